use std::net::TcpListener;
use std::sync::Arc;

use async_trait::async_trait;
use authcore::configuration::{
    ApplicationSettings, DatabaseSettings, EmailClientSettings, JwtSettings, PasswordSettings,
    Settings, VerificationSettings,
};
use authcore::error::{ConfigError, EmailError};
use authcore::notifier::Notifier;
use authcore::service::AuthService;
use authcore::startup::run;
use authcore::store::memory::InMemoryStore;
use authcore::store::Repositories;

struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn send_verification(&self, _: &str, _: &str, _: &str) -> Result<(), EmailError> {
        Ok(())
    }

    async fn send_welcome(&self, _: &str, _: &str) -> Result<(), EmailError> {
        Ok(())
    }

    async fn send_password_reset(&self, _: &str, _: &str, _: &str) -> Result<(), EmailError> {
        Ok(())
    }
}

fn settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "authcore".to_string(),
        },
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        jwt: JwtSettings {
            secret: "health-secret".to_string(),
            algorithm: "HS256".to_string(),
            access_token_expire_minutes: 15,
            refresh_token_expire_days: 7,
            issuer: "authcore".to_string(),
        },
        password: PasswordSettings::default(),
        verification: VerificationSettings::default(),
        email_client: EmailClientSettings {
            base_url: "http://localhost".to_string(),
            sender_email: "noreply@example.com".to_string(),
            authorization_token: "token".to_string(),
            timeout_milliseconds: 1000,
            frontend_url: "http://localhost:3000".to_string(),
        },
    }
}

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let service = AuthService::from_settings(
        &settings(),
        Repositories::shared(Arc::new(InMemoryStore::new())),
        Arc::new(SilentNotifier),
    )
    .expect("Failed to build auth service");
    let server = run(listener, service).expect("Failed to create server");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[test]
fn out_of_range_lifetimes_are_rejected_at_startup() {
    let cases: [(fn(&mut Settings), &str); 3] = [
        (
            |s: &mut Settings| s.verification.token_expire_hours = 0,
            "verification.token_expire_hours",
        ),
        (
            |s: &mut Settings| s.jwt.refresh_token_expire_days = 100_000_000,
            "jwt.refresh_token_expire_days",
        ),
        (
            |s: &mut Settings| s.jwt.access_token_expire_minutes = -1,
            "jwt.access_token_expire_minutes",
        ),
    ];

    for (tweak, expected_field) in cases {
        let mut settings = settings();
        tweak(&mut settings);

        let result = AuthService::from_settings(
            &settings,
            Repositories::shared(Arc::new(InMemoryStore::new())),
            Arc::new(SilentNotifier),
        );

        match result {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected_field),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("{} should have been rejected", expected_field),
        }
    }
}
