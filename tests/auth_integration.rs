use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use authcore::auth::{CredentialHasher, TokenCodec};
use authcore::configuration::{JwtSettings, PasswordSettings};
use authcore::email_client::{EmailClient, SenderEmail};
use authcore::notifier::EmailNotifier;
use authcore::service::{AuthPolicy, AuthService};
use authcore::startup::run;
use authcore::store::memory::InMemoryStore;
use authcore::store::Repositories;
use authcore::templates::TemplateRenderer;

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub email_server: MockServer,
    pub client: reqwest::Client,
}

async fn spawn_app() -> TestApp {
    let email_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&email_server)
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let email_client = EmailClient::new(
        email_server.uri(),
        SenderEmail::parse("noreply@example.com".to_string()).unwrap(),
        "server-token".to_string(),
        std::time::Duration::from_secs(2),
    )
    .unwrap();
    let notifier = Arc::new(EmailNotifier::new(
        email_client,
        TemplateRenderer::new("http://localhost:3000", 24),
    ));

    let hasher = CredentialHasher::new(&PasswordSettings {
        time_cost: 1,
        memory_cost: 1024,
        parallelism: 1,
        hash_length: 32,
        salt_length: 16,
    })
    .unwrap();
    let codec = TokenCodec::new(&JwtSettings {
        secret: "integration-secret".to_string(),
        algorithm: "HS256".to_string(),
        access_token_expire_minutes: 15,
        refresh_token_expire_days: 7,
        issuer: "authcore-test".to_string(),
    })
    .unwrap();

    let store = Arc::new(InMemoryStore::new());
    let service = AuthService::new(
        Repositories::shared(store.clone()),
        hasher,
        codec,
        notifier,
        AuthPolicy::new(false, 24).unwrap(),
    );

    let server = run(listener, service).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        email_server,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn post_json(&self, route: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, route))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn register(&self, email: &str) -> reqwest::Response {
        self.post_json(
            "/auth/register",
            &json!({
                "email": email,
                "password": "pw123456",
                "first_name": "Ada",
                "last_name": "Lovelace"
            }),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    async fn verify(&self, token: &str) -> reqwest::Response {
        self.client
            .get(&format!("{}/auth/verify-email", &self.address))
            .query(&[("token", token)])
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn verification_token(&self, user_id: Uuid) -> String {
        let tokens = self.store.verification_tokens_for(user_id).await;
        assert_eq!(tokens.len(), 1);
        tokens[0].token.clone()
    }

    /// Register, verify and log in; returns the login response body.
    async fn logged_in_user(&self, email: &str) -> Value {
        let body: Value = self.register(email).await.json().await.unwrap();
        let user_id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();
        let token = self.verification_token(user_id).await;
        assert_eq!(self.verify(&token).await.status().as_u16(), 200);

        let response = self.login(email, "pw123456").await;
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.unwrap()
    }
}

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_with_inactive_user() {
    let app = spawn_app().await;

    let response = app.register("ada@example.com").await;
    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["first_name"], "Ada");
    assert_eq!(body["is_active"], false);
    assert_eq!(body["is_verified"], false);
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn register_sends_verification_email() {
    let app = spawn_app().await;

    let body: Value = app.register("ada@example.com").await.json().await.unwrap();
    let user_id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();
    let token = app.verification_token(user_id).await;

    let mut requests = Vec::new();
    for _ in 0..50 {
        requests = app.email_server.received_requests().await.unwrap();
        if !requests.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(requests.len(), 1);
    let email: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(email["To"], "ada@example.com");
    assert!(email["HtmlBody"].as_str().unwrap().contains(&token));
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app().await;
    app.register("ada@example.com").await;

    let response = app.register("ada@example.com").await;

    assert_eq!(409, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "DUPLICATE_EMAIL");
    assert_eq!(body["status"], 409);
    assert!(body.get("error_id").is_some());
}

#[tokio::test]
async fn register_returns_400_for_invalid_data() {
    let app = spawn_app().await;
    let test_cases = vec![
        (
            json!({"email": "not-an-email", "password": "pw123456", "first_name": "Ada", "last_name": "L"}),
            "invalid email",
        ),
        (
            json!({"email": "ada@example.com", "password": "short", "first_name": "Ada", "last_name": "L"}),
            "short password",
        ),
        (
            json!({"email": "ada@example.com", "password": "pw123456", "first_name": "", "last_name": "L"}),
            "empty first name",
        ),
        (json!({"email": "ada@example.com"}), "missing fields"),
    ];

    for (body, description) in test_cases {
        let response = app.post_json("/auth/register", &body).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 when the payload had {}.",
            description
        );
    }
    assert_eq!(app.store.user_count().await, 0);
}

// --- Login Tests ---

#[tokio::test]
async fn login_is_forbidden_before_verification() {
    let app = spawn_app().await;
    app.register("ada@example.com").await;

    let response = app.login("ada@example.com", "pw123456").await;

    assert_eq!(403, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ACCOUNT_INACTIVE");
}

#[tokio::test]
async fn login_returns_bearer_tokens_after_verification() {
    let app = spawn_app().await;

    let body = app.logged_in_user("ada@example.com").await;

    assert_eq!(body["token_type"], "bearer");
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
}

#[tokio::test]
async fn login_returns_401_for_bad_credentials() {
    let app = spawn_app().await;
    app.logged_in_user("ada@example.com").await;

    let wrong_password = app.login("ada@example.com", "wrong-password").await;
    let unknown_email = app.login("nobody@example.com", "pw123456").await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_email.status().as_u16());
    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_email.json().await.unwrap();
    assert_eq!(a["message"], b["message"]);
    assert_eq!(a["code"], "INVALID_CREDENTIALS");
}

// --- Verification Tests ---

#[tokio::test]
async fn verify_email_is_single_use() {
    let app = spawn_app().await;
    let body: Value = app.register("ada@example.com").await.json().await.unwrap();
    let user_id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();
    let token = app.verification_token(user_id).await;

    let first = app.verify(&token).await;
    assert_eq!(200, first.status().as_u16());
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["success"], true);

    let second = app.verify(&token).await;
    assert_eq!(400, second.status().as_u16());
    let second: Value = second.json().await.unwrap();
    assert_eq!(second["success"], false);
    assert_eq!(second["message"], "Invalid token");
}

// --- Refresh and Logout Tests ---

#[tokio::test]
async fn refresh_rotates_and_rejects_replay() {
    let app = spawn_app().await;
    let login = app.logged_in_user("ada@example.com").await;
    let refresh_token = login["refresh_token"].as_str().unwrap();

    let response = app
        .post_json("/auth/refresh", &json!({ "refresh_token": refresh_token }))
        .await;
    assert_eq!(200, response.status().as_u16());
    let rotated: Value = response.json().await.unwrap();
    assert_ne!(rotated["refresh_token"].as_str().unwrap(), refresh_token);

    let replay = app
        .post_json("/auth/refresh", &json!({ "refresh_token": refresh_token }))
        .await;
    assert_eq!(401, replay.status().as_u16());
    let replay: Value = replay.json().await.unwrap();
    assert_eq!(replay["code"], "TOKEN_NOT_FOUND");
}

#[tokio::test]
async fn refresh_rejects_access_token() {
    let app = spawn_app().await;
    let login = app.logged_in_user("ada@example.com").await;

    let response = app
        .post_json("/auth/refresh", &json!({ "refresh_token": login["access_token"] }))
        .await;

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let app = spawn_app().await;
    let login = app.logged_in_user("ada@example.com").await;
    let body = json!({ "refresh_token": login["refresh_token"] });

    let response = app.post_json("/auth/logout", &body).await;
    assert_eq!(200, response.status().as_u16());

    let refresh = app.post_json("/auth/refresh", &body).await;
    assert_eq!(401, refresh.status().as_u16());

    let unknown = app
        .post_json("/auth/logout", &json!({ "refresh_token": "never-issued" }))
        .await;
    assert_eq!(200, unknown.status().as_u16());
}

// --- Protected Route Tests ---

#[tokio::test]
async fn me_requires_bearer_access_token() {
    let app = spawn_app().await;
    let login = app.logged_in_user("ada@example.com").await;
    let url = format!("{}/users/me", &app.address);

    let missing = app.client.get(&url).send().await.unwrap();
    assert_eq!(401, missing.status().as_u16());

    let with_refresh = app
        .client
        .get(&url)
        .bearer_auth(login["refresh_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(401, with_refresh.status().as_u16());

    let response = app
        .client
        .get(&url)
        .bearer_auth(login["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["email"], "ada@example.com");
    assert_eq!(me["is_verified"], true);
}

#[tokio::test]
async fn logout_all_revokes_every_refresh_token() {
    let app = spawn_app().await;
    let first = app.logged_in_user("ada@example.com").await;
    let second: Value = app
        .login("ada@example.com", "pw123456")
        .await
        .json()
        .await
        .unwrap();

    let response = app
        .client
        .post(&format!("{}/users/me/logout-all", &app.address))
        .bearer_auth(first["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    for login in [first, second] {
        let refresh = app
            .post_json("/auth/refresh", &json!({ "refresh_token": login["refresh_token"] }))
            .await;
        assert_eq!(401, refresh.status().as_u16());
    }
}
