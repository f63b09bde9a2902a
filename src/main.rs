use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use authcore::configuration::get_configuration;
use authcore::email_client::EmailClient;
use authcore::notifier::EmailNotifier;
use authcore::service::AuthService;
use authcore::startup::run;
use authcore::store::postgres::PgStore;
use authcore::store::Repositories;
use authcore::telemetry::init_telemetry;
use authcore::templates::TemplateRenderer;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    tracing::error!(error = %err, "{}", context);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    let configuration =
        get_configuration().map_err(|e| startup_error("Failed to read configuration", e))?;
    tracing::info!("Configuration loaded successfully");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| startup_error("Failed to create connection pool", e))?;

    let store = Arc::new(PgStore::new(pool));
    store
        .migrate()
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;
    tracing::info!("Database ready");

    let email_client = EmailClient::from_settings(&configuration.email_client)
        .map_err(|e| startup_error("Invalid email client settings", e))?;
    let templates = TemplateRenderer::new(
        configuration.email_client.frontend_url.clone(),
        configuration.verification.token_expire_hours,
    );
    let notifier = Arc::new(EmailNotifier::new(email_client, templates));

    let service = AuthService::from_settings(
        &configuration,
        Repositories::shared(store),
        notifier,
    )
    .map_err(|e| startup_error("Invalid auth settings", e))?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!(address = %address, "Server listening");

    run(listener, service)?.await
}
