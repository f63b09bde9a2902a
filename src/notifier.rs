/// Outbound account notifications.
///
/// `AuthService` only sees the `Notifier` capability. `EmailNotifier`
/// renders with a `TemplateRenderer` and delivers with an `EmailClient`.
use async_trait::async_trait;

use crate::email_client::EmailClient;
use crate::error::EmailError;
use crate::templates::{RenderedEmail, TemplateRenderer};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification(&self, email: &str, name: &str, token: &str)
        -> Result<(), EmailError>;

    async fn send_welcome(&self, email: &str, name: &str) -> Result<(), EmailError>;

    async fn send_password_reset(
        &self,
        email: &str,
        name: &str,
        token: &str,
    ) -> Result<(), EmailError>;
}

pub struct EmailNotifier {
    client: EmailClient,
    templates: TemplateRenderer,
}

impl EmailNotifier {
    pub fn new(client: EmailClient, templates: TemplateRenderer) -> Self {
        Self { client, templates }
    }

    async fn deliver(&self, recipient: &str, email: RenderedEmail) -> Result<(), EmailError> {
        self.client
            .send_email(recipient, &email.subject, &email.html, &email.text)
            .await
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_verification(
        &self,
        email: &str,
        name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        self.deliver(email, self.templates.verification_email(name, token))
            .await
    }

    async fn send_welcome(&self, email: &str, name: &str) -> Result<(), EmailError> {
        self.deliver(email, self.templates.welcome_email(name)).await
    }

    async fn send_password_reset(
        &self,
        email: &str,
        name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        self.deliver(email, self.templates.password_reset_email(name, token))
            .await
    }
}
