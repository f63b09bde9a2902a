use serde::Serialize;

use crate::configuration::EmailClientSettings;
use crate::error::{ConfigError, EmailError};
use crate::validators::is_valid_email;

/// HTTP client for a transactional email API.
#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: SenderEmail,
    authorization_token: String,
}

#[derive(Clone, Debug)]
pub struct SenderEmail(String);

impl SenderEmail {
    pub fn parse(s: String) -> Result<Self, String> {
        let email = is_valid_email(&s).map_err(|e| e.to_string())?;
        Ok(Self(email))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SenderEmail,
        authorization_token: String,
        timeout: std::time::Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            sender,
            authorization_token,
        })
    }

    pub fn from_settings(settings: &EmailClientSettings) -> Result<Self, ConfigError> {
        let sender = SenderEmail::parse(settings.sender_email.clone())
            .map_err(|e| ConfigError::invalid("email_client.sender_email", e))?;

        Self::new(
            settings.base_url.clone(),
            sender,
            settings.authorization_token.clone(),
            settings.timeout(),
        )
        .map_err(|e| ConfigError::invalid("email_client", e.to_string()))
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), EmailError> {
        let recipient = is_valid_email(recipient)
            .map_err(|e| EmailError::InvalidRecipient(e.to_string()))?;

        let url = format!("{}/email", self.base_url.trim_end_matches('/'));
        let request = SendEmailRequest {
            from: self.sender.inner(),
            to: &recipient,
            subject,
            html_body: html_content,
            text_body: text_content,
        };

        self.http_client
            .post(&url)
            .header("X-Postmark-Server-Token", &self.authorization_token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
