/// Outbound email rendering
///
/// Produces the subject, HTML body and plain-text alternative for each
/// message kind. Links point at the configured frontend.

use chrono::Datelike;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl RenderedEmail {
    fn new(subject: &str, html: String) -> Self {
        let text = html_to_plain_text(&html);
        Self {
            subject: subject.to_string(),
            html,
            text,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TemplateRenderer {
    frontend_url: String,
    verification_expiry_hours: i64,
}

impl TemplateRenderer {
    pub fn new(frontend_url: impl Into<String>, verification_expiry_hours: i64) -> Self {
        Self {
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
            verification_expiry_hours,
        }
    }

    pub fn verification_email(&self, user_name: &str, token: &str) -> RenderedEmail {
        let verification_url = format!("{}/auth/verify-email?token={}", self.frontend_url, token);
        let body = format!(
            "<p>Hi {name},</p>\
             <p>Please confirm your email address by following the link below.</p>\
             <p><a href=\"{url}\">{url}</a></p>\
             <p>This link expires in {hours} hours.</p>",
            name = escape_html(user_name),
            url = verification_url,
            hours = self.verification_expiry_hours,
        );
        RenderedEmail::new("Verify Your Email Address", self.layout(&body))
    }

    pub fn welcome_email(&self, user_name: &str) -> RenderedEmail {
        let body = format!(
            "<p>Hi {name},</p>\
             <p>Your email address is verified and your account is active.</p>\
             <p><a href=\"{url}\">Sign in</a></p>",
            name = escape_html(user_name),
            url = self.frontend_url,
        );
        RenderedEmail::new("Welcome!", self.layout(&body))
    }

    pub fn password_reset_email(&self, user_name: &str, token: &str) -> RenderedEmail {
        let reset_url = format!("{}/auth/reset-password?token={}", self.frontend_url, token);
        let body = format!(
            "<p>Hi {name},</p>\
             <p>We received a request to reset your password.</p>\
             <p><a href=\"{url}\">{url}</a></p>\
             <p>If you did not ask for this, you can ignore this email.</p>",
            name = escape_html(user_name),
            url = reset_url,
        );
        RenderedEmail::new("Reset Your Password", self.layout(&body))
    }

    fn layout(&self, body: &str) -> String {
        format!(
            "<html><body>{body}\
             <hr><p>Need help? <a href=\"{support}\">{support}</a></p>\
             <p>&copy; {year}</p></body></html>",
            body = body,
            support = format!("{}/support", self.frontend_url),
            year = chrono::Utc::now().year(),
        )
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Strip tags, decode the common entities and collapse whitespace.
pub fn html_to_plain_text(html: &str) -> String {
    let text = TAG_REGEX.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&copy;", "(c)")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    WHITESPACE_REGEX.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new("https://app.example.com/", 24)
    }

    #[test]
    fn test_html_to_plain_text() {
        let text = html_to_plain_text("<p>Hello&nbsp;<b>world</b></p>\n\n<p>a &amp; b &lt;c&gt;</p>");
        assert_eq!(text, "Hello world a & b <c>");
    }

    #[test]
    fn test_verification_email_contains_link() {
        let email = renderer().verification_email("Ada", "tok_123");

        assert_eq!(email.subject, "Verify Your Email Address");
        assert!(email
            .html
            .contains("https://app.example.com/auth/verify-email?token=tok_123"));
        assert!(email.text.contains("expires in 24 hours"));
        assert!(!email.text.contains('<'));
    }

    #[test]
    fn test_names_are_escaped() {
        let email = renderer().welcome_email("<script>");
        assert!(!email.html.contains("<script>"));
        assert!(email.text.contains("Hi <script>"));
    }

    #[test]
    fn test_password_reset_email() {
        let email = renderer().password_reset_email("Ada", "reset_1");
        assert!(email
            .html
            .contains("https://app.example.com/auth/reset-password?token=reset_1"));
        assert!(email.html.contains("https://app.example.com/support"));
    }
}
