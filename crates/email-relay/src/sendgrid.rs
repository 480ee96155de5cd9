//! SendGrid v3 mail provider
//!
//! Builds the `mail/send` payload (plain text first, then HTML, optional
//! attachments) and reads the message id from the `X-Message-Id` header.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::types::Attachment;
use crate::RelayConfig;

pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// One fully-resolved email handed to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub attachments: Vec<Attachment>,
}

/// Provider errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Email service not configured - Missing SendGrid API key")]
    NotConfigured,

    /// Non-2xx response; `body` is the raw provider response
    #[error("SendGrid returned HTTP {status}")]
    Rejected { status: u16, body: String },

    #[error("SendGrid request failed: {0}")]
    Transport(String),
}

/// Something that can deliver an [`OutboundEmail`]
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Whether credentials are present at all
    fn is_configured(&self) -> bool;

    /// Send and return the provider message id, if one was reported
    async fn send(&self, email: &OutboundEmail) -> Result<Option<String>, ProviderError>;
}

/// SendGrid-backed provider
pub struct SendGridProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    from_email: String,
    from_name: String,
}

impl SendGridProvider {
    pub fn new(config: &RelayConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: config.sendgrid_api_key.clone(),
            endpoint: SENDGRID_ENDPOINT.to_string(),
            from_email: config.sender_email().to_string(),
            from_name: config.sender_name().to_string(),
        }
    }

    /// Point at a different endpoint (for testing)
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// The JSON body SendGrid expects
    pub fn payload(&self, email: &OutboundEmail) -> Value {
        let mut payload = json!({
            "personalizations": [{
                "to": [{ "email": email.to }],
                "subject": email.subject,
            }],
            "from": {
                "email": self.from_email,
                "name": self.from_name,
            },
            "content": [
                { "type": "text/plain", "value": email.text_body },
                { "type": "text/html", "value": email.html_body },
            ],
        });
        if !email.attachments.is_empty() {
            payload["attachments"] = json!(email.attachments);
        }
        payload
    }
}

#[async_trait]
impl MailProvider for SendGridProvider {
    fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: &OutboundEmail) -> Result<Option<String>, ProviderError> {
        let api_key = match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(ProviderError::NotConfigured),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&self.payload(email))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            info!(message_id = ?message_id, "Email accepted by SendGrid");
            Ok(message_id)
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), error = %body, "SendGrid API error");
            Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[derive(Deserialize)]
struct SendGridErrors {
    #[serde(default)]
    errors: Vec<SendGridErrorItem>,
}

#[derive(Deserialize)]
struct SendGridErrorItem {
    message: String,
}

/// First `errors[].message` of a SendGrid error body, else the raw body
pub fn describe_rejection(body: &str) -> String {
    serde_json::from_str::<SendGridErrors>(body)
        .ok()
        .and_then(|e| e.errors.into_iter().next())
        .map(|e| e.message)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn provider() -> SendGridProvider {
        let config = RelayConfig {
            sendgrid_api_key: Some("SG.test".into()),
            from_email: Some("noreply@example.com".into()),
            from_name: Some("Signatures".into()),
            ..Default::default()
        };
        SendGridProvider::new(&config, reqwest::Client::new())
    }

    fn email(attachments: Vec<Attachment>) -> OutboundEmail {
        OutboundEmail {
            to: "signer@example.com".into(),
            subject: "Signature Request: NDA".into(),
            html_body: "<p>Sign</p>".into(),
            text_body: "Sign".into(),
            attachments,
        }
    }

    #[test]
    fn test_payload_shape() {
        let payload = provider().payload(&email(vec![]));
        assert_eq!(
            payload,
            json!({
                "personalizations": [{
                    "to": [{ "email": "signer@example.com" }],
                    "subject": "Signature Request: NDA",
                }],
                "from": { "email": "noreply@example.com", "name": "Signatures" },
                "content": [
                    { "type": "text/plain", "value": "Sign" },
                    { "type": "text/html", "value": "<p>Sign</p>" },
                ],
            })
        );
    }

    #[test]
    fn test_payload_includes_attachments() {
        let payload = provider().payload(&email(vec![Attachment::pdf("document.pdf", "JVBERi0=".into())]));
        assert_eq!(payload["attachments"][0]["filename"], "document.pdf");
        assert_eq!(payload["attachments"][0]["content"], "JVBERi0=");
    }

    #[test]
    fn test_configuration_detection() {
        assert!(provider().is_configured());
        let unconfigured = SendGridProvider::new(&RelayConfig::default(), reqwest::Client::new());
        assert!(!unconfigured.is_configured());
    }

    #[tokio::test]
    async fn test_send_without_key_is_not_configured() {
        let unconfigured = SendGridProvider::new(&RelayConfig::default(), reqwest::Client::new());
        let result = unconfigured.send(&email(vec![])).await;
        assert!(matches!(result, Err(ProviderError::NotConfigured)));
    }

    #[test]
    fn test_describe_rejection() {
        let body = r#"{"errors":[{"message":"The provided authorization grant is invalid","field":null}]}"#;
        assert_eq!(
            describe_rejection(body),
            "The provided authorization grant is invalid"
        );
        assert_eq!(describe_rejection("Bad Gateway"), "Bad Gateway");
    }
}
