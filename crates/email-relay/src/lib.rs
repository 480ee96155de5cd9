//! Email relay for signature request notifications
//!
//! A small HTTP service that accepts one notification at a time and hands it
//! to SendGrid, plus the client the dispatcher uses to reach it.
//!
//! ## Endpoints
//!
//! - `POST /functions/v1/send-email` - send `{to, subject, htmlBody, textBody, pdfUrl?}`
//! - `POST /functions/v1/test-email` - send a configuration test email
//! - `GET /health` - liveness
//!
//! Both function endpoints require `Authorization: Bearer <RELAY_API_KEY>`.
//!
//! ## Architecture
//!
//! ```text
//! esign-api (RelayClient) → email-relay (this) → SendGrid → Recipient
//! ```

pub mod client;
pub mod sendgrid;
pub mod server;
pub mod types;

pub use client::RelayClient;
pub use sendgrid::{MailProvider, OutboundEmail, ProviderError, SendGridProvider};
pub use server::{router, RelayState};
pub use types::{SendEmailRequest, SendEmailResponse, TestEmailRequest, ValidationError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fallback sender when `FROM_EMAIL` is unset
pub const DEFAULT_FROM_EMAIL: &str = "noreply@esignature-demo.com";

/// Fallback display name when `FROM_NAME` is unset
pub const DEFAULT_FROM_NAME: &str = "eSignature Service";

/// Configuration for the relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Listen port
    pub port: u16,

    /// Bearer key callers must present
    pub api_key: Option<String>,

    pub sendgrid_api_key: Option<String>,

    /// Sender address; also the default test-email recipient
    pub from_email: Option<String>,

    pub from_name: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            api_key: None,
            sendgrid_api_key: None,
            from_email: None,
            from_name: None,
        }
    }
}

impl RelayConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8787),
            api_key: non_empty_var("RELAY_API_KEY"),
            sendgrid_api_key: non_empty_var("SENDGRID_API_KEY"),
            from_email: non_empty_var("FROM_EMAIL"),
            from_name: non_empty_var("FROM_NAME"),
        }
    }

    pub fn sender_email(&self) -> &str {
        self.from_email.as_deref().unwrap_or(DEFAULT_FROM_EMAIL)
    }

    pub fn sender_name(&self) -> &str {
        self.from_name.as_deref().unwrap_or(DEFAULT_FROM_NAME)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 8787);
        assert!(config.api_key.is_none());
        assert_eq!(config.sender_email(), DEFAULT_FROM_EMAIL);
        assert_eq!(config.sender_name(), DEFAULT_FROM_NAME);
    }

    #[test]
    fn test_configured_sender_wins() {
        let config = RelayConfig {
            from_email: Some("team@example.com".into()),
            from_name: Some("Team".into()),
            ..Default::default()
        };
        assert_eq!(config.sender_email(), "team@example.com");
        assert_eq!(config.sender_name(), "Team");
    }

    /// tracing-subscriber must carry the features main.rs configures:
    /// `.json()` and `EnvFilter`
    #[test]
    fn test_tracing_features_enabled() {
        fn _assert_features() {
            use tracing_subscriber::{fmt, EnvFilter};
            let _ = fmt::fmt().json().with_ansi(false).with_current_span(false);
            let _ = EnvFilter::from_default_env();
        }
    }
}
