//! Relay client used as the dispatcher's delivery channel

use async_trait::async_trait;
use esign_core::{ChannelError, Delivery, Notification, NotificationChannel};
use tracing::{debug, instrument};

use crate::types::SendEmailResponse;

/// Path of the send endpoint, relative to the relay base URL
pub const SEND_EMAIL_PATH: &str = "/functions/v1/send-email";

/// Posts notifications to an email relay
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl RelayClient {
    /// A client with no `base_url` reports every delivery as unavailable
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_key)
    }

    pub fn with_client(http: reqwest::Client, base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn endpoint(&self) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}{}", base, SEND_EMAIL_PATH))
    }
}

#[async_trait]
impl NotificationChannel for RelayClient {
    #[instrument(skip(self, notification), fields(to = %notification.to))]
    async fn deliver(&self, notification: &Notification) -> Result<Delivery, ChannelError> {
        let endpoint = self
            .endpoint()
            .ok_or_else(|| ChannelError::Unavailable("email relay is not configured".to_string()))?;

        let mut request = self.http.post(&endpoint).json(notification);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_builder() {
                ChannelError::Unavailable(format!("cannot reach email relay: {}", e))
            } else {
                ChannelError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        let parsed = serde_json::from_str::<SendEmailResponse>(&body);
        debug!(status = status.as_u16(), "relay responded");

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = parsed.map_err(|e| ChannelError::MalformedResponse(e.to_string()))?;
        if !parsed.success {
            return Err(ChannelError::Failed(
                parsed
                    .error
                    .unwrap_or_else(|| "relay reported failure".to_string()),
            ));
        }

        Ok(Delivery {
            message_id: parsed.message_id,
        })
    }
}
