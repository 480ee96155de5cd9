//! Dispatch sequencing: one notification per recipient address
//!
//! Recipients are walked in roster order and their addresses in insertion
//! order. Each address gets a fresh signing token and link. A failure for one
//! address is recorded and the run moves on; a channel that reports itself
//! unavailable ends the run with a single aggregate error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::model::SignatureRequest;
use crate::template::render_signature_request;
use crate::token::{signing_url, SigningToken};

/// One outbound email as handed to the delivery channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

/// Accepted notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: Option<String>,
}

/// Delivery failures, split by whether the rest of the run can proceed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel cannot deliver anything; the run stops
    #[error("notification service unavailable: {0}")]
    Unavailable(String),

    /// Non-success HTTP status; `message` is the relay's error or `HTTP {status}`
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The relay answered but reported `success: false`
    #[error("{0}")]
    Failed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed relay response: {0}")]
    MalformedResponse(String),
}

impl ChannelError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ChannelError::Unavailable(_))
    }
}

/// Delivery seam used by the sequencer
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<Delivery, ChannelError>;
}

/// A persisted recipient and the addresses to notify in this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecipient {
    pub recipient_id: String,
    pub emails: Vec<String>,
}

/// Everything one dispatch run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Persisted request id, embedded in every signing link
    pub run_id: String,
    pub signing_base_url: String,
    #[serde(default)]
    pub document_url: Option<String>,
    pub request: SignatureRequest,
    /// Roster order; in sequential mode index + 1 is the order number
    pub recipients: Vec<DispatchRecipient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Not attempted because the run was aborted first
    Pending,
    Sent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub address: String,
    pub recipient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<u32>,
    /// SHA-256 of the token sent to this address, absent when never attempted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_digest: Option<String>,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

/// Result of one dispatch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// True iff `errors` is empty
    pub success: bool,
    pub sent_emails: Vec<String>,
    pub errors: Vec<String>,
    /// Addresses a send was attempted for
    pub attempted: usize,
    pub records: Vec<DispatchRecord>,
}

impl DispatchReport {
    pub fn summary(&self) -> String {
        format!(
            "{} of {} notifications sent",
            self.sent_emails.len(),
            self.attempted
        )
    }
}

/// Run one dispatch over `request.recipients`
#[instrument(
    skip(channel, request),
    fields(run_id = %request.run_id, recipients = request.recipients.len())
)]
pub async fn dispatch<C>(channel: &C, request: &DispatchRequest) -> DispatchReport
where
    C: NotificationChannel + ?Sized,
{
    let mut report = DispatchReport::default();
    let mut aborted = false;

    for (index, recipient) in request.recipients.iter().enumerate() {
        let order_number = request.request.sign_in_order.then(|| index as u32 + 1);

        for address in &recipient.emails {
            if aborted {
                report.records.push(DispatchRecord {
                    address: address.clone(),
                    recipient_id: recipient.recipient_id.clone(),
                    order_number,
                    token_digest: None,
                    outcome: DispatchOutcome::Pending,
                });
                continue;
            }

            let token = SigningToken::generate();
            let link = signing_url(
                &request.signing_base_url,
                &request.run_id,
                &recipient.recipient_id,
                &token,
            );
            let content = render_signature_request(&request.request, &link, order_number);
            let notification = Notification {
                to: address.clone(),
                subject: content.subject,
                html_body: content.html_body,
                text_body: content.text_body,
                pdf_url: request.document_url.clone(),
            };

            report.attempted += 1;
            let outcome = match channel.deliver(&notification).await {
                Ok(delivery) => {
                    info!(address = %address, recipient_id = %recipient.recipient_id, ?order_number, "notification sent");
                    report.sent_emails.push(address.clone());
                    DispatchOutcome::Sent {
                        message_id: delivery.message_id,
                    }
                }
                Err(err) if err.is_unavailable() => {
                    warn!(address = %address, error = %err, "notification channel unavailable, aborting run");
                    let reason = err.to_string();
                    // Per-address reasons stay in the records
                    report.errors = vec![reason.clone()];
                    aborted = true;
                    DispatchOutcome::Failed { reason }
                }
                Err(err) => {
                    warn!(address = %address, error = %err, "notification failed");
                    let reason = format!("Failed to send to {}: {}", address, err);
                    report.errors.push(reason.clone());
                    DispatchOutcome::Failed { reason }
                }
            };

            report.records.push(DispatchRecord {
                address: address.clone(),
                recipient_id: recipient.recipient_id.clone(),
                order_number,
                token_digest: Some(token.digest()),
                outcome,
            });
        }
    }

    report.success = report.errors.is_empty();
    info!(
        sent = report.sent_emails.len(),
        attempted = report.attempted,
        errors = report.errors.len(),
        "dispatch finished"
    );
    report
}
