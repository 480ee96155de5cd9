//! RelayClient against a live relay router on an ephemeral port

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{http::StatusCode, routing::post, Json, Router};
use email_relay::client::SEND_EMAIL_PATH;
use email_relay::{
    router, MailProvider, OutboundEmail, ProviderError, RelayClient, RelayConfig, RelayState,
};
use esign_core::{
    dispatch, ChannelError, DispatchRecipient, DispatchRequest, Notification, NotificationChannel,
    SignatureRequest,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const KEY: &str = "integration-key";

#[derive(Default)]
struct RecordingProvider {
    rejected: HashSet<String>,
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl MailProvider for RecordingProvider {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, email: &OutboundEmail) -> Result<Option<String>, ProviderError> {
        if self.rejected.contains(&email.to) {
            return Err(ProviderError::Rejected {
                status: 400,
                body: "invalid recipient".into(),
            });
        }
        self.sent.lock().unwrap().push(email.to.clone());
        Ok(Some(format!("id-{}", email.to)))
    }
}

async fn spawn_relay(provider: Arc<RecordingProvider>) -> String {
    let config = RelayConfig {
        api_key: Some(KEY.to_string()),
        ..Default::default()
    };
    let app = router(RelayState::new(config, provider));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A relay stand-in that answers 200 with a body chosen by recipient
async fn spawn_stub() -> String {
    async fn send(Json(body): Json<Value>) -> (StatusCode, String) {
        let body = match body["to"].as_str() {
            Some("garbled@x.com") => "<html>gateway</html>".to_string(),
            Some("refused@x.com") => json!({ "success": false, "error": "x" }).to_string(),
            _ => json!({ "success": true, "messageId": "stub-1" }).to_string(),
        };
        (StatusCode::OK, body)
    }

    let app = Router::new().route(SEND_EMAIL_PATH, post(send));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn lease_run(emails: &[&str]) -> DispatchRequest {
    DispatchRequest {
        run_id: "req-44".into(),
        signing_base_url: "http://localhost:5173/sign".into(),
        document_url: None,
        request: SignatureRequest {
            title: "Lease".into(),
            message: None,
            sign_in_order: false,
            document_name: "lease.pdf".into(),
            sender_name: "Landlord".into(),
            sender_email: "landlord@example.com".into(),
        },
        recipients: vec![DispatchRecipient {
            recipient_id: "a".into(),
            emails: emails.iter().map(|e| e.to_string()).collect(),
        }],
    }
}

/// An address nothing is listening on
async fn closed_port() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn notification(to: &str) -> Notification {
    Notification {
        to: to.to_string(),
        subject: "Signature Request: Lease".into(),
        html_body: "<p>Please sign</p>".into(),
        text_body: "Please sign".into(),
        pdf_url: None,
    }
}

#[tokio::test]
async fn delivers_and_returns_message_id() {
    let provider = Arc::new(RecordingProvider::default());
    let base = spawn_relay(provider.clone()).await;
    let client = RelayClient::new(Some(base), Some(KEY.into()));

    let delivery = client.deliver(&notification("a@example.com")).await.unwrap();

    assert_eq!(delivery.message_id.as_deref(), Some("id-a@example.com"));
    assert_eq!(*provider.sent.lock().unwrap(), vec!["a@example.com".to_string()]);
}

#[tokio::test]
async fn provider_rejection_is_a_per_address_failure() {
    let provider = Arc::new(RecordingProvider {
        rejected: ["bad@example.com".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let base = spawn_relay(provider).await;
    let client = RelayClient::new(Some(base), Some(KEY.into()));

    let err = client.deliver(&notification("bad@example.com")).await.unwrap_err();

    assert_eq!(
        err,
        ChannelError::Rejected {
            status: 500,
            message: "Failed to send email".into()
        }
    );
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn wrong_key_is_rejected() {
    let base = spawn_relay(Arc::new(RecordingProvider::default())).await;
    let client = RelayClient::new(Some(base), Some("nope".into()));

    let err = client.deliver(&notification("a@example.com")).await.unwrap_err();

    assert!(matches!(err, ChannelError::Rejected { status: 401, .. }));
}

#[tokio::test]
async fn refused_connection_is_unavailable() {
    let client = RelayClient::new(Some(closed_port().await), Some(KEY.into()));

    let err = client.deliver(&notification("a@example.com")).await.unwrap_err();

    assert!(err.is_unavailable(), "expected Unavailable, got {:?}", err);
}

#[tokio::test]
async fn dispatch_through_relay_reports_partial_failure() {
    let provider = Arc::new(RecordingProvider {
        rejected: ["a2@x.com".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let base = spawn_relay(provider.clone()).await;
    let client = RelayClient::new(Some(base), Some(KEY.into()));

    let request = DispatchRequest {
        run_id: "req-42".into(),
        signing_base_url: "http://localhost:5173/sign".into(),
        document_url: None,
        request: SignatureRequest {
            title: "Lease".into(),
            message: None,
            sign_in_order: true,
            document_name: "lease.pdf".into(),
            sender_name: "Landlord".into(),
            sender_email: "landlord@example.com".into(),
        },
        recipients: vec![
            DispatchRecipient {
                recipient_id: "a".into(),
                emails: vec!["a1@x.com".into(), "a2@x.com".into()],
            },
            DispatchRecipient {
                recipient_id: "b".into(),
                emails: vec!["b1@x.com".into()],
            },
        ],
    };

    let report = dispatch(&client, &request).await;

    assert!(!report.success);
    assert_eq!(report.sent_emails, vec!["a1@x.com", "b1@x.com"]);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("a2@x.com"));
    assert_eq!(report.summary(), "2 of 3 notifications sent");
}

#[tokio::test]
async fn dispatch_aborts_when_relay_is_down() {
    let client = RelayClient::new(Some(closed_port().await), Some(KEY.into()));
    let request = DispatchRequest {
        run_id: "req-43".into(),
        signing_base_url: "http://localhost:5173/sign".into(),
        document_url: None,
        request: SignatureRequest {
            title: "Lease".into(),
            message: None,
            sign_in_order: false,
            document_name: "lease.pdf".into(),
            sender_name: "Landlord".into(),
            sender_email: "landlord@example.com".into(),
        },
        recipients: vec![DispatchRecipient {
            recipient_id: "a".into(),
            emails: vec!["a1@x.com".into(), "a2@x.com".into(), "a3@x.com".into()],
        }],
    };

    let report = dispatch(&client, &request).await;

    assert!(!report.success);
    assert!(report.sent_emails.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.attempted, 1);
}

#[tokio::test]
async fn unparsable_success_body_is_malformed_response() {
    let client = RelayClient::new(Some(spawn_stub().await), Some(KEY.into()));

    let err = client.deliver(&notification("garbled@x.com")).await.unwrap_err();

    assert!(
        matches!(err, ChannelError::MalformedResponse(_)),
        "expected MalformedResponse, got {:?}",
        err
    );
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn reported_failure_is_failed_with_relay_error() {
    let client = RelayClient::new(Some(spawn_stub().await), Some(KEY.into()));

    let err = client.deliver(&notification("refused@x.com")).await.unwrap_err();

    assert_eq!(err, ChannelError::Failed("x".into()));
}

#[tokio::test]
async fn dispatch_continues_past_malformed_and_failed_replies() {
    let client = RelayClient::new(Some(spawn_stub().await), Some(KEY.into()));

    let report = dispatch(
        &client,
        &lease_run(&["garbled@x.com", "refused@x.com", "ok@x.com"]),
    )
    .await;

    assert!(!report.success);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.sent_emails, vec!["ok@x.com"]);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].starts_with("Failed to send to garbled@x.com"));
    assert_eq!(report.errors[1], "Failed to send to refused@x.com: x");
}
