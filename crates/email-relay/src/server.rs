//! HTTP surface of the relay
//!
//! - POST /functions/v1/send-email - Send one notification
//! - POST /functions/v1/test-email - Send a configuration test email
//! - GET /health - Health check

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use crate::sendgrid::{describe_rejection, MailProvider, OutboundEmail, ProviderError};
use crate::types::{
    is_valid_email, Attachment, SendEmailRequest, SendEmailResponse, TestEmailRequest,
    TestEmailResponse,
};
use crate::{RelayConfig, VERSION};

/// Recipient of the test email when neither `testEmail` nor `FROM_EMAIL` is set
pub const FALLBACK_TEST_RECIPIENT: &str = "test@example.com";

/// Shared relay state
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub provider: Arc<dyn MailProvider>,
    /// Used to fetch `pdfUrl` attachments
    pub http: reqwest::Client,
}

impl RelayState {
    pub fn new(config: RelayConfig, provider: Arc<dyn MailProvider>) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            http: reqwest::Client::new(),
        }
    }
}

/// Build the relay router
pub fn router(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let functions = Router::new()
        .route(
            "/functions/v1/send-email",
            post(send_email)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/functions/v1/test-email",
            post(test_email)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(functions)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Reject calls without the configured bearer key; preflights pass through
async fn require_api_key(State(state): State<RelayState>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match (state.config.api_key.as_deref(), presented) {
        (Some(expected), Some(given)) if bool::from(given.as_bytes().ct_eq(expected.as_bytes())) => {
            next.run(request).await
        }
        _ => {
            warn!(path = %request.uri().path(), "Rejected relay call without valid API key");
            json_response(
                StatusCode::UNAUTHORIZED,
                SendEmailResponse::failed("Unauthorized"),
            )
        }
    }
}

/// Handle POST /functions/v1/send-email
#[instrument(skip_all)]
async fn send_email(State(state): State<RelayState>, body: Bytes) -> Response {
    let request: SendEmailRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                SendEmailResponse::failed(format!("Invalid request: {}", e)),
            );
        }
    };

    if let Err(e) = request.validate() {
        return json_response(StatusCode::BAD_REQUEST, SendEmailResponse::failed(e.to_string()));
    }

    if !state.provider.is_configured() {
        error!("SENDGRID_API_KEY not found in environment variables");
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            SendEmailResponse::failed(ProviderError::NotConfigured.to_string()),
        );
    }

    let mut attachments = Vec::new();
    if let Some(url) = request.pdf_url.as_deref() {
        if let Some(attachment) = fetch_pdf_attachment(&state.http, url).await {
            attachments.push(attachment);
        }
    }

    let email = OutboundEmail {
        to: request.to,
        subject: request.subject,
        html_body: request.html_body,
        text_body: request.text_body,
        attachments,
    };

    match state.provider.send(&email).await {
        Ok(message_id) => {
            let message_id = message_id.unwrap_or_else(|| "unknown".to_string());
            info!(
                to = %email.to,
                subject = %email.subject,
                message_id = %message_id,
                attachments = email.attachments.len(),
                "Email sent successfully"
            );
            json_response(StatusCode::OK, SendEmailResponse::sent(message_id))
        }
        Err(ProviderError::NotConfigured) => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            SendEmailResponse::failed(ProviderError::NotConfigured.to_string()),
        ),
        Err(e) => {
            error!(to = %email.to, error = %e, "Failed to send email");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                SendEmailResponse::failed("Failed to send email"),
            )
        }
    }
}

/// Fetch `url` and wrap it as `document.pdf`; failures only warn
async fn fetch_pdf_attachment(http: &reqwest::Client, url: &str) -> Option<Attachment> {
    let response = match http.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(url, error = %e, "Error fetching PDF for attachment");
            return None;
        }
    };

    if !response.status().is_success() {
        warn!(url, status = response.status().as_u16(), "Failed to fetch PDF for attachment");
        return None;
    }

    match response.bytes().await {
        Ok(bytes) => Some(Attachment::pdf("document.pdf", BASE64.encode(&bytes))),
        Err(e) => {
            warn!(url, error = %e, "Error reading PDF for attachment");
            None
        }
    }
}

/// Handle POST /functions/v1/test-email
#[instrument(skip_all)]
async fn test_email(State(state): State<RelayState>, body: Bytes) -> Response {
    // No body or invalid JSON: continue without a test address
    let request: TestEmailRequest = serde_json::from_slice(&body).unwrap_or_default();

    let recipient = request
        .test_email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .or_else(|| state.config.from_email.clone())
        .unwrap_or_else(|| FALLBACK_TEST_RECIPIENT.to_string());

    info!(
        has_sendgrid_key = state.provider.is_configured(),
        from_email = state.config.from_email.as_deref().unwrap_or("not set"),
        from_name = state.config.from_name.as_deref().unwrap_or("not set"),
        test_recipient = %recipient,
        "Environment check"
    );

    if !is_valid_email(&recipient) {
        return json_response(
            StatusCode::BAD_REQUEST,
            TestEmailResponse {
                success: false,
                message: None,
                error: Some(format!("Invalid email address: {}", recipient)),
                details: json!(null),
            },
        );
    }

    if !state.provider.is_configured() {
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            TestEmailResponse {
                success: false,
                message: None,
                error: Some("SENDGRID_API_KEY not found".to_string()),
                details: json!("Please add SENDGRID_API_KEY to the relay environment"),
            },
        );
    }

    let email = configuration_test_email(&state.config, &recipient);

    match state.provider.send(&email).await {
        Ok(message_id) => json_response(
            StatusCode::OK,
            TestEmailResponse {
                success: true,
                message: Some("SendGrid configuration is working!".to_string()),
                error: None,
                details: json!({
                    "apiKeyConfigured": true,
                    "fromEmail": state.config.from_email.as_deref().unwrap_or("using default"),
                    "fromName": state.config.from_name.as_deref().unwrap_or("using default"),
                    "testRecipient": recipient,
                    "messageId": message_id,
                }),
            },
        ),
        Err(ProviderError::Rejected { status, body }) => {
            let suggestion = if status == 401 {
                "Check if your SendGrid API key is correct and has mail.send permissions"
            } else {
                "Check SendGrid API documentation for this error"
            };
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                TestEmailResponse {
                    success: false,
                    message: None,
                    error: Some("SendGrid API error".to_string()),
                    details: json!({
                        "status": status,
                        "error": describe_rejection(&body),
                        "suggestion": suggestion,
                    }),
                },
            )
        }
        Err(e) => {
            error!(error = %e, "Test email failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                TestEmailResponse {
                    success: false,
                    message: None,
                    error: Some("Test email failed".to_string()),
                    details: json!(e.to_string()),
                },
            )
        }
    }
}

fn configuration_test_email(config: &RelayConfig, recipient: &str) -> OutboundEmail {
    let timestamp = Utc::now().to_rfc3339();
    let from = config.sender_email();

    OutboundEmail {
        to: recipient.to_string(),
        subject: "SendGrid Configuration Test".to_string(),
        text_body: format!(
            "SendGrid Test Email\n\n\
             This is a test email sent to: {recipient}\n\n\
             If you receive this email, your eSignature email system is working correctly!\n\n\
             Timestamp: {timestamp}"
        ),
        html_body: format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h2 style="color: #22c55e;">SendGrid Test Email</h2>
  <p>This is a test email sent to: <strong>{recipient}</strong></p>
  <p><strong>If you receive this email, your eSignature email system is working correctly!</strong></p>
  <div style="background: #f3f4f6; padding: 15px; border-radius: 8px; margin: 20px 0;">
    <p><strong>Test Details:</strong></p>
    <ul>
      <li>Timestamp: {timestamp}</li>
      <li>From: {from}</li>
      <li>Service: SendGrid API</li>
    </ul>
  </div>
</div>"#
        ),
        attachments: Vec::new(),
    }
}

/// Handle GET /health
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "version": VERSION }))
}

/// Handle CORS preflight
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        SendEmailResponse::failed("Method not allowed"),
    )
}

/// Create a JSON response
fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const KEY: &str = "relay-secret";

    struct FakeProvider {
        configured: bool,
        reject_with: Option<(u16, String)>,
        sent: Mutex<Vec<OutboundEmail>>,
    }

    impl FakeProvider {
        fn accepting() -> Self {
            Self {
                configured: true,
                reject_with: None,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MailProvider for FakeProvider {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn send(&self, email: &OutboundEmail) -> Result<Option<String>, ProviderError> {
            self.sent.lock().unwrap().push(email.clone());
            match &self.reject_with {
                Some((status, body)) => Err(ProviderError::Rejected {
                    status: *status,
                    body: body.clone(),
                }),
                None => Ok(Some("sg-123".to_string())),
            }
        }
    }

    fn app(provider: Arc<FakeProvider>, config: RelayConfig) -> Router {
        router(RelayState::new(config, provider))
    }

    fn config() -> RelayConfig {
        RelayConfig {
            api_key: Some(KEY.to_string()),
            ..Default::default()
        }
    }

    fn post_json(uri: &str, key: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn notification() -> serde_json::Value {
        json!({
            "to": "signer@example.com",
            "subject": "Signature Request: NDA",
            "htmlBody": "<p>Sign</p>",
            "textBody": "Sign",
        })
    }

    #[tokio::test]
    async fn test_send_email_success() {
        let provider = Arc::new(FakeProvider::accepting());
        let response = app(provider.clone(), config())
            .oneshot(post_json("/functions/v1/send-email", Some(KEY), notification()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "messageId": "sg-123"})
        );
        let sent = provider.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "signer@example.com");
        assert!(sent[0].attachments.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthorized() {
        let provider = Arc::new(FakeProvider::accepting());
        let response = app(provider.clone(), config())
            .oneshot(post_json("/functions/v1/send-email", None, notification()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(provider.clone(), config())
            .oneshot(post_json("/functions/v1/send-email", Some("wrong"), notification()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(provider.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_key_prefix_and_extension_are_unauthorized() {
        let provider = Arc::new(FakeProvider::accepting());
        let prefix = &KEY[..KEY.len() - 1];
        let extended = format!("{}x", KEY);

        for key in [prefix, extended.as_str(), ""] {
            let response = app(provider.clone(), config())
                .oneshot(post_json("/functions/v1/send-email", Some(key), notification()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "key {:?}", key);
        }
        assert!(provider.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relay_without_key_rejects_everything() {
        let provider = Arc::new(FakeProvider::accepting());
        let response = app(provider, RelayConfig::default())
            .oneshot(post_json("/functions/v1/send-email", Some(""), notification()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_fields_is_bad_request() {
        let provider = Arc::new(FakeProvider::accepting());
        let response = app(provider, config())
            .oneshot(post_json(
                "/functions/v1/send-email",
                Some(KEY),
                json!({"to": "signer@example.com", "subject": "Hi"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Missing required fields: to, subject, htmlBody"
        );
    }

    #[tokio::test]
    async fn test_provider_rejection_is_server_error() {
        let provider = Arc::new(FakeProvider {
            reject_with: Some((403, "forbidden".into())),
            ..FakeProvider::accepting()
        });
        let response = app(provider, config())
            .oneshot(post_json("/functions/v1/send-email", Some(KEY), notification()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": "Failed to send email"})
        );
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = Arc::new(FakeProvider {
            configured: false,
            ..FakeProvider::accepting()
        });
        let response = app(provider.clone(), config())
            .oneshot(post_json("/functions/v1/send-email", Some(KEY), notification()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "Email service not configured - Missing SendGrid API key"
        );
        assert!(provider.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_pdf_still_sends() {
        let provider = Arc::new(FakeProvider::accepting());
        let mut body = notification();
        body["pdfUrl"] = json!("http://127.0.0.1:1/document.pdf");
        let response = app(provider.clone(), config())
            .oneshot(post_json("/functions/v1/send-email", Some(KEY), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(provider.sent.lock().unwrap()[0].attachments.is_empty());
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        let provider = Arc::new(FakeProvider::accepting());
        let request = Request::builder()
            .method("GET")
            .uri("/functions/v1/send-email")
            .header("Authorization", format!("Bearer {}", KEY))
            .body(Body::empty())
            .unwrap();
        let response = app(provider, config()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_preflight_needs_no_key() {
        let provider = Arc::new(FakeProvider::accepting());
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/functions/v1/send-email")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app(provider, config()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_test_email_recipient_fallbacks() {
        let provider = Arc::new(FakeProvider::accepting());
        let cfg = RelayConfig {
            from_email: Some("team@example.com".into()),
            ..config()
        };

        let response = app(provider.clone(), cfg.clone())
            .oneshot(post_json(
                "/functions/v1/test-email",
                Some(KEY),
                json!({"testEmail": "me@example.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["details"]["testRecipient"], "me@example.com");

        let response = app(provider.clone(), cfg)
            .oneshot(post_json("/functions/v1/test-email", Some(KEY), json!({})))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["details"]["testRecipient"], "team@example.com");

        let response = app(provider.clone(), config())
            .oneshot(post_json("/functions/v1/test-email", Some(KEY), json!({})))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await["details"]["testRecipient"],
            FALLBACK_TEST_RECIPIENT
        );

        let sent = provider.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].subject, "SendGrid Configuration Test");
    }

    #[tokio::test]
    async fn test_test_email_unauthorized_key_hint() {
        let provider = Arc::new(FakeProvider {
            reject_with: Some((
                401,
                r#"{"errors":[{"message":"The provided authorization grant is invalid"}]}"#.into(),
            )),
            ..FakeProvider::accepting()
        });
        let response = app(provider, config())
            .oneshot(post_json("/functions/v1/test-email", Some(KEY), json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["details"]["status"], 401);
        assert_eq!(
            body["details"]["error"],
            "The provided authorization grant is invalid"
        );
        assert!(body["details"]["suggestion"]
            .as_str()
            .unwrap()
            .contains("mail.send permissions"));
    }

    #[tokio::test]
    async fn test_health() {
        let provider = Arc::new(FakeProvider::accepting());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app(provider, config()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }
}
