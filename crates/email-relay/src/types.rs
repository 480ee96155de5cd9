//! Relay wire types
//!
//! Field names are camelCase on the wire (`htmlBody`, `pdfUrl`, `messageId`).

use serde::{Deserialize, Serialize};

/// Body of `POST /functions/v1/send-email`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    #[serde(default)]
    pub to: String,

    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub html_body: String,

    /// Plain text body (optional, but recommended for deliverability)
    #[serde(default)]
    pub text_body: String,

    /// Document to fetch and attach as `document.pdf`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl SendEmailRequest {
    /// Validate the request
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.to.trim().is_empty()
            || self.subject.trim().is_empty()
            || self.html_body.trim().is_empty()
        {
            return Err(ValidationError::MissingFields);
        }
        if !is_valid_email(&self.to) {
            return Err(ValidationError::InvalidEmail(self.to.clone()));
        }
        Ok(())
    }
}

/// Response of `POST /functions/v1/send-email`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendEmailResponse {
    /// Create a successful result
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    /// Create a failed result
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(message.into()),
        }
    }
}

/// Body of `POST /functions/v1/test-email`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailRequest {
    #[serde(default)]
    pub test_email: Option<String>,
}

/// Response of `POST /functions/v1/test-email`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEmailResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub details: serde_json::Value,
}

/// Email attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Base64-encoded content
    pub content: String,

    pub filename: String,

    /// MIME type (e.g., "application/pdf")
    #[serde(rename = "type")]
    pub content_type: String,

    pub disposition: String,
}

impl Attachment {
    pub fn pdf(filename: &str, content_base64: String) -> Self {
        Self {
            content: content_base64,
            filename: filename.to_string(),
            content_type: "application/pdf".to_string(),
            disposition: "attachment".to_string(),
        }
    }
}

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: to, subject, htmlBody")]
    MissingFields,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

/// Check if email address is valid
pub fn is_valid_email(email: &str) -> bool {
    // Extract email from "Name <email@domain.com>" format
    let email = match (email.find('<'), email.rfind('>')) {
        (Some(start), Some(end)) if start < end => &email[start + 1..end],
        _ => email,
    };

    email_address::EmailAddress::is_valid(email.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_fields_rejected() {
        let request: SendEmailRequest =
            serde_json::from_str(r#"{"to": "a@example.com", "subject": "Hi"}"#).unwrap();
        assert_eq!(request.validate(), Err(ValidationError::MissingFields));
        assert_eq!(
            ValidationError::MissingFields.to_string(),
            "Missing required fields: to, subject, htmlBody"
        );
    }

    #[test]
    fn test_text_body_is_optional() {
        let request: SendEmailRequest = serde_json::from_str(
            r#"{"to": "a@example.com", "subject": "Hi", "htmlBody": "<p>Hi</p>"}"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.pdf_url, None);
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let request = SendEmailRequest {
            to: "not-an-email".into(),
            subject: "Hi".into(),
            html_body: "<p>Hi</p>".into(),
            ..Default::default()
        };
        assert_eq!(
            request.validate(),
            Err(ValidationError::InvalidEmail("not-an-email".into()))
        );
    }

    #[test]
    fn test_display_name_addresses() {
        assert!(is_valid_email("Signer <signer@example.com>"));
        assert!(is_valid_email("signer@example.com"));
        assert!(!is_valid_email("Signer <nope>"));
    }

    #[test]
    fn test_response_wire_format() {
        let json = serde_json::to_value(SendEmailResponse::sent("abc123")).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "messageId": "abc123"}));

        let json = serde_json::to_value(SendEmailResponse::failed("Failed to send email")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "Failed to send email"})
        );
    }

    #[test]
    fn test_attachment_uses_sendgrid_field_names() {
        let json = serde_json::to_value(Attachment::pdf("document.pdf", "JVBERi0=".into())).unwrap();
        assert_eq!(json["type"], "application/pdf");
        assert_eq!(json["disposition"], "attachment");
        assert_eq!(json["filename"], "document.pdf");
    }
}
