//! Signature request notification content

use serde::{Deserialize, Serialize};

use crate::model::SignatureRequest;

/// Rendered subject and bodies for one notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Sentence describing the recipient's place in a sequential signing order
pub fn order_text(order_number: u32) -> String {
    let next = if order_number > 1 {
        "You will be notified when it's your turn to sign."
    } else {
        "You can sign immediately."
    };
    format!(
        "You are recipient #{} in the signing order. {}",
        order_number, next
    )
}

/// Render the request email for one recipient address
///
/// `order_number` is only shown when the request is sequential.
pub fn render_signature_request(
    request: &SignatureRequest,
    signing_url: &str,
    order_number: Option<u32>,
) -> NotificationContent {
    let subject = format!("Signature Request: {}", request.title);
    let order = order_number
        .filter(|_| request.sign_in_order)
        .map(order_text);

    let title = escape_html(&request.title);
    let document_name = escape_html(&request.document_name);
    let sender_name = escape_html(&request.sender_name);
    let sender_email = escape_html(&request.sender_email);
    let link = escape_html(signing_url);

    let message_html = request
        .message_text()
        .map(|m| {
            format!(
                r#"<p><strong>Message:</strong></p><p style="font-style: italic;">{}</p>"#,
                escape_html(m)
            )
        })
        .unwrap_or_default();

    let order_html = order
        .as_deref()
        .map(|text| {
            format!(
                r#"<div style="background: #e3f2fd; padding: 15px; border-radius: 6px; margin: 15px 0;"><p><strong>Signing Order:</strong> {}</p></div>"#,
                escape_html(text)
            )
        })
        .unwrap_or_default();

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Signature Request</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background: #f8f9fa; padding: 20px; border-radius: 8px; margin-bottom: 20px;">
    <h1 style="margin: 0; color: #007bff;">Signature Request</h1>
    <p style="margin: 10px 0 0 0; color: #6c757d;">You have been requested to sign a document</p>
  </div>
  <p>Hello,</p>
  <p>You have received a signature request for the following document:</p>
  <div style="border: 1px solid #e9ecef; border-radius: 8px; padding: 20px; margin: 20px 0;">
    <h3 style="margin-top: 0;">{title}</h3>
    <p><strong>Document:</strong> {document_name}</p>
    <p><strong>From:</strong> {sender_name} ({sender_email})</p>
    {message_html}
  </div>
  {order_html}
  <div style="text-align: center; margin: 30px 0;">
    <a href="{link}" style="display: inline-block; background: #007bff; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; font-weight: 500;">Review &amp; Sign Document</a>
  </div>
  <p><strong>What happens next?</strong></p>
  <ul>
    <li>Click the button above to review the document</li>
    <li>Add your signature where indicated</li>
    <li>Submit your signed document</li>
    <li>All parties will receive a copy once complete</li>
  </ul>
  <div style="margin-top: 30px; padding-top: 20px; border-top: 1px solid #e9ecef; font-size: 14px; color: #6c757d;">
    <p>If you have any questions about this document, please contact {sender_name} at {sender_email}.</p>
    <p><small>This is an automated message. Please do not reply to this email.</small></p>
  </div>
</body>
</html>"#
    );

    let mut text_body = format!(
        "Signature Request: {}\n\n\
         Hello,\n\n\
         You have received a signature request for the following document:\n\n\
         Document: {}\n\
         File: {}\n\
         From: {} ({})\n",
        request.title,
        request.title,
        request.document_name,
        request.sender_name,
        request.sender_email
    );
    if let Some(message) = request.message_text() {
        text_body.push_str(&format!("\nMessage: {}\n", message));
    }
    if let Some(order) = &order {
        text_body.push_str(&format!("\nSigning Order: {}\n", order));
    }
    text_body.push_str(&format!(
        "\nTo review and sign the document, please visit:\n{}\n\n\
         What happens next?\n\
         1. Click the link above to review the document\n\
         2. Add your signature where indicated\n\
         3. Submit your signed document\n\
         4. All parties will receive a copy once complete\n\n\
         If you have any questions about this document, please contact {} at {}.",
        signing_url, request.sender_name, request.sender_email
    ));

    NotificationContent {
        subject,
        html_body,
        text_body,
    }
}
