//! Data models for the eSignature API

use chrono::{DateTime, Utc};
use esign_core::{
    DispatchReport, FieldKind, FieldPlacement, PageField, Recipient, RecipientRole,
    RecipientStatus, RequestStatus, SigningProgress, Size,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Capture geometry as submitted; page and density fall back to server defaults
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeometryInput {
    pub surface: Size,
    pub capture: Size,
    #[serde(default)]
    pub page: Option<Size>,
    #[serde(default)]
    pub density: Option<f64>,
}

/// Request to create and send a signature request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequestBody {
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sign_in_order: bool,
    pub document_name: String,
    pub sender_name: String,
    pub sender_email: String,
    /// Roster order; ids are client-local
    pub recipients: Vec<Recipient>,
    /// Placements referencing the client-local recipient ids
    pub fields: Vec<FieldPlacement>,
    pub geometry: GeometryInput,
    /// The captured document, base64-encoded PDF
    pub pdf_base64: String,
}

/// Client-local recipient id and the id it was stored under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientIdMapping {
    pub client_id: String,
    pub recipient_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequestResponse {
    pub request_id: String,
    pub document_url: String,
    pub recipients: Vec<RecipientIdMapping>,
    pub fields: Vec<PageField>,
    pub report: DispatchReport,
    pub summary: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResendBody {
    /// Restrict the resend to these addresses
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub report: DispatchReport,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientView {
    pub id: String,
    pub name: Option<String>,
    pub emails: Vec<String>,
    pub role: RecipientRole,
    pub signing_order_index: i64,
    pub status: RecipientStatus,
    pub signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldView {
    pub id: String,
    pub recipient_id: String,
    pub kind: FieldKind,
    pub page_number: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Position on the preview surface the field was placed at
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub value: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchLogEntry {
    pub run_number: i64,
    pub recipient_id: String,
    pub address: String,
    pub order_number: Option<i64>,
    pub status: String,
    pub message_id: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestView {
    pub id: String,
    pub title: String,
    pub message: Option<String>,
    pub sign_in_order: bool,
    pub document_name: String,
    pub sender_name: String,
    pub sender_email: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub document_url: String,
    pub recipients: Vec<RecipientView>,
    pub fields: Vec<FieldView>,
    pub dispatch_log: Vec<DispatchLogEntry>,
}

/// Query of `GET /api/sign`, matching the signing link
#[derive(Debug, Clone, Deserialize)]
pub struct SigningQuery {
    pub request: String,
    pub recipient: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningView {
    pub request_id: String,
    pub title: String,
    pub message: Option<String>,
    pub document_name: String,
    pub sender_name: String,
    pub sender_email: String,
    pub request_status: RequestStatus,
    pub document_url: String,
    pub recipient: RecipientView,
    pub fields: Vec<FieldView>,
    pub progress: SigningProgress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillFieldBody {
    pub request: String,
    pub recipient: String,
    pub token: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillFieldResponse {
    pub field: FieldView,
    pub progress: SigningProgress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteBody {
    pub request: String,
    pub recipient: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub recipient_status: RecipientStatus,
    pub signed_at: Option<DateTime<Utc>>,
    pub request_status: RequestStatus,
}

/// Row of `signature_requests`
#[derive(Debug, Clone, FromRow)]
pub struct DbRequest {
    pub id: String,
    pub title: String,
    pub message: Option<String>,
    pub sign_in_order: bool,
    pub document_name: String,
    pub sender_name: String,
    pub sender_email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Row of `recipients`
#[derive(Debug, Clone, FromRow)]
pub struct DbRecipient {
    pub id: String,
    pub request_id: String,
    pub name: Option<String>,
    pub emails_json: String,
    pub role: String,
    pub signing_order_index: i64,
    pub status: String,
    pub signed_at: Option<DateTime<Utc>>,
}

/// Row of `signature_fields`
#[derive(Debug, Clone, FromRow)]
pub struct DbField {
    pub id: String,
    pub request_id: String,
    pub recipient_id: String,
    pub field_type: String,
    pub page_number: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub value: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
}

/// Row of `dispatch_log`
#[derive(Debug, Clone, FromRow)]
pub struct DbDispatchEntry {
    pub run_number: i64,
    pub recipient_id: String,
    pub address: String,
    pub order_number: Option<i64>,
    pub status: String,
    pub message_id: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row of `documents`
#[derive(Debug, Clone, FromRow)]
pub struct DbDocument {
    pub document_name: String,
    pub pdf_data: Vec<u8>,
}
