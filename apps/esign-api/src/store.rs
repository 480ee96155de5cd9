//! SQLite persistence for requests, recipients, fields and dispatch runs

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use esign_core::{
    token::verify_token, DispatchOutcome, DispatchReport, FieldKind, FieldPlacement, FieldState,
    PageField, Recipient, RequestStatus, SignatureRequest,
};
use sqlx::SqlitePool;

use crate::artifact::DocumentArtifact;
use crate::error::ApiError;
use crate::models::*;

/// Everything written when a request is created
pub struct NewRequest<'a> {
    pub id: &'a str,
    pub request: &'a SignatureRequest,
    /// Stored id paired with the submitted recipient, in roster order
    pub recipients: &'a [(String, Recipient)],
    /// Mapped field (stored ids) paired with its original placement
    pub fields: &'a [(PageField, FieldPlacement)],
    pub document: &'a DocumentArtifact,
    pub created_at: DateTime<Utc>,
}

/// Insert the request, its recipients, fields and document in one transaction
pub async fn insert_request(pool: &SqlitePool, new: &NewRequest<'_>) -> Result<(), sqlx::Error> {
    let now = new.created_at.to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO signature_requests (id, title, message, sign_in_order, document_name, sender_name, sender_email, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(new.id)
    .bind(new.request.title.trim())
    .bind(new.request.message_text())
    .bind(new.request.sign_in_order)
    .bind(&new.request.document_name)
    .bind(new.request.sender_name.trim())
    .bind(new.request.sender_email.trim())
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for (index, (id, recipient)) in new.recipients.iter().enumerate() {
        let emails_json = serde_json::to_string(&recipient.emails)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query(
            r#"
            INSERT INTO recipients (id, request_id, name, emails_json, role, signing_order_index, status)
            VALUES (?, ?, ?, ?, ?, ?, 'pending')
            "#,
        )
        .bind(id)
        .bind(new.id)
        .bind(&recipient.name)
        .bind(&emails_json)
        .bind(recipient.role.as_str())
        .bind(index as i64)
        .execute(&mut *tx)
        .await?;
    }

    for (field, placement) in new.fields {
        sqlx::query(
            r#"
            INSERT INTO signature_fields (id, request_id, recipient_id, field_type, page_number, x, y, width, height, pixel_x, pixel_y)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&field.field_id)
        .bind(new.id)
        .bind(&field.recipient_id)
        .bind(field.kind.as_str())
        .bind(field.page_number as i64)
        .bind(field.x)
        .bind(field.y)
        .bind(field.width)
        .bind(field.height)
        .bind(placement.x)
        .bind(placement.y)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO documents (request_id, document_name, document_hash, pdf_data, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.id)
    .bind(&new.request.document_name)
    .bind(&new.document.hash)
    .bind(&new.document.bytes)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

pub async fn fetch_request(pool: &SqlitePool, id: &str) -> Result<DbRequest, ApiError> {
    let request: Option<DbRequest> = sqlx::query_as(
        r#"
        SELECT id, title, message, sign_in_order, document_name, sender_name, sender_email,
               status, created_at, completed_at
        FROM signature_requests
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    request.ok_or_else(|| ApiError::RequestNotFound(id.to_string()))
}

/// Recipients of a request in signing order
pub async fn fetch_recipients(
    pool: &SqlitePool,
    request_id: &str,
) -> Result<Vec<DbRecipient>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, request_id, name, emails_json, role, signing_order_index, status, signed_at
        FROM recipients
        WHERE request_id = ?
        ORDER BY signing_order_index
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_recipient(
    pool: &SqlitePool,
    request_id: &str,
    recipient_id: &str,
) -> Result<Option<DbRecipient>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, request_id, name, emails_json, role, signing_order_index, status, signed_at
        FROM recipients
        WHERE request_id = ? AND id = ?
        "#,
    )
    .bind(request_id)
    .bind(recipient_id)
    .fetch_optional(pool)
    .await
}

/// Fields of a request, optionally only those of one recipient
pub async fn fetch_fields(
    pool: &SqlitePool,
    request_id: &str,
    recipient_id: Option<&str>,
) -> Result<Vec<DbField>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, request_id, recipient_id, field_type, page_number, x, y, width, height,
               pixel_x, pixel_y, value, signed_at
        FROM signature_fields
        WHERE request_id = ? AND (? IS NULL OR recipient_id = ?)
        ORDER BY rowid
        "#,
    )
    .bind(request_id)
    .bind(recipient_id)
    .bind(recipient_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_field(pool: &SqlitePool, field_id: &str) -> Result<Option<DbField>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, request_id, recipient_id, field_type, page_number, x, y, width, height,
               pixel_x, pixel_y, value, signed_at
        FROM signature_fields
        WHERE id = ?
        "#,
    )
    .bind(field_id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_dispatch_log(
    pool: &SqlitePool,
    request_id: &str,
) -> Result<Vec<DbDispatchEntry>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT run_number, recipient_id, address, order_number, status, message_id, reason, created_at
        FROM dispatch_log
        WHERE request_id = ?
        ORDER BY id
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_document(
    pool: &SqlitePool,
    request_id: &str,
) -> Result<Option<DbDocument>, sqlx::Error> {
    sqlx::query_as("SELECT document_name, pdf_data FROM documents WHERE request_id = ?")
        .bind(request_id)
        .fetch_optional(pool)
        .await
}

/// Append a dispatch run to the log and store the digests of delivered tokens
///
/// Returns the run number (1 for the first dispatch of a request).
pub async fn record_dispatch(
    pool: &SqlitePool,
    request_id: &str,
    report: &DispatchReport,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    let (last_run,): (Option<i64>,) =
        sqlx::query_as("SELECT MAX(run_number) FROM dispatch_log WHERE request_id = ?")
            .bind(request_id)
            .fetch_one(&mut *tx)
            .await?;
    let run_number = last_run.unwrap_or(0) + 1;

    for record in &report.records {
        let (status, message_id, reason) = match &record.outcome {
            DispatchOutcome::Pending => ("pending", None, None),
            DispatchOutcome::Sent { message_id } => ("sent", message_id.clone(), None),
            DispatchOutcome::Failed { reason } => ("failed", None, Some(reason.clone())),
        };

        sqlx::query(
            r#"
            INSERT INTO dispatch_log (request_id, run_number, recipient_id, address, order_number, status, message_id, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request_id)
        .bind(run_number)
        .bind(&record.recipient_id)
        .bind(&record.address)
        .bind(record.order_number.map(i64::from))
        .bind(status)
        .bind(message_id)
        .bind(reason)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        if let (true, Some(digest)) = (record.outcome.is_sent(), &record.token_digest) {
            sqlx::query(
                r#"
                INSERT INTO signing_tokens (token_digest, request_id, recipient_id, address, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(digest)
            .bind(request_id)
            .bind(&record.recipient_id)
            .bind(&record.address)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(run_number)
}

/// Whether `token` was delivered to this recipient of this request
pub async fn token_matches(
    pool: &SqlitePool,
    request_id: &str,
    recipient_id: &str,
    token: &str,
) -> Result<bool, sqlx::Error> {
    let digests: Vec<(String,)> = sqlx::query_as(
        "SELECT token_digest FROM signing_tokens WHERE request_id = ? AND recipient_id = ?",
    )
    .bind(request_id)
    .bind(recipient_id)
    .fetch_all(pool)
    .await?;

    Ok(digests
        .iter()
        .any(|(digest,)| verify_token(token, digest)))
}

pub async fn set_field_value(
    pool: &SqlitePool,
    field_id: &str,
    value: &str,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE signature_fields SET value = ?, signed_at = ? WHERE id = ?")
        .bind(value)
        .bind(at.to_rfc3339())
        .bind(field_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_recipient_signed(
    pool: &SqlitePool,
    recipient_id: &str,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE recipients SET status = 'signed', signed_at = ? WHERE id = ?")
        .bind(at.to_rfc3339())
        .bind(recipient_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_request_completed(
    pool: &SqlitePool,
    request_id: &str,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE signature_requests SET status = 'completed', completed_at = ? WHERE id = ? AND status != 'completed'",
    )
    .bind(at.to_rfc3339())
    .bind(request_id)
    .execute(pool)
    .await?;
    Ok(())
}

// ============================================================
// Row conversions
// ============================================================

impl DbRecipient {
    pub fn emails(&self) -> Result<Vec<String>, ApiError> {
        serde_json::from_str(&self.emails_json)
            .with_context(|| format!("corrupt emails for recipient {}", self.id))
            .map_err(ApiError::Internal)
    }

    pub fn view(&self) -> Result<RecipientView, ApiError> {
        Ok(RecipientView {
            id: self.id.clone(),
            name: self.name.clone(),
            emails: self.emails()?,
            role: self.role.parse().map_err(|e: String| ApiError::Internal(anyhow!(e)))?,
            signing_order_index: self.signing_order_index,
            status: self.status.parse().map_err(|e: String| ApiError::Internal(anyhow!(e)))?,
            signed_at: self.signed_at,
        })
    }
}

impl DbField {
    pub fn kind(&self) -> Result<FieldKind, ApiError> {
        self.field_type
            .parse()
            .map_err(|e: String| ApiError::Internal(anyhow!(e)))
    }

    pub fn view(&self) -> Result<FieldView, ApiError> {
        Ok(FieldView {
            id: self.id.clone(),
            recipient_id: self.recipient_id.clone(),
            kind: self.kind()?,
            page_number: self.page_number,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            pixel_x: self.pixel_x,
            pixel_y: self.pixel_y,
            value: self.value.clone(),
            signed_at: self.signed_at,
        })
    }

    pub fn state(&self) -> Result<FieldState, ApiError> {
        Ok(FieldState {
            field_id: self.id.clone(),
            recipient_id: self.recipient_id.clone(),
            kind: self.kind()?,
            value: self.value.clone(),
            signed_at: self.signed_at,
        })
    }
}

impl From<DbDispatchEntry> for DispatchLogEntry {
    fn from(row: DbDispatchEntry) -> Self {
        Self {
            run_number: row.run_number,
            recipient_id: row.recipient_id,
            address: row.address,
            order_number: row.order_number,
            status: row.status,
            message_id: row.message_id,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

impl DbRequest {
    pub fn status(&self) -> Result<RequestStatus, ApiError> {
        self.status
            .parse()
            .map_err(|e: String| ApiError::Internal(anyhow!(e)))
    }

    pub fn signature_request(&self) -> SignatureRequest {
        SignatureRequest {
            title: self.title.clone(),
            message: self.message.clone(),
            sign_in_order: self.sign_in_order,
            document_name: self.document_name.clone(),
            sender_name: self.sender_name.clone(),
            sender_email: self.sender_email.clone(),
        }
    }
}
