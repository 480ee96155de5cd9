//! HTTP handlers for the eSignature API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use esign_core::{
    coords::MM_TO_PX, dispatch, map_fields, signing, CaptureGeometry, DispatchRecipient,
    DispatchReport, DispatchRequest, FieldPlacement, PageField, Recipient, RecipientStatus,
    RequestStatus, Roster, SignatureRequest,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::artifact::decode_pdf;
use crate::error::{ApiError, Stage};
use crate::models::*;
use crate::state::AppState;
use crate::store::{self, NewRequest};

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Validate, persist and send a new signature request
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<CreateRequestResponse>), ApiError> {
    let request = SignatureRequest {
        title: body.title,
        message: body.message,
        sign_in_order: body.sign_in_order,
        document_name: body.document_name,
        sender_name: body.sender_name,
        sender_email: body.sender_email,
    };

    let roster = Roster::from_parts(body.recipients, body.fields)?;
    roster.validate_for_send(&request)?;

    let geometry = CaptureGeometry {
        surface: body.geometry.surface,
        capture: body.geometry.capture,
        page: body.geometry.page.unwrap_or(state.config.page),
        density: body.geometry.density.unwrap_or(MM_TO_PX),
    };
    let mapped = map_fields(&geometry, roster.fields())?;

    let artifact = decode_pdf(&body.pdf_base64)?;

    // Client ids are only meaningful to the editor; everything stored gets a fresh id
    let request_id = Uuid::new_v4().to_string();
    let recipients: Vec<(String, Recipient)> = roster
        .recipients()
        .iter()
        .map(|r| (Uuid::new_v4().to_string(), r.clone()))
        .collect();
    let stored_recipient_id = |client_id: &str| -> Result<String, ApiError> {
        recipients
            .iter()
            .find(|(_, r)| r.id == client_id)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("unmapped recipient {}", client_id)))
    };

    let fields: Vec<(PageField, FieldPlacement)> = mapped
        .into_iter()
        .zip(roster.fields().iter().cloned())
        .map(|(field, placement)| -> Result<_, ApiError> {
            Ok((
                PageField {
                    field_id: Uuid::new_v4().to_string(),
                    recipient_id: stored_recipient_id(&field.recipient_id)?,
                    ..field
                },
                placement,
            ))
        })
        .collect::<Result<_, ApiError>>()?;

    store::insert_request(
        &state.db,
        &NewRequest {
            id: &request_id,
            request: &request,
            recipients: &recipients,
            fields: &fields,
            document: &artifact,
            created_at: Utc::now(),
        },
    )
    .await
    .map_err(|e| ApiError::stage(Stage::Persistence, e))?;

    tracing::info!(
        request_id = %request_id,
        pages = artifact.page_count,
        recipients = recipients.len(),
        fields = fields.len(),
        "Created signature request"
    );

    let targets = recipients
        .iter()
        .map(|(id, r)| DispatchRecipient {
            recipient_id: id.clone(),
            emails: r.emails.clone(),
        })
        .collect();
    let report = run_dispatch(&state, &request_id, request, targets).await?;

    let response = CreateRequestResponse {
        document_url: state.config.document_url(&request_id),
        request_id,
        recipients: recipients
            .iter()
            .map(|(id, r)| RecipientIdMapping {
                client_id: r.id.clone(),
                recipient_id: id.clone(),
            })
            .collect(),
        fields: fields.into_iter().map(|(field, _)| field).collect(),
        summary: report.summary(),
        report,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Send notifications for one run and append the outcome to the dispatch log
async fn run_dispatch(
    state: &AppState,
    request_id: &str,
    request: SignatureRequest,
    recipients: Vec<DispatchRecipient>,
) -> Result<DispatchReport, ApiError> {
    let run = DispatchRequest {
        run_id: request_id.to_string(),
        signing_base_url: state.config.signing_base_url(),
        document_url: Some(state.config.document_url(request_id)),
        request,
        recipients,
    };

    let report = dispatch(state.channel.as_ref(), &run).await;

    let run_number = store::record_dispatch(&state.db, request_id, &report)
        .await
        .map_err(|e| ApiError::stage(Stage::Notification, e))?;

    tracing::info!(
        request_id = %request_id,
        run_number,
        "{}",
        report.summary()
    );

    Ok(report)
}

/// Full view of a request for its sender
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RequestView>, ApiError> {
    let request = store::fetch_request(&state.db, &id).await?;

    let recipients = store::fetch_recipients(&state.db, &id)
        .await?
        .iter()
        .map(DbRecipient::view)
        .collect::<Result<Vec<_>, _>>()?;
    let fields = store::fetch_fields(&state.db, &id, None)
        .await?
        .iter()
        .map(DbField::view)
        .collect::<Result<Vec<_>, _>>()?;
    let dispatch_log = store::fetch_dispatch_log(&state.db, &id)
        .await?
        .into_iter()
        .map(DispatchLogEntry::from)
        .collect();

    Ok(Json(RequestView {
        status: request.status()?,
        document_url: state.config.document_url(&request.id),
        id: request.id,
        title: request.title,
        message: request.message,
        sign_in_order: request.sign_in_order,
        document_name: request.document_name,
        sender_name: request.sender_name,
        sender_email: request.sender_email,
        created_at: request.created_at,
        completed_at: request.completed_at,
        recipients,
        fields,
        dispatch_log,
    }))
}

/// Get the stored PDF
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, [(String, String); 2], Vec<u8>), ApiError> {
    let document = store::fetch_document(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::RequestNotFound(id.clone()))?;

    Ok((
        StatusCode::OK,
        [
            ("Content-Type".to_string(), "application/pdf".to_string()),
            (
                "Content-Disposition".to_string(),
                format!(
                    "inline; filename=\"{}\"",
                    header_filename(&document.document_name)
                ),
            ),
        ],
        document.pdf_data,
    ))
}

/// Document name made safe for a quoted `Content-Disposition` filename
fn header_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect()
}

/// Re-notify addresses that have not been sent a link yet
///
/// Recipients keep their roster position so order numbers stay stable;
/// signed recipients and already-sent addresses are skipped.
pub async fn resend(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ResendBody>>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let request = store::fetch_request(&state.db, &id).await?;
    if request.status()? == RequestStatus::Completed {
        return Err(ApiError::Conflict(
            "Signature request is already completed".to_string(),
        ));
    }

    let only: Option<HashSet<String>> = body.and_then(|Json(b)| b.addresses).map(|addresses| {
        addresses
            .iter()
            .map(|a| a.trim().to_lowercase())
            .collect()
    });

    let sent: HashSet<(String, String)> = store::fetch_dispatch_log(&state.db, &id)
        .await?
        .into_iter()
        .filter(|entry| entry.status == "sent")
        .map(|entry| (entry.recipient_id, entry.address))
        .collect();

    let mut targets = Vec::new();
    for recipient in store::fetch_recipients(&state.db, &id).await? {
        let emails = if recipient.status == RecipientStatus::Signed.as_str() {
            Vec::new()
        } else {
            recipient
                .emails()?
                .into_iter()
                .filter(|email| !sent.contains(&(recipient.id.clone(), email.clone())))
                .filter(|email| {
                    only.as_ref()
                        .map_or(true, |only| only.contains(&email.trim().to_lowercase()))
                })
                .collect()
        };
        targets.push(DispatchRecipient {
            recipient_id: recipient.id,
            emails,
        });
    }

    if targets.iter().all(|t| t.emails.is_empty()) {
        return Err(ApiError::Conflict(
            "No unsent addresses to notify".to_string(),
        ));
    }

    let report = run_dispatch(&state, &id, request.signature_request(), targets).await?;

    Ok(Json(DispatchResponse {
        summary: report.summary(),
        report,
    }))
}

/// Resolve the request and recipient a signing link points at
async fn authorize(
    state: &AppState,
    request_id: &str,
    recipient_id: &str,
    token: &str,
) -> Result<(DbRequest, DbRecipient), ApiError> {
    if !store::token_matches(&state.db, request_id, recipient_id, token).await? {
        tracing::warn!(request_id, recipient_id, "Rejected signing token");
        return Err(ApiError::InvalidToken);
    }

    let request = store::fetch_request(&state.db, request_id).await?;
    let recipient = store::fetch_recipient(&state.db, request_id, recipient_id)
        .await?
        .ok_or(ApiError::InvalidToken)?;

    Ok((request, recipient))
}

async fn recipient_fields(
    state: &AppState,
    request_id: &str,
    recipient_id: &str,
) -> Result<Vec<DbField>, ApiError> {
    Ok(store::fetch_fields(&state.db, request_id, Some(recipient_id)).await?)
}

fn progress_of(fields: &[DbField]) -> Result<esign_core::SigningProgress, ApiError> {
    let states = fields
        .iter()
        .map(DbField::state)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(signing::progress(&states))
}

/// What a recipient sees after following their signing link
pub async fn signing_view(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SigningQuery>,
) -> Result<Json<SigningView>, ApiError> {
    let (request, recipient) =
        authorize(&state, &query.request, &query.recipient, &query.token).await?;

    let fields = recipient_fields(&state, &request.id, &recipient.id).await?;
    let progress = progress_of(&fields)?;

    Ok(Json(SigningView {
        request_status: request.status()?,
        document_url: state.config.document_url(&request.id),
        request_id: request.id,
        title: request.title,
        message: request.message,
        document_name: request.document_name,
        sender_name: request.sender_name,
        sender_email: request.sender_email,
        recipient: recipient.view()?,
        fields: fields
            .iter()
            .map(DbField::view)
            .collect::<Result<Vec<_>, _>>()?,
        progress,
    }))
}

/// Store a value for one of the recipient's fields
pub async fn fill_field(
    State(state): State<Arc<AppState>>,
    Path(field_id): Path<String>,
    Json(body): Json<FillFieldBody>,
) -> Result<Json<FillFieldResponse>, ApiError> {
    let (request, recipient) =
        authorize(&state, &body.request, &body.recipient, &body.token).await?;

    let field = store::fetch_field(&state.db, &field_id)
        .await?
        .filter(|f| f.request_id == request.id && f.recipient_id == recipient.id)
        .ok_or_else(|| ApiError::FieldNotFound(field_id.clone()))?;

    if recipient.status == RecipientStatus::Signed.as_str() {
        return Err(ApiError::Conflict(
            "Recipient has already completed signing".to_string(),
        ));
    }

    let value = signing::normalize_value(&field.id, field.kind()?, &body.value)?;
    store::set_field_value(&state.db, &field.id, &value, Utc::now()).await?;

    let fields = recipient_fields(&state, &request.id, &recipient.id).await?;
    let progress = progress_of(&fields)?;
    let field = fields
        .iter()
        .find(|f| f.id == field_id)
        .ok_or_else(|| ApiError::FieldNotFound(field_id.clone()))?
        .view()?;

    tracing::info!(
        request_id = %request.id,
        field_id = %field_id,
        "Field filled ({}/{})",
        progress.completed,
        progress.total
    );

    Ok(Json(FillFieldResponse { field, progress }))
}

/// Mark the recipient signed once every field of theirs has a value
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let (request, recipient) =
        authorize(&state, &body.request, &body.recipient, &body.token).await?;

    if recipient.status == RecipientStatus::Signed.as_str() {
        return Ok(Json(CompleteResponse {
            recipient_status: RecipientStatus::Signed,
            signed_at: recipient.signed_at,
            request_status: request.status()?,
        }));
    }

    let states = recipient_fields(&state, &request.id, &recipient.id)
        .await?
        .iter()
        .map(DbField::state)
        .collect::<Result<Vec<_>, _>>()?;
    if !signing::can_complete(&states) {
        let missing = signing::unfilled_fields(&states)
            .into_iter()
            .map(str::to_string)
            .collect();
        return Err(ApiError::IncompleteFields(missing));
    }

    let now = Utc::now();
    store::mark_recipient_signed(&state.db, &recipient.id, now).await?;

    let roles_and_statuses = store::fetch_recipients(&state.db, &request.id)
        .await?
        .iter()
        .map(|r| r.view().map(|v| (v.role, v.status)))
        .collect::<Result<Vec<_>, _>>()?;
    let request_status = signing::request_status(&roles_and_statuses);
    if request_status == RequestStatus::Completed {
        store::mark_request_completed(&state.db, &request.id, now).await?;
        tracing::info!(request_id = %request.id, "Signature request completed");
    }

    tracing::info!(
        request_id = %request.id,
        recipient_id = %recipient.id,
        "Recipient signed"
    );

    Ok(Json(CompleteResponse {
        recipient_status: RecipientStatus::Signed,
        signed_at: Some(now),
        request_status,
    }))
}
