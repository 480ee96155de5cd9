use thiserror::Error;

/// Errors raised by roster editing, readiness checks and coordinate mapping
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Email {email} is already listed for recipient {recipient_id}")]
    DuplicateEmail { recipient_id: String, email: String },

    #[error("Email index {index} is out of range for recipient {recipient_id}")]
    EmailIndexOutOfRange { recipient_id: String, index: usize },

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Duplicate recipient id: {0}")]
    DuplicateRecipient(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Duplicate field id: {0}")]
    DuplicateField(String),

    #[error("Reorder must list every existing recipient exactly once")]
    InvalidReorder,

    #[error("Request is not ready to send: {}", join_issues(.0))]
    NotReady(Vec<ReadinessIssue>),

    #[error("Preview surface has degenerate size {width}x{height}")]
    DegenerateSurface { width: f64, height: f64 },

    #[error("Captured image has degenerate size {width}x{height}")]
    DegenerateCapture { width: f64, height: f64 },

    #[error("Output page has degenerate size {width}x{height}")]
    DegeneratePage { width: f64, height: f64 },

    #[error("Capture density must be positive and finite, got {0}")]
    InvalidDensity(f64),

    #[error("Field {0} has a non-finite position")]
    InvalidFieldPosition(String),

    #[error("Field {0} requires a non-empty value")]
    EmptyFieldValue(String),

    #[error("Invalid date value: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

/// A single reason a roster or request cannot proceed to sending
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadinessIssue {
    #[error("at least one recipient is required")]
    NoRecipients,

    #[error("recipient {0} has no email address")]
    RecipientWithoutEmail(String),

    #[error("at least one signature field for a signer is required")]
    NoSignatureField,

    #[error("document title is required")]
    MissingTitle,

    #[error("sender name is required")]
    MissingSenderName,

    #[error("sender email is missing or invalid: {0:?}")]
    InvalidSenderEmail(String),
}

fn join_issues(issues: &[ReadinessIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, CoreError>;
