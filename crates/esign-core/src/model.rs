//! Recipients, field placements and the signature request payload

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a recipient is asked to do with the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    #[default]
    Signer,
    Reviewer,
    Cc,
}

impl RecipientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientRole::Signer => "signer",
            RecipientRole::Reviewer => "reviewer",
            RecipientRole::Cc => "cc",
        }
    }

    /// Only signers take part in required-field validation and completion
    pub fn is_signer(&self) -> bool {
        matches!(self, RecipientRole::Signer)
    }
}

impl fmt::Display for RecipientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipientRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signer" => Ok(RecipientRole::Signer),
            "reviewer" => Ok(RecipientRole::Reviewer),
            "cc" => Ok(RecipientRole::Cc),
            other => Err(format!("unknown recipient role: {}", other)),
        }
    }
}

/// Kind of marker placed on the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Signature,
    Initial,
    Date,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Signature => "signature",
            FieldKind::Initial => "initial",
            FieldKind::Date => "date",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signature" => Ok(FieldKind::Signature),
            "initial" => Ok(FieldKind::Initial),
            "date" => Ok(FieldKind::Date),
            other => Err(format!("unknown field kind: {}", other)),
        }
    }
}

/// A party to the signature request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// Opaque id, stable within a session
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Addresses in the order they were added
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub role: RecipientRole,
}

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            emails: Vec::new(),
            role: RecipientRole::Signer,
        }
    }

    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }
}

/// A signature/initial/date marker placed on the preview surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPlacement {
    pub id: String,
    pub kind: FieldKind,
    /// Pixels from the left edge of the preview surface
    pub x: f64,
    /// Pixels from the top edge of the preview surface
    pub y: f64,
    /// Back-reference to the owning recipient
    pub recipient_id: String,
}

/// Shared payload describing the action every recipient is asked to take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Recipients must act in roster order
    #[serde(default)]
    pub sign_in_order: bool,
    pub document_name: String,
    pub sender_name: String,
    pub sender_email: String,
}

impl SignatureRequest {
    /// The message, if it carries any non-whitespace text
    pub fn message_text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}
