//! Recipient-side signing state and request completion

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::{FieldKind, RecipientRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    #[default]
    Pending,
    Signed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Completed,
}

macro_rules! status_str {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($ty), other)),
                }
            }
        }
    };
}

status_str!(RecipientStatus { Pending => "pending", Signed => "signed" });
status_str!(RequestStatus { Pending => "pending", Completed => "completed" });

/// A placed field as seen during signing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    pub field_id: String,
    pub recipient_id: String,
    pub kind: FieldKind,
    pub value: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
}

impl FieldState {
    pub fn is_filled(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningProgress {
    pub completed: usize,
    pub total: usize,
}

impl SigningProgress {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

pub fn progress(fields: &[FieldState]) -> SigningProgress {
    SigningProgress {
        completed: fields.iter().filter(|f| f.is_filled()).count(),
        total: fields.len(),
    }
}

/// Ids of the fields that still need a value
pub fn unfilled_fields(fields: &[FieldState]) -> Vec<&str> {
    fields
        .iter()
        .filter(|f| !f.is_filled())
        .map(|f| f.field_id.as_str())
        .collect()
}

/// A recipient may complete once every one of their fields carries a value
pub fn can_complete(fields: &[FieldState]) -> bool {
    fields.iter().all(FieldState::is_filled)
}

/// Completed once every signer has signed; requests without signers stay pending
pub fn request_status(recipients: &[(RecipientRole, RecipientStatus)]) -> RequestStatus {
    let mut signers = recipients.iter().filter(|(role, _)| role.is_signer()).peekable();
    if signers.peek().is_none() {
        return RequestStatus::Pending;
    }
    if signers.all(|(_, status)| *status == RecipientStatus::Signed) {
        RequestStatus::Completed
    } else {
        RequestStatus::Pending
    }
}

/// Validate and normalise a submitted field value
///
/// Values are trimmed. Date fields must be `YYYY-MM-DD`.
pub fn normalize_value(field_id: &str, kind: FieldKind, raw: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(CoreError::EmptyFieldValue(field_id.to_string()));
    }
    if kind == FieldKind::Date {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| CoreError::InvalidDate(value.to_string()))?;
        return Ok(date.format("%Y-%m-%d").to_string());
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &str, value: Option<&str>) -> FieldState {
        FieldState {
            field_id: id.to_string(),
            recipient_id: "r1".to_string(),
            kind: FieldKind::Signature,
            value: value.map(String::from),
            signed_at: None,
        }
    }

    #[test]
    fn progress_counts_filled_fields() {
        let fields = vec![field("f1", Some("Ada")), field("f2", None), field("f3", Some("  "))];
        assert_eq!(progress(&fields), SigningProgress { completed: 1, total: 3 });
        assert_eq!(unfilled_fields(&fields), vec!["f2", "f3"]);
        assert!(!can_complete(&fields));
    }

    #[test]
    fn recipient_without_fields_can_complete() {
        assert!(can_complete(&[]));
        assert!(progress(&[]).is_complete());
    }

    #[test]
    fn request_completes_when_all_signers_signed() {
        use RecipientRole::*;
        use RecipientStatus::*;

        assert_eq!(request_status(&[(Signer, Signed), (Cc, Pending)]), RequestStatus::Completed);
        assert_eq!(request_status(&[(Signer, Signed), (Signer, Pending)]), RequestStatus::Pending);
        assert_eq!(request_status(&[(Reviewer, Signed)]), RequestStatus::Pending);
        assert_eq!(request_status(&[]), RequestStatus::Pending);
    }

    #[test]
    fn blank_value_is_rejected() {
        assert_eq!(
            normalize_value("f1", FieldKind::Initial, "   "),
            Err(CoreError::EmptyFieldValue("f1".into()))
        );
        assert_eq!(normalize_value("f1", FieldKind::Initial, " AL ").unwrap(), "AL");
    }

    #[test]
    fn dates_must_be_calendar_dates() {
        assert_eq!(normalize_value("d", FieldKind::Date, "2025-02-28").unwrap(), "2025-02-28");
        assert!(matches!(
            normalize_value("d", FieldKind::Date, "2025-02-30"),
            Err(CoreError::InvalidDate(_))
        ));
        assert!(matches!(
            normalize_value("d", FieldKind::Date, "28/02/2025"),
            Err(CoreError::InvalidDate(_))
        ));
    }

    #[test]
    fn statuses_parse_from_storage() {
        assert_eq!("signed".parse::<RecipientStatus>(), Ok(RecipientStatus::Signed));
        assert_eq!("completed".parse::<RequestStatus>(), Ok(RequestStatus::Completed));
        assert!("done".parse::<RequestStatus>().is_err());
    }
}
