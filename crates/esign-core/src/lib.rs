//! Signature request core logic
//!
//! This crate holds the pure domain of a signature request:
//!
//! - the recipient roster and field placements ([`roster`])
//! - mapping preview-surface pixels onto the output page ([`coords`])
//! - signing tokens and links ([`token`]) and notification content ([`template`])
//! - the dispatch sequencer that notifies every recipient address ([`dispatch`])
//! - recipient completion and request status ([`signing`])
//!
//! Delivery itself is behind [`NotificationChannel`]; the HTTP relay client
//! lives in the `email-relay` crate.

pub mod coords;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod roster;
pub mod signing;
pub mod template;
pub mod token;

pub use coords::{map_fields, CaptureGeometry, PageField, PageFit, Size};
pub use dispatch::{
    dispatch, ChannelError, Delivery, DispatchOutcome, DispatchRecipient, DispatchRecord,
    DispatchReport, DispatchRequest, Notification, NotificationChannel,
};
pub use error::{CoreError, ReadinessIssue, Result};
pub use model::{FieldKind, FieldPlacement, Recipient, RecipientRole, SignatureRequest};
pub use roster::{is_valid_email, Roster};
pub use signing::{FieldState, RecipientStatus, RequestStatus, SigningProgress};
pub use token::SigningToken;
