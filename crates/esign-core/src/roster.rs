//! Recipient roster and the field placements bound to it
//!
//! The roster owns recipients and fields together so that the
//! field → recipient back-reference can never dangle: removing a
//! recipient removes its fields, and fields can only be placed for a
//! recipient that exists.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, ReadinessIssue, Result};
use crate::model::{FieldKind, FieldPlacement, Recipient, RecipientRole, SignatureRequest};

/// Check an address the way the sender form does
///
/// Accepts `local@domain.tld` with no whitespace; the domain must contain a dot.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let dotted = domain
        .split_once('.')
        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty());
    dotted && email_address::EmailAddress::is_valid(email)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    recipients: Vec<Recipient>,
    fields: Vec<FieldPlacement>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from submitted recipients and fields, enforcing every
    /// invariant the editing operations enforce
    pub fn from_parts(recipients: Vec<Recipient>, fields: Vec<FieldPlacement>) -> Result<Self> {
        let mut roster = Roster::new();
        for recipient in recipients {
            roster.insert_recipient(recipient)?;
        }
        for field in fields {
            if !field.x.is_finite() || !field.y.is_finite() {
                return Err(CoreError::InvalidFieldPosition(field.id));
            }
            if roster.fields.iter().any(|f| f.id == field.id) {
                return Err(CoreError::DuplicateField(field.id));
            }
            roster.recipient(&field.recipient_id)?;
            roster.fields.push(field);
        }
        Ok(roster)
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn fields(&self) -> &[FieldPlacement] {
        &self.fields
    }

    pub fn recipient(&self, id: &str) -> Result<&Recipient> {
        self.recipients
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| CoreError::RecipientNotFound(id.to_string()))
    }

    fn recipient_mut(&mut self, id: &str) -> Result<&mut Recipient> {
        self.recipients
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| CoreError::RecipientNotFound(id.to_string()))
    }

    /// Append a blank signer and return its generated id
    pub fn add_recipient(&mut self) -> String {
        let id = format!("recipient-{}", Uuid::new_v4());
        self.recipients.push(Recipient::new(id.clone()));
        id
    }

    /// Append a fully specified recipient, validating its addresses
    pub fn insert_recipient(&mut self, recipient: Recipient) -> Result<()> {
        if self.recipients.iter().any(|r| r.id == recipient.id) {
            return Err(CoreError::DuplicateRecipient(recipient.id));
        }
        let Recipient {
            id,
            name,
            emails,
            role,
        } = recipient;
        self.recipients.push(Recipient {
            id: id.clone(),
            name: None,
            emails: Vec::new(),
            role,
        });
        self.rename_recipient(&id, name.as_deref())?;
        for email in &emails {
            if let Err(e) = self.add_email(&id, email) {
                self.recipients.pop();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove a recipient together with every field that references it
    pub fn remove_recipient(&mut self, id: &str) -> Result<Recipient> {
        let index = self
            .recipients
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| CoreError::RecipientNotFound(id.to_string()))?;
        let removed = self.recipients.remove(index);
        let before = self.fields.len();
        self.fields.retain(|f| f.recipient_id != id);
        debug!(
            recipient_id = %id,
            fields_removed = before - self.fields.len(),
            "Removed recipient"
        );
        Ok(removed)
    }

    /// Set the display name; a blank name clears it
    pub fn rename_recipient(&mut self, id: &str, name: Option<&str>) -> Result<()> {
        let recipient = self.recipient_mut(id)?;
        recipient.name = name.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        Ok(())
    }

    pub fn set_role(&mut self, id: &str, role: RecipientRole) -> Result<()> {
        self.recipient_mut(id)?.role = role;
        Ok(())
    }

    pub fn add_email(&mut self, id: &str, email: &str) -> Result<()> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(CoreError::InvalidEmail(email.to_string()));
        }
        let recipient = self.recipient_mut(id)?;
        if recipient.emails.iter().any(|e| e == email) {
            return Err(CoreError::DuplicateEmail {
                recipient_id: id.to_string(),
                email: email.to_string(),
            });
        }
        recipient.emails.push(email.to_string());
        Ok(())
    }

    pub fn remove_email(&mut self, id: &str, index: usize) -> Result<String> {
        let recipient = self.recipient_mut(id)?;
        if index >= recipient.emails.len() {
            return Err(CoreError::EmailIndexOutOfRange {
                recipient_id: id.to_string(),
                index,
            });
        }
        Ok(recipient.emails.remove(index))
    }

    /// Reorder recipients; `ids` must be a permutation of the current ids
    pub fn reorder(&mut self, ids: &[String]) -> Result<()> {
        if ids.len() != self.recipients.len() {
            return Err(CoreError::InvalidReorder);
        }
        let mut remaining = self.recipients.clone();
        let mut reordered = Vec::with_capacity(ids.len());
        for id in ids {
            let index = remaining
                .iter()
                .position(|r| &r.id == id)
                .ok_or(CoreError::InvalidReorder)?;
            reordered.push(remaining.swap_remove(index));
        }
        self.recipients = reordered;
        Ok(())
    }

    /// Place a field for an existing recipient and return its generated id
    pub fn place_field(
        &mut self,
        recipient_id: &str,
        kind: FieldKind,
        x: f64,
        y: f64,
    ) -> Result<String> {
        self.recipient(recipient_id)?;
        let id = format!("field-{}", Uuid::new_v4());
        if !x.is_finite() || !y.is_finite() {
            return Err(CoreError::InvalidFieldPosition(id));
        }
        self.fields.push(FieldPlacement {
            id: id.clone(),
            kind,
            x,
            y,
            recipient_id: recipient_id.to_string(),
        });
        Ok(id)
    }

    pub fn remove_field(&mut self, id: &str) -> Result<FieldPlacement> {
        let index = self
            .fields
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| CoreError::FieldNotFound(id.to_string()))?;
        Ok(self.fields.remove(index))
    }

    pub fn field_count(&self, recipient_id: &str, kind: FieldKind) -> usize {
        self.fields
            .iter()
            .filter(|f| f.recipient_id == recipient_id && f.kind == kind)
            .count()
    }

    /// Everything that blocks moving from field placement to sending
    pub fn readiness_issues(&self, title: &str) -> Vec<ReadinessIssue> {
        let mut issues = Vec::new();
        if self.recipients.is_empty() {
            issues.push(ReadinessIssue::NoRecipients);
        }
        for recipient in self.recipients.iter().filter(|r| r.emails.is_empty()) {
            issues.push(ReadinessIssue::RecipientWithoutEmail(recipient.id.clone()));
        }
        let has_signer_signature = self.fields.iter().any(|f| {
            f.kind == FieldKind::Signature
                && self
                    .recipient(&f.recipient_id)
                    .is_ok_and(|r| r.role.is_signer())
        });
        if !has_signer_signature {
            issues.push(ReadinessIssue::NoSignatureField);
        }
        if title.trim().is_empty() {
            issues.push(ReadinessIssue::MissingTitle);
        }
        issues
    }

    /// Full pre-send check: roster readiness plus sender details
    pub fn validate_for_send(&self, request: &SignatureRequest) -> Result<()> {
        let mut issues = self.readiness_issues(&request.title);
        if request.sender_name.trim().is_empty() {
            issues.push(ReadinessIssue::MissingSenderName);
        }
        if !is_valid_email(request.sender_email.trim()) {
            issues.push(ReadinessIssue::InvalidSenderEmail(
                request.sender_email.clone(),
            ));
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(CoreError::NotReady(issues))
        }
    }
}
