//! Issuance and validation outcomes.

use chrono::{DateTime, Utc};
use gatehouse_types::{Credential, Visit};

/// Result of a successful issuance: the signed credential ready for
/// transport/rendering plus the persisted visit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub credential: Credential,
    pub visit: Visit,
}

/// Outcome of presenting a credential at the gate.
///
/// Every branch is a legitimate business outcome, not an error: the gate UI
/// shows a different message for each, and none of them is retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Entry recorded; the visit is now INSIDE.
    Admitted { visit: Visit },
    /// Credential was already used; reports the original entry time.
    AlreadyUsed { entered_at: DateTime<Utc> },
    /// Current time is at or past `valid_until`.
    Expired,
    /// Signature does not match the presented fields.
    Forged,
    /// No visit holds this (nonce, signature) pair.
    NotFound,
    /// One or more of the five required fields is missing or unreadable.
    Malformed,
}

impl ValidationOutcome {
    /// Returns true if the visitor was admitted by this presentation.
    pub fn is_admitted(&self) -> bool {
        matches!(self, ValidationOutcome::Admitted { .. })
    }
}
