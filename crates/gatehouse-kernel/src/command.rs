//! Commands that advance a visit through its lifecycle.

use chrono::{DateTime, Utc};
use gatehouse_types::{AuthorizationMethod, Nonce, Signature};
use serde::{Deserialize, Serialize};

/// A state transition request against one visit record.
///
/// Commands carry every timestamp they need; the kernel never consults a
/// clock. Validation of the command against the visit's current status
/// happens in [`crate::kernel::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Attach an issued credential: PENDING -> AUTHORIZED.
    Authorize {
        nonce: Nonce,
        signature: Signature,
        valid_until: DateTime<Utc>,
        authorized_at: DateTime<Utc>,
        method: AuthorizationMethod,
    },

    /// Refuse issuance: PENDING -> DENIED.
    Deny { reason: String },

    /// Record gate entry: AUTHORIZED -> INSIDE.
    Admit { entered_at: DateTime<Utc> },

    /// Record gate exit: INSIDE -> FINISHED.
    RecordExit { exited_at: DateTime<Utc> },

    /// Administrative cancellation before entry: PENDING | AUTHORIZED -> CANCELLED.
    Cancel { cancelled_at: DateTime<Utc> },
}

impl Command {
    /// Builds an `Authorize` command from the issued credential fields.
    pub fn authorize(
        nonce: Nonce,
        signature: Signature,
        valid_until: DateTime<Utc>,
        authorized_at: DateTime<Utc>,
        method: AuthorizationMethod,
    ) -> Self {
        Command::Authorize {
            nonce,
            signature,
            valid_until,
            authorized_at,
            method,
        }
    }

    /// Builds a `Deny` command with the guard's reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Command::Deny {
            reason: reason.into(),
        }
    }
}
