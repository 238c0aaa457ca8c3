//! The blacklist guard.
//!
//! Consulted synchronously before any credential is issued; the issuer must
//! not proceed on a blocked visitor.

use gatehouse_types::Visitor;
use tracing::{info, warn};

/// Outcome of an admissibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admissibility {
    /// Nothing on record blocks this visitor.
    Admissible,
    /// The visitor is blacklisted; issuance must not proceed.
    Blocked { reason: String },
}

impl Admissibility {
    /// Returns true if issuance may proceed.
    pub fn is_admissible(&self) -> bool {
        matches!(self, Admissibility::Admissible)
    }
}

/// Blacklist enforcement for credential issuance.
///
/// Side-effect-free: reads only the visitor's blacklist flag and reason.
/// Decisions are audit-logged unless disabled.
#[derive(Debug, Clone)]
pub struct BlacklistGuard {
    /// Whether to log admissibility decisions.
    audit_enabled: bool,
}

impl BlacklistGuard {
    /// Creates a guard with audit logging enabled.
    pub fn new() -> Self {
        Self {
            audit_enabled: true,
        }
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    /// Checks whether a new visit may be issued for this visitor.
    ///
    /// **Audit:** logs every decision with visitor context.
    pub fn check_admissible(&self, visitor: &Visitor) -> Admissibility {
        if visitor.is_blacklisted {
            let reason = visitor
                .blacklist_reason
                .clone()
                .unwrap_or_else(|| "no reason recorded".to_string());

            if self.audit_enabled {
                warn!(
                    visitor = %visitor.id,
                    document = %visitor.document_number,
                    reason = %reason,
                    "issuance blocked by blacklist"
                );
            }

            Admissibility::Blocked { reason }
        } else {
            if self.audit_enabled {
                info!(visitor = %visitor.id, "visitor admissible");
            }
            Admissibility::Admissible
        }
    }
}

impl Default for BlacklistGuard {
    fn default() -> Self {
        Self::new()
    }
}
