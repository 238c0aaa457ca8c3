//! Effects produced by the kernel.
//!
//! Effects represent side effects that the runtime must execute after a
//! command is applied. The kernel is pure - it produces effects but never
//! executes them directly. The updated visit record itself is returned
//! alongside the effects and persisted by the runtime with a per-record
//! compare-and-swap.

use gatehouse_types::{AuditAction, VisitorId};
use serde::{Deserialize, Serialize};

/// An effect to be executed by the runtime.
///
/// Produced by [`crate::kernel::apply`] and describing actions that must be
/// performed outside the pure kernel (visitor bookkeeping, audit logging).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Increment the visitor's lifetime visit counter (admission only).
    IncrementVisitCount {
        /// The visitor who was admitted.
        visitor_id: VisitorId,
    },

    /// Append an entry to the audit trail.
    AuditLogAppend(AuditAction),
}
