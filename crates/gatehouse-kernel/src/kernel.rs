//! The kernel - pure functional core of the visit lifecycle.
//!
//! The kernel applies commands to a visit record to produce the updated
//! record and effects. It is completely pure: no IO, no clocks, no
//! randomness. This makes it deterministic and easy to test.
//!
//! # Example
//!
//! ```ignore
//! let (visit, effects) = apply(visit, Command::Admit { entered_at })?;
//! // Runtime persists the visit and executes effects...
//! ```

use chrono::{DateTime, Utc};
use gatehouse_types::{AuditAction, Visit, VisitId, VisitStatus};

use crate::command::Command;
use crate::effects::Effect;

/// Applies a command to a visit, producing the updated visit and effects.
///
/// Takes ownership of the visit, returns the new record. Every illegal
/// transition is a [`TransitionError`], never a silent field write.
pub fn apply(visit: Visit, cmd: Command) -> Result<(Visit, Vec<Effect>), TransitionError> {
    let mut effects = Vec::new();

    match cmd {
        Command::Authorize {
            nonce,
            signature,
            valid_until,
            authorized_at,
            method,
        } => {
            // Precondition: only a pending visit can be authorized
            if visit.status != VisitStatus::Pending {
                return Err(TransitionError::NotAuthorizable {
                    visit_id: visit.id,
                    status: visit.status,
                });
            }
            // Precondition: credential fields are write-once
            if visit.credential_key().is_some() {
                return Err(TransitionError::CredentialAlreadyAttached { visit_id: visit.id });
            }

            let mut new_visit = visit;
            new_visit.status = VisitStatus::Authorized;
            new_visit.nonce = Some(nonce);
            new_visit.signature = Some(signature);
            new_visit.valid_until = Some(valid_until);
            new_visit.authorized_at = Some(authorized_at);
            new_visit.authorization_method = Some(method);

            effects.push(Effect::AuditLogAppend(AuditAction::CredentialIssued {
                visit_id: new_visit.id,
                visitor_id: new_visit.visitor_id,
                unit_id: new_visit.unit_id,
                valid_until,
            }));

            // Postcondition: nonce and signature were set together
            debug_assert!(new_visit.credential_key().is_some());
            debug_assert_eq!(effects.len(), 1);

            Ok((new_visit, effects))
        }

        Command::Deny { reason } => {
            // Precondition: only a pending visit can be denied
            if visit.status != VisitStatus::Pending {
                return Err(TransitionError::NotDeniable {
                    visit_id: visit.id,
                    status: visit.status,
                });
            }

            let mut new_visit = visit;
            new_visit.status = VisitStatus::Denied;
            new_visit.denial_reason = Some(reason.clone());

            effects.push(Effect::AuditLogAppend(AuditAction::IssuanceDenied {
                visit_id: new_visit.id,
                visitor_id: new_visit.visitor_id,
                reason,
            }));

            // Postcondition: a denied visit never carries a credential
            debug_assert!(new_visit.credential_key().is_none());

            Ok((new_visit, effects))
        }

        Command::Admit { entered_at } => {
            // Precondition: entry is recorded at most once
            if let Some(previous) = visit.entered_at {
                return Err(TransitionError::AlreadyEntered {
                    visit_id: visit.id,
                    entered_at: previous,
                });
            }
            // Precondition: only an authorized visit can be admitted
            if visit.status != VisitStatus::Authorized {
                return Err(TransitionError::NotAdmittable {
                    visit_id: visit.id,
                    status: visit.status,
                });
            }

            let mut new_visit = visit;
            new_visit.status = VisitStatus::Inside;
            new_visit.entered_at = Some(entered_at);

            effects.push(Effect::IncrementVisitCount {
                visitor_id: new_visit.visitor_id,
            });
            effects.push(Effect::AuditLogAppend(AuditAction::EntryRecorded {
                visit_id: new_visit.id,
                visitor_id: new_visit.visitor_id,
                entered_at,
            }));

            // Postcondition: exactly 2 effects (counter + audit)
            debug_assert_eq!(effects.len(), 2);
            // Postcondition: exit fields untouched
            debug_assert!(new_visit.exited_at.is_none());
            debug_assert!(new_visit.duration_minutes.is_none());

            Ok((new_visit, effects))
        }

        Command::RecordExit { exited_at } => {
            // Precondition: idempotency guard - a second exit is rejected
            if visit.exited_at.is_some() || visit.status == VisitStatus::Finished {
                return Err(TransitionError::AlreadyFinished { visit_id: visit.id });
            }
            // Precondition: an exit needs an entry on record. Anything else
            // is a data-integrity problem, not a normal user error.
            let Some(entered_at) = visit.entered_at else {
                return Err(TransitionError::ExitWithoutEntry { visit_id: visit.id });
            };
            debug_assert_eq!(visit.status, VisitStatus::Inside);
            // Precondition: time must not run backwards across the visit
            if exited_at < entered_at {
                return Err(TransitionError::ExitBeforeEntry {
                    visit_id: visit.id,
                    entered_at,
                    exited_at,
                });
            }

            let duration_minutes = (exited_at - entered_at).num_minutes();

            let mut new_visit = visit;
            new_visit.status = VisitStatus::Finished;
            new_visit.exited_at = Some(exited_at);
            new_visit.duration_minutes = Some(duration_minutes);

            effects.push(Effect::AuditLogAppend(AuditAction::ExitRecorded {
                visit_id: new_visit.id,
                exited_at,
                duration_minutes,
            }));

            // Postcondition: duration is derived, whole minutes, truncated
            debug_assert!(duration_minutes >= 0);
            debug_assert_eq!(
                duration_minutes,
                (exited_at - entered_at).num_seconds() / 60
            );

            Ok((new_visit, effects))
        }

        Command::Cancel { cancelled_at } => {
            // Precondition: cancellation is only possible before entry
            if !matches!(
                visit.status,
                VisitStatus::Pending | VisitStatus::Authorized
            ) {
                return Err(TransitionError::NotCancellable {
                    visit_id: visit.id,
                    status: visit.status,
                });
            }
            debug_assert!(visit.entered_at.is_none());

            let mut new_visit = visit;
            new_visit.status = VisitStatus::Cancelled;
            new_visit.cancelled_at = Some(cancelled_at);

            effects.push(Effect::AuditLogAppend(AuditAction::VisitCancelled {
                visit_id: new_visit.id,
                cancelled_at,
            }));

            // Postcondition: cancelled is terminal
            debug_assert!(new_visit.status.is_terminal());

            Ok((new_visit, effects))
        }
    }
}

/// Errors that can occur when applying commands to a visit.
///
/// These are the spec's Conflict class: business-rule violations returned as
/// structured outcomes, never a crash.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("visit {visit_id} is {status}: only a pending visit can be authorized")]
    NotAuthorizable {
        visit_id: VisitId,
        status: VisitStatus,
    },

    #[error("visit {visit_id} already carries a credential")]
    CredentialAlreadyAttached { visit_id: VisitId },

    #[error("visit {visit_id} is {status}: only a pending visit can be denied")]
    NotDeniable {
        visit_id: VisitId,
        status: VisitStatus,
    },

    #[error("visit {visit_id} is {status}: only an authorized visit can be admitted")]
    NotAdmittable {
        visit_id: VisitId,
        status: VisitStatus,
    },

    #[error("entry already recorded for visit {visit_id} at {entered_at}")]
    AlreadyEntered {
        visit_id: VisitId,
        entered_at: DateTime<Utc>,
    },

    #[error("visit {visit_id} has no entry on record")]
    ExitWithoutEntry { visit_id: VisitId },

    #[error("exit already recorded for visit {visit_id}")]
    AlreadyFinished { visit_id: VisitId },

    #[error("visit {visit_id}: exit at {exited_at} precedes entry at {entered_at}")]
    ExitBeforeEntry {
        visit_id: VisitId,
        entered_at: DateTime<Utc>,
        exited_at: DateTime<Utc>,
    },

    #[error("visit {visit_id} is {status}: cancellation is only possible before entry")]
    NotCancellable {
        visit_id: VisitId,
        status: VisitStatus,
    },
}
