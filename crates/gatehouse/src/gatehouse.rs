//! The engine: issuance, validation, exit, cancellation.
//!
//! `Gatehouse` is the imperative shell around the pure kernel. It owns the
//! signing secret and the guard, talks to the store seams, stamps times from
//! the injected clock, and executes the effects the kernel produces. Every
//! state transition is applied as a single compare-and-swap against one visit
//! record; on a lost race the operation re-reads and re-evaluates, so the
//! single-use invariant holds under concurrent gate scans.

use chrono::{DateTime, Duration, Utc};
use gatehouse_config::GatehouseConfig;
use gatehouse_crypto::{
    CredentialSecret, generate_nonce, sign_credential, verify_presented_signature,
};
use gatehouse_kernel::{Clock, Command, Effect, StoreError, VisitStore, VisitorStore, apply};
use gatehouse_types::{
    AuthorizationMethod, Credential, Nonce, PresentedCredential, Signature, UnitId, Visit,
    VisitId, VisitKind, Visitor, VisitorId, canonical_timestamp,
};
use tracing::{debug, error, warn};

use crate::error::{EngineError, Result};
use crate::guard::{Admissibility, BlacklistGuard};
use crate::outcome::{Issued, ValidationOutcome};

/// A request to issue a credential.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub visitor_id: VisitorId,
    pub unit_id: UnitId,
    pub kind: VisitKind,
    pub reason: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Credential validity window; falls back to the configured default.
    pub validity_hours: Option<u32>,
    pub method: AuthorizationMethod,
}

impl IssueRequest {
    /// Creates a request with the default kind, validity, and method.
    pub fn new(visitor_id: VisitorId, unit_id: UnitId) -> Self {
        Self {
            visitor_id,
            unit_id,
            kind: VisitKind::default(),
            reason: None,
            scheduled_at: None,
            validity_hours: None,
            method: AuthorizationMethod::Auto,
        }
    }

    /// Sets the visit kind.
    pub fn with_kind(mut self, kind: VisitKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the free-form visit purpose.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the expected arrival time.
    pub fn with_scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Overrides the configured validity window.
    pub fn with_validity_hours(mut self, hours: u32) -> Self {
        self.validity_hours = Some(hours);
        self
    }

    /// Records how the resident authorized the visit.
    pub fn with_method(mut self, method: AuthorizationMethod) -> Self {
        self.method = method;
        self
    }
}

/// The visit authorization engine.
///
/// Generic over the clock and the two store seams so production and tests
/// plug in their own implementations (`gatehouse-store` provides the
/// in-memory one).
pub struct Gatehouse<C, V, S>
where
    C: Clock,
    V: VisitorStore,
    S: VisitStore,
{
    secret: CredentialSecret,
    default_validity_hours: u32,
    guard: BlacklistGuard,
    clock: C,
    visitors: V,
    visits: S,
}

impl<C, V, S> Gatehouse<C, V, S>
where
    C: Clock,
    V: VisitorStore,
    S: VisitStore,
{
    /// Builds an engine from validated configuration.
    ///
    /// Fails if the secret is missing/too short or the default validity is
    /// zero; a misconfigured engine must not come up.
    pub fn new(config: &GatehouseConfig, clock: C, visitors: V, visits: S) -> Result<Self> {
        config.validate()?;

        let guard = if config.policy.audit_decisions {
            BlacklistGuard::new()
        } else {
            BlacklistGuard::new().without_audit()
        };

        Ok(Self {
            secret: CredentialSecret::new(config.security.credential_secret.clone()),
            default_validity_hours: config.policy.default_validity_hours,
            guard,
            clock,
            visitors,
            visits,
        })
    }

    /// Returns a reference to the clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ========================================================================
    // Admissibility
    // ========================================================================

    /// Checks whether a new visit may be issued for the visitor.
    pub fn check_admissible(&self, visitor_id: VisitorId) -> Result<Admissibility> {
        let visitor = self.require_visitor(visitor_id)?;
        Ok(self.guard.check_admissible(&visitor))
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Pre-books a visit without issuing a credential (PENDING).
    pub fn schedule(
        &self,
        visitor_id: VisitorId,
        unit_id: UnitId,
        kind: VisitKind,
        scheduled_at: Option<DateTime<Utc>>,
        reason: Option<String>,
    ) -> Result<Visit> {
        self.require_visitor(visitor_id)?;

        let mut visit = Visit::scheduled(
            VisitId::generate(),
            visitor_id,
            unit_id,
            kind,
            scheduled_at,
            self.clock.now(),
        );
        visit.reason = reason;

        self.visits.insert(visit.clone())?;
        self.execute_effects(vec![Effect::AuditLogAppend(
            gatehouse_types::AuditAction::VisitScheduled {
                visit_id: visit.id,
                visitor_id,
                unit_id,
            },
        )])?;

        Ok(visit)
    }

    // ========================================================================
    // Issuance
    // ========================================================================

    /// Issues a signed credential, creating a new visit record.
    ///
    /// Not idempotent: every successful call creates an independent visit
    /// with an independent nonce. A blocked visitor still produces a DENIED
    /// visit record before the error is returned.
    pub fn issue(&self, request: IssueRequest) -> Result<Issued> {
        let validity_hours = self.effective_validity(request.validity_hours)?;
        let visitor = self.require_visitor(request.visitor_id)?;
        let now = self.clock.now();

        let mut visit = Visit::scheduled(
            VisitId::generate(),
            request.visitor_id,
            request.unit_id,
            request.kind,
            request.scheduled_at.or(Some(now)),
            now,
        );
        visit.reason = request.reason.clone();

        match self.guard.check_admissible(&visitor) {
            Admissibility::Blocked { reason } => {
                let (denied, effects) = apply(visit, Command::deny(reason.clone()))?;
                self.visits.insert(denied)?;
                self.execute_effects(effects)?;
                Err(EngineError::Blacklisted { reason })
            }
            Admissibility::Admissible => {
                let valid_until = now + Duration::hours(i64::from(validity_hours));
                let (nonce, signature) =
                    self.mint_credential(request.visitor_id, request.unit_id, valid_until);

                let (authorized, effects) = apply(
                    visit,
                    Command::authorize(nonce.clone(), signature, valid_until, now, request.method),
                )?;
                self.visits.insert(authorized.clone())?;
                self.execute_effects(effects)?;

                Ok(Issued {
                    credential: Credential {
                        visitor_id: request.visitor_id,
                        unit_id: request.unit_id,
                        valid_until,
                        nonce,
                        signature,
                    },
                    visit: authorized,
                })
            }
        }
    }

    /// Issues a credential for an already scheduled (PENDING) visit.
    pub fn issue_scheduled(
        &self,
        visit_id: VisitId,
        validity_hours: Option<u32>,
        method: AuthorizationMethod,
    ) -> Result<Issued> {
        let validity_hours = self.effective_validity(validity_hours)?;

        loop {
            let visit = self.require_visit(visit_id)?;
            let visitor = self.require_visitor(visit.visitor_id)?;
            let now = self.clock.now();

            match self.guard.check_admissible(&visitor) {
                Admissibility::Blocked { reason } => {
                    let (denied, effects) = apply(visit.clone(), Command::deny(reason.clone()))?;
                    match self.visits.compare_and_swap(&visit, denied) {
                        Ok(()) => {
                            self.execute_effects(effects)?;
                            return Err(EngineError::Blacklisted { reason });
                        }
                        Err(StoreError::CasConflict(_)) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Admissibility::Admissible => {
                    let valid_until = now + Duration::hours(i64::from(validity_hours));
                    let (nonce, signature) =
                        self.mint_credential(visit.visitor_id, visit.unit_id, valid_until);

                    let (authorized, effects) = apply(
                        visit.clone(),
                        Command::authorize(nonce.clone(), signature, valid_until, now, method),
                    )?;
                    match self.visits.compare_and_swap(&visit, authorized.clone()) {
                        Ok(()) => {
                            self.execute_effects(effects)?;
                            return Ok(Issued {
                                credential: Credential {
                                    visitor_id: authorized.visitor_id,
                                    unit_id: authorized.unit_id,
                                    valid_until,
                                    nonce,
                                    signature,
                                },
                                visit: authorized,
                            });
                        }
                        Err(StoreError::CasConflict(_)) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Decides whether a presented credential admits the visitor.
    ///
    /// Checks run strictly in this order: missing fields, signature
    /// (constant time, over the presented strings verbatim), expiry, record
    /// lookup by (nonce, signature), single-use. Only the final branch
    /// mutates state, and it does so through a compare-and-swap.
    pub fn validate(&self, presented: &PresentedCredential) -> Result<ValidationOutcome> {
        // 1. Malformed: any missing field rejects with no further checks
        let Some((visitor_raw, unit_raw, valid_until_raw, nonce_raw, signature_raw)) =
            presented.fields()
        else {
            return Ok(ValidationOutcome::Malformed);
        };

        // 2. Forged: cryptographic verification precedes everything else so
        // a forged payload never reaches a lookup or expiry branch
        let expected = sign_credential(
            &self.secret,
            visitor_raw,
            unit_raw,
            valid_until_raw,
            nonce_raw,
        );
        if !verify_presented_signature(&expected, signature_raw) {
            warn!(
                visitor = %visitor_raw,
                unit = %unit_raw,
                "credential rejected: signature mismatch"
            );
            return Ok(ValidationOutcome::Forged);
        }

        // The signature matched, so the presented strings are exactly what
        // the engine once signed; parse failures past this point mean the
        // payload never came from us after all.
        let Ok(valid_until) = DateTime::parse_from_rfc3339(valid_until_raw) else {
            return Ok(ValidationOutcome::Malformed);
        };
        let valid_until = valid_until.with_timezone(&Utc);
        let (Ok(visitor_id), Ok(unit_id)) =
            (visitor_raw.parse::<VisitorId>(), unit_raw.parse::<UnitId>())
        else {
            return Ok(ValidationOutcome::Malformed);
        };

        // 3. Expired: boundary inclusive, independent of whether the record
        // exists
        if self.clock.now() >= valid_until {
            return Ok(ValidationOutcome::Expired);
        }

        // 4. Lookup by the (nonce, signature) pair - the only lookup key
        let nonce = Nonce::new(nonce_raw);
        self.admit_by_credential(&nonce, &expected, visitor_id, unit_id)
    }

    /// Lookup, single-use enforcement, and the admit transition, retried on
    /// lost CAS races.
    fn admit_by_credential(
        &self,
        nonce: &Nonce,
        signature: &Signature,
        visitor_id: VisitorId,
        unit_id: UnitId,
    ) -> Result<ValidationOutcome> {
        loop {
            let Some(visit) = self.visits.find_by_credential(nonce, signature)? else {
                return Ok(ValidationOutcome::NotFound);
            };

            // Hardening: the credential's visitor/unit must match the stored
            // visit. The pair cannot legitimately diverge, so divergence
            // means tampering or index corruption.
            if visit.visitor_id != visitor_id || visit.unit_id != unit_id {
                error!(
                    visit = %visit.id,
                    presented_visitor = %visitor_id,
                    stored_visitor = %visit.visitor_id,
                    "credential rejected: stored visit does not match presented fields"
                );
                return Ok(ValidationOutcome::Forged);
            }

            // 5. Single-use: report the original entry, mutate nothing
            if let Some(entered_at) = visit.entered_at {
                return Ok(ValidationOutcome::AlreadyUsed { entered_at });
            }

            // 6. Admit: the sole path into INSIDE
            let (admitted, effects) = apply(
                visit.clone(),
                Command::Admit {
                    entered_at: self.clock.now(),
                },
            )?;
            match self.visits.compare_and_swap(&visit, admitted.clone()) {
                Ok(()) => {
                    self.execute_effects(effects)?;
                    return Ok(ValidationOutcome::Admitted { visit: admitted });
                }
                // Lost the race to a concurrent scan: re-read, which will
                // surface AlreadyUsed with the winner's entry time
                Err(StoreError::CasConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ========================================================================
    // Exit & cancellation
    // ========================================================================

    /// Records the visitor's exit and computes the visit duration.
    ///
    /// A second exit for the same visit is a Conflict
    /// ([`gatehouse_kernel::TransitionError::AlreadyFinished`]), not a silent
    /// success.
    pub fn record_exit(&self, visit_id: VisitId) -> Result<Visit> {
        loop {
            let visit = self.require_visit(visit_id)?;
            let (finished, effects) = apply(
                visit.clone(),
                Command::RecordExit {
                    exited_at: self.clock.now(),
                },
            )?;
            match self.visits.compare_and_swap(&visit, finished.clone()) {
                Ok(()) => {
                    self.execute_effects(effects)?;
                    return Ok(finished);
                }
                Err(StoreError::CasConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Administratively cancels a visit that has not seen entry.
    pub fn cancel(&self, visit_id: VisitId) -> Result<Visit> {
        loop {
            let visit = self.require_visit(visit_id)?;
            let (cancelled, effects) = apply(
                visit.clone(),
                Command::Cancel {
                    cancelled_at: self.clock.now(),
                },
            )?;
            match self.visits.compare_and_swap(&visit, cancelled.clone()) {
                Ok(()) => {
                    self.execute_effects(effects)?;
                    return Ok(cancelled);
                }
                Err(StoreError::CasConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Returns the visit record, if present.
    pub fn visit(&self, visit_id: VisitId) -> Result<Option<Visit>> {
        Ok(self.visits.get(visit_id)?)
    }

    /// Returns every visitor currently on the premises.
    pub fn visits_inside(&self) -> Result<Vec<Visit>> {
        Ok(self.visits.visits_inside()?)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn effective_validity(&self, requested: Option<u32>) -> Result<u32> {
        let hours = requested.unwrap_or(self.default_validity_hours);
        if hours == 0 {
            return Err(EngineError::InvalidValidity);
        }
        Ok(hours)
    }

    fn require_visitor(&self, id: VisitorId) -> Result<Visitor> {
        self.visitors
            .get(id)?
            .ok_or(EngineError::VisitorNotFound(id))
    }

    fn require_visit(&self, id: VisitId) -> Result<Visit> {
        self.visits.get(id)?.ok_or(EngineError::VisitNotFound(id))
    }

    fn mint_credential(
        &self,
        visitor_id: VisitorId,
        unit_id: UnitId,
        valid_until: DateTime<Utc>,
    ) -> (Nonce, Signature) {
        let nonce = generate_nonce();
        let signature = sign_credential(
            &self.secret,
            &visitor_id.to_string(),
            &unit_id.to_string(),
            &canonical_timestamp(valid_until),
            nonce.as_str(),
        );
        (nonce, signature)
    }

    /// Executes effects produced by the kernel.
    ///
    /// This is the imperative shell: visitor bookkeeping hits the store, the
    /// audit trail goes to structured logging.
    fn execute_effects(&self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::IncrementVisitCount { visitor_id } => {
                    self.visitors
                        .record_admission(visitor_id, self.clock.now())?;
                    debug!(visitor = %visitor_id, "visit counter incremented");
                }
                Effect::AuditLogAppend(action) => {
                    debug!(?action, "audit action");
                }
            }
        }
        Ok(())
    }
}
