//! End-to-end tests for the visit authorization engine.
//!
//! Drives the real engine against the in-memory store with a fixed clock:
//! issuance, gate validation in every outcome branch, exit bookkeeping, and
//! the single-use invariant under concurrent scans.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use gatehouse::{Admissibility, EngineError, Gatehouse, IssueRequest, ValidationOutcome};
use gatehouse_config::GatehouseConfig;
use gatehouse_crypto::{generate_nonce, sign_credential, CredentialSecret};
use gatehouse_kernel::{FixedClock, TransitionError, VisitStore, VisitorStore};
use gatehouse_store::MemoryStore;
use gatehouse_types::{
    canonical_timestamp, DocumentType, PresentedCredential, UnitId, Visit, VisitId, VisitKind,
    VisitStatus, Visitor, VisitorId,
};

const SECRET: &str = "integration-test-secret-0123456789abcdef";

struct Harness {
    engine: Gatehouse<Arc<FixedClock>, Arc<MemoryStore>, Arc<MemoryStore>>,
    clock: Arc<FixedClock>,
    store: Arc<MemoryStore>,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

fn harness() -> Harness {
    let mut config = GatehouseConfig::default();
    config.security.credential_secret = SECRET.to_string();
    config.policy.audit_decisions = false;

    let clock = Arc::new(FixedClock::new(t0()));
    let store = Arc::new(MemoryStore::new());
    let engine = Gatehouse::new(&config, clock.clone(), store.clone(), store.clone())
        .expect("engine should build from valid config");

    Harness {
        engine,
        clock,
        store,
    }
}

fn register_visitor(h: &Harness) -> VisitorId {
    let visitor = Visitor::new(
        VisitorId::generate(),
        "Ana Souza",
        DocumentType::Cpf,
        "123.456.789-00",
    );
    let id = visitor.id;
    VisitorStore::insert(&h.store, visitor).expect("register visitor");
    id
}

fn register_blacklisted_visitor(h: &Harness, reason: &str) -> VisitorId {
    let visitor = Visitor::new(
        VisitorId::generate(),
        "Carlos Lima",
        DocumentType::Rg,
        "98.765.432-1",
    )
    .blacklist(reason, t0());
    let id = visitor.id;
    VisitorStore::insert(&h.store, visitor).expect("register visitor");
    id
}

// ============================================================================
// The canonical scenario
// ============================================================================

#[test]
fn issue_validate_revalidate_exit_reexit() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let unit_id = UnitId::generate();

    // Issue at T0 with 24h validity
    let issued = h
        .engine
        .issue(IssueRequest::new(visitor_id, unit_id).with_validity_hours(24))
        .expect("issue");
    assert_eq!(issued.credential.valid_until, t0() + Duration::hours(24));
    assert_eq!(issued.visit.status, VisitStatus::Authorized);

    // Validate at T0+1h: admitted
    h.clock.set(t0() + Duration::hours(1));
    let outcome = h
        .engine
        .validate(&issued.credential.to_presented())
        .expect("validate");
    let ValidationOutcome::Admitted { visit } = outcome else {
        panic!("expected admission, got {outcome:?}");
    };
    assert_eq!(visit.status, VisitStatus::Inside);
    assert_eq!(visit.entered_at, Some(t0() + Duration::hours(1)));

    // Validate again: already used, original entry time reported
    h.clock.set(t0() + Duration::hours(1) + Duration::minutes(5));
    let outcome = h
        .engine
        .validate(&issued.credential.to_presented())
        .expect("validate");
    assert_eq!(
        outcome,
        ValidationOutcome::AlreadyUsed {
            entered_at: t0() + Duration::hours(1)
        }
    );

    // Exit at T0+2h: finished, duration 60 whole minutes
    h.clock.set(t0() + Duration::hours(2));
    let finished = h.engine.record_exit(visit.id).expect("exit");
    assert_eq!(finished.status, VisitStatus::Finished);
    assert_eq!(finished.duration_minutes, Some(60));

    // Second exit: conflict, not a silent success
    let err = h.engine.record_exit(visit.id).expect_err("second exit");
    assert!(matches!(
        err,
        EngineError::Transition(TransitionError::AlreadyFinished { .. })
    ));
}

// ============================================================================
// Validation outcomes
// ============================================================================

#[test]
fn expiry_boundary_is_inclusive() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let issued = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()).with_validity_hours(24))
        .expect("issue");

    // One second before the boundary: not expired
    h.clock.set(t0() + Duration::hours(24) - Duration::seconds(1));
    assert!(h
        .engine
        .validate(&issued.credential.to_presented())
        .expect("validate")
        .is_admitted());

    // Exactly at the boundary: expired (fresh credential, same instant)
    let issued2 = {
        h.clock.set(t0());
        let v2 = register_visitor(&h);
        h.engine
            .issue(IssueRequest::new(v2, UnitId::generate()).with_validity_hours(24))
            .expect("issue")
    };
    h.clock.set(t0() + Duration::hours(24));
    assert_eq!(
        h.engine
            .validate(&issued2.credential.to_presented())
            .expect("validate"),
        ValidationOutcome::Expired
    );
}

#[test]
fn every_mutated_field_reads_as_forged() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let issued = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()))
        .expect("issue");
    let good = issued.credential.to_presented();

    let mut wrong_visitor = good.clone();
    wrong_visitor.visitor_id = Some(VisitorId::generate().to_string());

    let mut wrong_unit = good.clone();
    wrong_unit.unit_id = Some(UnitId::generate().to_string());

    let mut wrong_expiry = good.clone();
    wrong_expiry.valid_until = Some(canonical_timestamp(t0() + Duration::hours(48)));

    let mut wrong_nonce = good.clone();
    wrong_nonce.nonce = Some(generate_nonce().to_string());

    let mut wrong_signature = good.clone();
    wrong_signature.signature = Some("ab".repeat(32));

    for presented in [
        wrong_visitor,
        wrong_unit,
        wrong_expiry,
        wrong_nonce,
        wrong_signature,
    ] {
        assert_eq!(
            h.engine.validate(&presented).expect("validate"),
            ValidationOutcome::Forged
        );
    }

    // The genuine credential still admits afterwards
    assert!(h
        .engine
        .validate(&good)
        .expect("validate")
        .is_admitted());
}

#[test]
fn missing_fields_are_malformed() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let issued = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()))
        .expect("issue");
    let good = issued.credential.to_presented();

    let strip: [fn(&mut PresentedCredential); 5] = [
        |p| p.visitor_id = None,
        |p| p.unit_id = None,
        |p| p.valid_until = None,
        |p| p.nonce = None,
        |p| p.signature = None,
    ];

    for f in strip {
        let mut presented = good.clone();
        f(&mut presented);
        assert_eq!(
            h.engine.validate(&presented).expect("validate"),
            ValidationOutcome::Malformed
        );
    }

    assert_eq!(
        h.engine
            .validate(&PresentedCredential::default())
            .expect("validate"),
        ValidationOutcome::Malformed
    );
}

#[test]
fn json_wire_payload_round_trips_through_validation() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let issued = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()))
        .expect("issue");

    // As the gate scanner submits it: the serialized credential parsed back
    // into a presented payload, untouched
    let wire = serde_json::to_string(&issued.credential).expect("serialize");
    let presented: PresentedCredential = serde_json::from_str(&wire).expect("deserialize");

    h.clock.set(t0() + Duration::minutes(1));
    assert!(h.engine.validate(&presented).expect("validate").is_admitted());
}

#[test]
fn well_signed_but_never_issued_credential_is_not_found() {
    let h = harness();
    register_visitor(&h);

    // Signed with the right secret, but no visit record was ever created
    let secret = CredentialSecret::new(SECRET);
    let visitor_id = VisitorId::generate();
    let unit_id = UnitId::generate();
    let valid_until = t0() + Duration::hours(6);
    let nonce = generate_nonce();
    let signature = sign_credential(
        &secret,
        &visitor_id.to_string(),
        &unit_id.to_string(),
        &canonical_timestamp(valid_until),
        nonce.as_str(),
    );

    let presented = PresentedCredential {
        visitor_id: Some(visitor_id.to_string()),
        unit_id: Some(unit_id.to_string()),
        valid_until: Some(canonical_timestamp(valid_until)),
        nonce: Some(nonce.to_string()),
        signature: Some(signature.to_string()),
    };

    assert_eq!(
        h.engine.validate(&presented).expect("validate"),
        ValidationOutcome::NotFound
    );
}

#[test]
fn stored_visit_mismatch_reads_as_forged() {
    let h = harness();

    // A correctly signed credential whose (nonce, signature) pair points at
    // a visit belonging to someone else entirely
    let secret = CredentialSecret::new(SECRET);
    let visitor_id = VisitorId::generate();
    let unit_id = UnitId::generate();
    let valid_until = t0() + Duration::hours(6);
    let nonce = generate_nonce();
    let signature = sign_credential(
        &secret,
        &visitor_id.to_string(),
        &unit_id.to_string(),
        &canonical_timestamp(valid_until),
        nonce.as_str(),
    );

    let mut foreign = Visit::scheduled(
        VisitId::generate(),
        VisitorId::generate(),
        UnitId::generate(),
        VisitKind::Ordinary,
        None,
        t0(),
    );
    foreign.status = VisitStatus::Authorized;
    foreign.nonce = Some(nonce.clone());
    foreign.signature = Some(signature);
    foreign.valid_until = Some(valid_until);
    VisitStore::insert(&h.store, foreign).expect("insert");

    let presented = PresentedCredential {
        visitor_id: Some(visitor_id.to_string()),
        unit_id: Some(unit_id.to_string()),
        valid_until: Some(canonical_timestamp(valid_until)),
        nonce: Some(nonce.to_string()),
        signature: Some(signature.to_string()),
    };

    assert_eq!(
        h.engine.validate(&presented).expect("validate"),
        ValidationOutcome::Forged
    );
}

#[test]
fn cancelled_visit_cannot_be_admitted() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let issued = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()))
        .expect("issue");

    h.engine.cancel(issued.visit.id).expect("cancel");

    let err = h
        .engine
        .validate(&issued.credential.to_presented())
        .expect_err("cancelled credential must not admit");
    assert!(matches!(
        err,
        EngineError::Transition(TransitionError::NotAdmittable {
            status: VisitStatus::Cancelled,
            ..
        })
    ));
}

// ============================================================================
// Issuance
// ============================================================================

#[test]
fn blacklisted_visitor_gets_denied_record_and_no_credential() {
    let h = harness();
    let visitor_id = register_blacklisted_visitor(&h, "dano ao patrimônio");

    let err = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()))
        .expect_err("issuance must be blocked");
    match err {
        EngineError::Blacklisted { reason } => assert_eq!(reason, "dano ao patrimônio"),
        other => panic!("expected Blacklisted, got {other:?}"),
    }

    // A DENIED record exists; no AUTHORIZED record was created
    let denied = h
        .store
        .list_by_status(VisitStatus::Denied)
        .expect("query");
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].visitor_id, visitor_id);
    assert!(denied[0].credential_key().is_none());
    assert!(h
        .store
        .list_by_status(VisitStatus::Authorized)
        .expect("query")
        .is_empty());
}

#[test]
fn check_admissible_reflects_blacklist() {
    let h = harness();
    let clean = register_visitor(&h);
    let blocked = register_blacklisted_visitor(&h, "ameaça a funcionário");

    assert!(h
        .engine
        .check_admissible(clean)
        .expect("check")
        .is_admissible());
    assert_eq!(
        h.engine.check_admissible(blocked).expect("check"),
        Admissibility::Blocked {
            reason: "ameaça a funcionário".to_string()
        }
    );

    let unknown = VisitorId::generate();
    assert!(matches!(
        h.engine.check_admissible(unknown),
        Err(EngineError::VisitorNotFound(id)) if id == unknown
    ));
}

#[test]
fn issuance_is_not_idempotent() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let unit_id = UnitId::generate();

    let first = h
        .engine
        .issue(IssueRequest::new(visitor_id, unit_id))
        .expect("issue");
    let second = h
        .engine
        .issue(IssueRequest::new(visitor_id, unit_id))
        .expect("issue");

    assert_ne!(first.visit.id, second.visit.id);
    assert_ne!(first.credential.nonce, second.credential.nonce);
    assert_ne!(first.credential.signature, second.credential.signature);
    assert_eq!(h.store.visit_count(), 2);
}

#[test]
fn zero_validity_is_rejected_before_any_side_effect() {
    let h = harness();
    let visitor_id = register_visitor(&h);

    let err = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()).with_validity_hours(0))
        .expect_err("zero validity");
    assert!(matches!(err, EngineError::InvalidValidity));
    assert_eq!(h.store.visit_count(), 0);
}

#[test]
fn issue_for_unknown_visitor_fails() {
    let h = harness();
    let unknown = VisitorId::generate();
    assert!(matches!(
        h.engine.issue(IssueRequest::new(unknown, UnitId::generate())),
        Err(EngineError::VisitorNotFound(id)) if id == unknown
    ));
}

#[test]
fn scheduled_visit_can_be_issued_later() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let unit_id = UnitId::generate();

    let pending = h
        .engine
        .schedule(
            visitor_id,
            unit_id,
            VisitKind::ServiceProvider,
            Some(t0() + Duration::hours(3)),
            Some("manutenção do ar-condicionado".to_string()),
        )
        .expect("schedule");
    assert_eq!(pending.status, VisitStatus::Pending);
    assert!(pending.credential_key().is_none());

    let issued = h
        .engine
        .issue_scheduled(pending.id, Some(8), gatehouse_types::AuthorizationMethod::Push)
        .expect("issue scheduled");
    assert_eq!(issued.visit.id, pending.id);
    assert_eq!(issued.visit.status, VisitStatus::Authorized);
    assert_eq!(issued.credential.valid_until, t0() + Duration::hours(8));

    // Still exactly one record for this visit
    assert_eq!(h.store.visit_count(), 1);

    assert!(h
        .engine
        .validate(&issued.credential.to_presented())
        .expect("validate")
        .is_admitted());
}

// ============================================================================
// Occupancy bookkeeping
// ============================================================================

#[test]
fn admission_updates_visitor_history_and_occupancy() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let issued = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()))
        .expect("issue");

    h.clock.set(t0() + Duration::minutes(30));
    let outcome = h
        .engine
        .validate(&issued.credential.to_presented())
        .expect("validate");
    assert!(outcome.is_admitted());

    let visitor = VisitorStore::get(&h.store, visitor_id)
        .expect("get")
        .expect("present");
    assert_eq!(visitor.visit_count, 1);
    assert_eq!(visitor.first_visit_at, Some(t0() + Duration::minutes(30)));

    let inside = h.engine.visits_inside().expect("query");
    assert_eq!(inside.len(), 1);
    assert_eq!(inside[0].visitor_id, visitor_id);

    // After exit nobody is inside
    h.clock.set(t0() + Duration::hours(1));
    h.engine.record_exit(inside[0].id).expect("exit");
    assert!(h.engine.visits_inside().expect("query").is_empty());
}

#[test]
fn cancel_after_entry_is_rejected() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let issued = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()))
        .expect("issue");

    h.clock.set(t0() + Duration::minutes(10));
    h.engine
        .validate(&issued.credential.to_presented())
        .expect("validate");

    let err = h
        .engine
        .cancel(issued.visit.id)
        .expect_err("cancel after entry");
    assert!(matches!(
        err,
        EngineError::Transition(TransitionError::NotCancellable { .. })
    ));
}

// ============================================================================
// Concurrency: single-use under racing gate scans
// ============================================================================

#[test]
fn concurrent_validations_admit_exactly_once() {
    let h = harness();
    let visitor_id = register_visitor(&h);
    let issued = h
        .engine
        .issue(IssueRequest::new(visitor_id, UnitId::generate()))
        .expect("issue");

    h.clock.set(t0() + Duration::minutes(1));
    let presented = issued.credential.to_presented();

    let outcomes: Vec<ValidationOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = &h.engine;
                let presented = presented.clone();
                scope.spawn(move || engine.validate(&presented).expect("validate"))
            })
            .collect();
        handles.into_iter().map(|j| j.join().expect("join")).collect()
    });

    let admitted = outcomes.iter().filter(|o| o.is_admitted()).count();
    assert_eq!(admitted, 1, "exactly one scan may admit");

    let entry_time = t0() + Duration::minutes(1);
    for outcome in &outcomes {
        match outcome {
            ValidationOutcome::Admitted { visit } => {
                assert_eq!(visit.entered_at, Some(entry_time));
            }
            ValidationOutcome::AlreadyUsed { entered_at } => {
                assert_eq!(*entered_at, entry_time);
            }
            other => panic!("unexpected outcome under race: {other:?}"),
        }
    }

    // The visit counter moved exactly once
    let visitor = VisitorStore::get(&h.store, visitor_id)
        .expect("get")
        .expect("present");
    assert_eq!(visitor.visit_count, 1);
}
