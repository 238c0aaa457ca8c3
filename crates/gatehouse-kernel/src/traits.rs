//! Seams to the engine's external collaborators.
//!
//! The engine is stateless between calls; everything durable lives behind
//! these traits. Concrete implementations are plugged in by the runtime:
//! `gatehouse-store` provides the in-memory store, [`SystemClock`] the wall
//! clock, and tests substitute [`FixedClock`] and their own stores.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use gatehouse_types::{Nonce, Signature, Visit, VisitId, VisitStatus, Visitor, VisitorId};
use thiserror::Error;

// ============================================================================
// Clock
// ============================================================================

/// Wall-clock time source.
///
/// Expiry is evaluated lazily against this clock at validation time; there is
/// no scheduled sweep.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock that returns a settable fixed instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock frozen at the given instant.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to a new instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

// ============================================================================
// Store errors
// ============================================================================

/// Errors surfaced by the store seams.
///
/// `CasConflict` signals a lost optimistic-concurrency race: the caller
/// re-reads and re-evaluates. `Unavailable` is the spec's Transient class,
/// safe for the caller to retry with backoff.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("visitor {0} already exists")]
    VisitorExists(VisitorId),

    #[error("visitor {0} not found")]
    VisitorNotFound(VisitorId),

    #[error("visit {0} already exists")]
    VisitExists(VisitId),

    #[error("visit {0} not found")]
    VisitNotFound(VisitId),

    #[error("concurrent update lost the race for visit {0}")]
    CasConflict(VisitId),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Visitor store
// ============================================================================

/// Lookup and bookkeeping for registered visitors.
pub trait VisitorStore {
    /// Registers a new visitor. Fails if the ID is already taken.
    fn insert(&self, visitor: Visitor) -> Result<(), StoreError>;

    /// Returns the visitor with the given ID, if registered.
    fn get(&self, id: VisitorId) -> Result<Option<Visitor>, StoreError>;

    /// Returns the visitor holding the given document number, if any.
    fn find_by_document(&self, document_number: &str) -> Result<Option<Visitor>, StoreError>;

    /// Records an admission: increments the visit counter and stamps the
    /// first-visit time if this is the visitor's first admission.
    fn record_admission(&self, id: VisitorId, at: DateTime<Utc>) -> Result<(), StoreError>;
}

impl<T: VisitorStore + ?Sized> VisitorStore for std::sync::Arc<T> {
    fn insert(&self, visitor: Visitor) -> Result<(), StoreError> {
        (**self).insert(visitor)
    }

    fn get(&self, id: VisitorId) -> Result<Option<Visitor>, StoreError> {
        (**self).get(id)
    }

    fn find_by_document(&self, document_number: &str) -> Result<Option<Visitor>, StoreError> {
        (**self).find_by_document(document_number)
    }

    fn record_admission(&self, id: VisitorId, at: DateTime<Utc>) -> Result<(), StoreError> {
        (**self).record_admission(id, at)
    }
}

// ============================================================================
// Visit store
// ============================================================================

/// Persistence for visit records.
///
/// Keyed by visit ID and additionally indexed by the (nonce, signature)
/// pair. All writes after insertion go through [`VisitStore::compare_and_swap`]
/// so that each transition is a single atomic read-modify-write per record -
/// two concurrent validations of one credential cannot both observe "not yet
/// entered".
pub trait VisitStore {
    /// Persists a freshly created visit. Fails if the ID is already taken.
    fn insert(&self, visit: Visit) -> Result<(), StoreError>;

    /// Returns the visit with the given ID, if present.
    fn get(&self, id: VisitId) -> Result<Option<Visit>, StoreError>;

    /// Returns the visit holding the given credential pair, if any. This
    /// pair is the only lookup key used at validation time.
    fn find_by_credential(
        &self,
        nonce: &Nonce,
        signature: &Signature,
    ) -> Result<Option<Visit>, StoreError>;

    /// Replaces `expected` with `new` atomically. Returns
    /// [`StoreError::CasConflict`] if the stored record no longer equals
    /// `expected`.
    fn compare_and_swap(&self, expected: &Visit, new: Visit) -> Result<(), StoreError>;

    /// Returns every visit currently in the given status.
    fn list_by_status(&self, status: VisitStatus) -> Result<Vec<Visit>, StoreError>;

    /// Returns every visitor currently on the premises, most recent entry
    /// first.
    fn visits_inside(&self) -> Result<Vec<Visit>, StoreError> {
        let mut inside = self.list_by_status(VisitStatus::Inside)?;
        inside.sort_by_key(|v| std::cmp::Reverse(v.entered_at));
        Ok(inside)
    }
}

impl<T: VisitStore + ?Sized> VisitStore for std::sync::Arc<T> {
    fn insert(&self, visit: Visit) -> Result<(), StoreError> {
        (**self).insert(visit)
    }

    fn get(&self, id: VisitId) -> Result<Option<Visit>, StoreError> {
        (**self).get(id)
    }

    fn find_by_credential(
        &self,
        nonce: &Nonce,
        signature: &Signature,
    ) -> Result<Option<Visit>, StoreError> {
        (**self).find_by_credential(nonce, signature)
    }

    fn compare_and_swap(&self, expected: &Visit, new: Visit) -> Result<(), StoreError> {
        (**self).compare_and_swap(expected, new)
    }

    fn list_by_status(&self, status: VisitStatus) -> Result<Vec<Visit>, StoreError> {
        (**self).list_by_status(status)
    }

    fn visits_inside(&self) -> Result<Vec<Visit>, StoreError> {
        (**self).visits_inside()
    }
}
