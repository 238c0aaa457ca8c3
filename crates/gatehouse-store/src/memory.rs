//! The in-memory store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use gatehouse_kernel::{StoreError, VisitStore, VisitorStore};
use gatehouse_types::{Nonce, Signature, Visit, VisitId, VisitStatus, Visitor, VisitorId};

#[derive(Debug, Default)]
struct Inner {
    visitors: BTreeMap<VisitorId, Visitor>,
    visits: BTreeMap<VisitId, Visit>,
    /// Secondary index: credential pair -> visit. Uniqueness comes from nonce
    /// entropy, not from a check here.
    by_credential: BTreeMap<(Nonce, Signature), VisitId>,
}

/// In-memory visitor/visit store.
///
/// All maps live under a single `RwLock`; [`VisitStore::compare_and_swap`]
/// holds the write lock for the full read-compare-write, so each visit
/// transition is atomic with respect to every other writer.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of visit records held.
    pub fn visit_count(&self) -> usize {
        self.read().visits.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("store lock poisoned")
    }
}

impl VisitorStore for MemoryStore {
    fn insert(&self, visitor: Visitor) -> Result<(), StoreError> {
        let mut inner = self.write();
        if inner.visitors.contains_key(&visitor.id) {
            return Err(StoreError::VisitorExists(visitor.id));
        }
        inner.visitors.insert(visitor.id, visitor);
        Ok(())
    }

    fn get(&self, id: VisitorId) -> Result<Option<Visitor>, StoreError> {
        Ok(self.read().visitors.get(&id).cloned())
    }

    fn find_by_document(&self, document_number: &str) -> Result<Option<Visitor>, StoreError> {
        Ok(self
            .read()
            .visitors
            .values()
            .find(|v| v.document_number == document_number)
            .cloned())
    }

    fn record_admission(&self, id: VisitorId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.write();
        let visitor = inner
            .visitors
            .get_mut(&id)
            .ok_or(StoreError::VisitorNotFound(id))?;
        visitor.visit_count = visitor.visit_count.saturating_add(1);
        if visitor.first_visit_at.is_none() {
            visitor.first_visit_at = Some(at);
        }
        Ok(())
    }
}

impl VisitStore for MemoryStore {
    fn insert(&self, visit: Visit) -> Result<(), StoreError> {
        let mut inner = self.write();
        if inner.visits.contains_key(&visit.id) {
            return Err(StoreError::VisitExists(visit.id));
        }
        if let Some((nonce, signature)) = visit.credential_key() {
            let key = (nonce.clone(), *signature);
            debug_assert!(!inner.by_credential.contains_key(&key));
            inner.by_credential.insert(key, visit.id);
        }
        inner.visits.insert(visit.id, visit);
        Ok(())
    }

    fn get(&self, id: VisitId) -> Result<Option<Visit>, StoreError> {
        Ok(self.read().visits.get(&id).cloned())
    }

    fn find_by_credential(
        &self,
        nonce: &Nonce,
        signature: &Signature,
    ) -> Result<Option<Visit>, StoreError> {
        let inner = self.read();
        let key = (nonce.clone(), *signature);
        Ok(inner
            .by_credential
            .get(&key)
            .and_then(|id| inner.visits.get(id))
            .cloned())
    }

    fn compare_and_swap(&self, expected: &Visit, new: Visit) -> Result<(), StoreError> {
        let mut inner = self.write();
        let stored = inner
            .visits
            .get(&expected.id)
            .ok_or(StoreError::VisitNotFound(expected.id))?;
        if stored != expected {
            return Err(StoreError::CasConflict(expected.id));
        }
        debug_assert_eq!(new.id, expected.id);

        // Credential attached by this transition: index it
        if expected.credential_key().is_none() {
            if let Some((nonce, signature)) = new.credential_key() {
                inner
                    .by_credential
                    .insert((nonce.clone(), *signature), new.id);
            }
        }
        inner.visits.insert(new.id, new);
        Ok(())
    }

    fn list_by_status(&self, status: VisitStatus) -> Result<Vec<Visit>, StoreError> {
        Ok(self
            .read()
            .visits
            .values()
            .filter(|v| v.status == status)
            .cloned()
            .collect())
    }
}
