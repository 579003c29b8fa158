//! In-memory resource store
//!
//! [`MemoryStore`] implements [`ResourceStore`] over a `Vec`, assigning
//! `srv-N` ids on create. It records every call it receives and can be told
//! to fail specific calls, which is what the batch-ordering and
//! partial-failure behaviour is tested against. The simulator uses it as the
//! shared server.

use crate::id::ResourceId;
use crate::resource::Resource;
use crate::store::{ResourceStore, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

/// Store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `list`
    List,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `reorder`
    Reorder,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// Operation
    pub op: StoreOp,
    /// Target id (update/delete), created payload's parent (create), or reorder parent
    pub target: Option<ResourceId>,
    /// Ids listed by a reorder
    pub ids: Vec<ResourceId>,
}

impl StoreCall {
    fn new(op: StoreOp, target: Option<ResourceId>) -> Self {
        Self {
            op,
            target,
            ids: Vec::new(),
        }
    }
}

/// Injected failure
#[derive(Debug, Clone)]
struct Fault {
    op: StoreOp,
    /// `None` matches any target
    target: Option<ResourceId>,
    error: StoreError,
    /// `None` fails forever
    remaining: Option<u32>,
}

#[derive(Debug)]
struct Inner<R> {
    records: Vec<R>,
    next_id: u64,
    calls: Vec<StoreCall>,
    faults: Vec<Fault>,
}

/// In-memory [`ResourceStore`] with a call log and fault injection
#[derive(Debug)]
pub struct MemoryStore<R: Resource> {
    inner: Mutex<Inner<R>>,
    latency: Mutex<Option<Duration>>,
}

impl<R: Resource> MemoryStore<R> {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Create a store seeded with `records` (ids are kept as given)
    ///
    /// Server ids handed out later continue after the highest seeded
    /// `srv-N`.
    #[must_use]
    pub fn with_records(records: Vec<R>) -> Self {
        let next_id = records
            .iter()
            .filter_map(|r| r.id().as_str().strip_prefix("srv-")?.parse::<u64>().ok())
            .max()
            .map_or(1, |n| n.saturating_add(1));
        Self {
            inner: Mutex::new(Inner {
                next_id,
                records,
                calls: Vec::new(),
                faults: Vec::new(),
            }),
            latency: Mutex::new(None),
        }
    }

    /// Snapshot of stored records
    #[must_use]
    pub fn records(&self) -> Vec<R> {
        self.inner.lock().records.clone()
    }

    /// Stored record by id
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<R> {
        self.inner
            .lock()
            .records
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    /// Calls received so far
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    /// Operations received so far, excluding `list`
    #[must_use]
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.op != StoreOp::List)
            .cloned()
            .collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Fail the next `op` call with `error`
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.inner.lock().faults.push(Fault {
            op,
            target: None,
            error,
            remaining: Some(1),
        });
    }

    /// Fail every `op` call targeting `target` with `error`
    pub fn fail_on(&self, op: StoreOp, target: ResourceId, error: StoreError) {
        self.inner.lock().faults.push(Fault {
            op,
            target: Some(target),
            error,
            remaining: None,
        });
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        self.inner.lock().faults.clear();
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Overwrite a record directly, bypassing the call log
    ///
    /// Stands in for another actor writing to the server.
    pub fn put(&self, record: R) {
        let mut inner = self.inner.lock();
        match inner.records.iter_mut().find(|r| r.id() == record.id()) {
            Some(slot) => *slot = record,
            None => inner.records.push(record),
        }
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Record the call and return the injected error, if any
    fn enter(inner: &mut Inner<R>, call: StoreCall) -> Result<(), StoreError> {
        let hit = inner.faults.iter().position(|f| {
            f.op == call.op && (f.target.is_none() || f.target == call.target)
        });
        inner.calls.push(call);

        let Some(idx) = hit else {
            return Ok(());
        };
        let error = inner.faults[idx].error.clone();
        let exhausted = match inner.faults[idx].remaining.as_mut() {
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            inner.faults.remove(idx);
        }
        Err(error)
    }

    fn check_unique(records: &[R], candidate: &R) -> Result<(), StoreError> {
        let Some(key) = candidate.unique_key() else {
            return Ok(());
        };
        let clash = records.iter().any(|r| {
            r.id() != candidate.id()
                && r.parent_id() == candidate.parent_id()
                && r.unique_key().as_deref() == Some(key.as_str())
        });
        if clash {
            return Err(StoreError::Conflict(format!(
                "{} '{}' already exists",
                R::KIND,
                key
            )));
        }
        Ok(())
    }
}

impl<R: Resource> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for MemoryStore<R> {
    async fn list(&self) -> Result<Vec<R>, StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock();
        Self::enter(&mut inner, StoreCall::new(StoreOp::List, None))?;
        let mut records = inner.records.clone();
        records.sort_by(|a, b| {
            a.parent_id()
                .cmp(&b.parent_id())
                .then(a.order().cmp(&b.order()))
        });
        Ok(records)
    }

    async fn create(&self, payload: &R) -> Result<R, StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock();
        let parent = payload.parent_id().cloned();
        Self::enter(&mut inner, StoreCall::new(StoreOp::Create, parent))?;

        if let Some(parent) = payload.parent_id() {
            if parent.is_local() {
                return Err(StoreError::Rejected(format!(
                    "parent {parent} is not a server id"
                )));
            }
        }

        let mut record = payload.clone();
        record.set_id(ResourceId::new(format!("srv-{}", inner.next_id)));
        Self::check_unique(&inner.records, &record)?;
        inner.next_id += 1;
        inner.records.push(record.clone());
        tracing::trace!(kind = %R::KIND, id = %record.id(), "memory store create");
        Ok(record)
    }

    async fn update(&self, id: &ResourceId, patch: &R::Patch) -> Result<R, StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock();
        Self::enter(&mut inner, StoreCall::new(StoreOp::Update, Some(id.clone())))?;

        let idx = inner
            .records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let mut updated = inner.records[idx].clone();
        updated.apply(patch);
        Self::check_unique(&inner.records, &updated)?;
        inner.records[idx] = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock();
        Self::enter(&mut inner, StoreCall::new(StoreOp::Delete, Some(id.clone())))?;

        let before = inner.records.len();
        inner.records.retain(|r| r.id() != id);
        if inner.records.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn reorder(
        &self,
        parent: Option<&ResourceId>,
        ids: &[ResourceId],
    ) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock();
        let mut call = StoreCall::new(StoreOp::Reorder, parent.cloned());
        call.ids = ids.to_vec();
        Self::enter(&mut inner, call)?;

        // Validate everything first: the reorder is all-or-nothing.
        for id in ids {
            let found = inner
                .records
                .iter()
                .any(|r| r.id() == id && r.parent_id() == parent);
            if !found {
                return Err(StoreError::NotFound(id.clone()));
            }
        }
        for (position, id) in ids.iter().enumerate() {
            if let Some(record) = inner.records.iter_mut().find(|r| r.id() == id) {
                record.set_order(u32::try_from(position).unwrap_or(u32::MAX));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Module, ModulePatch, TestCase};

    fn seeded() -> MemoryStore<Module> {
        MemoryStore::with_records(vec![
            Module::new("Login").with_id("srv-1").with_order(0),
            Module::new("Checkout").with_id("srv-2").with_order(1),
        ])
    }

    #[tokio::test]
    async fn create_assigns_server_ids() {
        let store = seeded();
        let created = store.create(&Module::new("Search")).await.unwrap();
        assert_eq!(created.id.as_str(), "srv-3");
        assert!(!created.id.is_local());
        assert_eq!(store.records().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let store = seeded();
        let err = store.create(&Module::new("login")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn creating_under_a_local_parent_is_rejected() {
        let store = MemoryStore::<TestCase>::new();
        let err = store
            .create(&TestCase::new(ResourceId::local(), "orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = seeded();
        let err = store
            .update(&ResourceId::new("srv-9"), &ModulePatch::default().name("x"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(ResourceId::new("srv-9")));
    }

    #[tokio::test]
    async fn new_ids_do_not_collide_with_seeded_ones() {
        let store = MemoryStore::with_records(vec![
            Module::new("Checkout").with_id("srv-2"),
            Module::new("Search").with_id("srv-3"),
        ]);
        let created = store.create(&Module::new("Profile")).await.unwrap();
        assert_eq!(created.id, ResourceId::new("srv-4"));
        assert_eq!(store.records().len(), 3);
    }

    #[tokio::test]
    async fn reorder_rewrites_positions() {
        let store = seeded();
        store
            .reorder(None, &[ResourceId::new("srv-2"), ResourceId::new("srv-1")])
            .await
            .unwrap();
        let listed = store.list().await.unwrap();
        let names: Vec<_> = listed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Checkout", "Login"]);
    }

    #[tokio::test]
    async fn faults_fire_once_and_are_logged() {
        let store = seeded();
        store.fail_next(StoreOp::Delete, StoreError::Network("reset".into()));

        let id = ResourceId::new("srv-1");
        assert!(store.delete(&id).await.is_err());
        assert!(store.delete(&id).await.is_ok());

        let ops: Vec<_> = store.calls().iter().map(|c| c.op).collect();
        assert_eq!(ops, [StoreOp::Delete, StoreOp::Delete]);
    }

    #[tokio::test]
    async fn targeted_faults_persist() {
        let store = seeded();
        let id = ResourceId::new("srv-2");
        store.fail_on(StoreOp::Update, id.clone(), StoreError::Rejected("locked".into()));

        for _ in 0..3 {
            assert!(store.update(&id, &ModulePatch::default().name("x")).await.is_err());
        }
        assert!(store
            .update(&ResourceId::new("srv-1"), &ModulePatch::default().name("y"))
            .await
            .is_ok());
    }
}
