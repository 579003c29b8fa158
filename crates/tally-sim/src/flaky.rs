//! Fault-injecting store decorator
//!
//! Fails a seeded-random share of mutating calls with a network error.
//! Listing always goes through, so the simulator can always observe the
//! server's real state.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_model::{Resource, ResourceId, ResourceStore, StoreError};

/// Store that randomly drops mutations
pub struct FlakyStore<R: Resource> {
    inner: Arc<dyn ResourceStore<R>>,
    rng: Mutex<StdRng>,
    fail_rate: f64,
    injected: AtomicU64,
}

impl<R: Resource> FlakyStore<R> {
    /// Wrap `inner`, failing each mutation with probability `fail_rate`
    #[must_use]
    pub fn new(inner: Arc<dyn ResourceStore<R>>, fail_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            fail_rate: fail_rate.clamp(0.0, 1.0),
            injected: AtomicU64::new(0),
        }
    }

    /// Number of failures injected so far
    #[must_use]
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    fn roll(&self) -> Result<(), StoreError> {
        if self.fail_rate > 0.0 && self.rng.lock().gen_bool(self.fail_rate) {
            self.injected.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Network("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for FlakyStore<R> {
    async fn list(&self) -> Result<Vec<R>, StoreError> {
        self.inner.list().await
    }

    async fn create(&self, payload: &R) -> Result<R, StoreError> {
        self.roll()?;
        self.inner.create(payload).await
    }

    async fn update(&self, id: &ResourceId, patch: &R::Patch) -> Result<R, StoreError> {
        self.roll()?;
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), StoreError> {
        self.roll()?;
        self.inner.delete(id).await
    }

    async fn reorder(&self, parent: Option<&ResourceId>, ids: &[ResourceId]) -> Result<(), StoreError> {
        self.roll()?;
        self.inner.reorder(parent, ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_model::{MemoryStore, Module, ModulePatch};

    fn store(fail_rate: f64) -> FlakyStore<Module> {
        let inner: Arc<dyn ResourceStore<Module>> =
            Arc::new(MemoryStore::with_records(vec![Module::new("A").with_id("m1")]));
        FlakyStore::new(inner, fail_rate, 7)
    }

    #[tokio::test]
    async fn zero_rate_never_fails() {
        let store = store(0.0);
        for _ in 0..20 {
            store
                .update(&ResourceId::new("m1"), &ModulePatch::default().description("x"))
                .await
                .unwrap();
        }
        assert_eq!(store.injected(), 0);
    }

    #[tokio::test]
    async fn full_rate_fails_mutations_but_not_lists() {
        let store = store(1.0);
        let err = store.delete(&ResourceId::new("m1")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(store.injected(), 1);
    }
}
