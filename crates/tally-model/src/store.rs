//! Resource store contract
//!
//! The engine sees the backend only through [`ResourceStore`]: an
//! asynchronous, key-addressable collection store whose every call may fail
//! on its own. No call is assumed to be transactional with any other.

use crate::id::ResourceId;
use crate::resource::Resource;
use async_trait::async_trait;
use std::sync::Arc;

/// Remote call failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Resource vanished or never existed server-side
    #[error("not found: {0}")]
    NotFound(ResourceId),

    /// Server-side conflict (e.g. duplicate name)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Server rejected the request for another reason
    #[error("rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Whether retrying the same call can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Asynchronous store for one resource collection
///
/// # Contract
/// - `list` returns a full snapshot of the collection
/// - `create` assigns a server id and returns the stored resource
/// - `reorder` rewrites the position of all listed siblings at once
#[async_trait]
pub trait ResourceStore<R: Resource>: Send + Sync {
    /// Full snapshot fetch
    async fn list(&self) -> Result<Vec<R>, StoreError>;

    /// Create a resource, returning it with its server id
    async fn create(&self, payload: &R) -> Result<R, StoreError>;

    /// Apply a patch to an existing resource
    async fn update(&self, id: &ResourceId, patch: &R::Patch) -> Result<R, StoreError>;

    /// Delete a resource
    async fn delete(&self, id: &ResourceId) -> Result<(), StoreError>;

    /// Set the order of the siblings under `parent` to the order of `ids`
    async fn reorder(&self, parent: Option<&ResourceId>, ids: &[ResourceId])
        -> Result<(), StoreError>;
}

#[async_trait]
impl<R, S> ResourceStore<R> for Arc<S>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    async fn list(&self) -> Result<Vec<R>, StoreError> {
        (**self).list().await
    }

    async fn create(&self, payload: &R) -> Result<R, StoreError> {
        (**self).create(payload).await
    }

    async fn update(&self, id: &ResourceId, patch: &R::Patch) -> Result<R, StoreError> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }

    async fn reorder(
        &self,
        parent: Option<&ResourceId>,
        ids: &[ResourceId],
    ) -> Result<(), StoreError> {
        (**self).reorder(parent, ids).await
    }
}
