//! Two-level edit session
//!
//! Pairs a parent draft (e.g. modules) with a child draft (e.g. test cases)
//! and keeps the parent/child relationship consistent while editing:
//! children can only be added under a parent that exists in the draft, and
//! deleting a parent removes its children with it.

use crate::draft::Draft;
use crate::error::{DraftError, SyncError};
use crate::orchestrator::{BatchOrchestrator, BatchReport};
use std::sync::Arc;
use tally_model::{Resource, ResourceId, ResourceStore};

/// Editable parent/child collection backed by two stores
#[derive(Debug)]
pub struct EditSession<P: Resource, C: Resource> {
    parents: Draft<P>,
    children: Draft<C>,
    orchestrator: BatchOrchestrator<P, C>,
}

impl<P: Resource, C: Resource> EditSession<P, C> {
    /// Fetch both collections and start editing them
    ///
    /// # Errors
    /// The store error of the failed fetch
    pub async fn load(
        parent_store: Arc<dyn ResourceStore<P>>,
        child_store: Arc<dyn ResourceStore<C>>,
    ) -> Result<Self, SyncError> {
        let orchestrator = BatchOrchestrator::new(parent_store, child_store);
        let (parents, children) = orchestrator.fetch().await?;
        tracing::debug!(
            parents = parents.len(),
            children = children.len(),
            "edit session loaded"
        );
        Ok(Self {
            parents: Draft::new(parents),
            children: Draft::new(children),
            orchestrator,
        })
    }

    /// Parent draft
    #[inline]
    #[must_use]
    pub fn parents(&self) -> &Draft<P> {
        &self.parents
    }

    /// Child draft
    #[inline]
    #[must_use]
    pub fn children(&self) -> &Draft<C> {
        &self.children
    }

    /// Children of `parent` in the draft, sorted by order
    #[must_use]
    pub fn children_of(&self, parent: &ResourceId) -> Vec<&C> {
        self.children.siblings(Some(parent))
    }

    /// Add a local parent
    ///
    /// # Errors
    /// See [`Draft::create_local`]
    pub fn create_parent(&mut self, payload: P) -> Result<ResourceId, DraftError> {
        self.parents.create_local(payload)
    }

    /// Add a local child under `parent`
    ///
    /// # Errors
    /// - `DraftError::NotFound` if `parent` is not in the parent draft
    /// - see [`Draft::create_local`]
    pub fn create_child(&mut self, parent: &ResourceId, mut payload: C) -> Result<ResourceId, DraftError> {
        if self.parents.get(parent).is_none() {
            return Err(DraftError::NotFound(parent.clone()));
        }
        payload.set_parent_id(parent.clone());
        self.children.create_local(payload)
    }

    /// Patch a parent
    ///
    /// # Errors
    /// See [`Draft::update_local`]
    pub fn update_parent(&mut self, id: &ResourceId, patch: &P::Patch) -> Result<(), DraftError> {
        self.parents.update_local(id, patch)
    }

    /// Patch a child
    ///
    /// # Errors
    /// See [`Draft::update_local`]
    pub fn update_child(&mut self, id: &ResourceId, patch: &C::Patch) -> Result<(), DraftError> {
        self.children.update_local(id, patch)
    }

    /// Delete a parent and every child under it
    ///
    /// # Returns
    /// Ids of the children removed with the parent
    ///
    /// # Errors
    /// - `DraftError::NotFound` if `id` is not in the parent draft
    pub fn delete_parent(&mut self, id: &ResourceId) -> Result<Vec<ResourceId>, DraftError> {
        self.parents.delete_local(id)?;
        let removed = self.children.delete_children_of(id);
        tracing::trace!(%id, children = removed.len(), "cascade delete");
        Ok(removed)
    }

    /// Delete one child
    ///
    /// # Errors
    /// - `DraftError::NotFound` if `id` is not in the child draft
    pub fn delete_child(&mut self, id: &ResourceId) -> Result<(), DraftError> {
        self.children.delete_local(id).map(|_| ())
    }

    /// Reorder the top-level parents
    ///
    /// # Errors
    /// See [`Draft::reorder_local`]
    pub fn reorder_parents(&mut self, ids: &[ResourceId]) -> Result<(), DraftError> {
        self.parents.reorder_local(None, ids)
    }

    /// Reorder the children of `parent`
    ///
    /// # Errors
    /// See [`Draft::reorder_local`]
    pub fn reorder_children(&mut self, parent: &ResourceId, ids: &[ResourceId]) -> Result<(), DraftError> {
        self.children.reorder_local(Some(parent), ids)
    }

    /// Whether either draft would send anything on save
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.parents.has_unsaved_changes() || self.children.has_unsaved_changes()
    }

    /// Throw away every local edit
    pub fn discard(&mut self) {
        self.parents.discard();
        self.children.discard();
    }

    /// Persist both drafts
    ///
    /// # Errors
    /// See [`BatchOrchestrator::save`]
    pub async fn save(&mut self) -> Result<BatchReport, SyncError> {
        self.orchestrator.save(&mut self.parents, &mut self.children).await
    }

    /// Re-fetch both collections, dropping local edits
    ///
    /// Recovers a session whose post-save fetch failed.
    ///
    /// # Errors
    /// The store error of the failed fetch; the drafts are left untouched
    pub async fn reload(&mut self) -> Result<(), SyncError> {
        let (parents, children) = self.orchestrator.fetch().await?;
        self.parents.rebase(parents);
        self.children.rebase(children);
        Ok(())
    }
}
