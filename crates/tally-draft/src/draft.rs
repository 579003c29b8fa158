//! Draft state manager
//!
//! Owns the (baseline, draft) pair of one resource collection plus the
//! tombstone set. Every mutation here is synchronous and local; nothing
//! touches the network until the draft is handed to the
//! [`BatchOrchestrator`](crate::BatchOrchestrator).

use crate::changeset::{diff, ChangeSet};
use crate::error::DraftError;
use std::collections::{BTreeSet, HashSet};
use tally_model::{Resource, ResourceId};

/// Local working copy of a server collection
///
/// # Invariants
/// - `baseline` and `draft` are independent owned copies
/// - `tombstones` only holds non-local ids that are present in `baseline`
/// - `baseline` is only ever replaced wholesale (see [`Draft::rebase`])
#[derive(Debug, Clone)]
pub struct Draft<R: Resource> {
    baseline: Vec<R>,
    draft: Vec<R>,
    tombstones: BTreeSet<ResourceId>,
}

impl<R: Resource> Draft<R> {
    /// Start editing `baseline`
    #[must_use]
    pub fn new(baseline: Vec<R>) -> Self {
        Self {
            draft: baseline.clone(),
            baseline,
            tombstones: BTreeSet::new(),
        }
    }

    /// Last snapshot known to match the server
    #[inline]
    #[must_use]
    pub fn baseline(&self) -> &[R] {
        &self.baseline
    }

    /// Current working copy
    #[inline]
    #[must_use]
    pub fn draft(&self) -> &[R] {
        &self.draft
    }

    /// Ids deleted locally that must be deleted remotely
    #[inline]
    #[must_use]
    pub fn tombstones(&self) -> &BTreeSet<ResourceId> {
        &self.tombstones
    }

    /// Draft entry by id
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&R> {
        self.draft.iter().find(|r| r.id() == id)
    }

    /// Draft entries under `parent`, sorted by order
    #[must_use]
    pub fn siblings(&self, parent: Option<&ResourceId>) -> Vec<&R> {
        let mut siblings: Vec<&R> = self
            .draft
            .iter()
            .filter(|r| r.parent_id() == parent)
            .collect();
        siblings.sort_by_key(|r| r.order());
        siblings
    }

    /// Add a new local-only resource
    ///
    /// The entry gets a fresh local id and is placed after its current
    /// siblings.
    ///
    /// # Errors
    /// - `DraftError::Validation` if the unique key clashes with a sibling
    pub fn create_local(&mut self, mut payload: R) -> Result<ResourceId, DraftError> {
        let id = ResourceId::local();
        payload.set_id(id.clone());
        let next = self
            .draft
            .iter()
            .filter(|r| r.parent_id() == payload.parent_id())
            .map(|r| r.order().saturating_add(1))
            .max()
            .unwrap_or(0);
        payload.set_order(next);
        self.check_unique(&payload)?;

        tracing::trace!(kind = %R::KIND, %id, "create local");
        self.draft.push(payload);
        Ok(id)
    }

    /// Merge `patch` into the draft entry `id`
    ///
    /// # Errors
    /// - `DraftError::NotFound` if `id` is not in the draft
    /// - `DraftError::Validation` if the result clashes with a sibling; the
    ///   entry is left unchanged
    pub fn update_local(&mut self, id: &ResourceId, patch: &R::Patch) -> Result<(), DraftError> {
        let idx = self.index_of(id)?;
        let mut candidate = self.draft[idx].clone();
        candidate.apply(patch);
        self.check_unique(&candidate)?;
        self.draft[idx] = candidate;
        Ok(())
    }

    /// Remove `id` from the draft
    ///
    /// Persisted ids are tombstoned so the delete reaches the server;
    /// local-only ids are simply dropped.
    ///
    /// # Errors
    /// - `DraftError::NotFound` if `id` is not in the draft
    pub fn delete_local(&mut self, id: &ResourceId) -> Result<R, DraftError> {
        let idx = self.index_of(id)?;
        let removed = self.draft.remove(idx);
        self.tombstone(id);
        Ok(removed)
    }

    /// Remove every draft entry under `parent`, returning the removed ids
    ///
    /// Used to cascade a parent delete onto its children.
    pub fn delete_children_of(&mut self, parent: &ResourceId) -> Vec<ResourceId> {
        let (removed, kept): (Vec<R>, Vec<R>) = std::mem::take(&mut self.draft)
            .into_iter()
            .partition(|r| r.parent_id() == Some(parent));
        self.draft = kept;

        let ids: Vec<ResourceId> = removed.iter().map(|r| r.id().clone()).collect();
        for id in &ids {
            self.tombstone(id);
        }
        ids
    }

    /// Rewrite the order of the siblings under `parent` to match `ids`
    ///
    /// Only `order` is touched.
    ///
    /// # Errors
    /// - `DraftError::NotFound` if an id is not in the draft
    /// - `DraftError::Validation` if an id is listed twice, belongs to another
    ///   parent, or a sibling is missing from `ids`
    pub fn reorder_local(
        &mut self,
        parent: Option<&ResourceId>,
        ids: &[ResourceId],
    ) -> Result<(), DraftError> {
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id) {
                return Err(DraftError::Validation(format!("{id} listed twice")));
            }
            let entry = self.get(id).ok_or_else(|| DraftError::NotFound(id.clone()))?;
            if entry.parent_id() != parent {
                return Err(DraftError::Validation(format!(
                    "{id} is not a sibling under {}",
                    parent.map_or("the root", ResourceId::as_str)
                )));
            }
        }
        let sibling_count = self
            .draft
            .iter()
            .filter(|r| r.parent_id() == parent)
            .count();
        if sibling_count != ids.len() {
            return Err(DraftError::Validation(format!(
                "reorder lists {} of {sibling_count} siblings",
                ids.len()
            )));
        }

        for (position, id) in ids.iter().enumerate() {
            let idx = self.index_of(id)?;
            self.draft[idx].set_order(u32::try_from(position).unwrap_or(u32::MAX));
        }
        Ok(())
    }

    /// Remote operations needed to persist the draft
    #[must_use]
    pub fn changes(&self) -> ChangeSet<R> {
        diff(&self.baseline, &self.draft, &self.tombstones)
    }

    /// Whether the draft differs from the baseline in content, order or membership
    ///
    /// Defined through [`Draft::changes`] so it always agrees with what a save
    /// would send.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        !self.changes().is_empty()
    }

    /// Throw away local edits
    pub fn discard(&mut self) {
        self.draft = self.baseline.clone();
        self.tombstones.clear();
    }

    /// Adopt a fresh server snapshot as baseline and draft
    ///
    /// Local edits not yet saved are dropped; call this only with the
    /// snapshot fetched after a save.
    pub fn rebase(&mut self, baseline: Vec<R>) {
        self.draft = baseline.clone();
        self.baseline = baseline;
        self.tombstones.clear();
    }

    fn index_of(&self, id: &ResourceId) -> Result<usize, DraftError> {
        self.draft
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| DraftError::NotFound(id.clone()))
    }

    fn tombstone(&mut self, id: &ResourceId) {
        if !id.is_local() && self.baseline.iter().any(|r| r.id() == id) {
            self.tombstones.insert(id.clone());
        }
    }

    fn check_unique(&self, candidate: &R) -> Result<(), DraftError> {
        let Some(key) = candidate.unique_key() else {
            return Ok(());
        };
        let clash = self.draft.iter().any(|r| {
            r.id() != candidate.id()
                && r.parent_id() == candidate.parent_id()
                && r.unique_key().as_deref() == Some(key.as_str())
        });
        if clash {
            return Err(DraftError::Validation(format!(
                "duplicate {} '{key}'",
                R::KIND
            )));
        }
        Ok(())
    }
}
