//! Batch persistence orchestrator
//!
//! Executes the change sets of a parent collection and its child collection
//! against their stores, in a fixed phase order:
//!
//! 1. delete tombstoned children
//! 2. delete tombstoned parents
//! 3. create new parents (recording local → server ids)
//! 4. create new children against the mapped parent ids
//! 5. update modified parents
//! 6. update modified children
//! 7. reorder parents, then children per parent
//!
//! Phases run strictly one after another; the items of one phase are
//! dispatched concurrently. A failing item is recorded and the batch keeps
//! going. Whatever happened, both collections are re-fetched at the end and
//! the drafts rebased on what the server actually holds.

use crate::changeset::{Reorder, Update};
use crate::draft::Draft;
use crate::error::SyncError;
use futures::future::{join_all, try_join};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use tally_model::{Resource, ResourceId, ResourceKind, ResourceStore, StoreError};

/// Remote operation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `reorder`
    Reorder,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Reorder => "reorder",
        })
    }
}

/// One failed remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Operation that failed
    pub operation: Operation,
    /// Kind of resource targeted
    pub kind: ResourceKind,
    /// Target id (reorders: the sibling group's parent, `None` for top level)
    pub resource_id: Option<ResourceId>,
    /// Cause
    pub error: StoreError,
}

impl Display for BatchFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.resource_id {
            Some(id) => write!(f, "{} {} {id}: {}", self.operation, self.kind, self.error),
            None => write!(f, "{} {}: {}", self.operation, self.kind, self.error),
        }
    }
}

/// Succeeded / failed counts of one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpCounts {
    /// Calls that succeeded
    pub succeeded: usize,
    /// Calls that failed
    pub failed: usize,
}

/// Outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Create counts
    pub creates: OpCounts,
    /// Update counts
    pub updates: OpCounts,
    /// Delete counts
    pub deletes: OpCounts,
    /// Reorder counts
    pub reorders: OpCounts,
    /// Every recorded failure, in phase order
    pub failures: Vec<BatchFailure>,
    /// Server ids assigned to local-only resources
    pub id_map: BTreeMap<ResourceId, ResourceId>,
}

impl BatchReport {
    /// Counts for one operation category
    #[must_use]
    pub fn counts(&self, operation: Operation) -> OpCounts {
        match operation {
            Operation::Create => self.creates,
            Operation::Update => self.updates,
            Operation::Delete => self.deletes,
            Operation::Reorder => self.reorders,
        }
    }

    /// Total succeeded calls
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.creates.succeeded + self.updates.succeeded + self.deletes.succeeded + self.reorders.succeeded
    }

    /// Total failed calls
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether every operation succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn counts_mut(&mut self, operation: Operation) -> &mut OpCounts {
        match operation {
            Operation::Create => &mut self.creates,
            Operation::Update => &mut self.updates,
            Operation::Delete => &mut self.deletes,
            Operation::Reorder => &mut self.reorders,
        }
    }

    fn record_ok(&mut self, operation: Operation) {
        self.counts_mut(operation).succeeded += 1;
    }

    fn record_err(
        &mut self,
        operation: Operation,
        kind: ResourceKind,
        resource_id: Option<ResourceId>,
        error: StoreError,
    ) {
        let failure = BatchFailure {
            operation,
            kind,
            resource_id,
            error,
        };
        tracing::warn!(%failure, "batch item failed");
        self.counts_mut(operation).failed += 1;
        self.failures.push(failure);
    }
}

impl Display for BatchReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} operations failed",
            self.failed(),
            self.failed() + self.succeeded()
        )?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

/// Persists a two-level (parent → children) draft
pub struct BatchOrchestrator<P: Resource, C: Resource> {
    parents: Arc<dyn ResourceStore<P>>,
    children: Arc<dyn ResourceStore<C>>,
}

impl<P: Resource, C: Resource> Clone for BatchOrchestrator<P, C> {
    fn clone(&self) -> Self {
        Self {
            parents: Arc::clone(&self.parents),
            children: Arc::clone(&self.children),
        }
    }
}

impl<P: Resource, C: Resource> fmt::Debug for BatchOrchestrator<P, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("parents", &P::KIND)
            .field("children", &C::KIND)
            .finish()
    }
}

impl<P: Resource, C: Resource> BatchOrchestrator<P, C> {
    /// Create orchestrator over the two stores
    #[inline]
    #[must_use]
    pub fn new(parents: Arc<dyn ResourceStore<P>>, children: Arc<dyn ResourceStore<C>>) -> Self {
        Self { parents, children }
    }

    /// Parent store
    #[inline]
    #[must_use]
    pub fn parent_store(&self) -> &Arc<dyn ResourceStore<P>> {
        &self.parents
    }

    /// Child store
    #[inline]
    #[must_use]
    pub fn child_store(&self) -> &Arc<dyn ResourceStore<C>> {
        &self.children
    }

    /// Fetch both collections
    ///
    /// # Errors
    /// The first store error encountered
    pub async fn fetch(&self) -> Result<(Vec<P>, Vec<C>), StoreError> {
        try_join(self.parents.list(), self.children.list()).await
    }

    /// Persist both drafts and rebase them on a fresh fetch
    ///
    /// # Returns
    /// - `Ok(report)` if every operation succeeded
    ///
    /// # Errors
    /// - `SyncError::PartialBatchFailure` if any operation failed; the drafts
    ///   are rebased on what the server accepted
    /// - `SyncError::Refetch` if the closing fetch failed; the drafts are left
    ///   untouched
    pub async fn save(
        &self,
        parents: &mut Draft<P>,
        children: &mut Draft<C>,
    ) -> Result<BatchReport, SyncError> {
        let parent_changes = parents.changes();
        let child_changes = children.changes();
        tracing::info!(
            parents = parent_changes.len(),
            children = child_changes.len(),
            "saving {}s and {}s",
            P::KIND,
            C::KIND
        );

        let mut report = BatchReport::default();

        // Children of a deleted parent are gone with it; their own delete
        // failures do not count.
        let doomed: HashSet<&ResourceId> = parent_changes.deletes.iter().collect();
        let orphaned: HashSet<ResourceId> = children
            .baseline()
            .iter()
            .filter(|c| c.parent_id().is_some_and(|p| doomed.contains(p)))
            .map(|c| c.id().clone())
            .collect();

        tracing::debug!(count = child_changes.deletes.len(), "phase 1: delete children");
        delete_all(&*self.children, &child_changes.deletes, &orphaned, &mut report).await;

        tracing::debug!(count = parent_changes.deletes.len(), "phase 2: delete parents");
        delete_all(&*self.parents, &parent_changes.deletes, &HashSet::new(), &mut report).await;

        tracing::debug!(count = parent_changes.creates.len(), "phase 3: create parents");
        create_all(&*self.parents, &parent_changes.creates, &mut report).await;

        tracing::debug!(count = child_changes.creates.len(), "phase 4: create children");
        let mut ready = Vec::with_capacity(child_changes.creates.len());
        for child in &child_changes.creates {
            match child.parent_id() {
                Some(parent) if parent.is_local() => match report.id_map.get(parent) {
                    Some(server_id) => {
                        let mut child = child.clone();
                        child.set_parent_id(server_id.clone());
                        ready.push(child);
                    }
                    None => {
                        let parent = parent.clone();
                        report.record_err(
                            Operation::Create,
                            C::KIND,
                            Some(child.id().clone()),
                            StoreError::NotFound(parent),
                        );
                    }
                },
                _ => ready.push(child.clone()),
            }
        }
        create_all(&*self.children, &ready, &mut report).await;

        tracing::debug!(count = parent_changes.updates.len(), "phase 5: update parents");
        update_all(&*self.parents, &parent_changes.updates, &mut report).await;

        tracing::debug!(count = child_changes.updates.len(), "phase 6: update children");
        update_all(&*self.children, &child_changes.updates, &mut report).await;

        tracing::debug!(
            parents = parent_changes.reorders.len(),
            children = child_changes.reorders.len(),
            "phase 7: reorder"
        );
        let parent_reorders = placements(parents.draft(), &parent_changes.reorders, &report.id_map);
        reorder_all(&*self.parents, &parent_reorders, &mut report).await;
        let child_reorders = placements(children.draft(), &child_changes.reorders, &report.id_map);
        reorder_all(&*self.children, &child_reorders, &mut report).await;

        match self.fetch().await {
            Ok((fresh_parents, fresh_children)) => {
                parents.rebase(fresh_parents);
                children.rebase(fresh_children);
            }
            Err(source) => {
                tracing::warn!(error = %source, "re-fetch after save failed; keeping draft");
                return Err(SyncError::Refetch { source, report });
            }
        }

        finish(report)
    }
}

/// Persist a flat (single-level) draft and rebase it on a fresh fetch
///
/// Phases: delete, create, update, reorder.
///
/// # Errors
/// As [`BatchOrchestrator::save`]
pub async fn save_flat<R: Resource>(
    store: &dyn ResourceStore<R>,
    draft: &mut Draft<R>,
) -> Result<BatchReport, SyncError> {
    let changes = draft.changes();
    tracing::info!(operations = changes.len(), "saving {}s", R::KIND);

    let mut report = BatchReport::default();
    delete_all(store, &changes.deletes, &HashSet::new(), &mut report).await;
    create_all(store, &changes.creates, &mut report).await;
    update_all(store, &changes.updates, &mut report).await;
    let reorders = placements(draft.draft(), &changes.reorders, &report.id_map);
    reorder_all(store, &reorders, &mut report).await;

    match store.list().await {
        Ok(fresh) => draft.rebase(fresh),
        Err(source) => {
            tracing::warn!(error = %source, "re-fetch after save failed; keeping draft");
            return Err(SyncError::Refetch { source, report });
        }
    }

    finish(report)
}

/// Reorders to send once creates have server ids
///
/// Every group in `reorders` is rebuilt from the draft with created entries
/// mapped to their server ids. A group is also sent when a created entry
/// sits before a persisted sibling, since a create alone only appends.
/// Entries whose create failed are left out, as are groups under a parent
/// that was never created.
fn placements<R: Resource>(
    draft: &[R],
    reorders: &[Reorder],
    id_map: &BTreeMap<ResourceId, ResourceId>,
) -> Vec<Reorder> {
    let moved: HashSet<Option<&ResourceId>> = reorders.iter().map(|r| r.parent.as_ref()).collect();
    let mut groups: BTreeMap<Option<&ResourceId>, Vec<(u32, usize, &ResourceId)>> = BTreeMap::new();
    for (idx, entry) in draft.iter().enumerate() {
        groups
            .entry(entry.parent_id())
            .or_default()
            .push((entry.order(), idx, entry.id()));
    }

    let mut placed = Vec::new();
    for (parent, mut siblings) in groups {
        siblings.sort_by_key(|&(order, idx, _)| (order, idx));
        let inserted = siblings
            .iter()
            .skip_while(|(_, _, id)| !id.is_local())
            .any(|(_, _, id)| !id.is_local());
        if !moved.contains(&parent) && !inserted {
            continue;
        }

        let parent = match parent {
            Some(p) if p.is_local() => match id_map.get(p) {
                Some(server_id) => Some(server_id.clone()),
                None => continue,
            },
            other => other.cloned(),
        };
        let ids = siblings
            .iter()
            .filter_map(|(_, _, id)| {
                if id.is_local() {
                    id_map.get(*id).cloned()
                } else {
                    Some((*id).clone())
                }
            })
            .collect();
        placed.push(Reorder { parent, ids });
    }
    placed
}

fn finish(report: BatchReport) -> Result<BatchReport, SyncError> {
    if report.is_success() {
        tracing::info!(succeeded = report.succeeded(), "save complete");
        Ok(report)
    } else {
        tracing::warn!(
            failed = report.failed(),
            succeeded = report.succeeded(),
            "save partially failed"
        );
        Err(SyncError::PartialBatchFailure(report))
    }
}

async fn delete_all<R: Resource>(
    store: &dyn ResourceStore<R>,
    ids: &[ResourceId],
    swallow: &HashSet<ResourceId>,
    report: &mut BatchReport,
) {
    let results = join_all(ids.iter().map(|id| async move { (id, store.delete(id).await) })).await;
    for (id, result) in results {
        match result {
            Ok(()) => report.record_ok(Operation::Delete),
            Err(err) if swallow.contains(id) => {
                tracing::debug!(%id, error = %err, "ignoring delete failure under deleted parent");
                report.record_ok(Operation::Delete);
            }
            Err(err) => report.record_err(Operation::Delete, R::KIND, Some(id.clone()), err),
        }
    }
}

async fn create_all<R: Resource>(store: &dyn ResourceStore<R>, payloads: &[R], report: &mut BatchReport) {
    let results = join_all(
        payloads
            .iter()
            .map(|payload| async move { (payload.id(), store.create(payload).await) }),
    )
    .await;
    for (local_id, result) in results {
        match result {
            Ok(created) => {
                report.id_map.insert(local_id.clone(), created.id().clone());
                report.record_ok(Operation::Create);
            }
            Err(err) => report.record_err(Operation::Create, R::KIND, Some(local_id.clone()), err),
        }
    }
}

async fn update_all<R: Resource>(
    store: &dyn ResourceStore<R>,
    updates: &[Update<R>],
    report: &mut BatchReport,
) {
    let results = join_all(
        updates
            .iter()
            .map(|u| async move { (&u.id, store.update(&u.id, &u.patch).await) }),
    )
    .await;
    for (id, result) in results {
        match result {
            Ok(_) => report.record_ok(Operation::Update),
            Err(err) => report.record_err(Operation::Update, R::KIND, Some(id.clone()), err),
        }
    }
}

async fn reorder_all<R: Resource>(
    store: &dyn ResourceStore<R>,
    reorders: &[Reorder],
    report: &mut BatchReport,
) {
    let results = join_all(
        reorders
            .iter()
            .map(|r| async move { (&r.parent, store.reorder(r.parent.as_ref(), &r.ids).await) }),
    )
    .await;
    for (parent, result) in results {
        match result {
            Ok(()) => report.record_ok(Operation::Reorder),
            Err(err) => report.record_err(Operation::Reorder, R::KIND, parent.clone(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(op: Operation) -> BatchFailure {
        BatchFailure {
            operation: op,
            kind: ResourceKind::Module,
            resource_id: Some(ResourceId::new("srv-1")),
            error: StoreError::Network("reset".into()),
        }
    }

    #[test]
    fn placements_map_created_ids_and_skip_failed_creates() {
        use tally_model::Module;

        let new = ResourceId::local();
        let lost = ResourceId::local();
        let draft = vec![
            Module::new("New").with_id(new.clone()).with_order(0),
            Module::new("A").with_id("srv-1").with_order(1),
            Module::new("Lost").with_id(lost).with_order(2),
            Module::new("B").with_id("srv-2").with_order(3),
        ];
        let id_map = BTreeMap::from([(new, ResourceId::new("srv-3"))]);

        let placed = placements(&draft, &[], &id_map);
        assert_eq!(
            placed,
            vec![Reorder {
                parent: None,
                ids: vec![
                    ResourceId::new("srv-3"),
                    ResourceId::new("srv-1"),
                    ResourceId::new("srv-2"),
                ],
            }]
        );
    }

    #[test]
    fn placements_ignore_untouched_groups() {
        use tally_model::Module;

        let draft = vec![
            Module::new("A").with_id("srv-1").with_order(0),
            Module::new("New").with_id(ResourceId::local()).with_order(1),
        ];
        assert!(placements(&draft, &[], &BTreeMap::new()).is_empty());
    }

    #[test]
    fn report_counts_by_category() {
        let mut report = BatchReport::default();
        report.record_ok(Operation::Create);
        report.record_ok(Operation::Create);
        let f = failure(Operation::Delete);
        report.record_err(f.operation, f.kind, f.resource_id, f.error);

        assert_eq!(report.counts(Operation::Create).succeeded, 2);
        assert_eq!(report.counts(Operation::Delete).failed, 1);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn report_display_lists_failures() {
        let mut report = BatchReport::default();
        report.record_ok(Operation::Update);
        let f = failure(Operation::Update);
        report.record_err(f.operation, f.kind, f.resource_id, f.error);

        let text = report.to_string();
        assert!(text.starts_with("1 of 2 operations failed"));
        assert!(text.contains("update module srv-1"));
    }

    #[test]
    fn finish_maps_failures_to_partial_batch_failure() {
        assert!(finish(BatchReport::default()).is_ok());

        let mut report = BatchReport::default();
        let f = failure(Operation::Reorder);
        report.record_err(f.operation, f.kind, None, f.error);
        assert!(matches!(finish(report), Err(SyncError::PartialBatchFailure(_))));
    }
}
