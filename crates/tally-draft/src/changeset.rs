//! Change-set calculation
//!
//! [`diff`] compares a baseline against a draft (plus the tombstone set) and
//! produces the minimal [`ChangeSet`] of remote operations that brings the
//! server in line with the draft.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tally_model::{Resource, ResourceId};

/// Update of one existing resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = "R::Patch: Serialize"))]
pub struct Update<R: Resource> {
    /// Target id (always a server id)
    pub id: ResourceId,
    /// Changed comparable fields
    pub patch: R::Patch,
}

/// Batched reorder of one sibling group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reorder {
    /// Parent of the sibling group, `None` for top level
    pub parent: Option<ResourceId>,
    /// Every persisted sibling, in draft order
    pub ids: Vec<ResourceId>,
}

/// Remote operations needed to persist a draft
///
/// Derived and ephemeral: recompute it instead of editing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = "R: Serialize, R::Patch: Serialize"))]
pub struct ChangeSet<R: Resource> {
    /// Local-only resources to create, in draft order
    pub creates: Vec<R>,
    /// Persisted resources whose comparable fields changed
    pub updates: Vec<Update<R>>,
    /// Tombstoned ids, sorted
    pub deletes: Vec<ResourceId>,
    /// Sibling groups whose order changed, sorted by parent
    pub reorders: Vec<Reorder>,
}

impl<R: Resource> ChangeSet<R> {
    /// Whether nothing needs to be sent
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
            && self.reorders.is_empty()
    }

    /// Number of remote calls this change set needs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len() + self.reorders.len()
    }
}

impl<R: Resource> Default for ChangeSet<R> {
    fn default() -> Self {
        Self {
            creates: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
            reorders: Vec::new(),
        }
    }
}

/// Diff `draft` against `baseline`
///
/// # Rules
/// - creates: draft entries with a local-only id
/// - deletes: every tombstone
/// - updates: persisted draft entries present in the baseline whose
///   comparable fields differ (order excluded)
/// - reorders: one per sibling group in which any persisted, non-tombstoned
///   entry changed order; lists all persisted siblings in draft order
///
/// Deterministic: equal inputs give equal change sets.
#[must_use]
pub fn diff<R: Resource>(
    baseline: &[R],
    draft: &[R],
    tombstones: &BTreeSet<ResourceId>,
) -> ChangeSet<R> {
    let base_by_id: HashMap<&ResourceId, &R> = baseline.iter().map(|r| (r.id(), r)).collect();

    let creates = draft.iter().filter(|r| r.id().is_local()).cloned().collect();

    let deletes = tombstones.iter().cloned().collect();

    let mut updates = Vec::new();
    // Sibling groups of persisted entries: parent -> [(order, draft index, entry)]
    let mut groups: BTreeMap<Option<&ResourceId>, Vec<(u32, usize, &R)>> = BTreeMap::new();
    let mut moved: BTreeSet<Option<&ResourceId>> = BTreeSet::new();

    for (idx, entry) in draft.iter().enumerate() {
        if entry.id().is_local() || tombstones.contains(entry.id()) {
            continue;
        }
        let Some(base) = base_by_id.get(entry.id()) else {
            continue;
        };
        if let Some(patch) = entry.patch_from(base) {
            updates.push(Update {
                id: entry.id().clone(),
                patch,
            });
        }
        if entry.order() != base.order() {
            moved.insert(entry.parent_id());
        }
        groups
            .entry(entry.parent_id())
            .or_default()
            .push((entry.order(), idx, entry));
    }

    let reorders = groups
        .into_iter()
        .filter(|(parent, _)| moved.contains(parent))
        .map(|(parent, mut siblings)| {
            siblings.sort_by_key(|&(order, idx, _)| (order, idx));
            Reorder {
                parent: parent.cloned(),
                ids: siblings.iter().map(|(_, _, r)| r.id().clone()).collect(),
            }
        })
        .collect();

    ChangeSet {
        creates,
        updates,
        deletes,
        reorders,
    }
}
