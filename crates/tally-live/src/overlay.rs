//! Pending-edit overlay
//!
//! Local edits of the tester's own results that the server has not
//! confirmed yet. While an entry exists its fields win over whatever a poll
//! returns; a result without an entry is *clean* and rendered verbatim.

use serde::Serialize;
use std::collections::HashMap;
use tally_model::{ResourceId, ResultPatch, TestResult};
use tokio::time::Instant;

/// Lifecycle phase of a pending edit
///
/// ```text
/// (clean) --edit--> Editing --save timer--> Saving --ack--> Settling --clear timer--> (clean)
///                      ^                       |               |
///                      |                       +--error--> Failed
///                      +------------- edit ----+---------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditPhase {
    /// Changed locally, save debounce running
    Editing,
    /// Update request in flight
    Saving,
    /// Saved; waiting out stale polls before trusting the server again
    Settling,
    /// Save failed; kept until the tester retries or edits again
    Failed,
}

/// One result's unconfirmed local edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// Overridden fields, accumulated over consecutive edits
    pub fields: ResultPatch,
    /// Phase
    pub phase: EditPhase,
    /// Last local edit
    pub last_activity: Instant,
    /// Bumped on every local edit; save acks for older generations are stale
    pub generation: u64,
    /// Message of the last failed save
    pub error: Option<String>,
    /// Generation of the save request awaiting an answer, if any
    pub in_flight: Option<u64>,
}

impl PendingEdit {
    /// Write the overridden fields onto a server result
    pub fn overlay(&self, result: &mut TestResult) {
        if let Some(status) = self.fields.status {
            result.status = status;
        }
        if let Some(notes) = &self.fields.notes {
            result.notes.clone_from(notes);
        }
        if let Some(attachments) = &self.fields.attachments {
            result.attachments.clone_from(attachments);
        }
        if let Some(tested_at) = self.fields.tested_at {
            result.tested_at = tested_at;
        }
    }
}

/// Pending edits by result id
#[derive(Debug, Default)]
pub struct PendingEditOverlay {
    entries: HashMap<ResourceId, PendingEdit>,
}

impl PendingEditOverlay {
    /// Create empty overlay
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `patch` into the entry of `id` and mark it `Editing`
    ///
    /// # Returns
    /// The entry's new generation
    pub fn record_edit(&mut self, id: &ResourceId, patch: &ResultPatch, now: Instant) -> u64 {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.fields.merge(patch);
                entry.phase = EditPhase::Editing;
                entry.last_activity = now;
                entry.generation += 1;
                entry.error = None;
                entry.generation
            }
            None => {
                self.entries.insert(
                    id.clone(),
                    PendingEdit {
                        fields: patch.clone(),
                        phase: EditPhase::Editing,
                        last_activity: now,
                        generation: 1,
                        error: None,
                        in_flight: None,
                    },
                );
                1
            }
        }
    }

    /// Entry of `id`
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&PendingEdit> {
        self.entries.get(id)
    }

    /// Mutable entry of `id`
    pub fn get_mut(&mut self, id: &ResourceId) -> Option<&mut PendingEdit> {
        self.entries.get_mut(id)
    }

    /// Phase of `id`; `None` means clean
    #[must_use]
    pub fn phase(&self, id: &ResourceId) -> Option<EditPhase> {
        self.entries.get(id).map(|e| e.phase)
    }

    /// Evict `id`
    pub fn remove(&mut self, id: &ResourceId) -> Option<PendingEdit> {
        self.entries.remove(id)
    }

    /// Apply every matching entry to `results`
    pub fn apply(&self, results: &mut [TestResult]) {
        if self.entries.is_empty() {
            return;
        }
        for result in results {
            if let Some(entry) = self.entries.get(&result.id) {
                entry.overlay(result);
            }
        }
    }

    /// Entries in a given phase, sorted by id
    #[must_use]
    pub fn in_phase(&self, phase: EditPhase) -> Vec<(&ResourceId, &PendingEdit)> {
        let mut found: Vec<_> = self.entries.iter().filter(|(_, e)| e.phase == phase).collect();
        found.sort_by(|a, b| a.0.cmp(b.0));
        found
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether every result is clean
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
