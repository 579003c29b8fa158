//! Live poll merger
//!
//! Pure, clock-explicit state of one tester's checklist execution screen:
//! the last polled server snapshot, the pending-edit overlay, the debounce
//! timers and the rendered [`ChecklistView`]. Every operation takes `now`
//! instead of reading a clock, so the whole edit lifecycle can be driven
//! step by step. [`LiveSession`](crate::LiveSession) wires it to a store and
//! a real timer.
//!
//! # Invariants
//! - only results owned by the local tester ever enter the overlay
//! - an overlay entry outlives its save by at least the clear debounce and
//!   is never evicted while focused
//! - a failed save keeps its entry until the tester retries or edits again
//! - at most one save per result is in flight; the server sees a result's
//!   saves in edit order

use crate::config::SyncConfig;
use crate::error::LiveError;
use crate::overlay::{EditPhase, PendingEdit, PendingEditOverlay};
use crate::timers::{TimerKind, TimerTable};
use serde::Serialize;
use std::collections::BTreeSet;
use tally_model::{
    views_equal, ChecklistView, ResourceId, ResultPatch, StoreError, TestCase, TestResult,
    TesterId,
};
use tokio::time::Instant;

/// Field of a result that can hold input focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultField {
    /// Status selector
    Status,
    /// Notes editor
    Notes,
    /// Attachment list
    Attachments,
}

/// Input focus on one field of one result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FocusTarget {
    /// Focused result
    pub result_id: ResourceId,
    /// Focused field
    pub field: ResultField,
}

impl FocusTarget {
    /// Create focus target
    #[inline]
    #[must_use]
    pub fn new(result_id: ResourceId, field: ResultField) -> Self {
        Self { result_id, field }
    }
}

/// Update the driver must send to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    /// Result to update
    pub result_id: ResourceId,
    /// Fields to send
    pub patch: ResultPatch,
    /// Overlay generation this request carries
    pub generation: u64,
}

/// Timer work done by [`LivePollMerger::tick`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Saves now in flight
    pub saves: Vec<SaveRequest>,
    /// Overlay entries dropped
    pub evicted: Vec<ResourceId>,
}

/// Result of re-rendering the view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Whether the view differs from the previous one
    pub changed: bool,
    /// Test cases collapsed because a result entered a collapse status
    pub collapsed: Vec<ResourceId>,
}

/// Edit whose save failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEdit {
    /// Result
    pub result_id: ResourceId,
    /// Unsaved fields
    pub fields: ResultPatch,
    /// Last save error
    pub error: String,
}

/// Merge state of one checklist session
#[derive(Debug)]
pub struct LivePollMerger {
    tester: TesterId,
    config: SyncConfig,
    overlay: PendingEditOverlay,
    timers: TimerTable,
    focus: Option<FocusTarget>,
    test_cases: Vec<TestCase>,
    server: Vec<TestResult>,
    view: ChecklistView,
    expanded: BTreeSet<ResourceId>,
}

impl LivePollMerger {
    /// Create merger for `tester`
    #[must_use]
    pub fn new(tester: TesterId, config: SyncConfig) -> Self {
        Self {
            tester,
            config,
            overlay: PendingEditOverlay::new(),
            timers: TimerTable::new(),
            focus: None,
            test_cases: Vec::new(),
            server: Vec::new(),
            view: ChecklistView::default(),
            expanded: BTreeSet::new(),
        }
    }

    /// Local tester
    #[inline]
    #[must_use]
    pub fn tester(&self) -> &TesterId {
        &self.tester
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Rendered view
    #[inline]
    #[must_use]
    pub fn view(&self) -> &ChecklistView {
        &self.view
    }

    /// Pending edits
    #[inline]
    #[must_use]
    pub fn overlay(&self) -> &PendingEditOverlay {
        &self.overlay
    }

    /// Phase of a result's pending edit; `None` when clean
    #[must_use]
    pub fn phase(&self, id: &ResourceId) -> Option<EditPhase> {
        self.overlay.phase(id)
    }

    /// Current focus
    #[inline]
    #[must_use]
    pub fn focus(&self) -> Option<&FocusTarget> {
        self.focus.as_ref()
    }

    /// Earliest pending timer
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Expanded test cases
    #[inline]
    #[must_use]
    pub fn expanded(&self) -> &BTreeSet<ResourceId> {
        &self.expanded
    }

    /// Expand a test case
    pub fn expand(&mut self, test_case_id: ResourceId) {
        self.expanded.insert(test_case_id);
    }

    /// Collapse a test case
    pub fn collapse(&mut self, test_case_id: &ResourceId) {
        self.expanded.remove(test_case_id);
    }

    /// Record a local edit of one of the tester's own results
    ///
    /// The overlay is written before anything is sent, so a poll landing
    /// mid-edit renders the local value. The save timer is (re)armed at
    /// `now + save_debounce`. Setting a status stamps `tested_at` unless the
    /// patch carries one: now for a tested status, cleared for pending.
    ///
    /// # Errors
    /// - `LiveError::UnknownResult` if the id is not in the last snapshot
    /// - `LiveError::NotOwner` if another tester owns the result
    pub fn apply_local_edit(
        &mut self,
        id: &ResourceId,
        edit: ResultPatch,
        now: Instant,
    ) -> Result<PollOutcome, LiveError> {
        let owner = self
            .server
            .iter()
            .find(|r| &r.id == id)
            .map(|r| &r.tester_id)
            .ok_or_else(|| LiveError::UnknownResult(id.clone()))?;
        if owner != &self.tester {
            return Err(LiveError::NotOwner {
                result: id.clone(),
                owner: owner.clone(),
                tester: self.tester.clone(),
            });
        }

        let mut edit = edit;
        if let (Some(status), None) = (edit.status, edit.tested_at) {
            let stamp = status.is_tested().then(chrono::Utc::now);
            edit = edit.tested_at(stamp);
        }

        let generation = self.overlay.record_edit(id, &edit, now);
        self.timers
            .schedule(id.clone(), TimerKind::Save, now + self.config.save_debounce());
        tracing::trace!(%id, generation, "local edit");

        Ok(self.render())
    }

    /// Move input focus; `None` blurs
    pub fn set_focus(&mut self, focus: Option<FocusTarget>) {
        self.focus = focus;
    }

    /// Fire every timer due at `now`
    ///
    /// Save timers move `Editing` entries to `Saving` and return the request
    /// to send. An entry whose previous request is still unanswered stays
    /// `Editing` until that answer arrives. Clear timers evict `Settling` entries, unless the result is
    /// focused, in which case the clear is pushed back by another debounce.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for (id, kind) in self.timers.due(now) {
            let Some(entry) = self.overlay.get_mut(&id) else {
                continue;
            };
            match (kind, entry.phase) {
                (TimerKind::Save, EditPhase::Editing) if entry.in_flight.is_some() => {
                    // Re-armed once the outstanding request is answered.
                    tracing::trace!(%id, "save deferred behind in-flight request");
                }
                (TimerKind::Save, EditPhase::Editing) => {
                    entry.phase = EditPhase::Saving;
                    entry.in_flight = Some(entry.generation);
                    outcome.saves.push(SaveRequest {
                        result_id: id,
                        patch: entry.fields.clone(),
                        generation: entry.generation,
                    });
                }
                (TimerKind::Clear, EditPhase::Settling) => {
                    let focused = self.focus.as_ref().is_some_and(|f| f.result_id == id);
                    if focused {
                        self.timers
                            .schedule(id, TimerKind::Clear, now + self.config.clear_debounce());
                    } else {
                        self.overlay.remove(&id);
                        outcome.evicted.push(id);
                    }
                }
                _ => {}
            }
        }

        if !outcome.evicted.is_empty() {
            tracing::debug!(evicted = outcome.evicted.len(), "overlay entries cleared");
            self.render();
        }
        outcome
    }

    /// The server accepted a save
    ///
    /// Moves `Saving → Settling` and arms the clear timer. An ack for an
    /// older generation (the result was edited again meanwhile) is not folded
    /// into the snapshot; it only releases the newer edit's save.
    pub fn save_succeeded(&mut self, request: &SaveRequest, saved: Option<TestResult>, now: Instant) {
        let id = &request.result_id;
        let current = self
            .overlay
            .get(id)
            .map_or(true, |entry| entry.generation == request.generation);
        if let Some(saved) = saved.filter(|_| current) {
            if let Some(slot) = self.server.iter_mut().find(|r| r.id == saved.id) {
                *slot = saved;
            }
        }

        if !self.answer(request, now) {
            return;
        }
        if let Some(entry) = self.overlay.get_mut(id) {
            entry.phase = EditPhase::Settling;
            self.timers
                .schedule(id.clone(), TimerKind::Clear, now + self.config.clear_debounce());
        }
    }

    /// The server rejected or never received a save
    ///
    /// The entry turns `Failed` and stays in the overlay until
    /// [`LivePollMerger::retry`] or a new edit. A failure of an older
    /// generation only releases the newer edit's save.
    pub fn save_failed(&mut self, request: &SaveRequest, error: &StoreError, now: Instant) {
        let id = &request.result_id;
        if !self.answer(request, now) {
            return;
        }
        if let Some(entry) = self.overlay.get_mut(id) {
            tracing::warn!(%id, %error, "save failed; keeping local edit");
            entry.phase = EditPhase::Failed;
            entry.error = Some(error.to_string());
            self.timers.cancel(id);
        }
    }

    /// Clear the in-flight marker of an answered request
    ///
    /// # Returns
    /// Whether the request carried the entry's current generation and the
    /// entry is still `Saving`. For a stale answer, a newer edit whose save
    /// timer already fired is sent on the next tick.
    fn answer(&mut self, request: &SaveRequest, now: Instant) -> bool {
        let id = &request.result_id;
        let Some(entry) = self.overlay.get_mut(id) else {
            return false;
        };
        if entry.in_flight == Some(request.generation) {
            entry.in_flight = None;
        }
        if entry.generation == request.generation && entry.phase == EditPhase::Saving {
            return true;
        }

        tracing::trace!(%id, "stale save answer");
        let save_armed = self
            .timers
            .get(id)
            .is_some_and(|timer| timer.kind == TimerKind::Save);
        if entry.phase == EditPhase::Editing && entry.in_flight.is_none() && !save_armed {
            self.timers.schedule(id.clone(), TimerKind::Save, now);
        }
        false
    }

    /// Re-arm the save of a failed edit so it goes out on the next tick
    ///
    /// # Errors
    /// `LiveError::NothingToRetry` if the result has no failed edit
    pub fn retry(&mut self, id: &ResourceId, now: Instant) -> Result<(), LiveError> {
        match self.overlay.get_mut(id) {
            Some(entry) if entry.phase == EditPhase::Failed => {
                entry.phase = EditPhase::Editing;
                entry.last_activity = now;
                self.timers.schedule(id.clone(), TimerKind::Save, now);
                Ok(())
            }
            _ => Err(LiveError::NothingToRetry(id.clone())),
        }
    }

    /// Failed edits, sorted by result id
    #[must_use]
    pub fn failed_edits(&self) -> Vec<FailedEdit> {
        self.overlay
            .in_phase(EditPhase::Failed)
            .into_iter()
            .map(|(id, entry): (&ResourceId, &PendingEdit)| FailedEdit {
                result_id: id.clone(),
                fields: entry.fields.clone(),
                error: entry.error.clone().unwrap_or_default(),
            })
            .collect()
    }

    /// Server results with the overlay applied
    ///
    /// Overlay entries override status, notes, attachments and `tested_at`;
    /// identity and ownership always come from the server.
    #[must_use]
    pub fn merge(&self, server_results: &[TestResult]) -> Vec<TestResult> {
        let mut merged = server_results.to_vec();
        self.overlay.apply(&mut merged);
        merged
    }

    /// Take a fresh poll and re-render
    pub fn apply_poll(&mut self, test_cases: Vec<TestCase>, server_results: Vec<TestResult>) -> PollOutcome {
        self.test_cases = test_cases;
        self.server = server_results;
        let outcome = self.render();
        tracing::debug!(
            results = self.server.len(),
            pending_edits = self.overlay.len(),
            changed = outcome.changed,
            "poll merged"
        );
        outcome
    }

    /// Rebuild the view from the snapshot and overlay
    fn render(&mut self) -> PollOutcome {
        let merged = self.merge(&self.server);
        let next = ChecklistView::build(&self.test_cases, &merged);

        let mut collapsed = Vec::new();
        for result in &merged {
            let Some(previous) = self.view.result(&result.id) else {
                continue;
            };
            let entered = previous.status != result.status
                && self.config.collapse_statuses.contains(&result.status);
            if entered && self.expanded.remove(&result.test_case_id) {
                collapsed.push(result.test_case_id.clone());
            }
        }

        let changed = !views_equal(&self.view, &next);
        if changed {
            self.view = next;
        }
        PollOutcome { changed, collapsed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tally_model::TestStatus::{Fail, Pass, Pending, Skipped};

    const SAVE: Duration = Duration::from_millis(500);
    const CLEAR: Duration = Duration::from_millis(3000);

    fn cases() -> Vec<TestCase> {
        vec![TestCase::new("m1", "Valid password").with_id("t1")]
    }

    fn server(alice: tally_model::TestStatus, bob: tally_model::TestStatus) -> Vec<TestResult> {
        vec![
            TestResult::pending("r-a", "t1", "alice").with_status(alice),
            TestResult::pending("r-b", "t1", "bob").with_status(bob),
        ]
    }

    fn merger() -> LivePollMerger {
        let mut merger = LivePollMerger::new(TesterId::new("alice"), SyncConfig::default());
        merger.apply_poll(cases(), server(Pending, Pending));
        merger
    }

    fn id(s: &str) -> ResourceId {
        ResourceId::new(s)
    }

    fn status_of(merger: &LivePollMerger, result: &str) -> tally_model::TestStatus {
        merger.view().result(&id(result)).unwrap().status
    }

    #[test]
    fn local_edit_renders_immediately() {
        let mut merger = merger();
        let outcome = merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Fail), Instant::now())
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(status_of(&merger, "r-a"), Fail);
        assert_eq!(merger.view().cases[0].overall_status, Fail);
        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Editing));
        assert!(merger.view().result(&id("r-a")).unwrap().tested_at.is_some());
    }

    #[test]
    fn foreign_and_unknown_results_are_rejected() {
        let mut merger = merger();
        let now = Instant::now();
        assert!(matches!(
            merger.apply_local_edit(&id("r-b"), ResultPatch::default().status(Pass), now),
            Err(LiveError::NotOwner { .. })
        ));
        assert_eq!(
            merger.apply_local_edit(&id("r-x"), ResultPatch::default().status(Pass), now),
            Err(LiveError::UnknownResult(id("r-x")))
        );
        assert!(merger.overlay().is_empty());
    }

    #[test]
    fn overlay_protects_in_flight_edit_from_stale_poll() {
        let mut merger = merger();
        let now = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().notes("B"), now)
            .unwrap();

        let mut stale = server(Pending, Pending);
        stale[0].notes = Some("A".into());
        merger.apply_poll(cases(), stale);

        let merged = merger.view().result(&id("r-a")).unwrap();
        assert_eq!(merged.notes.as_deref(), Some("B"));
    }

    #[test]
    fn edits_debounce_into_one_save() {
        let mut merger = merger();
        let start = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Fail), start)
            .unwrap();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().notes("x"), start + SAVE / 2)
            .unwrap();

        assert!(merger.tick(start + SAVE).saves.is_empty());

        let saves = merger.tick(start + SAVE / 2 + SAVE).saves;
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].patch.status, Some(Fail));
        assert_eq!(saves[0].patch.notes, Some(Some("x".into())));
        assert_eq!(saves[0].generation, 2);
        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Saving));
    }

    #[test]
    fn settled_entry_is_evicted_after_clear_debounce() {
        let mut merger = merger();
        let start = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Pass), start)
            .unwrap();
        let request = merger.tick(start + SAVE).saves.remove(0);
        merger.save_succeeded(&request, None, start + SAVE);
        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Settling));

        assert!(merger.tick(start + SAVE + CLEAR / 2).evicted.is_empty());
        let outcome = merger.tick(start + SAVE + CLEAR);
        assert_eq!(outcome.evicted, vec![id("r-a")]);
        assert_eq!(merger.phase(&id("r-a")), None);

        // Trusted verbatim from now on.
        merger.apply_poll(cases(), server(Fail, Pending));
        assert_eq!(status_of(&merger, "r-a"), Fail);
    }

    #[test]
    fn focus_holds_off_eviction() {
        let mut merger = merger();
        let start = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().notes("typing"), start)
            .unwrap();
        merger.set_focus(Some(FocusTarget::new(id("r-a"), ResultField::Notes)));
        let request = merger.tick(start + SAVE).saves.remove(0);
        merger.save_succeeded(&request, None, start + SAVE);

        let first_clear = start + SAVE + CLEAR;
        assert!(merger.tick(first_clear).evicted.is_empty());
        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Settling));

        merger.set_focus(None);
        assert_eq!(merger.tick(first_clear + CLEAR).evicted, vec![id("r-a")]);
    }

    #[test]
    fn edit_while_settling_returns_to_editing() {
        let mut merger = merger();
        let start = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Pass), start)
            .unwrap();
        let request = merger.tick(start + SAVE).saves.remove(0);
        merger.save_succeeded(&request, None, start + SAVE);

        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().notes("again"), start + SAVE * 2)
            .unwrap();
        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Editing));

        // The clear timer was replaced by a new save timer.
        let outcome = merger.tick(start + SAVE * 3);
        assert!(outcome.evicted.is_empty());
        assert_eq!(outcome.saves.len(), 1);
    }

    #[test]
    fn stale_ack_does_not_settle_newer_edit() {
        let mut merger = merger();
        let start = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Pass), start)
            .unwrap();
        let request = merger.tick(start + SAVE).saves.remove(0);
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Fail), start + SAVE)
            .unwrap();

        merger.save_succeeded(&request, None, start + SAVE * 2);
        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Editing));
        assert_eq!(status_of(&merger, "r-a"), Fail);
    }

    #[test]
    fn second_save_waits_for_the_first_answer() {
        let mut merger = merger();
        let start = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Pass), start)
            .unwrap();
        let first = merger.tick(start + SAVE).saves.remove(0);
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Fail), start + SAVE)
            .unwrap();

        // Debounce elapses while the first request is still out.
        assert!(merger.tick(start + SAVE * 2).saves.is_empty());
        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Editing));

        let slow_ack = start + SAVE * 5;
        let saved = TestResult::pending("r-a", "t1", "alice").with_status(Pass);
        merger.save_succeeded(&first, Some(saved), slow_ack);
        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Editing));
        assert_eq!(status_of(&merger, "r-a"), Fail);

        let second = merger.tick(slow_ack).saves;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].patch.status, Some(Fail));
        assert_eq!(second[0].generation, 2);

        merger.save_succeeded(&second[0], None, slow_ack);
        merger.tick(slow_ack + CLEAR);
        assert_eq!(merger.phase(&id("r-a")), None);
        // The stale Pass record never reached the snapshot.
        assert_eq!(status_of(&merger, "r-a"), Pending);
    }

    #[test]
    fn stale_failure_releases_the_newer_save() {
        let mut merger = merger();
        let start = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Pass), start)
            .unwrap();
        let first = merger.tick(start + SAVE).saves.remove(0);
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Skipped), start + SAVE)
            .unwrap();
        assert!(merger.tick(start + SAVE * 2).saves.is_empty());

        merger.save_failed(&first, &StoreError::Network("offline".into()), start + SAVE * 3);
        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Editing));
        assert!(merger.failed_edits().is_empty());
        assert_eq!(merger.tick(start + SAVE * 3).saves.len(), 1);
    }

    #[test]
    fn failed_save_is_retained_until_retry() {
        let mut merger = merger();
        let start = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Fail), start)
            .unwrap();
        let request = merger.tick(start + SAVE).saves.remove(0);
        merger.save_failed(&request, &StoreError::Network("offline".into()), start + SAVE);

        assert_eq!(merger.phase(&id("r-a")), Some(EditPhase::Failed));
        assert_eq!(merger.next_deadline(), None);
        let far_future = start + CLEAR * 100;
        assert!(merger.tick(far_future).evicted.is_empty());
        assert_eq!(status_of(&merger, "r-a"), Fail);

        let failed = merger.failed_edits();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error.contains("offline"));

        merger.retry(&id("r-a"), far_future).unwrap();
        assert_eq!(merger.tick(far_future).saves.len(), 1);
        assert_eq!(
            merger.retry(&id("r-a"), far_future),
            Err(LiveError::NothingToRetry(id("r-a")))
        );
    }

    #[test]
    fn unchanged_poll_reports_no_change() {
        let mut merger = merger();
        assert!(!merger.apply_poll(cases(), server(Pending, Pending)).changed);
        assert!(merger.apply_poll(cases(), server(Pending, Pass)).changed);
    }

    #[test]
    fn entering_collapse_status_collapses_the_case() {
        let mut merger = merger();
        merger.expand(id("t1"));

        let outcome = merger.apply_poll(cases(), server(Pending, Fail));
        assert!(outcome.collapsed.is_empty());
        assert!(merger.expanded().contains(&id("t1")));

        let outcome = merger.apply_poll(cases(), server(Pending, Pass));
        assert_eq!(outcome.collapsed, vec![id("t1")]);
        assert!(merger.expanded().is_empty());
    }

    #[test]
    fn setting_pending_clears_tested_at() {
        let mut merger = merger();
        let now = Instant::now();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Pass), now)
            .unwrap();
        merger
            .apply_local_edit(&id("r-a"), ResultPatch::default().status(Pending), now)
            .unwrap();
        assert!(merger.view().result(&id("r-a")).unwrap().tested_at.is_none());
    }
}
