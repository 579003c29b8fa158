//! Live session driver
//!
//! Connects a [`LivePollMerger`] to the result and test-case stores and to
//! tokio's clock. The merger sits behind a `parking_lot::Mutex` that is
//! only held for synchronous state changes, never across a store call.
//! Rendered views are published through a `watch` channel, and only when
//! they actually changed.

use crate::config::SyncConfig;
use crate::error::LiveError;
use crate::merger::{FailedEdit, FocusTarget, LivePollMerger, PollOutcome, SaveRequest};
use crate::overlay::EditPhase;
use futures::future::{join_all, try_join};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tally_model::{ChecklistView, ResourceId, ResourceStore, ResultPatch, TestCase, TestResult, TesterId};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

struct Shared {
    merger: Mutex<LivePollMerger>,
    results: Arc<dyn ResourceStore<TestResult>>,
    cases: Arc<dyn ResourceStore<TestCase>>,
    view_tx: watch::Sender<ChecklistView>,
    poll_in_flight: AtomicBool,
    wake: Notify,
}

/// Clears the in-flight flag when the poll ends, however it ends
struct PollGuard<'a>(&'a AtomicBool);

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Shared {
    fn publish(&self, merger: &LivePollMerger, outcome: &PollOutcome) {
        if outcome.changed {
            self.view_tx.send_replace(merger.view().clone());
        }
    }

    async fn poll(&self) -> Result<bool, LiveError> {
        if self
            .poll_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LiveError::PollInFlight);
        }
        let _guard = PollGuard(&self.poll_in_flight);

        let (cases, results) = match try_join(self.cases.list(), self.results.list()).await {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(error = %err, "poll failed; keeping previous view");
                return Err(err.into());
            }
        };

        let mut merger = self.merger.lock();
        let outcome = merger.apply_poll(cases, results);
        self.publish(&merger, &outcome);
        Ok(outcome.changed)
    }

    fn take_due(&self) -> Vec<SaveRequest> {
        let mut merger = self.merger.lock();
        let before = merger.view().clone();
        let tick = merger.tick(Instant::now());
        if !tick.evicted.is_empty() && merger.view() != &before {
            self.view_tx.send_replace(merger.view().clone());
        }
        tick.saves
    }

    async fn execute_saves(&self, requests: Vec<SaveRequest>) {
        if requests.is_empty() {
            return;
        }
        let outcomes = join_all(requests.iter().map(|request| async move {
            (request, self.results.update(&request.result_id, &request.patch).await)
        }))
        .await;

        let mut merger = self.merger.lock();
        for (request, outcome) in outcomes {
            match outcome {
                Ok(saved) => merger.save_succeeded(request, Some(saved), Instant::now()),
                Err(err) => merger.save_failed(request, &err, Instant::now()),
            }
        }
        drop(merger);
        self.wake.notify_one();
    }

    async fn drive(self: Arc<Self>, period: std::time::Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.merger.lock().next_deadline();
            let timer = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = ticker.tick() => {
                    let shared = Arc::clone(&self);
                    tokio::spawn(async move {
                        match shared.poll().await {
                            Err(LiveError::PollInFlight) => tracing::debug!("poll in flight; tick skipped"),
                            Err(_) | Ok(_) => {}
                        }
                    });
                }
                () = timer => {
                    let requests = self.take_due();
                    if !requests.is_empty() {
                        let shared = Arc::clone(&self);
                        tokio::spawn(async move { shared.execute_saves(requests).await });
                    }
                }
                () = self.wake.notified() => {}
            }
        }
    }
}

/// One tester's live view of a checklist
///
/// Dropping the session stops polling. Saves and polls already in flight
/// run to completion.
pub struct LiveSession {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("tester", self.shared.merger.lock().tester())
            .field("polling", &self.is_polling())
            .finish_non_exhaustive()
    }
}

impl LiveSession {
    /// Create session for `tester`; nothing is fetched until the first poll
    #[must_use]
    pub fn new(
        tester: TesterId,
        cases: Arc<dyn ResourceStore<TestCase>>,
        results: Arc<dyn ResourceStore<TestResult>>,
        config: SyncConfig,
    ) -> Self {
        let (view_tx, _) = watch::channel(ChecklistView::default());
        Self {
            shared: Arc::new(Shared {
                merger: Mutex::new(LivePollMerger::new(tester, config)),
                results,
                cases,
                view_tx,
                poll_in_flight: AtomicBool::new(false),
                wake: Notify::new(),
            }),
            driver: Mutex::new(None),
        }
    }

    /// Create session and run the first poll
    ///
    /// # Errors
    /// The store error of the initial fetch
    pub async fn connect(
        tester: TesterId,
        cases: Arc<dyn ResourceStore<TestCase>>,
        results: Arc<dyn ResourceStore<TestResult>>,
        config: SyncConfig,
    ) -> Result<Self, LiveError> {
        config.validate()?;
        let session = Self::new(tester, cases, results, config);
        session.poll_now().await?;
        Ok(session)
    }

    /// Latest rendered view
    #[must_use]
    pub fn view(&self) -> ChecklistView {
        self.shared.view_tx.borrow().clone()
    }

    /// Receiver notified whenever the rendered view changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChecklistView> {
        self.shared.view_tx.subscribe()
    }

    /// Edit one of the tester's own results
    ///
    /// # Errors
    /// See [`LivePollMerger::apply_local_edit`]
    pub fn apply_local_edit(&self, id: &ResourceId, edit: ResultPatch) -> Result<(), LiveError> {
        let mut merger = self.shared.merger.lock();
        let outcome = merger.apply_local_edit(id, edit, Instant::now())?;
        self.shared.publish(&merger, &outcome);
        drop(merger);
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Move input focus; `None` blurs
    pub fn set_focus(&self, focus: Option<FocusTarget>) {
        self.shared.merger.lock().set_focus(focus);
    }

    /// Expand a test case
    pub fn expand(&self, test_case_id: ResourceId) {
        self.shared.merger.lock().expand(test_case_id);
    }

    /// Expanded test cases, sorted
    #[must_use]
    pub fn expanded(&self) -> Vec<ResourceId> {
        self.shared.merger.lock().expanded().iter().cloned().collect()
    }

    /// Phase of a result's pending edit; `None` when clean
    #[must_use]
    pub fn phase(&self, id: &ResourceId) -> Option<EditPhase> {
        self.shared.merger.lock().phase(id)
    }

    /// Number of results with an unconfirmed local edit
    #[must_use]
    pub fn pending_edits(&self) -> usize {
        self.shared.merger.lock().overlay().len()
    }

    /// Edits whose save failed
    #[must_use]
    pub fn failed_edits(&self) -> Vec<FailedEdit> {
        self.shared.merger.lock().failed_edits()
    }

    /// Re-send a failed edit on the next timer run
    ///
    /// # Errors
    /// `LiveError::NothingToRetry` if the result has no failed edit
    pub fn retry(&self, id: &ResourceId) -> Result<(), LiveError> {
        self.shared.merger.lock().retry(id, Instant::now())?;
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Fetch and merge now
    ///
    /// # Returns
    /// Whether the rendered view changed
    ///
    /// # Errors
    /// - `LiveError::PollInFlight` if another poll is running
    /// - `LiveError::Store` if the fetch failed; the previous view is kept
    pub async fn poll_now(&self) -> Result<bool, LiveError> {
        self.shared.poll().await
    }

    /// Fire due timers and send the resulting saves
    ///
    /// # Returns
    /// Number of saves sent
    pub async fn run_due_timers(&self) -> usize {
        let requests = self.shared.take_due();
        let sent = requests.len();
        self.shared.execute_saves(requests).await;
        sent
    }

    /// Start the background driver (polls plus debounce timers)
    ///
    /// Uses the configured poll interval; restarting replaces the driver.
    pub fn start_polling(&self) {
        let period = self.shared.merger.lock().config().poll_interval();
        let task = tokio::spawn(Arc::clone(&self.shared).drive(period));
        if let Some(previous) = self.driver.lock().replace(task) {
            previous.abort();
        }
        tracing::info!(interval_ms = period.as_millis(), "polling started");
    }

    /// Stop the background driver
    pub fn stop_polling(&self) {
        if let Some(task) = self.driver.lock().take() {
            task.abort();
            tracing::info!("polling stopped");
        }
    }

    /// Whether the background driver is running
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.driver.lock().as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(task) = self.driver.get_mut().take() {
            task.abort();
        }
    }
}
