//! Per-result debounce timers
//!
//! One pending timer per result id. Scheduling a timer for an id replaces
//! whatever was scheduled before, which is how a new keystroke pushes the
//! save back and how an edit during settling cancels the clear.

use std::collections::HashMap;
use tally_model::ResourceId;
use tokio::time::Instant;

/// What happens when a timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Send the pending edit to the server
    Save,
    /// Drop the settled overlay entry
    Clear,
}

/// Scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    /// Kind
    pub kind: TimerKind,
    /// When it fires
    pub deadline: Instant,
}

/// Timer per result id
#[derive(Debug, Default)]
pub struct TimerTable {
    timers: HashMap<ResourceId, Timer>,
}

impl TimerTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` for `id`, replacing any timer already set
    pub fn schedule(&mut self, id: ResourceId, kind: TimerKind, deadline: Instant) {
        self.timers.insert(id, Timer { kind, deadline });
    }

    /// Cancel the timer of `id`
    pub fn cancel(&mut self, id: &ResourceId) -> Option<Timer> {
        self.timers.remove(id)
    }

    /// Timer scheduled for `id`
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&Timer> {
        self.timers.get(id)
    }

    /// Earliest deadline
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn due(&mut self, now: Instant) -> Vec<(ResourceId, TimerKind)> {
        let mut due: Vec<(ResourceId, Timer)> = Vec::new();
        self.timers.retain(|id, timer| {
            if timer.deadline <= now {
                due.push((id.clone(), *timer));
                false
            } else {
                true
            }
        });
        due.sort_by(|(a_id, a), (b_id, b)| a.deadline.cmp(&b.deadline).then_with(|| a_id.cmp(b_id)));
        due.into_iter().map(|(id, timer)| (id, timer.kind)).collect()
    }

    /// Number of scheduled timers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether nothing is scheduled
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(s: &str) -> ResourceId {
        ResourceId::new(s)
    }

    #[test]
    fn scheduling_replaces() {
        let now = Instant::now();
        let mut table = TimerTable::new();
        table.schedule(id("r1"), TimerKind::Save, now + Duration::from_millis(500));
        table.schedule(id("r1"), TimerKind::Clear, now + Duration::from_millis(3000));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&id("r1")).unwrap().kind, TimerKind::Clear);
    }

    #[test]
    fn due_pops_expired_in_deadline_order() {
        let now = Instant::now();
        let mut table = TimerTable::new();
        table.schedule(id("late"), TimerKind::Clear, now + Duration::from_millis(30));
        table.schedule(id("early"), TimerKind::Save, now + Duration::from_millis(10));
        table.schedule(id("future"), TimerKind::Save, now + Duration::from_secs(10));

        let due = table.due(now + Duration::from_millis(50));
        assert_eq!(
            due,
            vec![(id("early"), TimerKind::Save), (id("late"), TimerKind::Clear)]
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.next_deadline(), Some(now + Duration::from_secs(10)));
    }

    #[test]
    fn cancel_removes() {
        let mut table = TimerTable::new();
        table.schedule(id("r1"), TimerKind::Save, Instant::now());
        assert!(table.cancel(&id("r1")).is_some());
        assert!(table.is_empty());
        assert_eq!(table.next_deadline(), None);
    }
}
