//! Recurring tick timers.
//!
//! The simulator never sleeps or spawns on its own. It asks a
//! [`TickScheduler`] for a repeating timer and keeps the returned
//! [`TickTimer`] as the single handle to that resource; dropping the
//! brew means cancelling the handle.
//!
//! Every firing is tagged with the [`TimerId`] it was scheduled under, so
//! a firing that was already in flight when its timer got cancelled can be
//! recognized and discarded.
//!
//! Two schedulers exist: the Tokio-backed one in [`crate::service`] and
//! [`ManualScheduler`], which fires nothing by itself and lets tests step
//! the simulator deterministically.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Identity of one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

impl TimerId {
    /// The identifier following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Owned handle to an active repeating timer.
pub trait TickTimer: Send {
    /// The identifier firings of this timer carry.
    fn id(&self) -> TimerId;

    /// Stop the timer. No further firings are produced after this returns.
    fn cancel(self: Box<Self>);
}

/// Factory for repeating timers.
pub trait TickScheduler: Send {
    /// Start a timer that fires every `period`, first after one full period.
    fn schedule(&mut self, id: TimerId, period: Duration) -> Box<dyn TickTimer>;
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ManualTimers {
    active: BTreeSet<TimerId>,
    scheduled: u64,
    cancelled: u64,
    last_period: Option<Duration>,
}

/// A scheduler whose timers never fire on their own.
///
/// Clones share the same bookkeeping, so a test can keep one clone to
/// inspect which timers the simulator currently holds.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    timers: Arc<Mutex<ManualTimers>>,
}

impl ManualScheduler {
    /// Create a scheduler with no timers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers of timers that have been scheduled and not cancelled.
    pub fn active(&self) -> Vec<TimerId> {
        self.with(|t| t.active.iter().copied().collect())
    }

    /// Total number of timers ever scheduled.
    pub fn scheduled_count(&self) -> u64 {
        self.with(|t| t.scheduled)
    }

    /// Total number of timers cancelled.
    pub fn cancelled_count(&self) -> u64 {
        self.with(|t| t.cancelled)
    }

    /// Period requested for the most recent timer.
    pub fn last_period(&self) -> Option<Duration> {
        self.with(|t| t.last_period)
    }

    fn with<R>(&self, f: impl FnOnce(&mut ManualTimers) -> R) -> R {
        let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule(&mut self, id: TimerId, period: Duration) -> Box<dyn TickTimer> {
        self.with(|t| {
            t.active.insert(id);
            t.scheduled = t.scheduled.saturating_add(1);
            t.last_period = Some(period);
        });
        Box::new(ManualTimer {
            id,
            scheduler: self.clone(),
        })
    }
}

struct ManualTimer {
    id: TimerId,
    scheduler: ManualScheduler,
}

impl TickTimer for ManualTimer {
    fn id(&self) -> TimerId {
        self.id
    }

    fn cancel(self: Box<Self>) {
        let id = self.id;
        self.scheduler.with(|t| {
            if t.active.remove(&id) {
                t.cancelled = t.cancelled.saturating_add(1);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_scheduler_tracks_active_timers() {
        let mut scheduler = ManualScheduler::new();
        let observer = scheduler.clone();

        let first = scheduler.schedule(TimerId(1), Duration::from_millis(200));
        let second = scheduler.schedule(TimerId(2), Duration::from_millis(200));
        assert_eq!(observer.active(), vec![TimerId(1), TimerId(2)]);
        assert_eq!(observer.scheduled_count(), 2);
        assert_eq!(observer.last_period(), Some(Duration::from_millis(200)));

        first.cancel();
        assert_eq!(observer.active(), vec![TimerId(2)]);
        second.cancel();
        assert!(observer.active().is_empty());
        assert_eq!(observer.cancelled_count(), 2);
    }

    #[test]
    fn timer_ids_advance() {
        assert_eq!(TimerId(7).next(), TimerId(8));
        assert_eq!(TimerId(u64::MAX).next(), TimerId(0));
        assert_eq!(TimerId(3).to_string(), "timer-3");
    }
}
