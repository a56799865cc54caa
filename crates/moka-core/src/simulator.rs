//! The brew simulator state machine.
//!
//! [`BrewSimulator`] owns the live brew state and the single tick timer
//! that drives it. It is the only thing in the process that mutates
//! either; everything else sees published [`Snapshot`]s.
//!
//! # State machine
//!
//! ```text
//! Idle --start--> Heating --(pressure >= brew)--> Brewing --(full)--> Finished
//!   ^                |                               |                   |
//!   +---stop/reset---+-------------------------------+-------------------+
//! ```
//!
//! `start` is effective from `Idle` and `Finished` (or whenever no timer
//! is held). From `Heating` or `Brewing` with a live timer it only
//! re-publishes the current snapshot, so at most one timer ever exists.

use std::sync::Arc;

use moka_types::{ControlCommand, Phase, Snapshot};
use tracing::{debug, info};

use crate::model::{BrewModel, BrewState};
use crate::publish::StatePublisher;
use crate::timer::{TickScheduler, TickTimer, TimerId};

/// Why the timer is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An operator asked to stop. The pot is hard reset to idle.
    Operator,
    /// The brew completed. Terminal values are kept.
    Finished,
}

/// Result of delivering one timer firing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The brew advanced and the new snapshot was published.
    Advanced(Snapshot),
    /// The brew reached [`Phase::Finished`]; the timer has been stopped.
    Finished(Snapshot),
    /// The firing came from a timer that is no longer active and was
    /// discarded.
    Stale,
}

/// Deterministic tick-driven moka pot.
pub struct BrewSimulator {
    model: BrewModel,
    state: BrewState,
    timer: Option<Box<dyn TickTimer>>,
    scheduler: Box<dyn TickScheduler>,
    publisher: Arc<dyn StatePublisher>,
    last_timer_id: TimerId,
    ticks: u64,
}

impl BrewSimulator {
    /// Create an idle simulator. Nothing is published until
    /// [`initialize`](Self::initialize) or a control operation.
    pub fn new(
        model: BrewModel,
        scheduler: Box<dyn TickScheduler>,
        publisher: Arc<dyn StatePublisher>,
    ) -> Self {
        let state = model.cold(Phase::Idle);
        Self {
            model,
            state,
            timer: None,
            scheduler,
            publisher,
            last_timer_id: TimerId(0),
            ticks: 0,
        }
    }

    /// Publish the initial idle snapshot so retained channels are seeded
    /// before any client connects.
    pub fn initialize(&mut self) -> Snapshot {
        info!(
            tick_interval_ms = self.model.tick_interval.as_millis(),
            temperature_delta = self.model.temperature_delta,
            coffee_delta = self.model.coffee_delta,
            "Brew simulator initialized"
        );
        self.publish()
    }

    /// Cancel any active timer. The brew state is left as it is.
    pub fn shutdown(&mut self) {
        let had_timer = self.cancel_timer();
        info!(phase = %self.state.phase, had_timer, "Brew simulator shut down");
    }

    // -----------------------------------------------------------------------
    // Control operations
    // -----------------------------------------------------------------------

    /// Start a brew from cold.
    ///
    /// While a brew is running this is a no-op that re-publishes the
    /// current snapshot. Otherwise the pot is reset to ambient in
    /// [`Phase::Heating`], the snapshot is published, and a new tick timer
    /// is armed.
    pub fn start(&mut self) -> Snapshot {
        if self.is_ticking() && self.state.phase.is_running() {
            info!(
                phase = %self.state.phase,
                tick = self.ticks,
                "Start ignored, brew already running"
            );
            return self.publish();
        }

        self.cancel_timer();

        self.state = self.model.cold(Phase::Heating);
        self.ticks = 0;
        let snapshot = self.publish();

        self.last_timer_id = self.last_timer_id.next();
        let timer = self
            .scheduler
            .schedule(self.last_timer_id, self.model.tick_interval);
        info!(timer = %timer.id(), "Brew started");
        self.timer = Some(timer);

        snapshot
    }

    /// Operator stop: cancel the timer and hard reset to idle.
    pub fn stop(&mut self) -> Snapshot {
        self.stop_with(StopReason::Operator)
    }

    /// Cancel the timer and publish.
    ///
    /// [`StopReason::Finished`] keeps the terminal values;
    /// [`StopReason::Operator`] hard resets to ambient in [`Phase::Idle`].
    pub fn stop_with(&mut self, reason: StopReason) -> Snapshot {
        self.cancel_timer();
        match reason {
            StopReason::Finished => {
                info!(
                    tick = self.ticks,
                    coffee_volume = self.state.coffee_volume,
                    "Brew finished, holding final state"
                );
            }
            StopReason::Operator => {
                info!(phase = %self.state.phase, tick = self.ticks, "Brew stopped");
                self.state = self.model.cold(Phase::Idle);
            }
        }
        self.publish()
    }

    /// Hard reset to idle from any phase.
    pub fn reset(&mut self) -> Snapshot {
        self.cancel_timer();
        info!(phase = %self.state.phase, tick = self.ticks, "Brew reset");
        self.state = self.model.cold(Phase::Idle);
        self.publish()
    }

    /// Dispatch a [`ControlCommand`].
    pub fn apply(&mut self, command: ControlCommand) -> Snapshot {
        match command {
            ControlCommand::Start => self.start(),
            ControlCommand::Stop => self.stop(),
            ControlCommand::Reset => self.reset(),
        }
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Deliver one firing of timer `id`.
    ///
    /// Firings from any timer other than the active one are discarded.
    pub fn tick(&mut self, id: TimerId) -> TickOutcome {
        let active = self.timer.as_ref().map(|t| t.id());
        if active != Some(id) {
            debug!(timer = %id, ?active, "Discarding stale tick");
            return TickOutcome::Stale;
        }

        self.state = self.model.step(&self.state);
        self.ticks = self.ticks.saturating_add(1);

        if self.state.phase == Phase::Finished {
            return TickOutcome::Finished(self.stop_with(StopReason::Finished));
        }

        debug!(
            tick = self.ticks,
            temperature = self.state.temperature,
            pressure = self.state.pressure,
            coffee_volume = self.state.coffee_volume,
            phase = %self.state.phase,
            "Brew tick"
        );
        TickOutcome::Advanced(self.publish())
    }

    /// Fire the active timer once, if there is one.
    ///
    /// Convenience for driving the simulator without a real clock.
    pub fn fire(&mut self) -> Option<TickOutcome> {
        let id = self.timer.as_ref().map(|t| t.id())?;
        Some(self.tick(id))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Copy of the current published fields.
    pub const fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Whether a tick timer is currently held.
    pub const fn is_ticking(&self) -> bool {
        self.timer.is_some()
    }

    /// Identifier of the active timer.
    pub fn active_timer(&self) -> Option<TimerId> {
        self.timer.as_ref().map(|t| t.id())
    }

    /// Ticks applied since the last start.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn cancel_timer(&mut self) -> bool {
        self.timer.take().is_some_and(|timer| {
            debug!(timer = %timer.id(), "Cancelling tick timer");
            timer.cancel();
            true
        })
    }

    fn publish(&self) -> Snapshot {
        let snapshot = self.state.snapshot();
        self.publisher.publish(&snapshot);
        snapshot
    }
}

impl std::fmt::Debug for BrewSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrewSimulator")
            .field("state", &self.state)
            .field("active_timer", &self.active_timer())
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::unwrap_used)]
mod tests {
    use moka_types::Channel;

    use super::*;
    use crate::publish::MemoryPublisher;
    use crate::timer::ManualScheduler;

    struct Rig {
        sim: BrewSimulator,
        scheduler: ManualScheduler,
        published: Arc<MemoryPublisher>,
    }

    fn rig() -> Rig {
        let scheduler = ManualScheduler::new();
        let published = Arc::new(MemoryPublisher::new());
        let sim = BrewSimulator::new(
            BrewModel::default(),
            Box::new(scheduler.clone()),
            Arc::clone(&published) as Arc<dyn StatePublisher>,
        );
        Rig {
            sim,
            scheduler,
            published,
        }
    }

    fn assert_idle(snapshot: &Snapshot) {
        assert_eq!(snapshot.temperature, 20.0);
        assert_eq!(snapshot.pressure, 0.0);
        assert_eq!(snapshot.coffee_volume, 0.0);
        assert_eq!(snapshot.phase, Phase::Idle);
    }

    fn fire_n(sim: &mut BrewSimulator, n: u32) {
        for _ in 0..n {
            let _ = sim.fire();
        }
    }

    #[test]
    fn initialize_publishes_idle() {
        let mut r = rig();
        let snap = r.sim.initialize();
        assert_idle(&snap);
        assert_eq!(r.published.count(), 1);
        assert_eq!(r.published.retained(Channel::Phase).as_deref(), Some("idle"));
        assert!(!r.sim.is_ticking());
    }

    #[test]
    fn start_then_zero_ticks_is_cold_heating() {
        let mut r = rig();
        let snap = r.sim.start();
        assert_eq!(snap.temperature, 20.0);
        assert_eq!(snap.pressure, 0.0);
        assert_eq!(snap.coffee_volume, 0.0);
        assert_eq!(snap.phase, Phase::Heating);

        assert_eq!(r.published.count(), 1);
        assert_eq!(r.scheduler.active().len(), 1);
        assert_eq!(
            r.scheduler.last_period(),
            Some(std::time::Duration::from_millis(200))
        );
    }

    #[test]
    fn start_while_running_does_not_add_a_timer() {
        let mut r = rig();
        r.sim.start();
        fire_n(&mut r.sim, 10);

        let before = r.sim.snapshot();
        let again = r.sim.start();

        assert_eq!(again, before);
        assert_eq!(r.scheduler.scheduled_count(), 1);
        assert_eq!(r.scheduler.active().len(), 1);
        // start + 10 ticks + re-publish
        assert_eq!(r.published.count(), 12);
    }

    #[test]
    fn uninterrupted_brew_finishes_and_stops_timer() {
        let mut r = rig();
        r.sim.start();

        let mut outcome = None;
        let mut fired = 0_u32;
        while let Some(o) = r.sim.fire() {
            fired = fired.saturating_add(1);
            outcome = Some(o);
        }

        assert_eq!(fired, 259);
        let finished = outcome.and_then(|o| match o {
            TickOutcome::Finished(s) => Some(s),
            _ => None,
        });
        assert!(finished.is_some(), "expected finished outcome, got {outcome:?}");
        let finished = finished.unwrap();
        assert_eq!(finished.coffee_volume, 100.0);
        assert_eq!(finished.phase, Phase::Finished);
        assert_eq!(r.sim.ticks(), 259);
        assert!(!r.sim.is_ticking());
        assert!(r.scheduler.active().is_empty());

        // start + 258 advancing ticks + one final publish
        assert_eq!(r.published.count(), 260);
        assert_eq!(r.published.retained(Channel::CoffeeVolume).as_deref(), Some("100.0"));
        assert_eq!(r.published.retained(Channel::Phase).as_deref(), Some("finished"));
    }

    #[test]
    fn brewing_is_always_entered_before_finished() {
        let mut r = rig();
        r.sim.start();
        while r.sim.fire().is_some() {}

        let phases: Vec<Phase> = r.published.history().iter().map(|s| s.phase).collect();
        let first_brewing = phases.iter().position(|p| *p == Phase::Brewing).unwrap();
        let first_finished = phases.iter().position(|p| *p == Phase::Finished).unwrap();
        assert!(first_brewing < first_finished);
        // history index 0 is the start publish, so index 160 is tick 160
        assert_eq!(first_brewing, 160);
    }

    #[test]
    fn stop_in_any_phase_hard_resets() {
        for ticks in [0, 50, 170, 259] {
            let mut r = rig();
            r.sim.start();
            fire_n(&mut r.sim, ticks);

            let snap = r.sim.stop();
            assert_idle(&snap);
            assert!(!r.sim.is_ticking());
            assert!(r.scheduler.active().is_empty());
        }
    }

    #[test]
    fn stop_from_finish_keeps_terminal_values() {
        let mut r = rig();
        r.sim.start();
        while r.sim.fire().is_some() {}

        let snap = r.sim.stop_with(StopReason::Finished);
        assert_eq!(snap.coffee_volume, 100.0);
        assert_eq!(snap.phase, Phase::Finished);
        assert!(!r.sim.is_ticking());
    }

    #[test]
    fn reset_while_idle_republishes_idle() {
        let mut r = rig();
        r.sim.initialize();
        let snap = r.sim.reset();
        assert_idle(&snap);
        assert_eq!(r.published.count(), 2);
        assert!(r.scheduler.active().is_empty());
    }

    #[test]
    fn stale_tick_after_stop_is_discarded() {
        let mut r = rig();
        r.sim.start();
        let old = r.sim.active_timer().unwrap();
        r.sim.stop();
        let published = r.published.count();

        assert_eq!(r.sim.tick(old), TickOutcome::Stale);
        assert_idle(&r.sim.snapshot());
        assert_eq!(r.published.count(), published);
    }

    #[test]
    fn restart_after_finish_uses_a_fresh_timer() {
        let mut r = rig();
        r.sim.start();
        let first = r.sim.active_timer().unwrap();
        while r.sim.fire().is_some() {}

        let snap = r.sim.start();
        assert_eq!(snap.phase, Phase::Heating);
        assert_eq!(snap.coffee_volume, 0.0);
        assert_eq!(r.sim.ticks(), 0);
        let second = r.sim.active_timer().unwrap();
        assert_ne!(first, second);
        assert_eq!(r.sim.tick(first), TickOutcome::Stale);
        assert_eq!(r.scheduler.active(), vec![second]);
    }

    #[test]
    fn apply_dispatches_commands() {
        let mut r = rig();
        assert_eq!(r.sim.apply(ControlCommand::Start).phase, Phase::Heating);
        assert_eq!(r.sim.apply(ControlCommand::Stop).phase, Phase::Idle);
        r.sim.apply(ControlCommand::Start);
        assert_eq!(r.sim.apply(ControlCommand::Reset).phase, Phase::Idle);
        assert!(!r.sim.is_ticking());
    }

    #[test]
    fn shutdown_cancels_timer_and_keeps_state() {
        let mut r = rig();
        r.sim.start();
        fire_n(&mut r.sim, 5);
        let before = r.sim.snapshot();

        r.sim.shutdown();
        assert!(!r.sim.is_ticking());
        assert_eq!(r.sim.snapshot(), before);
        assert_eq!(r.sim.fire(), None);
    }
}
