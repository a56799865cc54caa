//! End-to-end brew cycles through the Tokio simulator service.
//!
//! Runs on a paused clock so a full 52 second brew completes instantly
//! and tick counts are exact.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::sync::Arc;
use std::time::Duration;

use moka_core::model::BrewModel;
use moka_core::publish::{MemoryPublisher, StatePublisher};
use moka_core::service::{SimulatorHandle, spawn_simulator};
use moka_types::{Channel, Phase};
use tokio::time;

fn spawn() -> (SimulatorHandle, Arc<MemoryPublisher>) {
    let published = Arc::new(MemoryPublisher::new());
    let (handle, _task) = spawn_simulator(
        BrewModel::default(),
        Arc::clone(&published) as Arc<dyn StatePublisher>,
    );
    (handle, published)
}

#[tokio::test(start_paused = true)]
async fn uninterrupted_brew_runs_to_finished() {
    let (handle, published) = spawn();
    handle.start().await.unwrap();

    // Tick 259 lands at 51.8 s.
    time::sleep(Duration::from_secs(52)).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Finished);
    assert_eq!(snap.coffee_volume, 100.0);
    assert_eq!(snap.temperature, 95.0);
    assert_eq!(snap.pressure, 1.5);

    // idle + start + 258 advancing ticks + final
    assert_eq!(published.count(), 261);
    assert_eq!(published.retained(Channel::Phase).as_deref(), Some("finished"));
    assert_eq!(published.retained(Channel::Temperature).as_deref(), Some("95.00"));
    assert_eq!(published.retained(Channel::Pressure).as_deref(), Some("1.50"));
    assert_eq!(published.retained(Channel::CoffeeVolume).as_deref(), Some("100.0"));

    // The timer is gone once finished.
    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(published.count(), 261);
}

#[tokio::test(start_paused = true)]
async fn phases_progress_in_order() {
    let (handle, published) = spawn();
    handle.start().await.unwrap();
    time::sleep(Duration::from_secs(52)).await;

    let phases: Vec<Phase> = published.history().iter().map(|s| s.phase).collect();
    let mut rank = 0_u8;
    for phase in phases.iter().skip(1) {
        let next = match phase {
            Phase::Heating => 1,
            Phase::Brewing => 2,
            Phase::Finished => 3,
            Phase::Idle => 0,
        };
        assert!(next >= rank, "phase went backwards: {phases:?}");
        rank = next;
    }
    assert_eq!(rank, 3);
}

#[tokio::test(start_paused = true)]
async fn stop_mid_brew_then_restart_begins_cold() {
    let (handle, published) = spawn();
    handle.start().await.unwrap();

    // Tick 170 is well into the brewing phase.
    time::sleep(Duration::from_millis(34_100)).await;
    assert_eq!(handle.snapshot().await.unwrap().phase, Phase::Brewing);

    let stopped = handle.stop().await.unwrap();
    assert_eq!(stopped.phase, Phase::Idle);
    assert_eq!(stopped.temperature, 20.0);
    assert_eq!(stopped.pressure, 0.0);
    assert_eq!(stopped.coffee_volume, 0.0);

    let restarted = handle.start().await.unwrap();
    assert_eq!(restarted.phase, Phase::Heating);
    assert_eq!(restarted.temperature, 20.0);
    assert_eq!(restarted.coffee_volume, 0.0);
    assert_eq!(published.latest(), Some(restarted));
}

#[tokio::test(start_paused = true)]
async fn reset_after_finish_returns_to_idle() {
    let (handle, published) = spawn();
    handle.start().await.unwrap();
    time::sleep(Duration::from_secs(52)).await;

    let snap = handle.reset().await.unwrap();
    assert_eq!(snap.phase, Phase::Idle);
    assert_eq!(snap.coffee_volume, 0.0);
    assert_eq!(published.retained(Channel::Phase).as_deref(), Some("idle"));
    assert_eq!(published.retained(Channel::CoffeeVolume).as_deref(), Some("0.0"));
}
