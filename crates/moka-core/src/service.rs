//! Tokio service that owns a [`BrewSimulator`].
//!
//! All access to the simulator is serialized through one mpsc queue.
//! Control requests, timer firings and snapshot reads are handled in
//! arrival order by a single task, so a tick can never interleave with a
//! start, stop or reset.
//!
//! Timer tasks hold only a weak sender. When every [`SimulatorHandle`] is
//! dropped (or [`SimulatorHandle::shutdown`] is called) the service loop
//! ends, cancels the active timer, and the task completes.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use moka_types::{ControlCommand, Snapshot};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::model::BrewModel;
use crate::publish::StatePublisher;
use crate::simulator::BrewSimulator;
use crate::timer::{TickScheduler, TickTimer, TimerId};

/// Depth of the service request queue.
const REQUEST_CAPACITY: usize = 64;

/// Errors returned by [`SimulatorHandle`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// The simulator service is no longer running.
    #[error("simulator service has shut down")]
    Shutdown,
}

enum Request {
    Control {
        command: ControlCommand,
        reply: oneshot::Sender<Snapshot>,
    },
    Tick(TimerId),
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Control { command, .. } => write!(f, "Control({command})"),
            Self::Tick(id) => write!(f, "Tick({id})"),
            Self::Snapshot(_) => f.write_str("Snapshot"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokio timers
// ---------------------------------------------------------------------------

/// Scheduler whose timers are Tokio tasks feeding the service queue.
struct TokioScheduler {
    tx: mpsc::WeakSender<Request>,
}

impl TickScheduler for TokioScheduler {
    fn schedule(&mut self, id: TimerId, period: Duration) -> Box<dyn TickTimer> {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(tx) = tx.upgrade() else {
                    break;
                };
                if tx.send(Request::Tick(id)).await.is_err() {
                    break;
                }
            }
            debug!(timer = %id, "Tick task exited");
        });
        Box::new(TokioTimer { id, task })
    }
}

struct TokioTimer {
    id: TimerId,
    task: JoinHandle<()>,
}

impl TickTimer for TokioTimer {
    fn id(&self) -> TimerId {
        self.id
    }

    fn cancel(self: Box<Self>) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable async handle to the simulator service.
#[derive(Debug, Clone)]
pub struct SimulatorHandle {
    tx: mpsc::Sender<Request>,
}

impl SimulatorHandle {
    /// Start a brew. A no-op while one is already running.
    pub async fn start(&self) -> Result<Snapshot, ControlError> {
        self.apply(ControlCommand::Start).await
    }

    /// Stop the brew and reset to idle.
    pub async fn stop(&self) -> Result<Snapshot, ControlError> {
        self.apply(ControlCommand::Stop).await
    }

    /// Reset to idle from any phase.
    pub async fn reset(&self) -> Result<Snapshot, ControlError> {
        self.apply(ControlCommand::Reset).await
    }

    /// Run a control command and return the snapshot it published.
    pub async fn apply(&self, command: ControlCommand) -> Result<Snapshot, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Control { command, reply })
            .await
            .map_err(closed)?;
        rx.await.map_err(closed)
    }

    /// Read the current state without publishing.
    pub async fn snapshot(&self) -> Result<Snapshot, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Snapshot(reply))
            .await
            .map_err(closed)?;
        rx.await.map_err(closed)
    }

    /// Ask the service to cancel its timer and exit.
    pub async fn shutdown(&self) -> Result<(), ControlError> {
        self.tx.send(Request::Shutdown).await.map_err(closed)
    }

    /// Whether the service has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn closed(error: impl Display) -> ControlError {
    debug!(error = %error, "Simulator service unavailable");
    ControlError::Shutdown
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Spawn the simulator service on the current Tokio runtime.
///
/// The idle snapshot is published as soon as the service task starts.
/// Returns the control handle and the service task's [`JoinHandle`].
pub fn spawn_simulator(
    model: BrewModel,
    publisher: Arc<dyn StatePublisher>,
) -> (SimulatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(REQUEST_CAPACITY);
    let scheduler = TokioScheduler { tx: tx.downgrade() };
    let simulator = BrewSimulator::new(model, Box::new(scheduler), publisher);
    let task = tokio::spawn(run(simulator, rx));
    (SimulatorHandle { tx }, task)
}

async fn run(mut simulator: BrewSimulator, mut rx: mpsc::Receiver<Request>) {
    simulator.initialize();

    while let Some(request) = rx.recv().await {
        match request {
            Request::Control { command, reply } => {
                let snapshot = simulator.apply(command);
                if reply.send(snapshot).is_err() {
                    debug!(%command, "Control caller went away before the reply");
                }
            }
            Request::Tick(id) => {
                simulator.tick(id);
            }
            Request::Snapshot(reply) => {
                if reply.send(simulator.snapshot()).is_err() {
                    debug!("Snapshot caller went away before the reply");
                }
            }
            Request::Shutdown => {
                info!("Simulator shutdown requested");
                break;
            }
        }
    }

    simulator.shutdown();
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::unwrap_used)]
mod tests {
    use moka_types::Phase;

    use super::*;
    use crate::publish::MemoryPublisher;

    fn spawn() -> (SimulatorHandle, JoinHandle<()>, Arc<MemoryPublisher>) {
        let published = Arc::new(MemoryPublisher::new());
        let (handle, task) = spawn_simulator(
            BrewModel::default(),
            Arc::clone(&published) as Arc<dyn StatePublisher>,
        );
        (handle, task, published)
    }

    #[tokio::test(start_paused = true)]
    async fn service_publishes_idle_on_start_up() {
        let (handle, _task, published) = spawn();
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(published.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_arrive_every_period() {
        let (handle, _task, _published) = spawn();
        handle.start().await.unwrap();

        time::sleep(Duration::from_millis(1100)).await;
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.temperature, 21.875);
        assert_eq!(snap.phase, Phase::Heating);
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_keeps_single_tick_rate() {
        let (handle, _task, _published) = spawn();
        handle.start().await.unwrap();
        handle.start().await.unwrap();

        time::sleep(Duration::from_millis(1100)).await;
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.temperature, 21.875);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_the_timer() {
        let (handle, _task, published) = spawn();
        handle.start().await.unwrap();
        time::sleep(Duration::from_millis(500)).await;

        let snap = handle.stop().await.unwrap();
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(snap.temperature, 20.0);
        let after_stop = published.count();

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(published.count(), after_stop);
        assert_eq!(handle.snapshot().await.unwrap().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_handle() {
        let (handle, task, _published) = spawn();
        handle.start().await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(handle.start().await, Err(ControlError::Shutdown));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_ends_the_service() {
        let (handle, task, _published) = spawn();
        handle.start().await.unwrap();
        drop(handle);
        task.await.unwrap();
    }
}
