//! Shared application state for the Observer API server.
//!
//! [`StateFeed`] is the observer's [`StatePublisher`]: the simulator
//! service hands it every snapshot, it keeps the most recent one for
//! REST reads and late `WebSocket` joiners, and fans it out over a
//! broadcast channel. [`AppState`] bundles the feed with the simulator
//! handle and the transport connectivity flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use moka_core::publish::StatePublisher;
use moka_core::service::SimulatorHandle;
use moka_types::Snapshot;
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the broadcast channel for published snapshots.
///
/// A subscriber that falls behind by more than this many messages
/// receives [`broadcast::error::RecvError::Lagged`] and skips to the
/// newest message.
const BROADCAST_CAPACITY: usize = 256;

/// A snapshot together with the time it was published.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PublishedState {
    /// The published fields.
    pub snapshot: Snapshot,
    /// When the simulator published it.
    pub updated_at: DateTime<Utc>,
}

/// Retained-latest-value feed of simulator snapshots.
#[derive(Debug)]
pub struct StateFeed {
    tx: broadcast::Sender<PublishedState>,
    latest: RwLock<Option<PublishedState>>,
}

impl StateFeed {
    /// Create an empty feed.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            latest: RwLock::new(None),
        }
    }

    /// Subscribe to every snapshot published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedState> {
        self.tx.subscribe()
    }

    /// The most recently published snapshot, if any.
    pub fn latest(&self) -> Option<PublishedState> {
        *self.latest.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StateFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl StatePublisher for StateFeed {
    fn publish(&self, snapshot: &Snapshot) {
        let published = PublishedState {
            snapshot: *snapshot,
            updated_at: Utc::now(),
        };
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(published);
        // Err only means no WebSocket clients are connected.
        let receivers = self.tx.send(published).unwrap_or(0);
        debug!(receivers, phase = %snapshot.phase, "Snapshot fanned out to observers");
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Latest snapshot and live stream.
    pub feed: Arc<StateFeed>,
    /// Control handle to the simulator service.
    pub simulator: SimulatorHandle,
    /// Whether the message bus transport is currently connected.
    pub connected: Arc<AtomicBool>,
}

impl AppState {
    /// Create application state with the transport marked disconnected.
    pub fn new(feed: Arc<StateFeed>, simulator: SimulatorHandle) -> Self {
        Self::with_connectivity(feed, simulator, Arc::new(AtomicBool::new(false)))
    }

    /// Create application state sharing the transport's connectivity flag.
    pub const fn with_connectivity(
        feed: Arc<StateFeed>,
        simulator: SimulatorHandle,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            feed,
            simulator,
            connected,
        }
    }

    /// Subscribe to the snapshot stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedState> {
        self.feed.subscribe()
    }

    /// Whether the message bus transport is currently connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
