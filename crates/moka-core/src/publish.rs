//! State publishing seam.
//!
//! The simulator hands every snapshot to a [`StatePublisher`]. Publishing
//! is fire-and-forget: implementations must not block and must handle
//! their own transport failures, because a publish problem is never
//! allowed to affect the simulation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use moka_types::{Channel, Snapshot};

/// Sink for simulator snapshots.
pub trait StatePublisher: Send + Sync {
    /// Deliver a snapshot to subscribers. Must not block.
    fn publish(&self, snapshot: &Snapshot);
}

/// Forwards every snapshot to several publishers in order.
#[derive(Clone, Default)]
pub struct FanoutPublisher {
    sinks: Vec<Arc<dyn StatePublisher>>,
}

impl FanoutPublisher {
    /// Create a fan-out with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn StatePublisher>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks attached.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sinks are attached.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl StatePublisher for FanoutPublisher {
    fn publish(&self, snapshot: &Snapshot) {
        for sink in &self.sinks {
            sink.publish(snapshot);
        }
    }
}

#[derive(Debug, Default)]
struct Retained {
    channels: BTreeMap<Channel, String>,
    history: Vec<Snapshot>,
}

/// In-process publisher with retained-latest-value semantics.
///
/// Keeps the last encoded payload per channel, exactly what a late
/// subscriber to a retained topic would receive, plus the full ordered
/// history of snapshots.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    inner: Mutex<Retained>,
}

impl MemoryPublisher {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// The retained payload of one channel.
    pub fn retained(&self, channel: Channel) -> Option<String> {
        self.with(|r| r.channels.get(&channel).cloned())
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<Snapshot> {
        self.with(|r| r.history.last().copied())
    }

    /// Every snapshot published so far, oldest first.
    pub fn history(&self) -> Vec<Snapshot> {
        self.with(|r| r.history.clone())
    }

    /// Number of snapshots published so far.
    pub fn count(&self) -> usize {
        self.with(|r| r.history.len())
    }

    fn with<R>(&self, f: impl FnOnce(&mut Retained) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl StatePublisher for MemoryPublisher {
    fn publish(&self, snapshot: &Snapshot) {
        self.with(|r| {
            for (channel, payload) in snapshot.payloads() {
                r.channels.insert(channel, payload);
            }
            r.history.push(*snapshot);
        });
    }
}
