//! MQTT transport for published state and incoming control commands.
//!
//! [`MqttTransport`] owns the `rumqttc` event loop and is driven on its own
//! Tokio task by [`MqttTransport::run`]. [`MqttPublisher`] is the
//! [`StatePublisher`] the simulator writes into; it never blocks and never
//! fails upward.
//!
//! Every state channel is published with QoS 1 and the retain flag, so a
//! subscriber that connects late immediately receives the latest value.
//! While the broker is unreachable, or the client's request queue is full,
//! the latest payload per topic is kept. The stash is re-sent on the next
//! `ConnAck`, and on a live connection as soon as the queue drains.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use moka_core::config::TransportConfig;
use moka_core::publish::StatePublisher;
use moka_core::service::SimulatorHandle;
use moka_types::{CONTROL_CHANNEL, Channel, Snapshot, topic};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS};
use tokio::time;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::control;

/// Errors that can occur while setting up the MQTT transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No broker URL was configured.
    #[error("no broker URL configured")]
    MissingBroker,

    /// The broker URL or connection options were rejected.
    #[error("invalid MQTT options for {url}: {reason}")]
    Options {
        /// The broker URL as configured.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Client identifier to connect with, including the random suffix when
/// `unique_client_id` is set.
pub fn client_id(config: &TransportConfig) -> String {
    if config.unique_client_id {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        format!("{}-{suffix}", config.client_id)
    } else {
        config.client_id.clone()
    }
}

/// Build `rumqttc` options from the transport configuration.
///
/// The broker URL selects the transport (`mqtt`, `mqtts`, `ws`, `wss`);
/// the client id is appended as an encoded `client_id` query parameter.
///
/// # Errors
///
/// Returns [`TransportError::MissingBroker`] if no URL is configured, or
/// [`TransportError::Options`] if `rumqttc` rejects it.
pub fn build_options(config: &TransportConfig) -> Result<MqttOptions, TransportError> {
    let url = config
        .broker_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(TransportError::MissingBroker)?;

    let rejected = |reason: String| TransportError::Options {
        url: url.to_owned(),
        reason,
    };

    let mut parsed = Url::parse(url).map_err(|e| rejected(e.to_string()))?;
    parsed
        .query_pairs_mut()
        .append_pair("client_id", &client_id(config));
    let mut options = MqttOptions::try_from(parsed).map_err(|e| rejected(e.to_string()))?;

    options
        .set_keep_alive(Duration::from_secs(config.keep_alive_secs))
        .set_clean_session(config.clean_session);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username.clone(), password.clone());
    }

    Ok(options)
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Publishes simulator snapshots as retained MQTT messages.
pub struct MqttPublisher {
    client: AsyncClient,
    prefix: String,
    connected: Arc<AtomicBool>,
    pending: Mutex<BTreeMap<String, String>>,
}

impl MqttPublisher {
    fn new(client: AsyncClient, prefix: String, connected: Arc<AtomicBool>) -> Self {
        Self {
            client,
            prefix,
            connected,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// Full topic of a state channel.
    pub fn state_topic(&self, channel: Channel) -> String {
        topic(&self.prefix, channel.name())
    }

    /// Full topic of the control channel.
    pub fn control_topic(&self) -> String {
        topic(&self.prefix, CONTROL_CHANNEL)
    }

    /// Topics with a payload waiting for the next connection.
    #[cfg(test)]
    pub fn pending_topics(&self) -> Vec<String> {
        self.lock_pending().keys().cloned().collect()
    }

    /// Re-send every stashed payload. Returns how many were attempted.
    pub fn flush_pending(&self) -> usize {
        let mut pending = self.lock_pending();
        let count = self.resend(&mut pending);
        if count > 0 {
            info!(count, remaining = pending.len(), "Flushed stashed state to broker");
        }
        count
    }

    /// Re-send the stash on a live connection once the request queue has
    /// room again. Returns how many were attempted.
    pub fn retry_pending(&self) -> usize {
        if !self.connected.load(Ordering::Relaxed) {
            return 0;
        }
        let mut pending = self.lock_pending();
        let count = self.resend(&mut pending);
        if count > 0 {
            debug!(count, remaining = pending.len(), "Retried stashed state");
        }
        count
    }

    /// Send a DISCONNECT. [`MqttTransport::run`] returns once it goes out.
    pub fn disconnect(&self) {
        if let Err(e) = self.client.try_disconnect() {
            warn!(error = %e, "Failed to queue MQTT disconnect");
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resend(&self, pending: &mut BTreeMap<String, String>) -> usize {
        let stashed = std::mem::take(pending);
        let count = stashed.len();
        for (topic, payload) in stashed {
            self.send(pending, topic, payload);
        }
        count
    }

    /// Queue a retained publish; keep the payload if the queue refuses it.
    fn send(&self, pending: &mut BTreeMap<String, String>, topic: String, payload: String) {
        match self
            .client
            .try_publish(topic.clone(), QoS::AtLeastOnce, true, payload.clone())
        {
            Ok(()) => {
                debug!(topic = %topic, payload = %payload, "State published");
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "Publish not queued, keeping latest value");
                pending.insert(topic, payload);
            }
        }
    }
}

impl StatePublisher for MqttPublisher {
    fn publish(&self, snapshot: &Snapshot) {
        let connected = self.connected.load(Ordering::Relaxed);
        let mut pending = self.lock_pending();
        for (channel, payload) in snapshot.payloads() {
            let topic = self.state_topic(channel);
            if connected {
                pending.remove(&topic);
                self.send(&mut pending, topic, payload);
            } else {
                pending.insert(topic, payload);
            }
        }
    }
}

impl std::fmt::Debug for MqttPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttPublisher")
            .field("prefix", &self.prefix)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// MQTT connection driver.
pub struct MqttTransport {
    eventloop: EventLoop,
    publisher: Arc<MqttPublisher>,
    connected: Arc<AtomicBool>,
    control_enabled: bool,
    reconnect_delay: Duration,
}

impl MqttTransport {
    /// Create the client and event loop. Nothing connects until
    /// [`run`](Self::run) polls the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the configured broker URL is unusable.
    pub fn new(
        config: &TransportConfig,
        connected: Arc<AtomicBool>,
    ) -> Result<Self, TransportError> {
        let options = build_options(config)?;
        info!(
            client_id = %options.client_id(),
            broker = ?options.broker_address(),
            clean_session = config.clean_session,
            "MQTT transport configured"
        );

        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity);
        let publisher = Arc::new(MqttPublisher::new(
            client,
            config.topic_prefix.clone(),
            Arc::clone(&connected),
        ));

        Ok(Self {
            eventloop,
            publisher,
            connected,
            control_enabled: config.control_enabled,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
        })
    }

    /// The publisher to hand to the simulator.
    pub fn publisher(&self) -> Arc<MqttPublisher> {
        Arc::clone(&self.publisher)
    }

    /// Drive the connection until a DISCONNECT has been sent.
    ///
    /// Connection errors are logged and retried after the configured
    /// delay; they never reach the simulator.
    pub async fn run(mut self, simulator: SimulatorHandle) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    self.on_connected(ack.session_present);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.on_message(&publish, &simulator).await;
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!(pkid = ack.pkid, "Control subscription acknowledged");
                }
                Ok(Event::Outgoing(Outgoing::Publish(_)) | Event::Incoming(Packet::PubAck(_))) => {
                    self.publisher.retry_pending();
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    self.connected.store(false, Ordering::Relaxed);
                    info!("MQTT transport disconnected");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    if self.connected.swap(false, Ordering::Relaxed) {
                        warn!(error = %e, "MQTT connection lost");
                    } else {
                        warn!(error = %e, "MQTT connection attempt failed");
                    }
                    time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    fn on_connected(&self, session_present: bool) {
        self.connected.store(true, Ordering::Relaxed);
        info!(session_present, "MQTT connected");

        if self.control_enabled {
            let control = self.publisher.control_topic();
            match self.publisher.client.try_subscribe(control.clone(), QoS::AtLeastOnce) {
                Ok(()) => info!(topic = %control, "Subscribed to control channel"),
                Err(e) => warn!(topic = %control, error = %e, "Control subscription failed"),
            }
        }

        self.publisher.flush_pending();
    }

    async fn on_message(&mut self, publish: &Publish, simulator: &SimulatorHandle) {
        if !self.control_enabled || publish.topic != self.publisher.control_topic() {
            debug!(topic = %publish.topic, "Ignoring message on unexpected topic");
            return;
        }
        if publish.retain {
            debug!(topic = %publish.topic, "Ignoring retained control message");
            return;
        }
        control::dispatch(&publish.payload, simulator).await;
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("publisher", &self.publisher)
            .field("control_enabled", &self.control_enabled)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish_non_exhaustive()
    }
}
