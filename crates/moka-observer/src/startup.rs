//! Observer server startup helper for embedding in the engine binary.
//!
//! Provides [`spawn_observer`] which binds the listener up front and then
//! serves the Observer HTTP + `WebSocket` API on a background Tokio task,
//! so the engine learns about a port conflict before it starts brewing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use moka_observer::startup::spawn_observer;
//!
//! let handle = spawn_observer(&config.observer, state).await?;
//! // The server is now running. Abort the handle on shutdown.
//! ```

use std::sync::Arc;

use moka_core::config::ObserverConfig;
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, bind, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind the Observer listener and serve it on a background Tokio task.
///
/// The server runs until the Tokio runtime is shut down or the returned
/// handle is aborted.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address is
/// malformed or cannot be bound.
pub async fn spawn_observer(
    config: &ObserverConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let listener = bind(&ServerConfig::from(config)).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok(handle)
}
