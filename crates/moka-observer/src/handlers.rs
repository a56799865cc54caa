//! Read-only REST handlers for the Observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/state` | Latest snapshot and transport connectivity |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, Utc};
use moka_types::Snapshot;

use crate::error::ObserverError;
use crate::state::AppState;

/// Response body for `GET /api/state`.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct StateResponse {
    /// Current brew state.
    pub snapshot: Snapshot,
    /// When the snapshot was published. `None` before the first publish.
    pub updated_at: Option<DateTime<Utc>>,
    /// Whether the message bus transport is connected.
    pub connected: bool,
}

/// Return the latest published snapshot.
///
/// Falls back to asking the simulator directly when nothing has been
/// published yet.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateResponse>, ObserverError> {
    let (snapshot, updated_at) = match state.feed.latest() {
        Some(published) => (published.snapshot, Some(published.updated_at)),
        None => (state.simulator.snapshot().await?, None),
    };

    Ok(Json(StateResponse {
        snapshot,
        updated_at,
        connected: state.is_connected(),
    }))
}

/// Serve a minimal HTML status page.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (phase, temperature, pressure, coffee, updated) = state.feed.latest().map_or_else(
        || {
            (
                "unknown".to_owned(),
                "-".to_owned(),
                "-".to_owned(),
                "-".to_owned(),
                "never".to_owned(),
            )
        },
        |p| {
            (
                p.snapshot.phase.to_string(),
                format!("{:.2}", p.snapshot.temperature),
                format!("{:.2}", p.snapshot.pressure),
                format!("{:.1}", p.snapshot.coffee_volume),
                p.updated_at.to_rfc3339(),
            )
        },
    );
    let (bus_class, bus_label) = if state.is_connected() {
        ("ok", "CONNECTED")
    } else {
        ("down", "DISCONNECTED")
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Moka Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #d29922; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #d29922; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .ok {{ color: #3fb950; font-weight: bold; }}
        .down {{ color: #f85149; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Moka Observer</h1>
    <p class="subtitle">Brew simulator monitoring server</p>

    <p>Bus: <span class="{bus_class}">{bus_label}</span></p>

    <div>
        <div class="metric">
            <div class="label">Phase</div>
            <div class="value">{phase}</div>
        </div>
        <div class="metric">
            <div class="label">Temperature (C)</div>
            <div class="value">{temperature}</div>
        </div>
        <div class="metric">
            <div class="label">Pressure (bar)</div>
            <div class="value">{pressure}</div>
        </div>
        <div class="metric">
            <div class="label">Coffee (%)</div>
            <div class="value">{coffee}</div>
        </div>
    </div>
    <p class="subtitle">Updated: {updated}</p>

    <hr>

    <h2>Endpoints</h2>
    <ul>
        <li>GET <a href="/api/state">/api/state</a> -- latest snapshot</li>
        <li>GET/POST <a href="/api/start">/api/start</a> -- start a brew</li>
        <li>GET/POST <a href="/api/stop">/api/stop</a> -- stop and reset</li>
        <li>GET/POST <a href="/api/reset">/api/reset</a> -- reset to idle</li>
        <li>WS /ws/state -- live snapshot stream</li>
    </ul>
</body>
</html>"#
    ))
}
