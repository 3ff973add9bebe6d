// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that the scheduler, timers and reveal pauses
//! monitor. An in-flight response cycle is drained before the process exits.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gate::ResponseGate;

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received SIGINT (Ctrl+C), initiating shutdown");
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl+C, initiating shutdown");
}

/// Waits up to `timeout` for the in-flight response cycle to finish.
///
/// Returns `true` when the gate was released in time.
pub async fn drain_cycles(gate: &ResponseGate, timeout: Duration) -> bool {
    if !gate.is_busy() {
        info!("no response cycle to drain");
        return true;
    }

    info!("waiting for the active response cycle to complete");
    match tokio::time::timeout(timeout, gate.idle()).await {
        Ok(()) => {
            info!("response cycle drained");
            true
        }
        Err(_) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "timeout reached, response cycle interrupted"
            );
            false
        }
    }
}
