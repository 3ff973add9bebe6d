// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-flight guard for response cycles.
//!
//! At most one cycle (API call plus reveal) runs at a time across the chat
//! send path, the proactive tick and random first contacts. Holding a
//! [`GateGuard`] is holding the gate; dropping it releases the gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct GateInner {
    busy: AtomicBool,
    released: Notify,
}

/// Shared single-flight gate. Clones refer to the same gate.
#[derive(Clone, Default)]
pub struct ResponseGate {
    inner: Arc<GateInner>,
}

impl ResponseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the gate if it is free.
    pub fn try_acquire(&self) -> Option<GateGuard> {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard {
                inner: Arc::clone(&self.inner),
            })
    }

    /// Waits for the gate, or returns `None` once `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<GateGuard> {
        loop {
            let released = self.inner.released.notified();
            if let Some(guard) = self.try_acquire() {
                return Some(guard);
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = released => {}
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Resolves once nobody holds the gate.
    pub async fn idle(&self) {
        loop {
            let released = self.inner.released.notified();
            if !self.is_busy() {
                return;
            }
            released.await;
        }
    }
}

/// Proof of holding the gate.
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard {
    inner: Arc<GateInner>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.inner.busy.store(false, Ordering::Release);
        self.inner.released.notify_waiters();
    }
}
