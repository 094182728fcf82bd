// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clipboard copy with timed auto-clear.
//!
//! A copied password is wiped after a fixed delay by a one-shot tokio task.
//! Each copy bumps a generation counter; a pending clear only fires if no
//! newer copy has happened since, so it never wipes something the operator
//! copied later.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use latchkey_core::{ClipboardSink, LatchkeyError};
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Pending auto-clear.
///
/// Dropping the handle does not cancel the clear.
#[derive(Debug)]
pub struct ClearHandle {
    task: JoinHandle<()>,
}

impl ClearHandle {
    /// Abort the pending clear. Best-effort: a clear already running finishes.
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the clear has run (or was cancelled).
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

/// Clear `sink` after `delay`, unconditionally.
pub fn schedule_clear(
    sink: Arc<dyn ClipboardSink>,
    delay: Duration,
) -> Result<ClearHandle, LatchkeyError> {
    spawn_clear(sink, delay, None)
}

/// Clipboard wrapper that schedules a clear after every copy.
#[derive(Clone)]
pub struct SecureClipboard {
    sink: Arc<dyn ClipboardSink>,
    generation: Arc<AtomicU64>,
    clear_after: Duration,
}

impl std::fmt::Debug for SecureClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureClipboard")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("clear_after", &self.clear_after)
            .finish_non_exhaustive()
    }
}

impl SecureClipboard {
    pub fn new(sink: Arc<dyn ClipboardSink>, clear_after: Duration) -> Self {
        Self {
            sink,
            generation: Arc::new(AtomicU64::new(0)),
            clear_after,
        }
    }

    pub fn clear_after(&self) -> Duration {
        self.clear_after
    }

    /// Put `secret` on the clipboard and schedule its removal.
    ///
    /// Must be called from within a tokio runtime.
    pub fn copy(&self, secret: &SecretString) -> Result<ClearHandle, LatchkeyError> {
        // Fail before touching the clipboard if nothing could clear it later.
        tokio::runtime::Handle::try_current().map_err(|_| no_runtime())?;

        self.sink.set_text(secret.expose_secret())?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, delay = ?self.clear_after, "secret copied to clipboard");

        spawn_clear(
            Arc::clone(&self.sink),
            self.clear_after,
            Some((Arc::clone(&self.generation), generation)),
        )
    }
}

fn spawn_clear(
    sink: Arc<dyn ClipboardSink>,
    delay: Duration,
    guard: Option<(Arc<AtomicU64>, u64)>,
) -> Result<ClearHandle, LatchkeyError> {
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| no_runtime())?;

    let task = runtime.spawn(async move {
        tokio::time::sleep(delay).await;

        if let Some((current, expected)) = &guard {
            if current.load(Ordering::SeqCst) != *expected {
                debug!("clipboard changed since copy, skipping clear");
                return;
            }
        }
        match sink.clear() {
            Ok(()) => debug!("clipboard cleared"),
            Err(e) => warn!(error = %e, "failed to clear clipboard"),
        }
    });

    Ok(ClearHandle { task })
}

fn no_runtime() -> LatchkeyError {
    LatchkeyError::Internal("clipboard auto-clear requires a tokio runtime".to_string())
}
