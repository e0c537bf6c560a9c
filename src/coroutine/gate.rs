//! Sticky one-shot gate for blocking waiters.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How often a waiter re-checks an external interrupt signal; the token has
/// no synchronous wait surface.
const EXTERNAL_POLL: Duration = Duration::from_millis(10);

/// One-shot synchronization point, opened exactly once when the coroutine
/// settles. The flag is sticky, so waiters arriving late return immediately.
pub(super) struct WaitGate {
    opened: Mutex<bool>,
    cvar: Condvar,
}

impl WaitGate {
    pub(super) fn new() -> Self {
        Self {
            opened: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    pub(super) fn open(&self) {
        let mut opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner);
        *opened = true;
        self.cvar.notify_all();
    }

    /// Park until the gate opens (`true`) or `external` fires (`false`).
    pub(super) fn wait(&self, external: Option<&CancellationToken>) -> bool {
        let mut opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner);
        while !*opened {
            match external {
                Some(signal) => {
                    if signal.is_cancelled() {
                        return false;
                    }
                    let (guard, _timed_out) = self
                        .cvar
                        .wait_timeout(opened, EXTERNAL_POLL)
                        .unwrap_or_else(PoisonError::into_inner);
                    opened = guard;
                }
                None => {
                    opened = self
                        .cvar
                        .wait(opened)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        true
    }
}
