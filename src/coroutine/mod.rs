//! Coroutine handle and lifecycle state machine.
//!
//! A [`Coroutine`] is a cloneable handle to one background execution of a
//! step sequence. The handle owns the cancellation signal, the terminal
//! outcome, and the wait gate; the driver (see [`driver`]) runs on a spawned
//! task and reports back through the same guarded transition path that
//! `cancel` and `dispose` use.

mod driver;
mod gate;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::Fault;
use crate::options::StartOptions;
use crate::types::{Outcome, StepSequence};
use gate::WaitGate;

/// Termination callback: invoked exactly once with the terminal outcome.
pub(crate) type EndCallback = Box<dyn FnOnce(&Coroutine, &Outcome) + Send + 'static>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/* ===================== Shared state ===================== */

/// Mutable lifecycle state.
///
/// Every read-modify-write of the outcome or the disposed bit goes through
/// the one mutex guarding this struct; that is what makes "check state, then
/// transition" atomic across `cancel`, natural completion, fault, and
/// `dispose` racing from arbitrary threads.
struct Lifecycle {
    /// Terminal outcome. `None` means Running. Monotonic: set exactly once.
    outcome: Option<Outcome>,
    /// Orthogonal disposed bit; only ever added after an outcome is set
    /// (dispose forces an implicit cancel first).
    disposed: bool,
    /// Pending termination callbacks, drained on settle, cleared on dispose.
    subscribers: Vec<EndCallback>,
}

struct Shared {
    id: u64,
    name: Option<String>,
    auto_dispose: bool,
    /// Owned by this coroutine; observed by every frame and every suspension.
    cancel_token: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    /// Sticky gate for blocking waiters, opened on first terminal outcome.
    gate: WaitGate,
    /// One-shot result channel; late subscribers see the settled value.
    ended_tx: watch::Sender<Option<Outcome>>,
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        // Settle never panics while holding the lock, but a poisoned guard
        // would still carry consistent state.
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/* ===================== Coroutine ===================== */

/// Handle to a running (or finished) coroutine.
///
/// Cheap to clone; all clones refer to the same execution. Safe to use from
/// any thread: every mutating operation is an atomic check-then-transition
/// and is a no-op once the coroutine is terminal.
#[derive(Clone)]
pub struct Coroutine {
    shared: Arc<Shared>,
}

impl Coroutine {
    /// Start a coroutine with default options (`auto_dispose = true`).
    ///
    /// The factory runs on the worker task and receives a handle to the
    /// coroutine itself, so step code can self-cancel or pass the
    /// cancellation token to other operations. Returns immediately; the
    /// step sequence executes concurrently. Must be called within a tokio
    /// runtime.
    pub fn start<F>(factory: F) -> Coroutine
    where
        F: FnOnce(Coroutine) -> StepSequence + Send + 'static,
    {
        Self::start_with(factory, StartOptions::new())
    }

    /// Start a coroutine with explicit [`StartOptions`].
    pub fn start_with<F>(factory: F, options: StartOptions) -> Coroutine
    where
        F: FnOnce(Coroutine) -> StepSequence + Send + 'static,
    {
        let StartOptions {
            auto_dispose,
            name,
            on_ended,
        } = options;

        let (ended_tx, _ended_rx) = watch::channel(None);
        let coroutine = Coroutine {
            shared: Arc::new(Shared {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                name,
                auto_dispose,
                cancel_token: CancellationToken::new(),
                lifecycle: Mutex::new(Lifecycle {
                    outcome: None,
                    disposed: false,
                    subscribers: Vec::new(),
                }),
                gate: WaitGate::new(),
                ended_tx,
            }),
        };

        if let Some(callback) = on_ended {
            coroutine.subscribe(callback);
        }

        let handle = coroutine.clone();
        tokio::spawn(async move {
            driver::run(handle, factory).await;
        });

        coroutine
    }

    /* ===================== Mutating operations ===================== */

    /// Cancel the coroutine.
    ///
    /// No-op unless still running. Settles the Cancelled outcome, raises the
    /// cancellation signal (aborting any pending suspension and unwinding
    /// every frame), notifies subscribers, then disposes if configured.
    /// Returns whether this call performed the cancellation. Callable from
    /// any thread, including from the coroutine's own step code and from
    /// nested frames.
    pub fn cancel(&self) -> bool {
        self.settle(Outcome::Cancelled)
    }

    /// Schedule a deferred [`cancel`](Self::cancel) after `duration`.
    ///
    /// The timer is bound to the coroutine's own cancellation signal, so
    /// disposing before the duration elapses suppresses the deferred cancel.
    /// A coroutine that reached a terminal outcome before the timer fires is
    /// never cancelled late: the fire is a guarded no-op.
    pub fn cancel_after(&self, duration: Duration) {
        let this = self.clone();
        let token = self.shared.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    this.cancel();
                }
            }
        });
    }

    /// Dispose the coroutine.
    ///
    /// Idempotent and safe from any thread, any number of times. Performs an
    /// implicit cancel first if still running, sets the disposed bit, raises
    /// the cancellation token so deferred timers unpark, and clears
    /// subscriber references.
    pub fn dispose(&self) {
        // Implicit cancel while running; guarded no-op otherwise.
        self.cancel();

        let dropped = {
            let mut lifecycle = self.shared.lifecycle();
            if lifecycle.disposed {
                return;
            }
            lifecycle.disposed = true;
            std::mem::take(&mut lifecycle.subscribers)
        };
        drop(dropped);

        // Releases any cancel_after timer still parked on its sleep.
        self.shared.cancel_token.cancel();

        tracing::debug!(
            id = self.shared.id,
            name = self.shared.name.as_deref().unwrap_or(""),
            "coroutine disposed"
        );
    }

    /// Settle the terminal outcome. Exactly one settle ever wins.
    fn settle(&self, outcome: Outcome) -> bool {
        let subscribers = {
            let mut lifecycle = self.shared.lifecycle();
            if lifecycle.outcome.is_some() {
                return false;
            }
            lifecycle.outcome = Some(outcome.clone());
            std::mem::take(&mut lifecycle.subscribers)
        };

        if outcome.is_cancelled() {
            self.shared.cancel_token.cancel();
        }

        // Gate opens before disposal and before callbacks run.
        self.shared.gate.open();
        // send_replace stores the value even with no receivers subscribed
        // yet, which is what makes late async joins replay.
        self.shared.ended_tx.send_replace(Some(outcome.clone()));

        tracing::debug!(
            id = self.shared.id,
            name = self.shared.name.as_deref().unwrap_or(""),
            %outcome,
            "coroutine settled"
        );

        // Outside the lock: callbacks may call cancel/dispose themselves.
        for subscriber in subscribers {
            subscriber(self, &outcome);
        }

        if self.shared.auto_dispose {
            self.dispose();
        }
        true
    }

    /// Natural completion, reported by the driver.
    pub(crate) fn complete(&self) {
        self.settle(Outcome::Completed);
    }

    /// Fault transition, reported by the driver.
    pub(crate) fn fault(&self, fault: Fault) {
        self.settle(Outcome::Faulted(fault));
    }

    /* ===================== Notification ===================== */

    /// Register a termination callback.
    ///
    /// Fires exactly once with `(coroutine, outcome)`. A subscriber
    /// registered after the coroutine already settled is replayed
    /// immediately rather than dropped.
    pub fn on_ended<F>(&self, f: F)
    where
        F: FnOnce(&Coroutine, &Outcome) + Send + 'static,
    {
        self.subscribe(Box::new(f));
    }

    pub(crate) fn subscribe(&self, callback: EndCallback) {
        let mut lifecycle = self.shared.lifecycle();
        if let Some(outcome) = lifecycle.outcome.clone() {
            drop(lifecycle);
            // Replay for late subscribers.
            callback(self, &outcome);
        } else {
            lifecycle.subscribers.push(callback);
        }
    }

    /// Wait asynchronously for the terminal outcome.
    ///
    /// Resolves immediately if the coroutine already settled.
    pub async fn terminated(&self) -> Outcome {
        let mut ended_rx = self.shared.ended_tx.subscribe();
        let settled = ended_rx
            .wait_for(|outcome| outcome.is_some())
            .await
            .expect("termination channel sender lives in the coroutine's shared state");
        settled
            .as_ref()
            .cloned()
            .expect("wait_for only returns a settled outcome")
    }

    /// Block the calling thread until the coroutine settles.
    ///
    /// Returns `true` once a terminal outcome was reached. If `external` is
    /// given and fires first, returns `false` without affecting the
    /// coroutine (best-effort wait, not a cancellation). Never blocks if the
    /// coroutine already settled. Intended for threads outside the tokio
    /// runtime.
    pub fn wait(&self, external: Option<&CancellationToken>) -> bool {
        self.shared.gate.wait(external)
    }

    /* ===================== Accessors ===================== */

    /// Whether no terminal outcome has been settled yet.
    pub fn is_running(&self) -> bool {
        self.shared.lifecycle().outcome.is_none()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.shared.lifecycle().outcome, Some(Outcome::Completed))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.shared.lifecycle().outcome, Some(Outcome::Cancelled))
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.shared.lifecycle().outcome, Some(Outcome::Faulted(_)))
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lifecycle().disposed
    }

    /// The terminal outcome, if settled.
    pub fn outcome(&self) -> Option<Outcome> {
        self.shared.lifecycle().outcome.clone()
    }

    /// A child of the coroutine's cancellation signal.
    ///
    /// Step code can pass this to other cancellable operations it performs;
    /// it fires when the coroutine is cancelled or disposed, but cancelling
    /// it does not raise the coroutine's own signal.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel_token.child_token()
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.shared.lifecycle();
        f.debug_struct("Coroutine")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("outcome", &lifecycle.outcome)
            .field("disposed", &lifecycle.disposed)
            .finish()
    }
}
