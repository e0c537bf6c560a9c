//! Start-time configuration for a coroutine.

use crate::coroutine::{Coroutine, EndCallback};
use crate::types::Outcome;

/// Options for starting a coroutine.
///
/// Consuming builder; pass the result to [`Coroutine::start_with`].
pub struct StartOptions {
    pub(crate) auto_dispose: bool,
    pub(crate) name: Option<String>,
    pub(crate) on_ended: Option<EndCallback>,
}

impl StartOptions {
    /// Create options with defaults (`auto_dispose = true`, no name, no
    /// termination callback).
    pub fn new() -> Self {
        Self {
            auto_dispose: true,
            name: None,
            on_ended: None,
        }
    }

    /// Set whether the coroutine disposes itself immediately on reaching a
    /// terminal outcome.
    pub fn auto_dispose(mut self, auto: bool) -> Self {
        self.auto_dispose = auto;
        self
    }

    /// Set a label attached to this coroutine's log events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register the termination callback, invoked exactly once with the
    /// terminal outcome.
    pub fn on_ended<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Coroutine, &Outcome) + Send + 'static,
    {
        self.on_ended = Some(Box::new(f));
        self
    }
}

impl Default for StartOptions {
    fn default() -> Self {
        Self::new()
    }
}
