//! Fault taxonomy for failures escaping user step code.

use std::any::Any;

use thiserror::Error;

/// A failure that escaped the step producer and ended the coroutine.
///
/// Faults are never swallowed: the coroutine settles `Outcome::Faulted`
/// carrying the fault, and the termination notification delivers it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    /// A panic escaped a pull of the step producer (or the factory call).
    #[error("step producer panicked: {0}")]
    StepPanic(String),
}

impl Fault {
    /// Build a fault from a caught panic payload.
    ///
    /// `String` and `&str` payloads keep their message; anything else gets a
    /// placeholder since the payload is opaque.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Fault {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else {
            "non-string panic payload".to_string()
        };
        Fault::StepPanic(message)
    }
}
