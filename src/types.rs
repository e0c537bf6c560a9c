//! Shared types: the yield vocabulary and terminal outcomes.

use std::fmt;
use std::time::Duration;

use crate::error::Fault;

/// A lazy sequence of steps, pulled one at a time by the driver.
///
/// The producer is pulled strictly sequentially, on the coroutine's worker
/// task, and never again after the coroutine leaves the Running state.
pub type StepSequence = Box<dyn Iterator<Item = Step> + Send + 'static>;

/// One value produced by a step sequence.
///
/// The driver classifies each produced value: durations suspend, nested
/// sequences delegate, and anything else is ignored. Ignoring unrecognized
/// values is part of the public contract (forward compatibility), not an
/// error — code matching on `Step` should treat unknown variants the same
/// way.
#[non_exhaustive]
pub enum Step {
    /// Suspend for at least the duration, or until cancellation fires.
    Sleep(Duration),
    /// Delegate to a nested step sequence until it is exhausted.
    Call(StepSequence),
    /// Explicitly produce nothing; the driver skips it.
    Pass,
}

impl Step {
    /// Wrap an iterator of steps as a nested delegation step.
    pub fn call<I>(steps: I) -> Step
    where
        I: IntoIterator<Item = Step>,
        I::IntoIter: Send + 'static,
    {
        Step::Call(Box::new(steps.into_iter()))
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Sleep(d) => f.debug_tuple("Sleep").field(d).finish(),
            Step::Call(_) => f.write_str("Call(..)"),
            Step::Pass => f.write_str("Pass"),
        }
    }
}

/// Terminal outcome of a coroutine.
///
/// Exactly one outcome is ever settled per coroutine; the disposed bit is
/// tracked separately and can combine with any of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The outermost step sequence was exhausted while still running.
    Completed,
    /// `cancel()` won, or disposal forced an implicit cancel.
    Cancelled,
    /// A failure escaped the step producer.
    Faulted(Fault),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Outcome::Faulted(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed => f.write_str("completed"),
            Outcome::Cancelled => f.write_str("cancelled"),
            Outcome::Faulted(fault) => write!(f, "faulted: {fault}"),
        }
    }
}
