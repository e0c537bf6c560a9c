//! Frame-stack driver.
//!
//! Drives one step producer to exhaustion, recursing into a nested producer
//! when one is yielded and returning control to the outer frame when the
//! nested one exhausts. Recursion depth equals delegation depth.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;

use super::Coroutine;
use crate::error::Fault;
use crate::types::{Step, StepSequence};

/// How one frame ended.
enum FrameEnd {
    /// The frame's producer ran out of steps; control returns to the parent
    /// frame (or the engine, for the outermost frame).
    Exhausted,
    /// Cancellation was observed; every frame unwinds without further pulls.
    /// The terminal transition already happened on the cancelling thread.
    Interrupted,
    /// A failure escaped a pull; every frame unwinds and the coroutine
    /// faults.
    Faulted(Fault),
}

/// Entry point for the worker task spawned by `Coroutine::start_with`.
pub(super) async fn run<F>(coroutine: Coroutine, factory: F)
where
    F: FnOnce(Coroutine) -> StepSequence + Send + 'static,
{
    // The factory runs on the worker; a panic here is a user step failure
    // like any other.
    let steps = match catch_unwind(AssertUnwindSafe(|| factory(coroutine.clone()))) {
        Ok(steps) => steps,
        Err(payload) => {
            coroutine.fault(Fault::from_panic(payload));
            return;
        }
    };

    match drive_frame(&coroutine, steps).await {
        FrameEnd::Exhausted => coroutine.complete(),
        FrameEnd::Interrupted => {}
        FrameEnd::Faulted(fault) => coroutine.fault(fault),
    }
}

/// Drive one frame until it ends.
///
/// `Box::pin` for async recursion.
fn drive_frame<'a>(
    coroutine: &'a Coroutine,
    mut steps: StepSequence,
) -> Pin<Box<dyn Future<Output = FrameEnd> + Send + 'a>> {
    Box::pin(async move {
        loop {
            // A terminal transition from any thread stops all pulling.
            if !coroutine.is_running() {
                return FrameEnd::Interrupted;
            }

            let step = match catch_unwind(AssertUnwindSafe(|| steps.next())) {
                Ok(Some(step)) => step,
                Ok(None) => {
                    // Tie-break: a signal raised before or during the final
                    // pull beats natural completion.
                    if coroutine.shared.cancel_token.is_cancelled() {
                        return FrameEnd::Interrupted;
                    }
                    return FrameEnd::Exhausted;
                }
                Err(payload) => return FrameEnd::Faulted(Fault::from_panic(payload)),
            };

            match step {
                Step::Sleep(duration) => {
                    tracing::trace!(id = coroutine.id(), ?duration, "suspending");
                    tokio::select! {
                        _ = coroutine.shared.cancel_token.cancelled() => {
                            // The pending wait is abandoned and the producer
                            // is never resumed.
                            return FrameEnd::Interrupted;
                        }
                        _ = tokio::time::sleep(duration) => {}
                    }
                }
                Step::Call(nested) => {
                    tracing::trace!(id = coroutine.id(), "entering nested frame");
                    match drive_frame(coroutine, nested).await {
                        // Nested exhaustion ends only that frame; this frame
                        // resumes pulling its own steps.
                        FrameEnd::Exhausted => {}
                        end => return end,
                    }
                }
                // Everything else is ignored by contract.
                _ => {}
            }
        }
    })
}
