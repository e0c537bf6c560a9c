pub mod coroutine;
pub mod error;
pub mod options;
pub mod types;

// Re-export main types
pub use coroutine::Coroutine;
pub use error::Fault;
pub use options::StartOptions;
pub use types::{Outcome, Step, StepSequence};
