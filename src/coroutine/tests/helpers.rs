//! Shared test helpers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::{Step, StepSequence};

/// Install a fmt subscriber honoring `RUST_LOG`; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Step producer that counts its pulls, optionally panicking at a chosen
/// pull to simulate a failure escaping user step code.
pub struct Counted {
    steps: std::vec::IntoIter<Step>,
    pulls: Arc<AtomicUsize>,
    panic_on_pull: Option<usize>,
}

impl Counted {
    pub fn new(steps: Vec<Step>) -> (Self, Arc<AtomicUsize>) {
        let pulls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                steps: steps.into_iter(),
                pulls: pulls.clone(),
                panic_on_pull: None,
            },
            pulls,
        )
    }

    pub fn panicking_at(steps: Vec<Step>, pull: usize) -> (Self, Arc<AtomicUsize>) {
        let (mut counted, pulls) = Self::new(steps);
        counted.panic_on_pull = Some(pull);
        (counted, pulls)
    }

    pub fn boxed(self) -> StepSequence {
        Box::new(self)
    }
}

impl Iterator for Counted {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        let pull = self.pulls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on_pull == Some(pull) {
            panic!("boom on pull {pull}");
        }
        self.steps.next()
    }
}
