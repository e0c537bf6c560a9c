//! Frame-stack driver tests: nesting, suspension, and cancellation at
//! suspension points.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::helpers::{init_tracing, Counted};
use crate::coroutine::Coroutine;
use crate::types::{Outcome, Step, StepSequence};

/* ===================== Nesting ===================== */

#[tokio::test(start_paused = true)]
async fn nested_delegation_runs_both_sleeps() {
    init_tracing();
    let started = tokio::time::Instant::now();
    let (nested, nested_pulls) = Counted::new(vec![Step::Sleep(Duration::from_secs(1))]);
    let (outer, outer_pulls) = Counted::new(vec![
        Step::Sleep(Duration::from_secs(2)),
        Step::Call(nested.boxed()),
    ]);
    let co = Coroutine::start(move |_| outer.boxed());

    assert_eq!(co.terminated().await, Outcome::Completed);
    // suspend 2s, then 1s inside the nested frame
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(outer_pulls.load(Ordering::SeqCst), 3);
    assert_eq!(nested_pulls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn nested_exhaustion_returns_control_to_parent() {
    let (nested, nested_pulls) = Counted::new(vec![]);
    let (outer, outer_pulls) = Counted::new(vec![
        Step::Call(nested.boxed()),
        Step::Pass,
        Step::Sleep(Duration::from_millis(10)),
    ]);
    let co = Coroutine::start(move |_| outer.boxed());

    assert_eq!(co.terminated().await, Outcome::Completed);
    assert_eq!(nested_pulls.load(Ordering::SeqCst), 1);
    // the parent kept pulling after the nested frame ended
    assert_eq!(outer_pulls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn nested_sequence_from_a_plain_vec() {
    let started = tokio::time::Instant::now();
    let (outer, _) = Counted::new(vec![Step::call(vec![Step::Sleep(
        Duration::from_secs(1),
    )])]);
    let co = Coroutine::start(move |_| outer.boxed());

    assert_eq!(co.terminated().await, Outcome::Completed);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn cancel_from_nested_frame_unwinds_the_whole_stack() {
    let outer_pulls = Arc::new(AtomicUsize::new(0));
    let nested_pulls = Arc::new(AtomicUsize::new(0));
    let (outer_seen, nested_seen) = (outer_pulls.clone(), nested_pulls.clone());

    let co = Coroutine::start(move |handle| {
        let nested = Box::new(std::iter::from_fn(move || {
            nested_seen.fetch_add(1, Ordering::SeqCst);
            // cancels the entire stack, not just this frame
            handle.cancel();
            Some(Step::Pass)
        })) as StepSequence;
        let mut queued =
            vec![Step::Call(nested), Step::Sleep(Duration::from_secs(1))].into_iter();
        Box::new(std::iter::from_fn(move || {
            outer_seen.fetch_add(1, Ordering::SeqCst);
            queued.next()
        })) as StepSequence
    });

    assert_eq!(co.terminated().await, Outcome::Cancelled);
    assert_eq!(nested_pulls.load(Ordering::SeqCst), 1);
    assert_eq!(outer_pulls.load(Ordering::SeqCst), 1);
}

/* ===================== Suspension ===================== */

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_a_pending_sleep() {
    let started = tokio::time::Instant::now();
    let (steps, pulls) = Counted::new(vec![Step::Sleep(Duration::from_secs(5)), Step::Pass]);
    let co = Coroutine::start(move |_| steps.boxed());

    tokio::time::sleep(Duration::from_secs(1)).await;
    co.cancel();

    assert_eq!(co.terminated().await, Outcome::Cancelled);
    // the suspension aborted instead of running its full duration
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(pulls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn unrecognized_steps_are_skipped() {
    let (steps, pulls) = Counted::new(vec![Step::Pass, Step::Pass]);
    let co = Coroutine::start(move |_| steps.boxed());

    assert_eq!(co.terminated().await, Outcome::Completed);
    assert_eq!(pulls.load(Ordering::SeqCst), 3);
}
