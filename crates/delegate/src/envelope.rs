// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The message envelope (C2) and the `AsyncWait` control block (part of C5).
//!
//! An envelope is a heap-allocated value carrying a cloned [`crate::Callable`] plus an owned
//! argument tuple across a [`crate::Dispatcher`]'s queue. `Args` being an owned tuple, freed
//! exactly once by ordinary `Drop`, is how invariant I1 (every envelope owns exactly one
//! callable clone and one argument tuple, both freed exactly once on every exit path) falls out
//! of the type system rather than needing to be coded by hand.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::callable::Callable;
use crate::error::Error;

/// A heap-allocated unit of work a [`crate::Dispatcher`] runs on its loop thread exactly once.
///
/// Object-safe by construction: `run` takes `Box<Self>` so the dispatcher can own a
/// `Box<dyn Envelope>` without knowing the concrete argument/return types underneath.
pub trait Envelope: Send {
    /// Runs the envelope. Called by the dispatcher exactly once, on its loop thread.
    fn run(self: Box<Self>);
}

/// The envelope for a fire-and-forget (C4) invocation: invoke and discard the result.
///
/// Invocation failures (an empty inner callable) are logged rather than propagated - by the time
/// this envelope runs, the caller that dispatched it has already returned, so there is nowhere
/// to report the error to other than the trace log.
pub(crate) struct FireEnvelope<Args, Ret> {
    pub(crate) target: Callable<Args, Ret>,
    pub(crate) args: Args,
}

impl<Args, Ret> Envelope for FireEnvelope<Args, Ret>
where
    Args: Send + 'static,
    Ret: Send + 'static,
{
    fn run(self: Box<Self>) {
        if let Err(error) = self.target.invoke(self.args) {
            tracing::warn!(%error, "fire-and-forget invocation failed");
        }
    }
}

/// The three-state outcome of an `AsyncWait` (C5) call, shared between the waiter and the
/// envelope through a [`ControlBlock`].
enum Outcome<Ret> {
    /// Neither the waiter's timeout nor the callee's invocation has concluded yet.
    Pending,
    /// The callee ran to completion (successfully or not); this is the synchronous result of
    /// [`crate::Callable::invoke`].
    Ready(crate::error::Result<Ret>),
    /// The callee panicked while running; re-raised on the waiter if it is still present.
    Panicked(Box<dyn Any + Send>),
    /// The waiter gave up before the callee ran. Set either by the waiter on timeout, or by the
    /// envelope's `Drop` if it is destroyed without ever running (for example, a dispatcher
    /// shutdown that drains its queue without executing it).
    Abandoned,
}

/// The shared state machine backing one `AsyncWait` (C5) call.
///
/// Realizes the distilled spec's "mutex + semaphore + refcount" triad as `Mutex<Outcome<Ret>>` +
/// `Condvar`, shared via `Arc`. Rust's `Arc` already performs the refcount's memory-lifetime half
/// of the protocol (I3, I7); the `Outcome` enum carries the other half - the decision of whether
/// the callee must still invoke the target (I5, I8).
pub(crate) struct ControlBlock<Ret> {
    state: Mutex<Outcome<Ret>>,
    condvar: Condvar,
}

impl<Ret> ControlBlock<Ret> {
    pub(crate) fn new() -> Self {
        Self { state: Mutex::new(Outcome::Pending), condvar: Condvar::new() }
    }

    /// Blocks until the callee has run or `timeout` elapses, whichever is first.
    ///
    /// Returns `(result, successful)`. `successful` is `true` iff the callee actually ran (it may
    /// still have returned an error or panicked); it is `false` only when the wait timed out
    /// before the callee ran, in which case `result` is `Ok(None)`.
    pub(crate) fn wait(&self, timeout: Duration) -> (crate::error::Result<Option<Ret>>, bool) {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = if timeout == Duration::MAX {
            self.condvar
                .wait_while(guard, |outcome| matches!(outcome, Outcome::Pending))
                .unwrap_or_else(PoisonError::into_inner)
        } else {
            let (guard, result) = self
                .condvar
                .wait_timeout_while(guard, timeout, |outcome| matches!(outcome, Outcome::Pending))
                .unwrap_or_else(PoisonError::into_inner);
            if result.timed_out() && matches!(*guard, Outcome::Pending) {
                let mut guard = guard;
                *guard = Outcome::Abandoned;
                return (Ok(None), false);
            }
            guard
        };

        match std::mem::replace(&mut *guard, Outcome::Abandoned) {
            Outcome::Ready(Ok(ret)) => (Ok(Some(ret)), true),
            Outcome::Ready(Err(error)) => (Err(error), true),
            Outcome::Panicked(payload) => panic::resume_unwind(payload),
            // Pending is unreachable here: the loop above only exits once the predicate is
            // false. Abandoned can only be produced by this method or by the envelope's Drop,
            // neither of which runs concurrently with a second waiter (there is exactly one).
            Outcome::Pending | Outcome::Abandoned => (Ok(None), false),
        }
    }

    /// Invoked by the envelope on the dispatcher's loop thread. Runs `target` against `args`
    /// unless the waiter has already abandoned the call (I5, I8): the check and the invocation
    /// happen under the same lock, so there is no window where the waiter's abandonment and the
    /// envelope's decision to run can race. `Condvar::wait*` releases the mutex while blocked, so
    /// holding the lock across the call does not deadlock the waiter.
    pub(crate) fn run<Args>(&self, target: &Callable<Args, Ret>, args: Args) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*guard, Outcome::Abandoned) {
            tracing::debug!("waiter already abandoned the call; skipping invocation");
            return;
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| target.invoke(args))) {
            Ok(result) => Outcome::Ready(result),
            Err(payload) => Outcome::Panicked(payload),
        };
        *guard = outcome;
        drop(guard);
        self.condvar.notify_one();
    }

    /// Marks the call abandoned if it hasn't already concluded, waking a waiter that might still
    /// be blocked. Used by the envelope's `Drop` so a dispatcher that discards queued work (for
    /// example on shutdown) cannot leave a waiter blocked forever.
    fn abandon_if_pending(&self) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*guard, Outcome::Pending) {
            *guard = Outcome::Abandoned;
            drop(guard);
            self.condvar.notify_one();
        }
    }
}

/// The envelope for an `AsyncWait` (C5) invocation.
pub(crate) struct WaitEnvelope<Args, Ret> {
    pub(crate) target: Callable<Args, Ret>,
    pub(crate) args: Args,
    pub(crate) control: std::sync::Arc<ControlBlock<Ret>>,
}

impl<Args, Ret> Envelope for WaitEnvelope<Args, Ret>
where
    Args: Send + 'static,
    Ret: Send + 'static,
{
    fn run(self: Box<Self>) {
        self.control.run(&self.target, self.args);
    }
}

impl<Args, Ret> Drop for WaitEnvelope<Args, Ret> {
    fn drop(&mut self) {
        self.control.abandon_if_pending();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn fire_envelope_invokes_target() {
        fn add(a: i32, b: i32) -> i32 {
            a + b
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let target: Callable<(i32, i32), i32> = Callable::from_fn(add as fn(i32, i32) -> i32);
        let envelope: Box<dyn Envelope> =
            Box::new(FireEnvelope { target: target.clone(), args: (2, 3) });
        std::thread::spawn(move || {
            envelope.run();
            tx.send(()).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    // P5: the inner callable runs at most once; a pending control block runs it exactly once.
    #[test]
    fn control_block_runs_when_pending() {
        fn double(n: i32) -> i32 {
            n * 2
        }

        let control = Arc::new(ControlBlock::<i32>::new());
        let target: Callable<(i32,), i32> = Callable::from_fn(double as fn(i32) -> i32);
        control.run(&target, (21,));
        let (result, successful) = control.wait(Duration::from_secs(5));
        assert!(successful);
        assert_eq!(result.unwrap(), Some(42));
    }

    // P7: if `wait` times out and the envelope subsequently runs, the inner callable is NOT
    // invoked.
    #[test]
    fn abandoned_call_is_never_invoked() {
        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let control = Arc::new(ControlBlock::<i32>::new());

        // Time out the wait before anything runs.
        let (result, successful) = control.wait(Duration::from_millis(20));
        assert!(!successful);
        assert_eq!(result.unwrap(), None);

        let invoked_clone = Arc::clone(&invoked);
        let owner = invoked_clone;
        struct Checker(Arc<std::sync::atomic::AtomicBool>);
        impl Checker {
            fn mark(&self, _n: i32) -> i32 {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
                0
            }
        }
        let checker = Arc::new(Checker(owner));
        let target: Callable<(i32,), i32> =
            Callable::from_shared_method(checker, Checker::mark as fn(&Checker, i32) -> i32);

        control.run(&target, (1,));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }

    // P6: the control block is torn down by exactly one party - here the waiter's `Arc` and the
    // dropped envelope's `Arc` are the only two owners, and the block's `Drop` (via `Arc`) runs
    // exactly once regardless of which side lets go last.
    #[test]
    fn dropping_unrun_wait_envelope_unblocks_waiter() {
        crate::test_support::execute_or_abandon(|| {
            let control = Arc::new(ControlBlock::<i32>::new());
            let target: Callable<(i32,), i32> = Callable::empty();
            let envelope =
                Box::new(WaitEnvelope { target, args: (1,), control: Arc::clone(&control) });

            let waiter_control = Arc::clone(&control);
            let handle =
                std::thread::spawn(move || waiter_control.wait(Duration::from_secs(30)));
            std::thread::sleep(Duration::from_millis(50));
            drop(envelope);

            let (result, successful) = handle.join().unwrap();
            assert!(!successful);
            assert_eq!(result.unwrap(), None);
        });
    }
}
