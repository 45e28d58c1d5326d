// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The async wrapper (C4): fire-and-forget cross-thread invocation.
//!
//! Wrapping a [`Callable`] with [`Callable::into_async`] produces a *new* `Callable<Args, ()>`
//! whose invocation packages the arguments, clones the wrapper, posts an envelope to the target
//! dispatcher, and returns immediately. Producing another `Callable` (rather than a distinct
//! wrapper type) is what lets an async-wrapped callback be stored in a [`crate::Multicast`] or
//! [`crate::Singlecast`] next to ordinary callables.

use std::sync::Arc;

use crate::callable::{Callable, Identity, Target};
use crate::dispatcher::Dispatcher;
use crate::envelope::FireEnvelope;
use crate::error::Result;

struct AsyncFireTarget<Args, Ret> {
    target: Callable<Args, Ret>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

impl<Args, Ret> Target<Args, ()> for AsyncFireTarget<Args, Ret>
where
    Args: Send + 'static,
    Ret: Send + 'static,
{
    fn call(&self, args: Args) -> Result<()> {
        let Some(dispatcher) = &self.dispatcher else {
            self.target.invoke(args)?;
            return Ok(());
        };
        let envelope = FireEnvelope { target: self.target.clone(), args };
        dispatcher.dispatch(Box::new(envelope))
    }

    fn clone_boxed(&self) -> Box<dyn Target<Args, ()>> {
        Box::new(Self { target: self.target.clone(), dispatcher: self.dispatcher.clone() })
    }

    fn identity(&self) -> Identity {
        Identity::Wrapped {
            inner: Box::new(self.target.identity()),
            dispatcher: self.dispatcher.as_ref().map_or(0, dispatcher_address),
        }
    }
}

/// A stable identity for a `dyn Dispatcher` trait object, used so two async wrappers targeting
/// the same dispatcher compare equal regardless of how many `Arc` clones separate them.
pub(crate) fn dispatcher_address(dispatcher: &Arc<dyn Dispatcher>) -> usize {
    Arc::as_ptr(dispatcher).cast::<()>() as usize
}

impl<Args, Ret> Callable<Args, Ret>
where
    Args: Send + 'static,
    Ret: Send + 'static,
{
    /// Wraps this callable so that invoking the result posts an envelope to `dispatcher` and
    /// returns immediately, discarding the original return value.
    ///
    /// `dispatcher` accepts `None` (or any `impl Into<Option<_>>`, including a bare
    /// `Arc<dyn Dispatcher>`): per §4.2 step 1, a wrapper built with no dispatcher falls through
    /// to a direct synchronous invocation on the caller's thread instead of posting an envelope.
    /// This keeps the escape hatch reachable even when the wrapped callable has already been
    /// stored somewhere generic (for example inside a [`crate::Multicast`]) and the caller can no
    /// longer reach the un-wrapped callable to invoke it directly.
    #[must_use]
    pub fn into_async(self, dispatcher: impl Into<Option<Arc<dyn Dispatcher>>>) -> Callable<Args, ()> {
        Callable::from_target(Box::new(AsyncFireTarget { target: self, dispatcher: dispatcher.into() }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::dispatcher::WorkerThreadDispatcher;

    // S1: invoking the async-wrapped callable runs the inner function on the dispatcher's
    // thread exactly once, and the caller returns immediately.
    #[test]
    fn fire_and_forget_runs_once_on_dispatcher_thread() {
        static SEEN: AtomicI32 = AtomicI32::new(0);
        fn record(n: i32) {
            SEEN.store(n, Ordering::SeqCst);
        }

        let dispatcher: Arc<dyn Dispatcher> = Arc::new(WorkerThreadDispatcher::spawn().unwrap());
        let inner: Callable<(i32,), ()> = Callable::from_fn(record as fn(i32));
        let wrapped = inner.into_async(Arc::clone(&dispatcher));

        wrapped.invoke((42,)).unwrap();

        for _ in 0..100 {
            if SEEN.load(Ordering::SeqCst) == 42 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(SEEN.load(Ordering::SeqCst), 42);
    }

    // §4.2 step 1: a wrapper built with no dispatcher runs inline, on the caller's thread,
    // instead of posting an envelope anywhere.
    #[test]
    fn no_dispatcher_runs_inline() {
        static SEEN: AtomicI32 = AtomicI32::new(0);
        fn record(n: i32) {
            SEEN.store(n, Ordering::SeqCst);
        }

        let inner: Callable<(i32,), ()> = Callable::from_fn(record as fn(i32));
        let wrapped = inner.into_async(None);

        wrapped.invoke((7,)).unwrap();
        assert_eq!(SEEN.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn dispatch_rejected_is_visible_to_caller() {
        fn noop() {}

        // Shut the dispatcher down through a concrete handle before wrapping, since
        // `Dispatcher` itself exposes no shutdown method.
        let concrete = WorkerThreadDispatcher::spawn().unwrap();
        concrete.shutdown();
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(concrete);

        let inner: Callable<(), ()> = Callable::from_fn(noop as fn());
        let wrapped = inner.into_async(dispatcher);
        assert!(matches!(wrapped.invoke(()), Err(crate::Error::DispatchRejected)));
    }

    #[test]
    fn same_dispatcher_and_target_compare_equal() {
        fn noop() {}

        let dispatcher: Arc<dyn Dispatcher> = Arc::new(WorkerThreadDispatcher::spawn().unwrap());
        let inner: Callable<(), ()> = Callable::from_fn(noop as fn());
        let a = inner.clone().into_async(Arc::clone(&dispatcher));
        let b = inner.into_async(dispatcher);
        assert_eq!(a, b);
    }

    // An empty target that reaches the dispatcher's loop thread logs its failure (rather than
    // panicking) and still completes normally - there is nowhere else to report it, since the
    // caller that dispatched the envelope has already returned.
    #[test]
    fn empty_target_is_logged_and_does_not_panic_the_worker_thread() {
        let dispatcher = WorkerThreadDispatcher::spawn().unwrap();
        let shared: Arc<dyn Dispatcher> = Arc::new(dispatcher);
        let inner: Callable<(), ()> = Callable::empty();
        let wrapped = inner.into_async(Arc::clone(&shared));

        wrapped.invoke(()).unwrap();

        // A follow-up dispatch on the same worker thread succeeding proves the earlier failed
        // invocation did not panic or wedge the loop thread.
        static RAN: AtomicI32 = AtomicI32::new(0);
        fn mark() {
            RAN.store(1, Ordering::SeqCst);
        }
        let follow_up: Callable<(), ()> = Callable::from_fn(mark as fn());
        follow_up.into_async(shared).invoke(()).unwrap();

        for _ in 0..100 {
            if RAN.load(Ordering::SeqCst) == 1 {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("worker thread never ran the follow-up dispatch");
    }
}
