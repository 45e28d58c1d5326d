// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The `AsyncWait` wrapper (C5): a blocking cross-thread call with a timeout, the heart of the
//! cross-thread invocation core (§4.3 of the design).
//!
//! Unlike the async (C4) wrapper, `AsyncWait` is its own type rather than another `Callable`: it
//! carries extra per-call state (the timeout, and the success flag queried after a call
//! completes) that doesn't fit the plain `(Args) -> Ret` shape a `Callable` exposes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::async_fire::dispatcher_address;
use crate::callable::Callable;
use crate::dispatcher::Dispatcher;
use crate::envelope::{ControlBlock, WaitEnvelope};
use crate::error::Result;

/// A blocking, cross-thread call with a timeout and an abandonment protocol (component C5).
///
/// [`AsyncWait::invoke`] posts the wrapped target to the target dispatcher's thread and blocks
/// the caller on a control block shared with the envelope, up to `timeout`. If the callee
/// finishes first, the caller wakes with its return value. If the timeout elapses first, the
/// caller gives up (the control block is marked abandoned) and the envelope, when it eventually
/// runs, skips the invocation entirely rather than writing into a return slot nobody is waiting
/// on (invariant I8).
///
/// `timeout = Duration::ZERO` means "no wait, succeed only if the callee has already run";
/// `timeout = Duration::MAX` means "wait forever."
pub struct AsyncWait<Args, Ret> {
    target: Callable<Args, Ret>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    timeout: Duration,
    successful: AtomicBool,
}

impl<Args, Ret> fmt::Debug for AsyncWait<Args, Ret> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncWait")
            .field("timeout", &self.timeout)
            .field("successful", &self.successful.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<Args, Ret> AsyncWait<Args, Ret>
where
    Args: Send + 'static,
    Ret: Default + Send + 'static,
{
    pub(crate) fn new(target: Callable<Args, Ret>, dispatcher: Option<Arc<dyn Dispatcher>>, timeout: Duration) -> Self {
        Self { target, dispatcher, timeout, successful: AtomicBool::new(false) }
    }

    /// Invokes the target, blocking the caller up to this wrapper's timeout.
    ///
    /// Returns the callee's return value on success, or `Ret::default()` if the call timed out
    /// (query [`AsyncWait::was_successful`] to tell the two apart). An inner-callable error
    /// (only possible if the wrapped callable is itself empty) and a dispatcher rejection both
    /// propagate as `Err`; a panic inside the callee is caught and re-raised here if the waiter
    /// is still present when it happens.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] if the wrapped callable has no bound target, or
    /// [`crate::Error::DispatchRejected`] if the dispatcher refused the envelope.
    pub fn invoke(&self, args: Args) -> Result<Ret> {
        let Some(dispatcher) = &self.dispatcher else {
            let ret = self.target.invoke(args)?;
            self.successful.store(true, Ordering::SeqCst);
            return Ok(ret);
        };

        let control = Arc::new(ControlBlock::new());
        let envelope =
            WaitEnvelope { target: self.target.clone(), args, control: Arc::clone(&control) };
        dispatcher.dispatch(Box::new(envelope))?;

        let (result, successful) = control.wait(self.timeout);
        self.successful.store(successful, Ordering::SeqCst);
        Ok(result?.unwrap_or_default())
    }

    /// Reports whether the most recent call to [`AsyncWait::invoke`] actually ran the inner
    /// callable to completion, as opposed to timing out.
    #[must_use]
    pub fn was_successful(&self) -> bool {
        self.successful.load(Ordering::SeqCst)
    }
}

impl<Args, Ret> PartialEq for AsyncWait<Args, Ret> {
    fn eq(&self, other: &Self) -> bool {
        let same_dispatcher = match (&self.dispatcher, &other.dispatcher) {
            (None, None) => true,
            (Some(a), Some(b)) => dispatcher_address(a) == dispatcher_address(b),
            _ => false,
        };
        same_dispatcher && self.target == other.target
    }
}

impl<Args, Ret> Callable<Args, Ret>
where
    Args: Send + 'static,
    Ret: Default + Send + 'static,
{
    /// Wraps this callable so that invoking the result blocks the caller, up to `timeout`, for
    /// the target to run on `dispatcher`'s thread and return a value.
    ///
    /// `dispatcher` accepts `None` (or any `impl Into<Option<_>>`, including a bare
    /// `Arc<dyn Dispatcher>`): per transition 1.a of §4.3, a wrapper built with no dispatcher
    /// invokes inline and returns immediately, never allocating a control block.
    #[must_use]
    pub fn into_async_wait(
        self,
        dispatcher: impl Into<Option<Arc<dyn Dispatcher>>>,
        timeout: Duration,
    ) -> AsyncWait<Args, Ret> {
        AsyncWait::new(self, dispatcher.into(), timeout)
    }
}
