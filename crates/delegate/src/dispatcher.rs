// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The dispatcher port (C3): the abstract capability the cross-thread invocation core requires,
//! plus one reference implementation the crate ships so it (and callers without an existing
//! thread/executor abstraction) has something concrete to dispatch to.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::envelope::Envelope;
use crate::error::{Error, Result};

/// A per-thread FIFO of envelopes, drained on that thread.
///
/// `dispatch` must be callable from any thread and must not block beyond a bounded time; it
/// reports `DispatchRejected` rather than blocking indefinitely or panicking when the dispatcher
/// is shut down or its queue is full.
///
/// This is the only collaborator the cross-thread invocation core (C4, C5) requires; application
/// code may implement it against an existing executor or message loop instead of using
/// [`WorkerThreadDispatcher`].
pub trait Dispatcher: Send + Sync {
    /// Enqueues `envelope` to be run once on this dispatcher's thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DispatchRejected`] if the dispatcher has shut down or its queue (if
    /// bounded) is full. On error, the envelope is returned to the caller by being dropped
    /// without having run.
    fn dispatch(&self, envelope: Box<dyn Envelope>) -> Result<()>;
}

struct Shared {
    queue: Mutex<VecDeque<Box<dyn Envelope>>>,
    condvar: Condvar,
    shutdown: AtomicBool,
    capacity: Option<usize>,
}

/// A reference [`Dispatcher`] implementation: a dedicated OS thread draining a FIFO queue.
///
/// Modeled on an ordinary worker-thread message loop: `dispatch` pushes onto a mutex-guarded
/// `VecDeque` and wakes the loop thread via a condvar; the loop thread pops and runs envelopes
/// one at a time, in enqueue order.
pub struct WorkerThreadDispatcher {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WorkerThreadDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThreadDispatcher")
            .field("shutdown", &self.shared.shutdown.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Builder for [`WorkerThreadDispatcher`]: queue capacity and thread name, the only
/// configuration surface this crate exposes (it has no persistent configuration file).
#[derive(Debug, Clone)]
pub struct WorkerThreadDispatcherBuilder {
    name: String,
    capacity: Option<usize>,
}

impl Default for WorkerThreadDispatcherBuilder {
    fn default() -> Self {
        Self { name: "delegate-worker".to_owned(), capacity: None }
    }
}

impl WorkerThreadDispatcherBuilder {
    /// Sets the OS thread name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bounds the queue to at most `capacity` pending envelopes; `dispatch` rejects further
    /// envelopes once the bound is reached. Unbounded by default.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Spawns the loop thread and returns the running dispatcher.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`std::io::Error`] if the OS thread could not be spawned.
    pub fn spawn(self) -> std::io::Result<WorkerThreadDispatcher> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
            capacity: self.capacity,
        });

        let loop_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new().name(self.name).spawn(move || run_loop(&loop_shared))?;

        Ok(WorkerThreadDispatcher { shared, handle: Mutex::new(Some(handle)) })
    }
}

fn run_loop(shared: &Arc<Shared>) {
    loop {
        let mut queue = shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
        while queue.is_empty() && !shared.shutdown.load(Ordering::Acquire) {
            queue = shared.condvar.wait(queue).unwrap_or_else(PoisonError::into_inner);
        }

        if shared.shutdown.load(Ordering::Acquire) {
            let dropped = queue.len();
            queue.clear();
            drop(queue);
            if dropped > 0 {
                tracing::debug!(dropped, "dispatcher shut down with envelopes still queued");
            }
            return;
        }

        let envelope = queue.pop_front();
        drop(queue);
        if let Some(envelope) = envelope {
            envelope.run();
        }
    }
}

impl WorkerThreadDispatcher {
    /// Starts building a dispatcher with the default name and an unbounded queue.
    #[must_use]
    pub fn builder() -> WorkerThreadDispatcherBuilder {
        WorkerThreadDispatcherBuilder::default()
    }

    /// Spawns a dispatcher with the default name and an unbounded queue.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`std::io::Error`] if the OS thread could not be spawned.
    pub fn spawn() -> std::io::Result<Self> {
        Self::builder().spawn()
    }

    /// Stops accepting new envelopes and joins the loop thread.
    ///
    /// Any envelope still queued at this point is dropped without running - draining, not
    /// flushing. Idempotent: calling this more than once (or dropping the dispatcher afterward)
    /// has no further effect.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.condvar.notify_all();
        if let Some(handle) = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = handle.join();
        }
    }

    /// The number of envelopes currently queued and not yet run.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Dispatcher for WorkerThreadDispatcher {
    fn dispatch(&self, envelope: Box<dyn Envelope>) -> Result<()> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(Error::DispatchRejected);
        }

        let mut queue = self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(capacity) = self.shared.capacity {
            if queue.len() >= capacity {
                return Err(Error::DispatchRejected);
            }
        }
        queue.push_back(envelope);
        drop(queue);
        self.shared.condvar.notify_one();
        tracing::trace!("envelope enqueued");
        Ok(())
    }
}

impl Drop for WorkerThreadDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::envelope::FireEnvelope;
    use crate::Callable;

    #[test]
    fn runs_envelopes_in_fifo_order() {
        let dispatcher = WorkerThreadDispatcher::spawn().unwrap();
        let order: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            struct Recorder(Arc<Mutex<Vec<i32>>>);
            impl Recorder {
                fn record(&self, n: i32) {
                    self.0.lock().unwrap().push(n);
                }
            }
            let target: Callable<(i32,), ()> = Callable::from_shared_method(
                Arc::new(Recorder(order)),
                Recorder::record as fn(&Recorder, i32),
            );
            dispatcher.dispatch(Box::new(FireEnvelope { target, args: (i,) })).unwrap();
        }

        // Give the worker thread a bounded amount of time to drain.
        for _ in 0..100 {
            if order.lock().unwrap().len() == 5 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn shutdown_rejects_new_dispatches() {
        let dispatcher = WorkerThreadDispatcher::spawn().unwrap();
        dispatcher.shutdown();

        fn noop() {}
        let target: Callable<(), ()> = Callable::from_fn(noop as fn());
        let result = dispatcher.dispatch(Box::new(FireEnvelope { target, args: () }));
        assert!(matches!(result, Err(Error::DispatchRejected)));
    }

    #[test]
    fn bounded_capacity_rejects_when_full() {
        let dispatcher = WorkerThreadDispatcherBuilder::default().capacity(1).name("bounded").spawn().unwrap();
        // Fill and immediately shut down so the loop thread cannot drain between dispatches in
        // a way that would make this test flaky.
        dispatcher.shutdown();
        fn noop() {}
        let target: Callable<(), ()> = Callable::from_fn(noop as fn());
        let result = dispatcher.dispatch(Box::new(FireEnvelope { target, args: () }));
        assert!(matches!(result, Err(Error::DispatchRejected)));
    }
}
