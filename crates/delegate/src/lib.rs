// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed, thread-aware callbacks for in-process and cross-process dispatch.
//!
//! This crate is a from-scratch Rust realization of a C++ delegate/callback library: a value
//! type that can bind a free function or a method, be cloned and compared for equality, and be
//! invoked either directly, fire-and-forget on another thread, or blocking-with-timeout on
//! another thread. Three container types ([`Multicast`], [`SafeMulticast`], [`Singlecast`]) hold
//! groups of callables, and a remote bridge ([`remote`]) extends invocation across a byte-stream
//! transport.
//!
//! # Core types
//!
//! - [`Callable`] (C1) - a polymorphic, cloneable, equality-comparable function value. Binds a
//!   free function ([`Callable::from_fn`]), a method on an owner reached through a raw pointer
//!   ([`Callable::from_method`]), or a method on an `Arc`-owned owner
//!   ([`Callable::from_shared_method`]).
//! - [`Dispatcher`] (C3) - the single capability the cross-thread wrappers need: a place to post
//!   work that will run on some other thread. [`WorkerThreadDispatcher`] is the reference
//!   implementation this crate ships.
//! - [`Callable::into_async`] (C4) wraps a callable so that invoking it posts the call to a
//!   dispatcher and returns immediately.
//! - [`Callable::into_async_wait`] / [`AsyncWait`] (C5) wraps a callable so that invoking it
//!   blocks the caller, up to a timeout, for the call to run on a dispatcher's thread and
//!   produce a value.
//! - [`Multicast`] (C6), [`SafeMulticast`] (C7), and [`Singlecast`] (C8) - containers of
//!   callables, the thread-safe variant of the first guarding its target list with a mutex.
//! - [`remote`] (C9) - sending a call across a byte-stream transport, and routing an inbound
//!   stream back to a locally registered callable.
//!
//! # Errors and logging
//!
//! Fallible operations return [`Result`]/[`Error`], a plain [`thiserror`]-derived enum; there is
//! no dedicated error-handling framework here. Dispatch points log via [`tracing`] rather than
//! returning diagnostics the caller has no way to consume (for instance, a fire-and-forget
//! invocation failure has nowhere to report to but the trace log, since the caller has already
//! returned).

#![cfg_attr(docsrs, feature(doc_cfg))]

mod arity;
mod async_fire;
mod async_wait;
mod callable;
mod copy_policy;
mod dispatcher;
mod envelope;
mod error;
mod multicast;
pub mod remote;
mod safe_multicast;
mod singlecast;
#[cfg(test)]
mod test_support;

pub use async_wait::AsyncWait;
pub use callable::Callable;
pub use copy_policy::NoCopy;
pub use dispatcher::{Dispatcher, WorkerThreadDispatcher, WorkerThreadDispatcherBuilder};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use multicast::Multicast;
pub use safe_multicast::SafeMulticast;
pub use singlecast::Singlecast;
