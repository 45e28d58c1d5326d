// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The thread-safe multicast container (C7): a [`crate::Multicast`] guarded so that registration
//! changes and invocation never interleave.
//!
//! Plain `Multicast` assumes single-threaded access to its target list; `SafeMulticast` is the
//! variant used when subscribers are added, removed, and invoked from different threads. The
//! mutex is held for the whole of `invoke`, so an observer calling in from another thread always
//! sees either the list before a concurrent `add`/`remove` or the list after it, never a partial
//! view (invariant, property P9 of the design).

use std::sync::{Mutex, PoisonError};

use crate::callable::Callable;
use crate::error::Result;
use crate::multicast::Multicast;

/// A [`Multicast`] guarded by a mutex so concurrent registration and invocation never race
/// (component C7).
pub struct SafeMulticast<Args, Ret = ()> {
    inner: Mutex<Multicast<Args, Ret>>,
}

impl<Args, Ret> Default for SafeMulticast<Args, Ret> {
    fn default() -> Self {
        Self { inner: Mutex::new(Multicast::new()) }
    }
}

impl<Args, Ret> SafeMulticast<Args, Ret> {
    /// Creates an empty, thread-safe multicast.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `target` under the lock.
    pub fn add(&self, target: Callable<Args, Ret>) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).add(target);
    }

    /// Removes the first target equal to `target` under the lock. Returns `true` if an element
    /// was removed.
    pub fn remove(&self, target: &Callable<Args, Ret>) -> bool {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).remove(target)
    }

    /// Drops every registered target under the lock.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Reports whether no targets are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    /// The number of registered targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Invokes every registered target while holding the lock for the entire call, so the set of
    /// targets invoked is always a consistent snapshot with respect to concurrent `add`/`remove`.
    pub fn invoke(&self, args: Args) -> Vec<Result<Ret>>
    where
        Args: Clone,
    {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).invoke(args)
    }
}

impl<Args, Ret> std::ops::AddAssign<Callable<Args, Ret>> for SafeMulticast<Args, Ret> {
    fn add_assign(&mut self, target: Callable<Args, Ret>) {
        self.add(target);
    }
}

impl<Args, Ret> std::ops::SubAssign<&Callable<Args, Ret>> for SafeMulticast<Args, Ret> {
    fn sub_assign(&mut self, target: &Callable<Args, Ret>) {
        self.remove(target);
    }
}

impl<Args, Ret> std::fmt::Debug for SafeMulticast<Args, Ret> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.inner.lock().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("SafeMulticast").field("len", &len).finish_non_exhaustive()
    }
}
