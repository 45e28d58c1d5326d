// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The singlecast slot (C8): at most one registered callable, the simplest of the containers.
//!
//! Assigning a new target replaces whatever was previously bound rather than erroring or
//! appending to it - matching a single-subscriber "latest wins" registration rather than the
//! queue-like semantics of [`crate::Multicast`].

use crate::callable::Callable;
use crate::error::{Error, Result};

/// A single optional callable slot, re-assignable at any time (component C8).
pub struct Singlecast<Args, Ret = ()> {
    target: Option<Callable<Args, Ret>>,
}

impl<Args, Ret> Default for Singlecast<Args, Ret> {
    fn default() -> Self {
        Self { target: None }
    }
}

impl<Args, Ret> Singlecast<Args, Ret> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `target`, replacing (and dropping) whatever was previously bound.
    pub fn set(&mut self, target: Callable<Args, Ret>) {
        self.target = Some(target);
    }

    /// Unbinds the slot, if anything was bound.
    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Reports whether a target is currently bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.target.is_some()
    }

    /// Invokes the bound target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] if nothing is currently bound.
    pub fn invoke(&self, args: Args) -> Result<Ret> {
        match &self.target {
            Some(target) => target.invoke(args),
            None => Err(Error::Empty),
        }
    }
}

impl<Args, Ret> std::fmt::Debug for Singlecast<Args, Ret> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Singlecast").field("bound", &self.is_bound()).finish_non_exhaustive()
    }
}
