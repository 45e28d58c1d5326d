// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The multicast container (C6): an ordered list of callables invoked together.
//!
//! `Multicast` is not itself a `Callable` - a fan-out over `N` targets naturally produces `N`
//! results, which doesn't fit a single `(Args) -> Ret` shape. [`Multicast::invoke`] instead
//! returns one result per registered target, in registration order, and keeps invoking the rest
//! even if an earlier one errors (the "continue and collect" policy): a single misbehaving
//! subscriber must never prevent its siblings from being notified.

use crate::callable::Callable;
use crate::error::Result;

/// An ordered collection of callables invoked together, each call producing one result per
/// registered target (component C6).
///
/// Equality-based [`Multicast::remove`] relies on [`Callable`]'s `PartialEq`, so the same
/// function pointer, or the same (owner, method) pair, used to register a target is also what
/// identifies it for removal later - no handle or token needed.
pub struct Multicast<Args, Ret = ()> {
    targets: Vec<Callable<Args, Ret>>,
}

impl<Args, Ret> Default for Multicast<Args, Ret> {
    fn default() -> Self {
        Self { targets: Vec::new() }
    }
}

impl<Args, Ret> Multicast<Args, Ret> {
    /// Creates an empty multicast.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `target`, keeping the targets already present.
    pub fn add(&mut self, target: Callable<Args, Ret>) {
        self.targets.push(target);
    }

    /// Removes the first target equal to `target`, leaving any later duplicate registration of
    /// the same callable in place. Returns `true` if an element was removed.
    pub fn remove(&mut self, target: &Callable<Args, Ret>) -> bool {
        let Some(position) = self.targets.iter().position(|t| t == target) else {
            return false;
        };
        self.targets.remove(position);
        true
    }

    /// Drops every registered target.
    pub fn clear(&mut self) {
        self.targets.clear();
    }

    /// Reports whether no targets are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// The number of registered targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Invokes every registered target in registration order, cloning `args` for each.
    ///
    /// Every target runs regardless of whether an earlier one returned an error; the returned
    /// vector has exactly one entry per registered target, in registration order, so callers can
    /// tell which target produced which result (or error).
    pub fn invoke(&self, args: Args) -> Vec<Result<Ret>>
    where
        Args: Clone,
    {
        let Some((last, rest)) = self.targets.split_last() else {
            return Vec::new();
        };
        let mut results: Vec<Result<Ret>> =
            rest.iter().map(|target| target.invoke(args.clone())).collect();
        results.push(last.invoke(args));
        for (index, result) in results.iter().enumerate() {
            if let Err(error) = result {
                tracing::warn!(index, %error, "multicast target failed");
            }
        }
        results
    }
}

impl<Args, Ret> std::ops::AddAssign<Callable<Args, Ret>> for Multicast<Args, Ret> {
    fn add_assign(&mut self, target: Callable<Args, Ret>) {
        self.add(target);
    }
}

impl<Args, Ret> std::ops::SubAssign<&Callable<Args, Ret>> for Multicast<Args, Ret> {
    fn sub_assign(&mut self, target: &Callable<Args, Ret>) {
        self.remove(target);
    }
}

impl<Args, Ret> std::fmt::Debug for Multicast<Args, Ret> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multicast").field("len", &self.targets.len()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;

    #[test]
    fn empty_multicast_invokes_nothing() {
        let multicast: Multicast<(i32,), ()> = Multicast::new();
        assert!(multicast.invoke((1,)).is_empty());
    }

    // P3: every registered target is invoked exactly once per call, in registration order.
    #[test]
    fn invokes_all_targets_in_order() {
        static SEEN: [AtomicI32; 3] = [AtomicI32::new(0), AtomicI32::new(0), AtomicI32::new(0)];
        fn mark0() {
            SEEN[0].store(1, Ordering::SeqCst);
        }
        fn mark1() {
            SEEN[1].store(1, Ordering::SeqCst);
        }
        fn mark2() {
            SEEN[2].store(1, Ordering::SeqCst);
        }

        let mut multicast: Multicast<(), ()> = Multicast::new();
        multicast.add(Callable::from_fn(mark0 as fn()));
        multicast.add(Callable::from_fn(mark1 as fn()));
        multicast.add(Callable::from_fn(mark2 as fn()));

        let results = multicast.invoke(());
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(Result::is_ok));
        assert!(SEEN.iter().all(|s| s.load(Ordering::SeqCst) == 1));
    }

    // P4: a failing target does not prevent its siblings from running.
    #[test]
    fn a_failing_target_does_not_block_the_rest() {
        static RAN: AtomicI32 = AtomicI32::new(0);
        fn ok() {
            RAN.store(1, Ordering::SeqCst);
        }

        let mut multicast: Multicast<(), ()> = Multicast::new();
        multicast.add(Callable::empty());
        multicast.add(Callable::from_fn(ok as fn()));

        let results = multicast.invoke(());
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(crate::Error::Empty)));
        assert!(results[1].is_ok());
        assert_eq!(RAN.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_drops_matching_target_only() {
        fn a() {}
        fn b() {}

        let mut multicast: Multicast<(), ()> = Multicast::new();
        let callable_a = Callable::from_fn(a as fn());
        let callable_b = Callable::from_fn(b as fn());
        multicast.add(callable_a.clone());
        multicast.add(callable_b.clone());

        let removed = multicast.remove(&callable_a);
        assert!(removed);
        assert_eq!(multicast.len(), 1);

        let results = multicast.invoke(());
        assert_eq!(results.len(), 1);
    }

    // P4: removing once after adding the same callable twice leaves one registration behind.
    #[test]
    fn remove_drops_only_the_first_of_duplicate_registrations() {
        fn a() {}

        let mut multicast: Multicast<(), ()> = Multicast::new();
        let callable_a = Callable::from_fn(a as fn());
        multicast.add(callable_a.clone());
        multicast.add(callable_a.clone());

        assert!(multicast.remove(&callable_a));
        assert_eq!(multicast.len(), 1);
        assert!(!multicast.is_empty());
    }

    #[test]
    fn add_assign_and_sub_assign_operators() {
        fn noop() {}
        let target = Callable::from_fn(noop as fn());

        let mut multicast: Multicast<(), ()> = Multicast::new();
        multicast += target.clone();
        assert_eq!(multicast.len(), 1);
        multicast -= &target;
        assert!(multicast.is_empty());
    }

    #[test]
    fn clear_empties_the_list() {
        fn noop() {}
        let mut multicast: Multicast<(), ()> = Multicast::new();
        multicast.add(Callable::from_fn(noop as fn()));
        multicast.clear();
        assert!(multicast.is_empty());
    }
}
