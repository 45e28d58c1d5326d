// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The argument copy policy (§4.2, §9 of the design).
//!
//! In the source design, every argument crossing a dispatcher boundary needs an explicit
//! decision: copy the value (and later free the copy), or trust the caller that the original
//! outlives the call. In Rust, passing an argument by value already *is* that decision for
//! ordinary owned types - moving `Args` into an envelope transfers ownership, so there is
//! nothing left for the original caller to alias or free. [`NoCopy`] exists only for the
//! "opt-out" policy: carrying a raw pointer across the boundary as-is, on the caller's explicit
//! promise that the pointee outlives every dispatched call built from it. This is the crate's
//! only sanctioned way to move a non-`'static`/non-`Send` value across a dispatcher boundary.

use std::fmt;

/// Wraps a raw pointer so it can be carried across a dispatcher boundary without being deep
/// copied, matching the source design's "do not copy" argument policy.
///
/// Constructing a `NoCopy` is an unsafe assertion that the pointee remains valid for the
/// duration of every dispatched call built from it; `NoCopy` itself is always `Send` and
/// `'static` (a raw pointer carries no lifetime), which is precisely what makes this the
/// sanctioned escape hatch for values that are themselves not `Send`/`'static`.
pub struct NoCopy<T: ?Sized>(*const T);

impl<T: ?Sized> NoCopy<T> {
    /// Wraps `pointee` for transport across a dispatcher boundary without copying it.
    ///
    /// # Safety
    ///
    /// `pointee` must remain valid for the duration of every dispatched call that carries the
    /// returned value (and every clone of it).
    #[must_use]
    pub unsafe fn new(pointee: &T) -> Self {
        Self(pointee)
    }

    /// Dereferences back to the wrapped pointee.
    ///
    /// Safe to call because the only way to construct a `NoCopy` already carries the validity
    /// obligation as an unsafe precondition at construction time.
    #[must_use]
    pub fn get(&self) -> &T {
        // SAFETY: upheld by the precondition on `NoCopy::new`.
        unsafe { &*self.0 }
    }
}

impl<T: ?Sized> Clone for NoCopy<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for NoCopy<T> {}

// SAFETY: `NoCopy::new`'s caller guarantees the pointee outlives every call carrying this
// value, including calls run on another thread; under that guarantee, moving the address
// itself across threads is sound.
unsafe impl<T: ?Sized> Send for NoCopy<T> {}

impl<T: ?Sized> fmt::Debug for NoCopy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NoCopy").field(&self.0).finish()
    }
}
