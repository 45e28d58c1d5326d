// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::arity::{FreeFnPtr, MethodFnPtr};
use crate::error::{Error, Result};

/// The identity a [`Callable`] variant exposes for equality purposes.
///
/// Two callables are equal iff they carry the same identity. This is the sum-type realization
/// of the source design's runtime type comparison: no downcasting or `Any` is involved, the tag
/// alone decides which identity field is meaningful. [`Identity::Wrapped`] and
/// [`Identity::Remote`] are used by the async (C4) and remote-send (C9) wrappers in
/// [`crate::async_fire`] and [`crate::remote`], which fold an inner identity together with the
/// dispatcher or remote id they target, per the data model's equality rule for wrapped variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Identity {
    /// No target is bound (a default-constructed, "empty" callable).
    Empty,
    FreeFn(usize),
    MethodRaw(usize, usize),
    MethodShared(usize, usize),
    Wrapped { inner: Box<Identity>, dispatcher: usize },
    Remote(u32),
}

/// Object-safe erasure for the [`Callable`] variants.
///
/// `call` returns a `Result` (rather than `Ret` directly) so that wrapped variants - the async
/// (C4) and remote-send (C9) targets - can report `DispatchRejected` or a transport failure
/// through the same path a plain free-function or method call uses, which always succeeds.
pub(crate) trait Target<Args, Ret>: Send + Sync {
    fn call(&self, args: Args) -> Result<Ret>;
    fn clone_boxed(&self) -> Box<dyn Target<Args, Ret>>;
    fn identity(&self) -> Identity;
}

struct FreeFnTarget<F, Args, Ret> {
    f: F,
    _marker: PhantomData<fn(Args) -> Ret>,
}

impl<F, Args, Ret> Target<Args, Ret> for FreeFnTarget<F, Args, Ret>
where
    F: FreeFnPtr<Args, Ret>,
    Args: 'static,
    Ret: 'static,
{
    fn call(&self, args: Args) -> Result<Ret> {
        Ok(self.f.invoke(args))
    }

    fn clone_boxed(&self) -> Box<dyn Target<Args, Ret>> {
        Box::new(Self { f: self.f, _marker: PhantomData })
    }

    fn identity(&self) -> Identity {
        Identity::FreeFn(self.f.address())
    }
}

/// A method bound to an owner reached through a raw pointer.
///
/// The owner's lifetime is the caller's responsibility: it must outlive this target and every
/// clone of it. See [`Callable::from_method`].
struct RawMethodTarget<Owner, F, Args, Ret> {
    owner: *const Owner,
    method: F,
    _marker: PhantomData<fn(Args) -> Ret>,
}

// SAFETY: the caller of the `unsafe` constructor `Callable::from_method` guarantees the owner
// outlives every clone of the callable, which is the same contract a `&'static Owner` would
// carry; we require `Owner: Sync` so sharing the raw pointer across threads is sound, matching
// the aliasing rules of an ordinary shared reference.
unsafe impl<Owner: Sync, F, Args, Ret> Send for RawMethodTarget<Owner, F, Args, Ret> {}
// SAFETY: see the `Send` impl above; no interior mutability is performed through `owner`.
unsafe impl<Owner: Sync, F, Args, Ret> Sync for RawMethodTarget<Owner, F, Args, Ret> {}

impl<Owner, F, Args, Ret> Target<Args, Ret> for RawMethodTarget<Owner, F, Args, Ret>
where
    F: MethodFnPtr<Owner, Args, Ret>,
    Owner: Sync,
    Args: 'static,
    Ret: 'static,
{
    fn call(&self, args: Args) -> Result<Ret> {
        // SAFETY: per the constructor's documented obligation, `owner` is valid for as long as
        // this target (or any clone of it) exists.
        let owner = unsafe { &*self.owner };
        Ok(self.method.invoke(owner, args))
    }

    fn clone_boxed(&self) -> Box<dyn Target<Args, Ret>> {
        Box::new(Self { owner: self.owner, method: self.method, _marker: PhantomData })
    }

    fn identity(&self) -> Identity {
        Identity::MethodRaw(self.owner as usize, self.method.address())
    }
}

/// A method bound to an owner kept alive by a shared handle.
///
/// Cloning this target clones the `Arc`, extending the owner's lifetime for as long as any
/// clone of the callable survives. See [`Callable::from_shared_method`].
struct SharedMethodTarget<Owner, F, Args, Ret> {
    owner: Arc<Owner>,
    method: F,
    _marker: PhantomData<fn(Args) -> Ret>,
}

impl<Owner, F, Args, Ret> Target<Args, Ret> for SharedMethodTarget<Owner, F, Args, Ret>
where
    Owner: Send + Sync,
    F: MethodFnPtr<Owner, Args, Ret>,
    Args: 'static,
    Ret: 'static,
{
    fn call(&self, args: Args) -> Result<Ret> {
        Ok(self.method.invoke(&self.owner, args))
    }

    fn clone_boxed(&self) -> Box<dyn Target<Args, Ret>> {
        Box::new(Self { owner: Arc::clone(&self.owner), method: self.method, _marker: PhantomData })
    }

    fn identity(&self) -> Identity {
        Identity::MethodShared(Arc::as_ptr(&self.owner) as usize, self.method.address())
    }
}

/// A typed, cloneable, equality-comparable function value.
///
/// `Callable<Args, Ret>` is the crate's realization of component C1: a polymorphic "function
/// value" that may hold a free function, a method bound to a borrowed owner, or a method bound
/// to a shared (`Arc`-owned) owner. `Args` is a plain tuple type (`()`, `(A,)`, `(A, B)`, ...)
/// fixed at construction and preserved by cloning; there is no per-arity `Callable0`,
/// `Callable1`, ... family.
///
/// A default-constructed `Callable` is empty: [`Callable::invoke`] returns [`Error::Empty`], and
/// [`Callable::is_bound`] reports `false`. Cloning an empty callable yields another empty
/// callable.
pub struct Callable<Args, Ret = ()> {
    inner: Option<Box<dyn Target<Args, Ret>>>,
}

impl<Args, Ret> Callable<Args, Ret>
where
    Args: 'static,
    Ret: 'static,
{
    /// Creates an empty callable. Invoking it returns [`Error::Empty`].
    #[must_use]
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Binds a free function pointer.
    #[must_use]
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FreeFnPtr<Args, Ret>,
    {
        Self { inner: Some(Box::new(FreeFnTarget { f, _marker: PhantomData })) }
    }

    /// Binds a method to an owner reached through a raw pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure `owner` remains valid for as long as this callable, or any clone
    /// of it, exists. This is the "raw owner" variant described in the data model: its lifetime
    /// is a caller contract, not something the callable tracks.
    #[must_use]
    pub unsafe fn from_method<Owner, F>(owner: *const Owner, method: F) -> Self
    where
        Owner: Sync,
        F: MethodFnPtr<Owner, Args, Ret>,
    {
        Self { inner: Some(Box::new(RawMethodTarget { owner, method, _marker: PhantomData })) }
    }

    /// Binds a method to an owner kept alive by a shared handle.
    ///
    /// The owner's lifetime is extended by this callable (and every clone of it) for as long as
    /// any of them survive.
    #[must_use]
    pub fn from_shared_method<Owner, F>(owner: Arc<Owner>, method: F) -> Self
    where
        Owner: Send + Sync,
        F: MethodFnPtr<Owner, Args, Ret>,
    {
        Self { inner: Some(Box::new(SharedMethodTarget { owner, method, _marker: PhantomData })) }
    }

    /// Invokes the bound target synchronously on the current thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] if no target is bound.
    pub fn invoke(&self, args: Args) -> Result<Ret> {
        match &self.inner {
            Some(target) => target.call(args),
            None => Err(Error::Empty),
        }
    }

    /// Returns `true` if a target is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.is_some()
    }

    /// Returns `true` if no target is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Wraps an already type-erased target. Used internally by the async (C4) and remote-send
    /// (C9) wrappers, which need to produce a new `Callable` from a hand-rolled `Target` impl.
    pub(crate) fn from_target(target: Box<dyn Target<Args, Ret>>) -> Self {
        Self { inner: Some(target) }
    }

    /// The bound target's equality/clone identity (`Identity::Empty` if unbound). Used
    /// internally by wrappers that need to fold their own identity together with the identity
    /// of the callable they wrap.
    pub(crate) fn identity(&self) -> Identity {
        match &self.inner {
            Some(target) => target.identity(),
            None => Identity::Empty,
        }
    }
}

impl<Args, Ret> Default for Callable<Args, Ret>
where
    Args: 'static,
    Ret: 'static,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<Args, Ret> Clone for Callable<Args, Ret> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.as_ref().map(|target| target.clone_boxed()) }
    }
}

impl<Args, Ret> PartialEq for Callable<Args, Ret> {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl<Args, Ret> Eq for Callable<Args, Ret> {}

impl<Args, Ret> fmt::Debug for Callable<Args, Ret> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("bound", &self.inner.is_some())
            .field("args", &std::any::type_name::<Args>())
            .field("ret", &std::any::type_name::<Ret>())
            .finish_non_exhaustive()
    }
}
