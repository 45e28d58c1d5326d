// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Collapses the 0..=8 argument-count explosion that a hand-written, per-arity `Callable`
//! family would otherwise require into two small traits, each implemented once per arity by
//! [`impl_arity`].
//!
//! Every other part of the crate is written against a single generic `Callable<Args, Ret>`,
//! where `Args` is a plain tuple; nothing downstream of this module is arity-specific.

/// A free function pointer that can be invoked with an owned argument tuple.
///
/// Implemented for `fn(A1, .., An) -> Ret` for every supported arity. `address` returns the
/// function pointer's value as an integer, which is the identity used by [`crate::Callable`]
/// equality for the free-function variant.
pub trait FreeFnPtr<Args, Ret>: Copy + Send + Sync + 'static {
    /// Calls the function with the given arguments.
    fn invoke(self, args: Args) -> Ret;

    /// The function pointer's address, used as an equality/clone identity.
    fn address(self) -> usize;
}

/// A method function pointer `fn(&Owner, A1, .., An) -> Ret` that can be invoked against a
/// borrowed owner with an owned argument tuple.
pub trait MethodFnPtr<Owner, Args, Ret>: Copy + Send + Sync + 'static {
    /// Calls the method against `owner` with the given arguments.
    fn invoke(self, owner: &Owner, args: Args) -> Ret;

    /// The method pointer's address, used as an equality/clone identity.
    fn address(self) -> usize;
}

macro_rules! impl_arity {
    ($($arg:ident),*) => {
        #[allow(non_snake_case, reason = "tuple destructuring names arguments after their types")]
        impl<$($arg,)* Ret> FreeFnPtr<($($arg,)*), Ret> for fn($($arg),*) -> Ret {
            fn invoke(self, args: ($($arg,)*)) -> Ret {
                let ($($arg,)*) = args;
                self($($arg),*)
            }

            fn address(self) -> usize {
                self as usize
            }
        }

        #[allow(non_snake_case, reason = "tuple destructuring names arguments after their types")]
        impl<Owner, $($arg,)* Ret> MethodFnPtr<Owner, ($($arg,)*), Ret> for fn(&Owner, $($arg),*) -> Ret {
            fn invoke(self, owner: &Owner, args: ($($arg,)*)) -> Ret {
                let ($($arg,)*) = args;
                self(owner, $($arg),*)
            }

            fn address(self) -> usize {
                self as usize
            }
        }
    };
}

impl_arity!();
impl_arity!(A1);
impl_arity!(A1, A2);
impl_arity!(A1, A2, A3);
impl_arity!(A1, A2, A3, A4);
impl_arity!(A1, A2, A3, A4, A5);
impl_arity!(A1, A2, A3, A4, A5, A6);
impl_arity!(A1, A2, A3, A4, A5, A6, A7);
impl_arity!(A1, A2, A3, A4, A5, A6, A7, A8);

#[cfg(test)]
mod tests {
    use super::*;

    fn add(a: i32, b: i32) -> i32 {
        a + b
    }

    fn zero() -> i32 {
        0
    }

    #[test]
    fn free_fn_invoke() {
        let f: fn(i32, i32) -> i32 = add;
        assert_eq!(f.invoke((1, 2)), 3);
    }

    #[test]
    fn free_fn_nullary_invoke() {
        let f: fn() -> i32 = zero;
        assert_eq!(f.invoke(()), 0);
    }

    #[test]
    fn free_fn_address_stable() {
        let f: fn(i32, i32) -> i32 = add;
        assert_eq!(f.address(), f.address());
        assert_eq!(f.address(), add as usize);
    }

    struct Counter(i32);

    impl Counter {
        fn add(&self, n: i32) -> i32 {
            self.0 + n
        }
    }

    #[test]
    fn method_fn_invoke() {
        let f: fn(&Counter, i32) -> i32 = Counter::add;
        let owner = Counter(10);
        assert_eq!(f.invoke(&owner, (5,)), 15);
    }
}
