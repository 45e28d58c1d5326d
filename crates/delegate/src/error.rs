// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

use crate::remote::DelegateId;

/// The result type for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while constructing or invoking a [`crate::Callable`] or one of its
/// wrappers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Invoked a [`crate::Callable`] that has no bound target.
    #[error("callable has no bound target")]
    Empty,

    /// A [`crate::Dispatcher`] refused an envelope because it has shut down or its queue is
    /// full.
    #[error("dispatcher rejected the envelope (shut down or at capacity)")]
    DispatchRejected,

    /// An inbound remote stream named a [`DelegateId`] that has no registered receiver.
    #[error("remote id {0:?} has no registered receiver")]
    NoSuchRemoteTarget(DelegateId),

    /// An inbound remote stream could not be decoded.
    #[error("failed to decode remote argument: {0}")]
    RemoteDecode(String),

    /// A [`DelegateId`] was registered twice.
    #[error("remote id {0:?} is already registered")]
    DuplicateRemoteId(DelegateId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Error: Send, Sync, std::error::Error);
    }

    #[test]
    fn messages_are_stable() {
        assert_eq!(Error::Empty.to_string(), "callable has no bound target");
        assert_eq!(
            Error::DispatchRejected.to_string(),
            "dispatcher rejected the envelope (shut down or at capacity)"
        );
    }
}
