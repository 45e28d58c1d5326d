// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test-only timeout guard, so a regression in the timeout/abandonment logic fails the
//! offending test instead of hanging the whole suite.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Tests exercising real timing must not block indefinitely if the code under test regresses.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs `f` on a background thread and abandons it if it does not complete within
/// [`TEST_TIMEOUT`].
///
/// # Panics
///
/// Panics if `f` does not complete in time, or if it panics itself.
pub(crate) fn execute_or_abandon<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (sender, receiver) = mpsc::channel();

    // The channel closes without a value both if the spawned thread panics and if it never
    // finishes, so `recv_timeout` alone distinguishes "ran to completion" from either failure.
    thread::spawn(move || {
        let result = f();
        let _ = sender.send(result);
    });

    receiver.recv_timeout(TEST_TIMEOUT).expect("test timed out; suspect a hang in the code under test")
}
