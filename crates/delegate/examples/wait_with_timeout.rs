// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wraps a callable so invoking it blocks the caller, up to a timeout, for the call to run on a
//! worker thread and return a value.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use delegate::{Callable, Dispatcher, WorkerThreadDispatcher};

struct Greeter;

impl Greeter {
    fn compute_len(&self, s: String) -> usize {
        s.len()
    }

    fn slow_compute_len(&self, s: String) -> usize {
        thread::sleep(Duration::from_secs(2));
        s.len()
    }
}

fn main() {
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(WorkerThreadDispatcher::spawn().expect("spawn worker thread"));
    let greeter = Arc::new(Greeter);

    let fast: Callable<(String,), usize> =
        Callable::from_shared_method(Arc::clone(&greeter), Greeter::compute_len as fn(&Greeter, String) -> usize);
    let fast_wait = fast.into_async_wait(Arc::clone(&dispatcher), Duration::from_secs(1));
    let len = fast_wait.invoke(("hello".to_owned(),)).expect("callable is bound");
    println!("fast call returned {len}, successful = {}", fast_wait.was_successful());

    let slow: Callable<(String,), usize> =
        Callable::from_shared_method(greeter, Greeter::slow_compute_len as fn(&Greeter, String) -> usize);
    let slow_wait = slow.into_async_wait(dispatcher, Duration::from_millis(200));
    let len = slow_wait.invoke(("world".to_owned(),)).expect("callable is bound");
    println!("slow call returned {len} (default on timeout), successful = {}", slow_wait.was_successful());
}
