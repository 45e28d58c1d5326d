// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wraps a callable so invoking it posts the call to a worker thread and returns immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use delegate::{Callable, Dispatcher, WorkerThreadDispatcher};

static DONE: AtomicBool = AtomicBool::new(false);

fn log_event(id: u32) {
    println!("handled event {id} on {:?}", std::thread::current().id());
    DONE.store(true, Ordering::SeqCst);
}

fn main() {
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(WorkerThreadDispatcher::spawn().expect("spawn worker thread"));

    let handler: Callable<(u32,), ()> = Callable::from_fn(log_event as fn(u32));
    let fire_and_forget = handler.into_async(Arc::clone(&dispatcher));

    println!("dispatching from {:?}", std::thread::current().id());
    fire_and_forget.invoke((7,)).expect("dispatch accepted");

    while !DONE.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(5));
    }
}
