// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Sends a call across an in-process loopback "transport" to a locally registered receiver,
//! standing in for a real byte-stream transport such as a socket or a message queue.

use std::sync::Arc;

use delegate::remote::{DelegateId, RemoteReceiver, Transport, dispatch, remote_sender};
use delegate::{Callable, Result};

struct LoopbackTransport;

impl Transport for LoopbackTransport {
    fn send(&self, stream: &[u8]) -> Result<()> {
        // A real transport would write `stream` to a socket; here we hand it straight to the
        // receiving side's dispatch table, in the same process.
        dispatch(stream)
    }
}

fn on_remote_ping(message: String) {
    println!("received remote ping: {message}");
}

fn main() {
    let id = DelegateId(1);
    let local: Callable<(String,), ()> = Callable::from_fn(on_remote_ping as fn(String));
    let _receiver = RemoteReceiver::register(id, local).expect("id not already registered");

    let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport);
    let sender: Callable<(String,), ()> = remote_sender(id, transport);

    sender.invoke(("hello from across the wire".to_owned(),)).expect("send succeeds");
}
