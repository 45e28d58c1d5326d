// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Registers several subscribers on a [`Multicast`] and fans a single call out to all of them,
//! continuing past a subscriber that errors.

use delegate::{Callable, Multicast};

fn on_temperature_changed(celsius: i32) {
    println!("display: {celsius}C");
}

fn on_temperature_changed_fahrenheit(celsius: i32) {
    println!("display (F): {}F", celsius * 9 / 5 + 32);
}

fn main() {
    let mut subscribers: Multicast<(i32,), ()> = Multicast::new();
    subscribers.add(Callable::from_fn(on_temperature_changed as fn(i32)));
    subscribers.add(Callable::empty()); // an unbound subscriber - its error is reported, not fatal.
    subscribers.add(Callable::from_fn(on_temperature_changed_fahrenheit as fn(i32)));

    for (index, result) in subscribers.invoke((21,)).into_iter().enumerate() {
        if let Err(error) = result {
            println!("subscriber {index} failed: {error}");
        }
    }
}
