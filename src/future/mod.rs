// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Write-once promises and chainable futures
//!
//! A `SharedCore` is the state shared between a `Promise` and its `Future`
//! handles: one completion slot and the list of continuations registered
//! while it was empty, both guarded by the core's synchronization strategy.
//!
//! Completing a core drains the list and hands every continuation to the
//! execution context it asked for, strictly after the strategy's critical
//! section is over. Registration on an already-completed core schedules the
//! continuation right away. Either way a continuation fires exactly once.
//!
//! Derived futures (`on_complete` and friends) have no user-visible promise;
//! their cores are completed by the continuation registered upstream.

pub(crate) mod core;
mod cores;
mod future;
mod promise;

pub use self::future::Future;
pub use self::promise::Promise;

use sync::SyncStrategy;

/// A fresh promise/future pair using the process default strategy
pub fn make<T>() -> (Promise<T>, Future<T>)
    where T: Send + Sync + Clone + 'static
{
    let promise = Promise::new();
    let future = promise.future();
    (promise, future)
}

/// A fresh promise/future pair with an explicit synchronization strategy
pub fn make_with<T>(strategy: SyncStrategy) -> (Promise<T>, Future<T>)
    where T: Send + Sync + Clone + 'static
{
    let promise = Promise::with_strategy(strategy);
    let future = promise.future();
    (promise, future)
}
