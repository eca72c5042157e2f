// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use completion::{CancelToken, Completion, FutureError};
use future::core::{settle, SharedCore};
use future::Future;
use sync::{default_strategy, SyncStrategy};

/// The unique write-once completer paired with a future.
///
/// At most one completion attempt takes effect; every later one is rejected
/// without touching the stored completion (the attempt returns `false` and
/// leaves a `debug!` diagnostic). Dropping a promise that never completed
/// fails its future with a broken-promise error so observers do not hang.
pub struct Promise<T>
    where T: Send + Sync + Clone + 'static
{
    core: Arc<SharedCore<T>>,
}

impl<T> Promise<T>
    where T: Send + Sync + Clone + 'static
{
    /// A fresh pending promise using the process default strategy
    pub fn new() -> Promise<T> {
        Promise::with_strategy(default_strategy())
    }

    /// A fresh pending promise with an explicit synchronization strategy
    pub fn with_strategy(strategy: SyncStrategy) -> Promise<T> {
        Promise { core: SharedCore::new(strategy, None) }
    }

    /// The future completed by this promise. May be called any number of
    /// times; every handle observes the same completion slot.
    pub fn future(&self) -> Future<T> {
        Future::from_core(self.core.clone())
    }

    /// Apply a completion under the single-fire rule.
    ///
    /// `Completion::CompleteUsing` defers this promise's future to the
    /// referenced one. Returns `false` for a rejected double completion.
    pub fn complete_with(&self, completion: Completion<T>) -> bool {
        settle(&self.core, completion)
    }

    pub fn complete_with_success(&self, value: T) -> bool {
        self.complete_with(Completion::Success(value))
    }

    pub fn complete_with_fail<E>(&self, error: E) -> bool
        where E: Into<FutureError>
    {
        self.complete_with(Completion::Fail(error.into()))
    }

    pub fn complete_with_cancel(&self, token: Option<CancelToken>) -> bool {
        self.complete_with(Completion::Cancelled(token))
    }

    pub fn is_completed(&self) -> bool {
        self.core.sync().is_completed()
    }
}

impl<T> Drop for Promise<T>
    where T: Send + Sync + Clone + 'static
{
    fn drop(&mut self) {
        // A promise that handed its future off to an indirection is not
        // broken; the forwarding subscription will complete it.
        if !self.core.sync().is_completed() && !self.core.has_forward() {
            debug!("promise dropped before completing core {}", self.core.id());
            settle(&self.core, Completion::Fail(FutureError::broken_promise()));
        }
    }
}
