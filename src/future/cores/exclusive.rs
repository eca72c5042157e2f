// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use completion::Completion;
use future::core::{CompleteOutcome, Continuation, CoreSync, RegisterOutcome};
use sync::Spinlock;

use super::Inner;

/// Exclusive-lock discipline: a spinlock around all state access.
pub struct ExclusiveCore<T> {
    inner: Spinlock<Inner<T>>,
}

impl<T> ExclusiveCore<T> {
    pub fn new(completion: Option<Completion<T>>) -> ExclusiveCore<T> {
        ExclusiveCore { inner: Spinlock::new(Inner::new(completion)) }
    }
}

impl<T> CoreSync<T> for ExclusiveCore<T>
    where T: Send + Sync + Clone + 'static
{
    fn try_complete(&self, completion: Completion<T>) -> CompleteOutcome<T> {
        let mut inner = self.inner.lock();
        complete_impl!(inner, completion)
    }

    fn register(&self, continuation: Continuation<T>) -> RegisterOutcome<T> {
        let mut inner = self.inner.lock();
        register_impl!(inner, continuation)
    }

    fn completion(&self) -> Option<Completion<T>> {
        self.inner.lock().completion.clone()
    }

    fn is_completed(&self) -> bool {
        self.inner.lock().completion.is_some()
    }
}
