// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::RwLock;

use completion::Completion;
use future::core::{CompleteOutcome, Continuation, CoreSync, RegisterOutcome};

use super::Inner;

/// Reader/writer discipline: completion and registration take the write
/// lock, the read-side accessors run concurrently under read locks.
pub struct RwCore<T> {
    inner: RwLock<Inner<T>>,
}

// Continuations are only ever touched under the write lock; the read side
// never looks past the completion slot.
unsafe impl<T: Send + Sync> Sync for RwCore<T> {}

impl<T> RwCore<T> {
    pub fn new(completion: Option<Completion<T>>) -> RwCore<T> {
        RwCore { inner: RwLock::new(Inner::new(completion)) }
    }
}

impl<T> CoreSync<T> for RwCore<T>
    where T: Send + Sync + Clone + 'static
{
    fn try_complete(&self, completion: Completion<T>) -> CompleteOutcome<T> {
        let mut inner = self.inner.write().unwrap();
        complete_impl!(inner, completion)
    }

    fn register(&self, continuation: Continuation<T>) -> RegisterOutcome<T> {
        let mut inner = self.inner.write().unwrap();
        register_impl!(inner, continuation)
    }

    fn completion(&self) -> Option<Completion<T>> {
        self.inner.read().unwrap().completion.clone()
    }

    fn is_completed(&self) -> bool {
        self.inner.read().unwrap().completion.is_some()
    }
}
