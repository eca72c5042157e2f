// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::mpsc;
use std::sync::Arc;

use completion::{CancelToken, Completion, FutureError};
use executor::{default_context, ExecutionContext, Immediate};
use future::core::{settle, subscribe, SharedCore};
use future::Promise;
use sync::{default_strategy, SyncStrategy};

/// Read-only handle to an eventually-available result.
///
/// A future observes the single completion slot it shares with its promise
/// (or with the continuation engine, for derived futures). Handles are cheap
/// to clone; all clones observe the same slot.
pub struct Future<T> {
    pub(crate) core: Arc<SharedCore<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Future<T> {
        Future { core: self.core.clone() }
    }
}

impl<T> Future<T>
    where T: Send + Sync + Clone + 'static
{
    pub(crate) fn from_core(core: Arc<SharedCore<T>>) -> Future<T> {
        Future { core: core }
    }

    /// An already-completed future carrying the given completion.
    ///
    /// Uses the process default synchronization strategy. A `CompleteUsing`
    /// completion is resolved through the engine rather than stored, so the
    /// returned future completes when the referenced one does.
    pub fn completed(completion: Completion<T>) -> Future<T> {
        Future::completed_with(default_strategy(), completion)
    }

    /// Like `completed`, with an explicit synchronization strategy
    pub fn completed_with(strategy: SyncStrategy, completion: Completion<T>) -> Future<T> {
        match completion {
            indirection @ Completion::CompleteUsing(..) => {
                let core = SharedCore::new(strategy, None);
                settle(&core, indirection);
                Future { core: core }
            }
            completion => Future { core: SharedCore::new(strategy, Some(completion)) },
        }
    }

    pub fn success(value: T) -> Future<T> {
        Future::completed(Completion::Success(value))
    }

    pub fn fail<E>(error: E) -> Future<T>
        where E: Into<FutureError>
    {
        Future::completed(Completion::Fail(error.into()))
    }

    pub fn cancelled(token: Option<CancelToken>) -> Future<T> {
        Future::completed(Completion::Cancelled(token))
    }

    /// Run `f` on the default context and expose its result as a future
    pub fn spawn<F>(f: F) -> Future<T>
        where F: FnOnce() -> T + Send + 'static
    {
        Future::spawn_in(&default_context(), f)
    }

    /// Run `f` on the given context and expose its result as a future.
    ///
    /// If `f` panics the worker drops the promise, so the future fails with
    /// a broken-promise error instead of hanging.
    pub fn spawn_in<F>(context: &Arc<dyn ExecutionContext>, f: F) -> Future<T>
        where F: FnOnce() -> T + Send + 'static
    {
        let promise = Promise::new();
        let future = promise.future();

        context.execute(Box::new(move || {
            promise.complete_with_success(f());
        }));

        future
    }

    /// The canonical registration primitive.
    ///
    /// Registers `f` to receive this future's terminal completion on
    /// `context` and returns the future of whatever completion `f` produces.
    /// Returning `Completion::CompleteUsing` defers the result future to
    /// another one. The handler runs exactly once and never under any engine
    /// lock; it always goes through `context`, so only an `Immediate`
    /// context ever runs it on the registering or completing thread.
    pub fn on_complete_in<S, F>(&self, context: &Arc<dyn ExecutionContext>, f: F) -> Future<S>
        where S: Send + Sync + Clone + 'static,
              F: FnOnce(Completion<T>) -> Completion<S> + Send + 'static
    {
        let downstream = SharedCore::new(default_strategy(), None);
        let result = Future { core: downstream.clone() };

        subscribe(&self.core,
                  context.clone(),
                  Box::new(move |completion| {
                      settle(&downstream, f(completion));
                  }));

        result
    }

    /// `on_complete_in` on the default context
    pub fn on_complete<S, F>(&self, f: F) -> Future<S>
        where S: Send + Sync + Clone + 'static,
              F: FnOnce(Completion<T>) -> Completion<S> + Send + 'static
    {
        self.on_complete_in(&default_context(), f)
    }

    /// Success-only registration: `f` runs for a success and decides the
    /// downstream completion; failures and cancellations skip `f` and are
    /// forwarded unchanged.
    pub fn on_success_in<S, F>(&self, context: &Arc<dyn ExecutionContext>, f: F) -> Future<S>
        where S: Send + Sync + Clone + 'static,
              F: FnOnce(T) -> Completion<S> + Send + 'static
    {
        self.on_complete_in(context, move |completion| {
            match completion {
                Completion::Success(value) => f(value),
                other => other.convert(),
            }
        })
    }

    pub fn on_success<S, F>(&self, f: F) -> Future<S>
        where S: Send + Sync + Clone + 'static,
              F: FnOnce(T) -> Completion<S> + Send + 'static
    {
        self.on_success_in(&default_context(), f)
    }

    /// Map the success value; failures and cancellations are forwarded
    pub fn map_in<S, F>(&self, context: &Arc<dyn ExecutionContext>, f: F) -> Future<S>
        where S: Send + Sync + Clone + 'static,
              F: FnOnce(T) -> S + Send + 'static
    {
        self.on_success_in(context, move |value| Completion::Success(f(value)))
    }

    pub fn map<S, F>(&self, f: F) -> Future<S>
        where S: Send + Sync + Clone + 'static,
              F: FnOnce(T) -> S + Send + 'static
    {
        self.map_in(&default_context(), f)
    }

    /// Chain a future-producing handler; the result future adopts the
    /// returned future's eventual outcome
    pub fn and_then_in<S, F>(&self, context: &Arc<dyn ExecutionContext>, f: F) -> Future<S>
        where S: Send + Sync + Clone + 'static,
              F: FnOnce(T) -> Future<S> + Send + 'static
    {
        self.on_success_in(context, move |value| Completion::CompleteUsing(f(value)))
    }

    pub fn and_then<S, F>(&self, f: F) -> Future<S>
        where S: Send + Sync + Clone + 'static,
              F: FnOnce(T) -> Future<S> + Send + 'static
    {
        self.and_then_in(&default_context(), f)
    }

    /// Observe a failure for its side effect.
    ///
    /// Does not derive a new future: the same handle is returned for further
    /// chaining. `f` fires only if this future fails.
    pub fn on_fail_in<F>(&self, context: &Arc<dyn ExecutionContext>, f: F) -> Future<T>
        where F: FnOnce(FutureError) + Send + 'static
    {
        subscribe(&self.core,
                  context.clone(),
                  Box::new(move |completion| {
                      if let Completion::Fail(error) = completion {
                          f(error);
                      }
                  }));

        self.clone()
    }

    pub fn on_fail<F>(&self, f: F) -> Future<T>
        where F: FnOnce(FutureError) + Send + 'static
    {
        self.on_fail_in(&default_context(), f)
    }

    /// Observe a cancellation for its side effect; same contract as
    /// `on_fail_in`
    pub fn on_cancel_in<F>(&self, context: &Arc<dyn ExecutionContext>, f: F) -> Future<T>
        where F: FnOnce(Option<CancelToken>) + Send + 'static
    {
        subscribe(&self.core,
                  context.clone(),
                  Box::new(move |completion| {
                      if let Completion::Cancelled(token) = completion {
                          f(token);
                      }
                  }));

        self.clone()
    }

    pub fn on_cancel<F>(&self, f: F) -> Future<T>
        where F: FnOnce(Option<CancelToken>) + Send + 'static
    {
        self.on_cancel_in(&default_context(), f)
    }

    /// Request cancellation.
    ///
    /// Best-effort and racy: if the future already completed the request is
    /// dropped silently and the existing completion stands.
    pub fn cancel(&self) {
        settle(&self.core, Completion::Cancelled(None));
    }

    /// Request cancellation carrying an identifying token
    pub fn cancel_with(&self, token: CancelToken) {
        settle(&self.core, Completion::Cancelled(Some(token)));
    }

    /// The stored completion, if the future has completed.
    ///
    /// Never returns `CompleteUsing`: indirections resolve before anything
    /// is stored.
    pub fn completion(&self) -> Option<Completion<T>> {
        self.core.sync().completion()
    }

    pub fn is_completed(&self) -> bool {
        self.core.sync().is_completed()
    }

    /// Block the calling thread until this future completes.
    ///
    /// Meant for tests and top-level glue. Calling it from inside a
    /// continuation the awaited future depends on deadlocks that context's
    /// worker; do not do that.
    pub fn sync(&self) -> Completion<T> {
        let (tx, rx) = mpsc::channel();

        subscribe(&self.core,
                  Arc::new(Immediate),
                  Box::new(move |completion| {
                      let _ = tx.send(completion);
                  }));

        match rx.recv() {
            Ok(completion) => completion,
            // Every completer is gone without firing; report it as the
            // broken promise it is rather than blocking forever.
            Err(..) => Completion::Fail(FutureError::broken_promise()),
        }
    }
}
