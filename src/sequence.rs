// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Aggregating combinators

use std::sync::{Arc, Mutex};

use completion::{CancelToken, Completion, FutureError};
use executor::Immediate;
use future::core::subscribe;
use future::{Future, Promise};

struct Gather<T>
    where T: Send + Sync + Clone + 'static
{
    slots: Vec<Option<T>>,
    remaining: usize,
    failed: Option<(usize, FutureError)>,
    cancelled: Option<(usize, Option<CancelToken>)>,
    promise: Option<Promise<Vec<T>>>,
}

/// Aggregate many futures into one, preserving input order.
///
/// The aggregate completes `Success` with every input's value once all of
/// them succeed. Terminal precedence when inputs disagree is
/// `Fail > Cancelled > Success`, ties broken by the lowest input index:
/// the first observed failure completes the aggregate immediately, while a
/// cancellation only wins after every input is terminal and none failed.
/// An empty input list completes `Success` with an empty vector right away.
pub fn sequence<T>(futures: Vec<Future<T>>) -> Future<Vec<T>>
    where T: Send + Sync + Clone + 'static
{
    let count = futures.len();
    let promise = Promise::new();
    let result = promise.future();

    if count == 0 {
        promise.complete_with_success(Vec::new());
        return result;
    }

    let gather = Arc::new(Mutex::new(Gather {
        slots: (0..count).map(|_| None).collect(),
        remaining: count,
        failed: None,
        cancelled: None,
        promise: Some(promise),
    }));

    for (index, future) in futures.iter().enumerate() {
        let gather = gather.clone();

        subscribe(&future.core,
                  Arc::new(Immediate),
                  Box::new(move |completion: Completion<T>| {
                      let mut state = gather.lock().unwrap();

                      match completion {
                          Completion::Success(value) => {
                              state.slots[index] = Some(value);
                          }
                          Completion::Fail(error) => {
                              let lower = state.failed.as_ref().map_or(true, |&(i, _)| index < i);
                              if lower {
                                  state.failed = Some((index, error));
                              }
                          }
                          Completion::Cancelled(token) => {
                              let lower = state.cancelled.as_ref().map_or(true, |&(i, _)| index < i);
                              if lower {
                                  state.cancelled = Some((index, token));
                              }
                          }
                          Completion::CompleteUsing(..) => {
                              unreachable!("a stored completion is always terminal");
                          }
                      }

                      state.remaining -= 1;

                      let decided = if state.failed.is_some() {
                          let error = state.failed.as_ref().map(|&(_, ref e)| e.clone()).unwrap();
                          Some(Completion::Fail(error))
                      } else if state.remaining == 0 {
                          match state.cancelled.take() {
                              Some((_, token)) => Some(Completion::Cancelled(token)),
                              None => {
                                  let values = state.slots
                                      .iter_mut()
                                      .map(|slot| slot.take().expect("aggregate slot missing a value"))
                                      .collect();
                                  Some(Completion::Success(values))
                              }
                          }
                      } else {
                          None
                      };

                      if let Some(completion) = decided {
                          if let Some(promise) = state.promise.take() {
                              // Complete outside the gather lock; the
                              // promise schedules continuations and user
                              // code must never run under it
                              drop(state);
                              promise.complete_with(completion);
                          }
                      }
                  }));
    }

    result
}
