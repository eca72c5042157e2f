// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

extern crate copromise;
extern crate env_logger;
extern crate rand;

use copromise::{default_context, Completion, Future, Promise};
use rand::Rng;

/// Roughly one in five attempts succeeds
fn flaky_job() -> Future<String> {
    let promise = Promise::new();
    let future = promise.future();

    default_context().execute(Box::new(move || {
        if rand::thread_rng().gen_range(0, 5) == 0 {
            promise.complete_with_success("lucky".to_owned());
        } else {
            promise.complete_with_fail("not this time");
        }
    }));

    future
}

/// Retry until the flaky job succeeds, counting attempts.
///
/// Each failed attempt answers with `CompleteUsing` on the next attempt's
/// future, so the whole retry chain resolves through the engine without
/// growing the stack.
fn keep_trying(attempt: u32) -> Future<u32> {
    let attempts = attempt + 1;

    flaky_job().on_complete(move |completion| {
        match completion {
            Completion::Success(..) => Completion::Success(attempts),
            _ => Completion::CompleteUsing(keep_trying(attempts)),
        }
    })
}

fn main() {
    env_logger::init();

    match keep_trying(0).sync() {
        Completion::Success(attempts) => println!("succeeded after {} attempt(s)", attempts),
        other => println!("gave up: {:?}", other),
    }
}
