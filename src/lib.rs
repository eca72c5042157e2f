// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Composable futures and write-once promises
//!
//! A `Promise<T>` is the unique completer of a `Future<T>`. Futures chain:
//! registering a handler with `on_complete`/`on_success`/`map`/`and_then`
//! yields a new future completed by the handler's result, and failures or
//! cancellations upstream are forwarded past success handlers downstream on
//! their own. A handler may also answer `Completion::CompleteUsing(other)`
//! to defer its future to another one.
//!
//! Completion is single-fire and race-free no matter which threads complete,
//! register or cancel, and no matter which of the interchangeable
//! synchronization strategies guards the future's state. Handlers run on
//! pluggable execution contexts and never under an engine lock.
//!
//! ```
//! use copromise::Promise;
//!
//! let promise = Promise::new();
//! let doubled = promise.future().map(|x: u32| x * 2);
//!
//! promise.complete_with_success(21);
//! assert_eq!(doubled.sync().into_value(), Some(42));
//! ```

#[macro_use]
extern crate log;
extern crate num_cpus;

pub use completion::{CancelToken, Completion, FutureError};
pub use executor::{default_context, ExecutionContext, Immediate, SerialQueue, Task, ThreadPool};
pub use future::{make, make_with, Future, Promise};
pub use sequence::sequence;
pub use sync::{default_strategy, set_default_strategy, SyncStrategy};

pub mod completion;
pub mod executor;
pub mod future;
pub mod sequence;
pub mod sync;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chained_maps() {
        let future = Future::success("5")
            .map(|s: &'static str| s.parse::<u32>().unwrap())
            .map(|n| vec![n]);

        assert_eq!(future.sync().into_value(), Some(vec![5]));
    }

    #[test]
    fn default_strategy_is_settable() {
        set_default_strategy(SyncStrategy::LockFree);
        assert_eq!(default_strategy(), SyncStrategy::LockFree);

        let future = Future::success(1).map(|n: u32| n + 1);
        assert_eq!(future.sync().into_value(), Some(2));

        set_default_strategy(SyncStrategy::Exclusive);
    }
}
