// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Synchronization strategies guarding a future's internal state

pub use self::spinlock::{Spinlock, SpinlockGuard};

pub mod spinlock;

use std::sync::atomic::{AtomicUsize, Ordering};

/// The mutual-exclusion discipline protecting a future's completion slot and
/// pending-continuation list.
///
/// Every discipline provides the same guarantees (single-fire completion,
/// exactly-once continuation delivery); they differ only in how the two
/// bookkeeping operations are guarded. The strategy is fixed per future at
/// construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Exclusive spinlock around all state access
    Exclusive,
    /// Reader/writer lock: reads run concurrently, mutations are exclusive
    ReadWrite,
    /// Lock-free compare-and-swap over the pending-continuation stack
    LockFree,
}

impl SyncStrategy {
    fn to_index(self) -> usize {
        match self {
            SyncStrategy::Exclusive => 0,
            SyncStrategy::ReadWrite => 1,
            SyncStrategy::LockFree => 2,
        }
    }

    fn from_index(index: usize) -> SyncStrategy {
        match index {
            0 => SyncStrategy::Exclusive,
            1 => SyncStrategy::ReadWrite,
            2 => SyncStrategy::LockFree,
            _ => unreachable!("unknown synchronization strategy index"),
        }
    }
}

static DEFAULT_STRATEGY: AtomicUsize = AtomicUsize::new(0);

/// Select the strategy used by futures constructed without an explicit one.
///
/// Set this once, before the first future or promise that should use it is
/// constructed; it is not meant to be flipped concurrently with construction.
/// Futures that already exist keep whatever strategy they were built with.
pub fn set_default_strategy(strategy: SyncStrategy) {
    DEFAULT_STRATEGY.store(strategy.to_index(), Ordering::Relaxed);
}

/// The strategy new futures pick up by default
pub fn default_strategy() -> SyncStrategy {
    SyncStrategy::from_index(DEFAULT_STRATEGY.load(Ordering::Relaxed))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strategy_roundtrip() {
        for &strategy in &[SyncStrategy::Exclusive, SyncStrategy::ReadWrite, SyncStrategy::LockFree] {
            assert_eq!(SyncStrategy::from_index(strategy.to_index()), strategy);
        }
    }
}
