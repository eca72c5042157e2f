// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The shared core behind every promise/future pair
//!
//! A `SharedCore` owns the completion slot and the pending-continuation list,
//! both guarded by the synchronization strategy the core was built with. The
//! free functions `settle` and `subscribe` are the whole engine: everything
//! in the public API is a thin wrapper around them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use completion::{Completion, FutureError};
use executor::ExecutionContext;
use executor::Immediate;
use future::cores::{CasCore, ExclusiveCore, RwCore};
use future::Future;
use sync::{Spinlock, SyncStrategy};

static NEXT_CORE_ID: AtomicUsize = AtomicUsize::new(1);

/// A registered handler waiting for a core to complete, paired with the
/// execution context it asked to run on.
///
/// The handler owns everything needed to complete its downstream core;
/// the upstream core never holds a strong reference back downstream.
pub struct Continuation<T> {
    handler: Box<dyn FnOnce(Completion<T>) + Send>,
    context: Arc<dyn ExecutionContext>,
}

impl<T> Continuation<T>
    where T: Send + 'static
{
    fn new(context: Arc<dyn ExecutionContext>, handler: Box<dyn FnOnce(Completion<T>) + Send>) -> Continuation<T> {
        Continuation {
            handler: handler,
            context: context,
        }
    }

    /// Hand the handler to its execution context. Called exactly once, and
    /// only after every engine lock has been released.
    pub fn schedule(self, completion: Completion<T>) {
        let Continuation { handler, context } = self;
        context.execute(Box::new(move || handler(completion)));
    }
}

/// Result of registering a continuation on a core
pub enum RegisterOutcome<T> {
    /// The core is still pending; the continuation was appended to its list
    Pending,
    /// The core already completed; the caller gets the continuation back
    /// together with the completion and must schedule it itself
    Completed(Continuation<T>, Completion<T>),
}

/// Result of attempting to complete a core
pub enum CompleteOutcome<T> {
    /// The attempt won; the drained pending list is returned in
    /// registration order for the caller to schedule
    Won(Vec<Continuation<T>>),
    /// The core was already completed, the attempt changed nothing
    Rejected,
}

/// The two guarded bookkeeping operations every synchronization strategy
/// must provide, plus the read-side accessors.
///
/// Implementations never invoke continuations themselves; they only mutate
/// the (completion, pending list) pair and report what the caller has to
/// schedule. That keeps user code strictly outside every critical section.
pub trait CoreSync<T>: Send + Sync {
    fn try_complete(&self, completion: Completion<T>) -> CompleteOutcome<T>;
    fn register(&self, continuation: Continuation<T>) -> RegisterOutcome<T>;
    fn completion(&self) -> Option<Completion<T>>;
    fn is_completed(&self) -> bool;
}

/// The state shared by a promise, its future handles and their registered
/// continuations.
pub struct SharedCore<T> {
    id: usize,
    sync: Box<dyn CoreSync<T>>,
    // Weak edge to the core this one defers to while a CompleteUsing
    // indirection is in flight; only read by the cycle walk.
    forward: Spinlock<Option<Weak<SharedCore<T>>>>,
}

impl<T> SharedCore<T>
    where T: Send + Sync + Clone + 'static
{
    pub fn new(strategy: SyncStrategy, completion: Option<Completion<T>>) -> Arc<SharedCore<T>> {
        let sync: Box<dyn CoreSync<T>> = match strategy {
            SyncStrategy::Exclusive => Box::new(ExclusiveCore::new(completion)),
            SyncStrategy::ReadWrite => Box::new(RwCore::new(completion)),
            SyncStrategy::LockFree => Box::new(CasCore::new(completion)),
        };

        Arc::new(SharedCore {
            id: NEXT_CORE_ID.fetch_add(1, Ordering::Relaxed),
            sync: sync,
            forward: Spinlock::new(None),
        })
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn sync(&self) -> &dyn CoreSync<T> {
        &*self.sync
    }

    pub fn has_forward(&self) -> bool {
        self.forward.lock().is_some()
    }

    fn forward_target(&self) -> Option<Arc<SharedCore<T>>> {
        self.forward.lock().as_ref().and_then(|weak| weak.upgrade())
    }

    fn set_forward(&self, target: &Arc<SharedCore<T>>) {
        *self.forward.lock() = Some(Arc::downgrade(target));
    }

    fn clear_forward(&self) {
        *self.forward.lock() = None;
    }
}

/// Register a handler on `core`, to run on `context` once the core has a
/// terminal completion. Fires immediately (through the context) if the core
/// already completed.
pub fn subscribe<T>(core: &Arc<SharedCore<T>>,
                    context: Arc<dyn ExecutionContext>,
                    handler: Box<dyn FnOnce(Completion<T>) + Send>)
    where T: Send + Sync + Clone + 'static
{
    let continuation = Continuation::new(context, handler);

    match core.sync.register(continuation) {
        RegisterOutcome::Pending => {
            trace!("continuation pending on core {}", core.id);
        }
        RegisterOutcome::Completed(continuation, completion) => {
            trace!("core {} already completed, scheduling continuation", core.id);
            continuation.schedule(completion);
        }
    }
}

/// Apply a completion to `core` under the single-fire rule.
///
/// Terminal completions either win (every pending continuation is scheduled
/// exactly once, after the strategy's critical section is over) or are
/// rejected as a double completion. A `CompleteUsing` completion instead
/// registers a forwarding subscription on the target future, so arbitrarily
/// long indirection chains resolve iteratively with bounded stack depth.
///
/// Returns `true` if the call decided the future's fate (including accepting
/// an indirection), `false` for a rejected double completion.
pub fn settle<T>(core: &Arc<SharedCore<T>>, completion: Completion<T>) -> bool
    where T: Send + Sync + Clone + 'static
{
    match completion {
        Completion::CompleteUsing(target) => resolve_indirection(core, target),
        completion => {
            match core.sync.try_complete(completion.clone()) {
                CompleteOutcome::Won(pending) => {
                    core.clear_forward();
                    trace!("core {} completed, scheduling {} continuation(s)", core.id, pending.len());
                    for continuation in pending {
                        continuation.schedule(completion.clone());
                    }
                    true
                }
                CompleteOutcome::Rejected => {
                    core.clear_forward();
                    debug!("core {} rejected a second completion", core.id);
                    false
                }
            }
        }
    }
}

fn resolve_indirection<T>(core: &Arc<SharedCore<T>>, target: Future<T>) -> bool
    where T: Send + Sync + Clone + 'static
{
    let target_core = target.core;

    // Publish the forward edge before walking: of two threads racing to
    // close a cycle, at least the later one then sees the whole loop.
    core.set_forward(&target_core);

    if forward_chain_cycles(core) {
        warn!("core {} was deferred along a cyclic indirection chain", core.id);
        return settle(core, Completion::Fail(FutureError::indirection_cycle()));
    }

    let origin = core.clone();
    subscribe(&target_core,
              Arc::new(Immediate),
              Box::new(move |completion| {
                  // settle clears the forward edge itself; clearing it here
                  // first would open a window in which the promise drop
                  // mistakes the pending core for a broken one
                  settle(&origin, completion);
              }));
    true
}

/// Floyd's tortoise/hare over the forward edges reachable from `origin`.
///
/// Edges disappear as indirections resolve, so a vanished edge means the
/// chain is making progress and cannot be a cycle.
fn forward_chain_cycles<T>(origin: &Arc<SharedCore<T>>) -> bool
    where T: Send + Sync + Clone + 'static
{
    fn advance<T>(node: Option<&Arc<SharedCore<T>>>) -> Option<Arc<SharedCore<T>>>
        where T: Send + Sync + Clone + 'static
    {
        node.and_then(|node| node.forward_target())
    }

    let mut slow = origin.forward_target();
    let mut fast = advance(slow.as_ref());

    while let Some(hare) = fast {
        if hare.id == origin.id {
            return true;
        }

        if let Some(ref tortoise) = slow {
            if tortoise.id == hare.id {
                return true;
            }
        }

        slow = advance(slow.as_ref());
        let step = advance(Some(&hare));
        fast = advance(step.as_ref());
    }

    false
}
