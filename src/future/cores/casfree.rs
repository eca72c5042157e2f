// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use completion::Completion;
use future::core::{CompleteOutcome, Continuation, CoreSync, RegisterOutcome};

struct Node<T> {
    continuation: Continuation<T>,
    next: *mut Node<T>,
}

/// Sentinel stored in `head` once the core is sealed. Never dereferenced.
#[inline]
fn sealed<T>() -> *mut Node<T> {
    1 as *mut Node<T>
}

/// Lock-free discipline.
///
/// Pending continuations form a Treiber stack under `head`; a null head is
/// an empty pending list, the sentinel marks a sealed (completed) core.
///
/// Completing claims `claimed` first, writes the completion slot, then swaps
/// the sentinel into `head` with release ordering, taking the whole stack in
/// one step. Registration loops on a compare-and-swap of `head`; losing the
/// race against the seal swap re-reads the head and finds the sentinel, so a
/// continuation ends up either in the drained stack or scheduled by the
/// registrar, never both and never neither. An acquire load that observes
/// the sentinel therefore also observes the completion slot.
pub struct CasCore<T> {
    head: AtomicPtr<Node<T>>,
    claimed: AtomicBool,
    slot: UnsafeCell<Option<Completion<T>>>,
}

unsafe impl<T: Send + Sync> Send for CasCore<T> {}
unsafe impl<T: Send + Sync> Sync for CasCore<T> {}

impl<T> CasCore<T> {
    pub fn new(completion: Option<Completion<T>>) -> CasCore<T> {
        debug_assert!(completion.as_ref().map_or(true, |c| !c.is_complete_using()),
                      "a core must never store a pending indirection");

        match completion {
            Some(completion) => {
                CasCore {
                    head: AtomicPtr::new(sealed()),
                    claimed: AtomicBool::new(true),
                    slot: UnsafeCell::new(Some(completion)),
                }
            }
            None => {
                CasCore {
                    head: AtomicPtr::new(ptr::null_mut()),
                    claimed: AtomicBool::new(false),
                    slot: UnsafeCell::new(None),
                }
            }
        }
    }
}

impl<T> CoreSync<T> for CasCore<T>
    where T: Send + Sync + Clone + 'static
{
    fn try_complete(&self, completion: Completion<T>) -> CompleteOutcome<T> {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return CompleteOutcome::Rejected;
        }

        // Sole claimant: the slot write below happens-before the seal swap.
        unsafe {
            *self.slot.get() = Some(completion);
        }

        let mut node = self.head.swap(sealed(), Ordering::AcqRel);
        let mut drained = Vec::new();

        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
            drained.push(boxed.continuation);
        }

        // Stack order is reverse registration order
        drained.reverse();

        CompleteOutcome::Won(drained)
    }

    fn register(&self, continuation: Continuation<T>) -> RegisterOutcome<T> {
        let node = Box::into_raw(Box::new(Node {
            continuation: continuation,
            next: ptr::null_mut(),
        }));

        loop {
            let head = self.head.load(Ordering::Acquire);

            if head == sealed() {
                let boxed = unsafe { Box::from_raw(node) };
                let completion = unsafe {
                    (*self.slot.get()).clone().expect("sealed core without a completion")
                };
                return RegisterOutcome::Completed(boxed.continuation, completion);
            }

            unsafe {
                (*node).next = head;
            }

            if self.head.compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed).is_ok() {
                return RegisterOutcome::Pending;
            }
        }
    }

    fn completion(&self) -> Option<Completion<T>> {
        if self.head.load(Ordering::Acquire) == sealed() {
            unsafe { (*self.slot.get()).clone() }
        } else {
            None
        }
    }

    fn is_completed(&self) -> bool {
        self.head.load(Ordering::Acquire) == sealed()
    }
}

impl<T> Drop for CasCore<T> {
    fn drop(&mut self) {
        let mut node = *self.head.get_mut();

        if node == sealed() {
            return;
        }

        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
        }
    }
}
