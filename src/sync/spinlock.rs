// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A simple spinlock

use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

#[inline(always)]
fn cpu_relax() {
    hint::spin_loop();
}

const BACKOFF_BASE: usize = 1 << 4;
const BACKOFF_CEILING: usize = 1 << 10;

/// A simple, unfair spinlock.
///
/// Suited for critical sections that only touch a couple of words, like the
/// bookkeeping of a future's completion slot. Contended waiters back off
/// exponentially instead of hammering the cache line.
pub struct Spinlock<T: ?Sized> {
    lock: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub fn new(data: T) -> Spinlock<T> {
        Spinlock {
            lock: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> Spinlock<T> {
    pub fn try_lock(&self) -> Option<SpinlockGuard<T>> {
        match self.lock.compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed) {
            Ok(..) => Some(SpinlockGuard::new(self)),
            Err(..) => None,
        }
    }

    pub fn lock(&self) -> SpinlockGuard<T> {
        let mut backoff = BACKOFF_BASE;

        while self.lock.compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed) != Ok(false) {
            while self.lock.load(Ordering::Relaxed) {
                for _ in 0..backoff {
                    cpu_relax();
                }

                backoff <<= (backoff != BACKOFF_CEILING) as usize;
            }
        }

        SpinlockGuard::new(self)
    }
}

impl<T: ?Sized + Default> Default for Spinlock<T> {
    fn default() -> Spinlock<T> {
        Spinlock::new(Default::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Spinlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => write!(f, "Spinlock {{ data: {:?} }}", &*guard),
            None => write!(f, "Spinlock {{ <locked> }}"),
        }
    }
}

pub struct SpinlockGuard<'a, T: ?Sized + 'a> {
    owner: &'a Spinlock<T>,
    // keeps the guard on the thread that acquired the lock
    _not_send: PhantomData<*const ()>,
}

impl<'a, T: ?Sized> SpinlockGuard<'a, T> {
    fn new(owner: &'a Spinlock<T>) -> SpinlockGuard<'a, T> {
        SpinlockGuard {
            owner: owner,
            _not_send: PhantomData,
        }
    }
}

impl<'a, T: ?Sized> Drop for SpinlockGuard<'a, T> {
    fn drop(&mut self) {
        self.owner.lock.store(false, Ordering::Release);
    }
}

impl<'a, T: ?Sized> Deref for SpinlockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.owner.data.get() }
    }
}

impl<'a, T: ?Sized> DerefMut for SpinlockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.owner.data.get() }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lock_and_unlock() {
        let lock = Spinlock::new(1);

        {
            let mut guard = lock.lock();
            *guard += 1;
        }

        assert_eq!(*lock.lock(), 2);
    }

    #[test]
    fn try_lock_while_held() {
        let lock = Spinlock::new(0);

        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn contended_counter() {
        const THREADS: usize = 4;
        const ITERS: usize = 10_000;

        let lock = Arc::new(Spinlock::new(0usize));
        let mut handles = Vec::new();

        for _ in 0..THREADS {
            let lock = lock.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..ITERS {
                    *lock.lock() += 1;
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*lock.lock(), THREADS * ITERS);
    }
}
