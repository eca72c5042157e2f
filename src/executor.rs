// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution contexts that run continuation bodies
//!
//! The engine never runs user code itself; every continuation is handed to an
//! `ExecutionContext` after the future's internal locks have been released.
//! The contexts shipped here are deliberately small: an inline one for pure
//! bookkeeping, a fixed thread pool, and a single-worker serial queue whose
//! FIFO order backs the per-context ordering guarantee.

use std::panic;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Once};
use std::thread;

/// A unit of work submitted to an execution context
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run submitted work.
///
/// Implementations must guarantee eventual execution and must not block the
/// submitter. Submission order is only meaningful within a serial context;
/// across contexts there is no ordering relation at all.
pub trait ExecutionContext: Send + Sync {
    fn execute(&self, task: Task);
}

/// Runs the task inline on the submitting thread.
///
/// The engine submits continuations only after releasing every internal
/// lock, so inline execution is safe with respect to the engine itself; it
/// is the right choice for cheap bookkeeping handlers. Anything that may
/// block or take long belongs on a pooled context instead.
pub struct Immediate;

impl ExecutionContext for Immediate {
    fn execute(&self, task: Task) {
        task();
    }
}

fn worker_loop(queue: Arc<Mutex<Receiver<Task>>>) {
    loop {
        let task = {
            let queue = queue.lock().unwrap();
            queue.recv()
        };

        match task {
            Ok(task) => {
                // A panicking task must not take the worker down with it
                if panic::catch_unwind(panic::AssertUnwindSafe(task)).is_err() {
                    warn!("task panicked on {:?}", thread::current().name());
                }
            }
            Err(..) => break,
        }
    }
}

fn spawn_workers(name: &str, count: usize) -> Sender<Task> {
    let (tx, rx) = mpsc::channel();
    let rx = Arc::new(Mutex::new(rx));

    for tid in 0..count {
        let rx = rx.clone();
        thread::Builder::new()
            .name(format!("{}-{}", name, tid))
            .spawn(move || worker_loop(rx))
            .expect("failed to spawn worker thread");
    }

    tx
}

/// A fixed pool of worker threads fed from a single queue.
///
/// Tasks are picked up in submission order but run concurrently, so no
/// ordering may be assumed between them.
pub struct ThreadPool {
    queue: Mutex<Sender<Task>>,
}

impl ThreadPool {
    pub fn new(workers: usize) -> ThreadPool {
        assert!(workers >= 1, "Must have at least one worker");
        ThreadPool { queue: Mutex::new(spawn_workers("copromise-pool", workers)) }
    }
}

impl ExecutionContext for ThreadPool {
    fn execute(&self, task: Task) {
        trace!("submitting task to thread pool");
        if self.queue.lock().unwrap().send(task).is_err() {
            warn!("thread pool workers are gone, dropping task");
        }
    }
}

/// A single worker draining a FIFO queue.
///
/// Tasks submitted to the same serial queue run one after another in
/// submission order.
pub struct SerialQueue {
    queue: Mutex<Sender<Task>>,
}

impl SerialQueue {
    pub fn new() -> SerialQueue {
        SerialQueue { queue: Mutex::new(spawn_workers("copromise-serial", 1)) }
    }
}

impl ExecutionContext for SerialQueue {
    fn execute(&self, task: Task) {
        trace!("submitting task to serial queue");
        if self.queue.lock().unwrap().send(task).is_err() {
            warn!("serial queue worker is gone, dropping task");
        }
    }
}

/// The process-wide default context backing the convenience registration
/// methods. Built lazily on first use: a thread pool with one worker per
/// available CPU.
pub fn default_context() -> Arc<dyn ExecutionContext> {
    static INIT: Once = Once::new();
    static mut DEFAULT: *const Arc<dyn ExecutionContext> = 0 as *const _;

    unsafe {
        INIT.call_once(|| {
            let pool: Arc<dyn ExecutionContext> = Arc::new(ThreadPool::new(::num_cpus::get()));
            DEFAULT = Box::into_raw(Box::new(pool));
        });

        (*DEFAULT).clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn immediate_runs_inline() {
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = ran.clone();
        Immediate.execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pool_runs_every_task() {
        const TASKS: usize = 64;

        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        for _ in 0..TASKS {
            let counter = counter.clone();
            let tx = tx.clone();
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                tx.send(()).unwrap();
            }));
        }

        for _ in 0..TASKS {
            rx.recv().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), TASKS);
    }

    #[test]
    fn serial_queue_preserves_order() {
        const TASKS: usize = 128;

        let queue = SerialQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();

        for index in 0..TASKS {
            let order = order.clone();
            let tx = tx.clone();
            queue.execute(Box::new(move || {
                order.lock().unwrap().push(index);
                tx.send(()).unwrap();
            }));
        }

        for _ in 0..TASKS {
            rx.recv().unwrap();
        }

        let order = order.lock().unwrap();
        assert_eq!(*order, (0..TASKS).collect::<Vec<_>>());
    }

    #[test]
    fn pool_survives_a_panicking_task() {
        let pool = ThreadPool::new(1);
        let (tx, rx) = mpsc::channel();

        pool.execute(Box::new(|| panic!("poison the worker")));

        pool.execute(Box::new(move || {
            tx.send(()).unwrap();
        }));

        rx.recv().unwrap();
    }
}
