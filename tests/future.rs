extern crate copromise;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;

use copromise::{make, make_with, sequence, CancelToken, Completion, ExecutionContext, Future,
                Immediate, SerialQueue, SyncStrategy};

const STRATEGIES: &'static [SyncStrategy] =
    &[SyncStrategy::Exclusive, SyncStrategy::ReadWrite, SyncStrategy::LockFree];

#[test]
fn immediate_success_is_observable_before_registration() {
    let future = Future::success(5);

    match future.completion() {
        Some(Completion::Success(value)) => assert_eq!(value, 5),
        other => panic!("expected a stored success, got {:?}", other),
    }
}

#[test]
fn failures_skip_success_handlers() {
    let (promise, future) = make::<u32>();
    let first_ran = Arc::new(AtomicBool::new(false));
    let second_ran = Arc::new(AtomicBool::new(false));

    let chained = {
        let first_ran = first_ran.clone();
        let second_ran = second_ran.clone();
        future.map(move |value: u32| {
                  first_ran.store(true, Ordering::SeqCst);
                  value + 1
              })
              .map(move |value| {
                  second_ran.store(true, Ordering::SeqCst);
                  value + 1
              })
    };

    promise.complete_with_fail("boom");

    let completion = chained.sync();
    assert_eq!(completion.error().unwrap().to_string(), "boom");
    assert!(!first_ran.load(Ordering::SeqCst));
    assert!(!second_ran.load(Ordering::SeqCst));
}

#[test]
fn completion_is_single_fire() {
    for &strategy in STRATEGIES {
        let (promise, future) = make_with::<u32>(strategy);

        assert!(promise.complete_with_success(1));
        assert!(!promise.complete_with_success(2));
        assert!(!promise.complete_with_fail("too late"));
        assert!(!promise.complete_with_cancel(None));

        assert_eq!(future.sync().into_value(), Some(1));
    }
}

#[test]
fn complete_using_adopts_transitive_outcome() {
    let (promise, inner) = make::<u32>();
    let middle = Future::completed(Completion::CompleteUsing(inner));
    let outer = Future::completed(Completion::CompleteUsing(middle.clone()));

    assert!(!outer.is_completed());

    promise.complete_with_success(11);

    assert_eq!(outer.sync().into_value(), Some(11));
    assert_eq!(middle.sync().into_value(), Some(11));
}

#[test]
fn handler_returned_future_drives_the_result() {
    let (first, f1) = make::<u32>();
    let (second, f2) = make::<u32>();

    let chained = f1.and_then(move |value| {
        assert_eq!(value, 1);
        f2
    });

    first.complete_with_success(1);
    second.complete_with_success(2);

    assert_eq!(chained.sync().into_value(), Some(2));
}

#[test]
fn on_complete_can_convert_a_failure() {
    let (promise, future) = make::<u32>();

    let recovered = future.on_complete(|completion| {
        match completion {
            Completion::Success(value) => Completion::Success(value.to_string()),
            Completion::Fail(..) => Completion::Success("fallback".to_owned()),
            other => other.convert(),
        }
    });

    promise.complete_with_fail("nope");

    assert_eq!(recovered.sync().into_value(), Some("fallback".to_owned()));
}

#[test]
fn concurrent_registration_fires_each_continuation_exactly_once() {
    const THREADS: usize = 16;

    for &strategy in STRATEGIES {
        let (promise, future) = make_with::<u32>(strategy);
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS + 1));
        let (tx, rx) = mpsc::channel();
        let mut handles = Vec::new();

        for _ in 0..THREADS {
            let future = future.clone();
            let calls = calls.clone();
            let barrier = barrier.clone();
            let tx = tx.clone();

            handles.push(thread::spawn(move || {
                let inline: Arc<dyn ExecutionContext> = Arc::new(Immediate);
                barrier.wait();
                future.map_in(&inline, move |value: u32| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tx.send(value).unwrap();
                });
            }));
        }

        barrier.wait();
        promise.complete_with_success(9);

        for handle in handles {
            handle.join().unwrap();
        }
        for _ in 0..THREADS {
            assert_eq!(rx.recv().unwrap(), 9);
        }

        assert_eq!(calls.load(Ordering::SeqCst), THREADS);
    }
}

#[test]
fn cancelling_a_completed_future_is_a_noop() {
    let future = Future::success(3);

    future.cancel();

    match future.completion() {
        Some(Completion::Success(value)) => assert_eq!(value, 3),
        other => panic!("cancellation clobbered the completion: {:?}", other),
    }
}

#[test]
fn cancellation_carries_its_token() {
    let (_promise, future) = make::<u32>();
    let token = CancelToken::new();

    future.cancel_with(token.clone());

    match future.sync() {
        Completion::Cancelled(Some(ref observed)) => assert_eq!(*observed, token),
        other => panic!("expected the cancellation token back, got {:?}", other),
    }
}

#[test]
fn cancellation_propagates_past_success_handlers() {
    let (_promise, future) = make::<u32>();
    let ran = Arc::new(AtomicBool::new(false));

    let chained = {
        let ran = ran.clone();
        future.map(move |value: u32| {
            ran.store(true, Ordering::SeqCst);
            value
        })
    };

    future.cancel();

    assert!(chained.sync().is_cancelled());
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn observers_fire_for_their_kind_only_and_chain() {
    let (promise, future) = make::<u32>();
    let failed = Arc::new(AtomicBool::new(false));
    let cancelled = Arc::new(AtomicBool::new(false));
    let inline: Arc<dyn ExecutionContext> = Arc::new(Immediate);

    let same = {
        let failed = failed.clone();
        let cancelled = cancelled.clone();
        future.on_fail_in(&inline, move |_| failed.store(true, Ordering::SeqCst))
              .on_cancel_in(&inline, move |_| cancelled.store(true, Ordering::SeqCst))
    };

    promise.complete_with_fail("observed");

    assert!(same.sync().is_fail());
    assert!(failed.load(Ordering::SeqCst));
    assert!(!cancelled.load(Ordering::SeqCst));
}

#[test]
fn serial_context_preserves_registration_order() {
    const CONTINUATIONS: usize = 64;

    let (promise, future) = make::<u32>();
    let serial: Arc<dyn ExecutionContext> = Arc::new(SerialQueue::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut derived = Vec::new();

    for index in 0..CONTINUATIONS {
        let order = order.clone();
        derived.push(future.map_in(&serial, move |_| {
            order.lock().unwrap().push(index);
        }));
    }

    promise.complete_with_success(0);

    for future in derived {
        future.sync();
    }

    assert_eq!(*order.lock().unwrap(), (0..CONTINUATIONS).collect::<Vec<_>>());
}

#[test]
fn a_direct_indirection_cycle_fails_fast() {
    let (promise, future) = make::<u32>();

    promise.complete_with(Completion::CompleteUsing(future.clone()));

    let completion = future.sync();
    assert!(completion.error().unwrap().is_indirection_cycle());
}

#[test]
fn a_two_node_indirection_cycle_fails_fast() {
    let (first, fa) = make::<u32>();
    let (second, fb) = make::<u32>();

    first.complete_with(Completion::CompleteUsing(fb.clone()));
    second.complete_with(Completion::CompleteUsing(fa.clone()));

    assert!(fa.sync().error().unwrap().is_indirection_cycle());
    assert!(fb.sync().error().unwrap().is_indirection_cycle());
}

#[test]
fn dropping_an_uncompleted_promise_breaks_the_future() {
    let future = {
        let (promise, future) = make::<u32>();
        drop(promise);
        future
    };

    let completion = future.sync();
    assert!(completion.error().unwrap().is_broken_promise());
}

#[test]
fn spawned_work_completes_its_future() {
    let future = Future::spawn(|| 6 * 7);
    assert_eq!(future.sync().into_value(), Some(42));
}

#[test]
fn sequence_preserves_order_and_fails_on_any_failure() {
    let aggregate = sequence(vec![Future::success(1), Future::success(2), Future::success(3)]);
    assert_eq!(aggregate.sync().into_value(), Some(vec![1, 2, 3]));

    let aggregate = sequence(vec![Future::success(1), Future::fail("second broke")]);
    let completion = aggregate.sync();
    assert_eq!(completion.error().unwrap().to_string(), "second broke");
}
