// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

extern crate clap;
extern crate copromise;
extern crate env_logger;
extern crate num_cpus;

use std::sync::Arc;
use std::time::Instant;

use clap::{App, Arg};
use copromise::{sequence, Completion, ExecutionContext, Future, Immediate, Promise, SyncStrategy,
                ThreadPool};

fn unit_add(pool: &Arc<dyn ExecutionContext>, strategy: SyncStrategy, x: u64, y: u64) -> Future<u64> {
    let promise = Promise::with_strategy(strategy);
    let future = promise.future();

    pool.execute(Box::new(move || {
        promise.complete_with_success(x + y);
    }));

    future
}

fn divide_and_conquer(pool: &Arc<dyn ExecutionContext>,
                      strategy: SyncStrategy,
                      x: u64,
                      y: u64,
                      iterations: usize)
                      -> Future<u64> {
    let promise = Promise::with_strategy(strategy);
    let future = promise.future();
    let worker_pool = pool.clone();

    pool.execute(Box::new(move || {
        let mut parts = Vec::new();

        if iterations == 1 {
            parts.push(unit_add(&worker_pool, strategy, x, y));
        } else {
            let half = iterations / 2;
            parts.push(divide_and_conquer(&worker_pool, strategy, x, y, half));
            parts.push(divide_and_conquer(&worker_pool, strategy, x, y, half));
            if half * 2 < iterations {
                parts.push(unit_add(&worker_pool, strategy, x, y));
            }
        }

        let inline: Arc<dyn ExecutionContext> = Arc::new(Immediate);
        sequence(parts).map_in(&inline, move |values: Vec<u64>| {
            let mut sum = 0;
            for value in &values {
                sum += *value;
            }
            promise.complete_with_success(sum);
        });
    }));

    future
}

fn main() {
    env_logger::init();

    let matches = App::new("divide-conquer")
        .about("Sums N unit additions through a tree of sequenced futures")
        .arg(Arg::with_name("iterations")
                 .short("n")
                 .long("iterations")
                 .takes_value(true)
                 .help("Number of unit additions to aggregate"))
        .arg(Arg::with_name("strategy")
                 .short("s")
                 .long("strategy")
                 .takes_value(true)
                 .possible_values(&["exclusive", "readwrite", "lockfree"])
                 .help("Synchronization strategy guarding every future"))
        .get_matches();

    let iterations = matches.value_of("iterations")
                            .unwrap_or("20000")
                            .parse::<usize>()
                            .expect("iterations must be a number");
    assert!(iterations >= 1, "need at least one addition");

    let strategy = match matches.value_of("strategy").unwrap_or("exclusive") {
        "readwrite" => SyncStrategy::ReadWrite,
        "lockfree" => SyncStrategy::LockFree,
        _ => SyncStrategy::Exclusive,
    };

    let pool: Arc<dyn ExecutionContext> = Arc::new(ThreadPool::new(num_cpus::get()));

    let beg = Instant::now();
    let completion = divide_and_conquer(&pool, strategy, 0, 1, iterations).sync();
    let elapsed = beg.elapsed();

    match completion {
        Completion::Success(sum) => {
            println!("{} additions -> {} in {:?} using {:?}", iterations, sum, elapsed, strategy);
        }
        other => println!("aggregate failed: {:?}", other),
    }
}
