// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The coinshop-rs Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Concurrency tests: serialized per-account debits, deadlock freedom of
//! the ordered two-account locking, and conservation under contention.
//!
//! The tests use parking_lot's `deadlock_detection` feature to watch for
//! cycles in the lock graph while threads hammer the engines.

use coinshop_rs::{
    BalanceStore, LedgerError, MemoryLedger, MemoryStore, OpContext, TransferEngine, UserId,
};
use parking_lot::deadlock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

fn store_with(balances: &[(i64, i64)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for &(id, balance) in balances {
        store.create_account(UserId(id), balance).unwrap();
    }
    store
}

// === Tests ===

/// Two concurrent debits of the full balance: exactly one may win.
#[test]
fn concurrent_full_debits_one_success_one_insufficient() {
    let detector = start_deadlock_detector();

    for _ in 0..100 {
        let store = store_with(&[(1, 100)]);
        let successes = AtomicUsize::new(0);
        let shortfalls = AtomicUsize::new(0);

        crossbeam::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|_| {
                    let ctx = OpContext::new();
                    match store.adjust(&ctx, UserId(1), -100) {
                        Ok(_) => {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(LedgerError::InsufficientFunds) => {
                            shortfalls.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                });
            }
        })
        .expect("Thread panicked");

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(shortfalls.load(Ordering::SeqCst), 1);
        let ctx = OpContext::new();
        assert_eq!(store.balance(&ctx, UserId(1)).unwrap(), 0);
    }

    stop_deadlock_detector(detector);
}

/// Opposing transfers over the same pair of accounts must both complete:
/// the lock order is global and direction-independent.
#[test]
fn no_deadlock_opposing_transfers() {
    let detector = start_deadlock_detector();
    let store = store_with(&[(1, 100_000), (2, 100_000)]);
    let ledger = Arc::new(MemoryLedger::new());
    let engine = Arc::new(TransferEngine::new(Arc::clone(&store), ledger));

    const OPS_PER_THREAD: usize = 1_000;

    let forward = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let ctx = OpContext::new();
            for _ in 0..OPS_PER_THREAD {
                let _ = engine.transfer(&ctx, UserId(1), UserId(2), 3, None);
            }
        })
    };
    let backward = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let ctx = OpContext::new();
            for _ in 0..OPS_PER_THREAD {
                let _ = engine.transfer(&ctx, UserId(2), UserId(1), 5, None);
            }
        })
    };

    forward.join().expect("Thread panicked");
    backward.join().expect("Thread panicked");

    stop_deadlock_detector(detector);

    // Conservation: opposing moves only shuffle coins between the pair.
    assert_eq!(store.sum_of_balances(), 200_000);
}

/// Many threads moving coins around a ring of accounts: no deadlock, no
/// value created or destroyed, no balance below zero.
#[test]
fn concurrent_ring_transfers_conserve_total() {
    let detector = start_deadlock_detector();

    const NUM_ACCOUNTS: i64 = 8;
    const NUM_THREADS: usize = 16;
    const OPS_PER_THREAD: usize = 500;
    const SEED: i64 = 1_000;

    let balances: Vec<(i64, i64)> = (1..=NUM_ACCOUNTS).map(|id| (id, SEED)).collect();
    let store = store_with(&balances);
    let ledger = Arc::new(MemoryLedger::new());
    let engine = TransferEngine::new(Arc::clone(&store), Arc::clone(&ledger));

    crossbeam::thread::scope(|scope| {
        for thread_id in 0..NUM_THREADS {
            let engine = &engine;
            scope.spawn(move |_| {
                let ctx = OpContext::new();
                for i in 0..OPS_PER_THREAD {
                    let from = ((thread_id + i) % NUM_ACCOUNTS as usize) as i64 + 1;
                    let to = (from % NUM_ACCOUNTS) + 1;
                    let amount = (i % 7 + 1) as i64;
                    match engine.transfer(&ctx, UserId(from), UserId(to), amount, None) {
                        Ok(()) | Err(LedgerError::InsufficientFunds) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            });
        }
    })
    .expect("Thread panicked");

    stop_deadlock_detector(detector);

    assert_eq!(store.sum_of_balances(), NUM_ACCOUNTS * SEED);
    let ctx = OpContext::new();
    for id in 1..=NUM_ACCOUNTS {
        assert!(store.balance(&ctx, UserId(id)).unwrap() >= 0);
    }
}

/// High contention on one account mixing credits, debits, and reads.
#[test]
fn no_deadlock_high_contention_single_account() {
    let detector = start_deadlock_detector();
    let store = store_with(&[(1, 0)]);

    const NUM_THREADS: usize = 50;
    const OPS_PER_THREAD: usize = 100;

    crossbeam::thread::scope(|scope| {
        for _ in 0..NUM_THREADS {
            let store = &store;
            scope.spawn(move |_| {
                let ctx = OpContext::new();
                for i in 0..OPS_PER_THREAD {
                    if i % 3 == 0 {
                        store.adjust(&ctx, UserId(1), 10).unwrap();
                    } else if i % 3 == 1 {
                        let _ = store.adjust(&ctx, UserId(1), -1);
                    } else {
                        let _ = store.balance(&ctx, UserId(1));
                    }
                }
            });
        }
    })
    .expect("Thread panicked");

    stop_deadlock_detector(detector);

    let ctx = OpContext::new();
    assert!(store.balance(&ctx, UserId(1)).unwrap() >= 0);
}

/// Concurrent creations of the same account: exactly one wins.
#[test]
fn concurrent_account_creation_is_atomic() {
    let store = Arc::new(MemoryStore::new());
    let created = AtomicUsize::new(0);

    crossbeam::thread::scope(|scope| {
        for _ in 0..8 {
            let store = &store;
            let created = &created;
            scope.spawn(move |_| {
                if store.create_account(UserId(1), 1000).is_ok() {
                    created.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    })
    .expect("Thread panicked");

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(store.account_count(), 1);
}

/// A transfer that loses the race for funds fails cleanly while the winner
/// commits: never two overdrafting successes.
#[test]
fn racing_transfers_never_overdraft() {
    for _ in 0..100 {
        let store = store_with(&[(1, 100), (2, 0), (3, 0)]);
        let ledger = Arc::new(MemoryLedger::new());
        let engine = TransferEngine::new(Arc::clone(&store), Arc::clone(&ledger));
        let successes = AtomicUsize::new(0);

        crossbeam::thread::scope(|scope| {
            for to in [2i64, 3] {
                let engine = &engine;
                let successes = &successes;
                scope.spawn(move |_| {
                    let ctx = OpContext::new();
                    match engine.transfer(&ctx, UserId(1), UserId(to), 100, None) {
                        Ok(()) => {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(LedgerError::InsufficientFunds) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                });
            }
        })
        .expect("Thread panicked");

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.transaction_count(), 1);
        assert_eq!(store.sum_of_balances(), 100);
    }
}
