// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The event-scheduler seam lifespan and deadline expiry hang off.
//!
//! The cache core never decides *how* timers are driven; it hands a
//! callback and a fire time to whatever `EventScheduler` the caller wired
//! up, and the callback's return value re-arms the next fire time — the
//! same "callback returns next firing time" contract the external
//! interfaces describe. [`ThreadedScheduler`] is the one concrete
//! implementation this crate ships, a single background thread driven by a
//! binary heap of due times, in the two-tier atomic/condvar notify idiom
//! used for wake notification elsewhere in this crate.

use parking_lot::{Condvar, Mutex};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Nanoseconds since `UNIX_EPOCH`, monotonic for scheduling purposes (the
/// scheduler only ever compares two values produced by [`now`]).
pub type MonotonicTime = i64;

/// Current time in the same units `EventScheduler` callbacks receive.
pub fn now() -> MonotonicTime {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

pub type TimerCallback = Arc<dyn Fn(MonotonicTime) -> Option<MonotonicTime> + Send + Sync>;

/// Opaque handle returned by `schedule_at`, used to cancel before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Schedules a callback to run at (or after) a monotonic time point.
pub trait EventScheduler: Send + Sync {
    /// Schedule `cb` to run at `time`. `cb`'s return value is the next fire
    /// time (re-arming), or `None` to stop.
    fn schedule_at(&self, time: MonotonicTime, cb: TimerCallback) -> TimerHandle;

    /// Cancel a previously scheduled timer. No-op if it already fired.
    fn cancel(&self, handle: TimerHandle);
}

struct Entry {
    id: u64,
    fire_at: MonotonicTime,
    cb: TimerCallback,
    cancelled: Arc<AtomicBool>,
}

struct Shared {
    heap: Mutex<BinaryHeap<Reverse<(MonotonicTime, u64)>>>,
    entries: Mutex<std::collections::HashMap<u64, Entry>>,
    condvar: Condvar,
    shutdown: AtomicBool,
    next_id: AtomicU64,
}

/// Single background-thread scheduler backed by a binary heap of due times.
pub struct ThreadedScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadedScheduler {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            heap: Mutex::new(BinaryHeap::new()),
            entries: Mutex::new(std::collections::HashMap::new()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        });

        let worker_shared = shared.clone();
        let worker = std::thread::Builder::new()
            .name("ddshc-scheduler".into())
            .spawn(move || run_worker(worker_shared))
            .expect("failed to spawn scheduler thread");

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }
}

impl Default for ThreadedScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadedScheduler {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.condvar.notify_all();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl EventScheduler for ThreadedScheduler {
    fn schedule_at(&self, time: MonotonicTime, cb: TimerCallback) -> TimerHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            fire_at: time,
            cb,
            cancelled: Arc::new(AtomicBool::new(false)),
        };

        self.shared.entries.lock().insert(id, entry);
        self.shared.heap.lock().push(Reverse((time, id)));
        self.shared.condvar.notify_all();
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(entry) = self.shared.entries.lock().remove(&handle.0) {
            entry.cancelled.store(true, Ordering::Release);
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }

        let next_due = shared.heap.lock().peek().map(|Reverse((t, _))| *t);

        let mut heap_guard = shared.heap.lock();
        match next_due {
            None => {
                shared.condvar.wait(&mut heap_guard);
            }
            Some(fire_at) => {
                let n = now();
                if fire_at > n {
                    let wait_for = Duration::from_nanos((fire_at - n).max(0) as u64);
                    shared.condvar.wait_for(&mut heap_guard, wait_for);
                }
            }
        }
        drop(heap_guard);

        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }

        let current = now();
        let due: Vec<u64> = {
            let mut heap = shared.heap.lock();
            let mut fired = Vec::new();
            while let Some(Reverse((t, id))) = heap.peek().copied() {
                if t > current {
                    break;
                }
                heap.pop();
                fired.push(id);
            }
            fired
        };

        for id in due {
            let entry = shared.entries.lock().remove(&id);
            let Some(entry) = entry else { continue };
            if entry.cancelled.load(Ordering::Acquire) {
                continue;
            }

            if let Some(next_fire) = (entry.cb)(entry.fire_at) {
                let re_armed = Entry {
                    id: entry.id,
                    fire_at: next_fire,
                    cb: entry.cb,
                    cancelled: entry.cancelled,
                };
                shared.entries.lock().insert(id, re_armed);
                shared.heap.lock().push(Reverse((next_fire, id)));
            }
        }
    }
}
