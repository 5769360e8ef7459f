//! Timer/callback registry driven by the poll loop.
//!
//! Callbacks are plain closures run on the main thread. The scheduler holds
//! non-`Send` closures, so it cannot leave the thread that owns the loop.

use crate::bridge::CallbackRegistry;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// Identifies a scheduled callback for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

enum Callback {
    Once(Box<dyn FnOnce()>),
    Repeating {
        interval: Duration,
        f: Box<dyn FnMut()>,
    },
}

/// Deadline-ordered callback registry.
///
/// Callbacks with equal deadlines run in scheduling order.
#[derive(Default)]
pub struct Scheduler {
    // (deadline, id) min-heap; ids increase monotonically so ties keep order
    queue: BinaryHeap<Reverse<(Instant, CallbackId)>>,
    callbacks: HashMap<CallbackId, Callback>,
    // Heap entries whose callback was cancelled; the front entry is never stale
    stale: usize,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` once, `delay` from now.
    pub fn schedule<F>(&mut self, delay: Duration, f: F) -> CallbackId
    where
        F: FnOnce() + 'static,
    {
        self.schedule_at(Instant::now() + delay, f)
    }

    /// Run `f` once at `deadline`.
    pub fn schedule_at<F>(&mut self, deadline: Instant, f: F) -> CallbackId
    where
        F: FnOnce() + 'static,
    {
        self.insert(deadline, Callback::Once(Box::new(f)))
    }

    /// Run `f` every `interval`, first after one interval.
    pub fn schedule_repeating<F>(&mut self, interval: Duration, f: F) -> CallbackId
    where
        F: FnMut() + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        self.insert(
            Instant::now() + interval,
            Callback::Repeating {
                interval,
                f: Box::new(f),
            },
        )
    }

    /// Remove a pending callback. Returns false if it already ran or was
    /// cancelled.
    pub fn cancel(&mut self, id: CallbackId) -> bool {
        if self.callbacks.remove(&id).is_none() {
            return false;
        }
        self.stale += 1;
        self.drop_stale();
        true
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Run every callback due at or before `now`.
    pub fn run_due_at(&mut self, now: Instant) -> usize {
        let mut ran = 0;
        let mut rearm = Vec::new();

        while let Some(Reverse((deadline, id))) = self.queue.peek().copied() {
            if deadline > now {
                break;
            }
            self.queue.pop();

            let Some(callback) = self.callbacks.remove(&id) else {
                self.stale = self.stale.saturating_sub(1);
                continue;
            };

            match callback {
                Callback::Once(f) => f(),
                Callback::Repeating { interval, mut f } => {
                    f();
                    let mut next = deadline + interval;
                    if next <= now {
                        // Fell behind; skip missed ticks rather than bursting
                        next = now + interval;
                    }
                    rearm.push((next, id, Callback::Repeating { interval, f }));
                }
            }
            ran += 1;
        }

        for (deadline, id, callback) in rearm {
            self.callbacks.insert(id, callback);
            self.queue.push(Reverse((deadline, id)));
        }
        self.drop_stale();

        if ran > 0 {
            tracing::trace!("Ran {} scheduled callbacks", ran);
        }
        ran
    }

    fn insert(&mut self, deadline: Instant, callback: Callback) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.callbacks.insert(id, callback);
        self.queue.push(Reverse((deadline, id)));
        id
    }

    /// Drop every cancelled entry from the queue.
    pub fn compact(&mut self) {
        let callbacks = &self.callbacks;
        self.queue
            .retain(|Reverse((_, id))| callbacks.contains_key(id));
        self.stale = 0;
    }

    /// Pop cancelled entries off the front, and rebuild once they make up
    /// more than half of the queue.
    fn drop_stale(&mut self) {
        while let Some(Reverse((_, id))) = self.queue.peek() {
            if self.callbacks.contains_key(id) {
                break;
            }
            self.queue.pop();
            self.stale = self.stale.saturating_sub(1);
        }
        if self.stale * 2 > self.queue.len() {
            self.compact();
        }
    }
}

impl CallbackRegistry for Scheduler {
    fn run_due(&mut self) -> usize {
        self.run_due_at(Instant::now())
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.queue.peek().map(|Reverse((deadline, _))| *deadline)
    }
}
