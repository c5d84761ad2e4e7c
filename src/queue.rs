//! Bounded event queue.
//!
//! [`EventQueue`] is a fixed-capacity ring of [`GamepadEvent`] records with a
//! drop-oldest policy: `push` never blocks and never fails, it evicts the oldest
//! record when full. Recency wins over completeness.
//!
//! [`SharedEventQueue`] wraps the ring in a mutex plus condition variable so a
//! producer thread (the HID run loop on macOS) can hand finished events to the
//! consumer, and the consumer can sleep in [`SharedEventQueue::pop_wait`]
//! instead of spinning.

use crate::event::GamepadEvent;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default number of records held before the oldest is dropped.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct EventQueue {
    buf: VecDeque<GamepadEvent>,
    cap: usize,
    dropped: u64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventQueue {
    /// Create a ring holding at most `cap` records (minimum 1).
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
            dropped: 0,
        }
    }

    /// Append a record, evicting the oldest one if the ring is full.
    pub fn push(&mut self, ev: GamepadEvent) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
            self.dropped += 1;
        }
        self.buf.push_back(ev);
    }

    /// Remove the oldest record, or `None` when empty.
    pub fn pop(&mut self) -> Option<GamepadEvent> {
        self.buf.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Records evicted by overflow since creation.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Thread-safe [`EventQueue`] with blocking pop.
#[derive(Debug, Default)]
pub struct SharedEventQueue {
    inner: Mutex<EventQueue>,
    ready: Condvar,
}

impl SharedEventQueue {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(EventQueue::with_capacity(cap)),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EventQueue> {
        // A panicking producer must not take the consumer down with it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, ev: GamepadEvent) {
        let overflowed = {
            let mut q = self.lock();
            let full = q.len() == q.capacity();
            q.push(ev);
            full
        };
        if overflowed {
            log::trace!("event queue full, dropped oldest record");
        }
        self.ready.notify_one();
    }

    /// Push several records under one lock.
    pub fn extend<I: IntoIterator<Item = GamepadEvent>>(&self, events: I) {
        {
            let mut q = self.lock();
            for ev in events {
                q.push(ev);
            }
        }
        self.ready.notify_all();
    }

    pub fn pop(&self) -> Option<GamepadEvent> {
        self.lock().pop()
    }

    /// Pop with a timeout in milliseconds.
    ///
    /// - `timeout_ms == 0`: same as [`pop`](Self::pop).
    /// - `timeout_ms < 0`: block until a record exists.
    /// - `timeout_ms > 0`: block at most that long.
    pub fn pop_wait(&self, timeout_ms: i32) -> Option<GamepadEvent> {
        if timeout_ms == 0 {
            return self.pop();
        }
        let mut q = self.wait_nonempty(self.lock(), timeout_ms);
        q.pop()
    }

    /// Block until the queue is non-empty or the timeout passes, without
    /// consuming anything. Same timeout rules as [`pop_wait`](Self::pop_wait).
    pub fn wait(&self, timeout_ms: i32) {
        if timeout_ms == 0 {
            return;
        }
        drop(self.wait_nonempty(self.lock(), timeout_ms));
    }

    fn wait_nonempty<'a>(
        &'a self,
        mut q: MutexGuard<'a, EventQueue>,
        timeout_ms: i32,
    ) -> MutexGuard<'a, EventQueue> {
        if timeout_ms < 0 {
            while q.is_empty() {
                q = self
                    .ready
                    .wait(q)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            return q;
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        while q.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .ready
                .wait_timeout(q, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            q = guard;
        }
        q
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::GamepadEvent;
    use std::sync::Arc;
    use std::thread;

    fn ev(n: u32) -> GamepadEvent {
        GamepadEvent::connected(n, n as i64)
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let mut q = EventQueue::with_capacity(4);
        assert!(q.pop().is_none());
    }

    #[test]
    fn fifo_order() {
        let mut q = EventQueue::with_capacity(4);
        q.push(ev(1));
        q.push(ev(2));
        assert_eq!(q.pop().map(|e| e.device_id), Some(1));
        assert_eq!(q.pop().map(|e| e.device_id), Some(2));
        assert!(q.is_empty());
    }

    #[test]
    fn overflow_drops_only_the_oldest() {
        let cap = DEFAULT_CAPACITY;
        let mut q = EventQueue::default();
        for n in 0..=cap as u32 {
            q.push(ev(n));
        }

        let drained: Vec<u32> = std::iter::from_fn(|| q.pop()).map(|e| e.device_id).collect();
        assert_eq!(drained.len(), cap);
        assert_eq!(drained.first(), Some(&1));
        assert_eq!(drained.last(), Some(&(cap as u32)));
        assert!(drained.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(q.dropped(), 1);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut q = EventQueue::with_capacity(0);
        q.push(ev(1));
        q.push(ev(2));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop().map(|e| e.device_id), Some(2));
    }

    #[test]
    fn pop_wait_zero_does_not_block() {
        let q = SharedEventQueue::with_capacity(8);
        let start = Instant::now();
        assert!(q.pop_wait(0).is_none());
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn pop_wait_times_out() {
        let q = SharedEventQueue::with_capacity(8);
        let start = Instant::now();
        assert!(q.pop_wait(20).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn pop_wait_forever_wakes_on_push() {
        let q = Arc::new(SharedEventQueue::with_capacity(8));
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                q.push(ev(9));
            })
        };
        assert_eq!(q.pop_wait(-1).map(|e| e.device_id), Some(9));
        producer.join().unwrap();
    }
}
