//! # Sidecar Queue
//!
//! The bounded, tail-drop, in-memory FIFO that sits between the Sampler and
//! the Worker Pool (§4.3). This is the only buffering point in the
//! pipeline: everything upstream either lands here or is dropped/sampled
//! out before it ever does.
//!
//! Concurrency: MPMC, built over a `tokio::sync::Mutex`-guarded `VecDeque`
//! plus a `Notify` used to wake blocked `get(timeout)` callers — the same
//! shape as the teacher's in-memory provider storage, minus the
//! session/visibility-timeout machinery a single-process tail-drop buffer
//! doesn't need.

use sidecar_core::event::ValidatedEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Returned by `try_put` when the queue is at capacity. The caller (the
/// Producer API) is expected to count this under
/// `events_dropped{reason="queue_full"}` and move on; it never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("queue is at capacity")]
pub struct QueueFullError;

struct Storage {
    buffer: VecDeque<ValidatedEvent>,
}

/// A fixed-capacity FIFO with tail-drop overflow semantics.
///
/// Capacity is tracked separately from the buffer's allocation
/// (`AtomicUsize`) so a config reload can widen or narrow the advertised
/// capacity without touching the deque: per spec §4.3, "resize on config
/// reload is lazy."
pub struct BoundedQueue {
    storage: Mutex<Storage>,
    notify: Notify,
    capacity: AtomicUsize,
}

impl BoundedQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: Mutex::new(Storage {
                buffer: VecDeque::with_capacity(capacity.min(1024)),
            }),
            notify: Notify::new(),
            capacity: AtomicUsize::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Widen or narrow the advertised capacity. Does not reallocate or
    /// evict; a narrower capacity only takes effect as the buffer drains
    /// below the new limit.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    /// Non-blocking enqueue. Returns `Err(QueueFullError)` if the buffer is
    /// already at (or above, following a capacity narrowing) the current
    /// capacity — the newest arrival is the one rejected (tail-drop).
    pub async fn try_put(&self, event: ValidatedEvent) -> Result<(), QueueFullError> {
        let mut storage = self.storage.lock().await;
        if storage.buffer.len() >= self.capacity() {
            return Err(QueueFullError);
        }
        storage.buffer.push_back(event);
        drop(storage);
        self.notify.notify_one();
        Ok(())
    }

    /// Block up to `timeout` for an event. Returns `None` on timeout so
    /// workers can re-check shutdown flags on their own cadence rather than
    /// blocking forever.
    pub async fn get(&self, timeout: Duration) -> Option<ValidatedEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut storage = self.storage.lock().await;
                if let Some(event) = storage.buffer.pop_front() {
                    return Some(event);
                }
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return None;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return None,
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.storage.lock().await.buffer.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn utilization(&self) -> f64 {
        let capacity = self.capacity();
        if capacity == 0 {
            return 0.0;
        }
        self.len().await as f64 / capacity as f64
    }
}

/// Shared handle used by producers and workers alike.
pub type SharedQueue = Arc<BoundedQueue>;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
