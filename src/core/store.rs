//! The collector's rolling window of recent samples.
//!
//! `SampleStore` is shared between request handlers behind an `Arc`. A
//! single mutex guards the window so that eviction, append and panic
//! evaluation happen atomically with respect to snapshots. Snapshots are
//! copies; rendering never holds the lock.

use super::panic::{PanicDetector, PanicEvent, PanicState, DEFAULT_PANIC_THRESHOLD};
use super::sample::StampedRate;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of samples kept in the window.
pub const DEFAULT_CAPACITY: usize = 360;

/// Events buffered per subscriber before new ones are dropped.
pub const SUBSCRIBER_CAPACITY: usize = 64;

/// Fixed-capacity FIFO of samples in arrival order.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<StampedRate>,
    capacity: usize,
}

impl RollingWindow {
    /// Create an empty window; a capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one first when full.
    ///
    /// Returns the evicted sample, if any.
    pub fn push(&mut self, sample: StampedRate) -> Option<StampedRate> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, StampedRate> {
        self.samples.iter()
    }

    /// Copy the contents out in arrival order.
    pub fn to_vec(&self) -> Vec<StampedRate> {
        self.samples.iter().copied().collect()
    }
}

impl<'a> IntoIterator for &'a RollingWindow {
    type Item = &'a StampedRate;
    type IntoIter = std::collections::vec_deque::Iter<'a, StampedRate>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

struct Inner {
    window: RollingWindow,
    last_state: PanicState,
}

/// Process-wide sample store, injected into the HTTP handlers.
pub struct SampleStore {
    inner: Mutex<Inner>,
    detector: PanicDetector,
    subscribers: Mutex<Vec<Sender<PanicEvent>>>,
}

/// Shared store handle.
pub type SharedSampleStore = Arc<SampleStore>;

impl Default for SampleStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_PANIC_THRESHOLD)
    }
}

impl SampleStore {
    pub fn new(capacity: usize, panic_threshold: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                window: RollingWindow::new(capacity),
                last_state: PanicState::Ok,
            }),
            detector: PanicDetector::new(panic_threshold),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Create a store already wrapped for sharing.
    pub fn shared(capacity: usize, panic_threshold: usize) -> SharedSampleStore {
        Arc::new(Self::new(capacity, panic_threshold))
    }

    /// Record one sample and re-evaluate the panic condition.
    ///
    /// The returned state is the one computed for this push. Every push
    /// that evaluates to panic logs a warning; transitions are also sent to
    /// subscribers before the lock is released, so they arrive in push order.
    pub fn push(&self, timestamp: f64, rate: u32) -> PanicState {
        tracing::debug!("Push: timestamp={:.2}, rate={}", timestamp, rate);

        let mut inner = self.inner.lock();
        inner.window.push(StampedRate::new(timestamp, rate));

        let state = self.detector.state(&inner.window);
        if state.is_panic() {
            tracing::warn!("Panic! No heart-rate signal, last sample at {:.2}", timestamp);
        }
        if let Some(event) = PanicEvent::between(inner.last_state, state, timestamp) {
            self.dispatch(event);
        }
        inner.last_state = state;

        state
    }

    /// Independent copy of the window in arrival order.
    pub fn snapshot(&self) -> Vec<StampedRate> {
        self.inner.lock().window.to_vec()
    }

    /// Recompute the panic predicate over the current window.
    pub fn panic_state(&self) -> PanicState {
        let inner = self.inner.lock();
        self.detector.state(&inner.window)
    }

    /// Receive future OK→PANIC and PANIC→OK transitions.
    ///
    /// Each subscriber buffers up to [`SUBSCRIBER_CAPACITY`] events. When a
    /// subscriber falls that far behind, further events are dropped for it
    /// until it drains its queue; it stays subscribed. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> Receiver<PanicEvent> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.inner.lock().window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().window.capacity()
    }

    pub fn panic_threshold(&self) -> usize {
        self.detector.threshold()
    }

    /// Called with `inner` held; lock order is `inner` then `subscribers`.
    fn dispatch(&self, event: PanicEvent) {
        if let PanicEvent::Cleared { timestamp } = event {
            tracing::info!("Heart-rate signal restored at {:.2}", timestamp);
        }

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Panic event subscriber is full, dropping {:?}", event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
