//! Bounded outbound queue between metric call sites and the forwarder.
//!
//! Any number of [`Producer`]s can enqueue payloads concurrently, and a single [`Consumer`] (the forwarder) dequeues
//! them in FIFO order. Enqueueing never blocks: once the queue is at or above [`DROP_THRESHOLD`] of its capacity, new
//! payloads are dropped instead.

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};

/// Fraction of the queue capacity at which producers start dropping payloads.
pub const DROP_THRESHOLD: f64 = 0.9;

/// Outcome of an enqueue attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Enqueued {
    /// The payload was appended to the queue.
    Accepted,

    /// The queue was too full, and the payload was dropped.
    Dropped,

    /// The consumer is gone, and the payload was dropped.
    Closed,
}

/// Outcome of a blocking dequeue.
#[derive(Debug, Eq, PartialEq)]
pub enum Dequeued {
    /// The next payload in the queue.
    Payload(String),

    /// The shutdown signal fired before a payload became available.
    Shutdown,

    /// Every producer was dropped and the queue is empty.
    Closed,
}

/// Creates a new bounded queue with the given capacity.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn bounded_queue(capacity: usize) -> (Producer, Consumer) {
    assert!(capacity > 0, "queue capacity must be non-zero");

    let (tx, rx) = bounded(capacity);
    let threshold = capacity as f64 * DROP_THRESHOLD;
    (Producer { tx, threshold }, Consumer { rx })
}

/// Producer side of the outbound queue.
#[derive(Clone)]
pub struct Producer {
    tx: Sender<String>,
    threshold: f64,
}

impl Producer {
    /// Enqueues the payload without blocking.
    ///
    /// If the queue is at or above the drop threshold, the payload is dropped.
    pub fn enqueue(&self, payload: String) -> Enqueued {
        if self.tx.len() as f64 >= self.threshold {
            return Enqueued::Dropped;
        }

        // Other producers can race us past the threshold, but `try_send` still never lets the queue grow beyond its
        // capacity.
        match self.tx.try_send(payload) {
            Ok(()) => Enqueued::Accepted,
            Err(TrySendError::Full(_)) => Enqueued::Dropped,
            Err(TrySendError::Disconnected(_)) => Enqueued::Closed,
        }
    }

    /// Returns the number of payloads currently queued.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Returns the capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }
}

/// Consumer side of the outbound queue.
pub struct Consumer {
    rx: Receiver<String>,
}

impl Consumer {
    /// Waits until a payload is available, the shutdown signal fires, or every producer has been dropped.
    ///
    /// The shutdown signal fires when its sending half is dropped.
    pub fn dequeue_blocking(&self, shutdown: &Receiver<()>) -> Dequeued {
        select! {
            recv(self.rx) -> msg => match msg {
                Ok(payload) => Dequeued::Payload(payload),
                Err(_) => Dequeued::Closed,
            },
            recv(shutdown) -> _ => Dequeued::Shutdown,
        }
    }

    /// Dequeues the next payload, if one is available, without blocking.
    pub fn try_dequeue(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Returns the number of payloads currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }
}
