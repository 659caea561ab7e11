//! Session output multiplexer.
//!
//! This module provides broadcasting of PTY output to multiple attached consumers.
//! It handles slow consumers by dropping messages when their queues are full,
//! and tracks per-consumer delivery statistics and backpressure.
//!
//! [`ConsumerSet`] performs no locking of its own; the owning session guards it
//! together with the history log so that appends, fan-out, and attach are
//! mutually exclusive.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Identifier of a consumer within its session.
pub type ConsumerId = u64;

/// Default queue capacity for each consumer, in messages.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Statistics about a consumer's message handling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Total messages queued successfully.
    pub messages_sent: u64,
    /// Messages dropped because the queue was full.
    pub messages_dropped: u64,
    /// Whether the consumer is currently experiencing backpressure.
    pub is_backpressured: bool,
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Queued,
    Dropped,
    Disconnected,
}

/// The session-side half of a consumer.
struct ConsumerHandle {
    id: ConsumerId,
    tx: mpsc::Sender<Bytes>,
    done: CancellationToken,
    stats: ConsumerStats,
}

impl ConsumerHandle {
    /// Attempts to queue data without blocking.
    fn try_send(&mut self, data: Bytes) -> Delivery {
        match self.tx.try_send(data) {
            Ok(()) => {
                self.stats.messages_sent += 1;
                if self.stats.is_backpressured {
                    self.stats.is_backpressured = false;
                    tracing::debug!(consumer_id = self.id, "Consumer recovered from backpressure");
                }
                Delivery::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.messages_dropped += 1;
                if !self.stats.is_backpressured {
                    self.stats.is_backpressured = true;
                    tracing::warn!(
                        consumer_id = self.id,
                        dropped = self.stats.messages_dropped,
                        "Consumer is backpressured, dropping output"
                    );
                }
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Disconnected,
        }
    }
}

/// An attached viewer: a bounded output queue plus a termination signal.
///
/// The queue yields every chunk the session delivered to this consumer, in
/// pump order. The termination signal fires when the consumer is detached or
/// the session is closed.
pub struct Consumer {
    id: ConsumerId,
    rx: mpsc::Receiver<Bytes>,
    done: CancellationToken,
}

impl Consumer {
    /// Returns the consumer ID.
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Waits for the next output chunk.
    ///
    /// Returns `None` once the consumer has been detached and its queue drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Takes the next queued chunk without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Returns a handle to the termination signal.
    pub fn termination(&self) -> CancellationToken {
        self.done.clone()
    }

    /// Returns whether the consumer has been terminated.
    pub fn is_terminated(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Splits the consumer into its ID, output queue, and termination signal.
    pub fn into_parts(self) -> (ConsumerId, mpsc::Receiver<Bytes>, CancellationToken) {
        (self.id, self.rx, self.done)
    }
}

/// The set of consumers attached to one session.
pub struct ConsumerSet {
    consumers: HashMap<ConsumerId, ConsumerHandle>,
    next_id: ConsumerId,
}

impl ConsumerSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            consumers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a consumer with a queue of `capacity` messages.
    pub fn add(&mut self, capacity: usize) -> Consumer {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let done = CancellationToken::new();
        self.consumers.insert(
            id,
            ConsumerHandle {
                id,
                tx,
                done: done.clone(),
                stats: ConsumerStats::default(),
            },
        );
        tracing::debug!(consumer_id = id, capacity, "Added consumer");

        Consumer { id, rx, done }
    }

    /// Removes a consumer and fires its termination signal.
    ///
    /// Returns the consumer's statistics if it was still registered.
    pub fn remove(&mut self, id: ConsumerId) -> Option<ConsumerStats> {
        let handle = self.consumers.remove(&id)?;
        handle.done.cancel();
        Some(handle.stats)
    }

    /// Delivers data to every consumer without blocking.
    ///
    /// Consumers with a full queue miss this chunk. Consumers whose receiving
    /// half was dropped are removed. Returns how many consumers queued it.
    pub fn broadcast(&mut self, data: &Bytes) -> usize {
        let mut disconnected = Vec::new();
        let mut queued = 0;

        for (id, handle) in self.consumers.iter_mut() {
            match handle.try_send(data.clone()) {
                Delivery::Queued => queued += 1,
                Delivery::Dropped => {}
                Delivery::Disconnected => disconnected.push(*id),
            }
        }

        for id in disconnected {
            self.remove(id);
            tracing::debug!(consumer_id = id, "Removed disconnected consumer");
        }

        queued
    }

    /// Removes every consumer, firing each termination signal.
    ///
    /// Returns how many consumers were attached.
    pub fn close_all(&mut self) -> usize {
        let count = self.consumers.len();
        for (_, handle) in self.consumers.drain() {
            handle.done.cancel();
        }
        count
    }

    /// Returns the number of attached consumers.
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Returns whether no consumer is attached.
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Returns statistics for one consumer.
    pub fn stats(&self, id: ConsumerId) -> Option<ConsumerStats> {
        self.consumers.get(&id).map(|h| h.stats.clone())
    }
}

impl Default for ConsumerSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_consumer_ids_are_unique() {
        let mut set = ConsumerSet::new();
        let a = set.add(4);
        let b = set.add(4);
        assert_ne!(a.id(), b.id());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_broadcast_preserves_order_for_every_consumer() {
        let mut set = ConsumerSet::new();
        let mut a = set.add(16);
        let mut b = set.add(16);

        for part in ["one", "two", "three"] {
            assert_eq!(set.broadcast(&chunk(part)), 2);
        }

        for consumer in [&mut a, &mut b] {
            let received: Vec<Bytes> = std::iter::from_fn(|| consumer.try_recv()).collect();
            assert_eq!(received, vec![chunk("one"), chunk("two"), chunk("three")]);
        }
    }

    #[test]
    fn test_full_queue_drops_without_affecting_others() {
        let mut set = ConsumerSet::new();
        let mut slow = set.add(2);
        let mut fast = set.add(16);

        for i in 0..5 {
            set.broadcast(&chunk(&i.to_string()));
            // The fast consumer keeps draining.
            assert_eq!(fast.try_recv(), Some(chunk(&i.to_string())));
        }

        let stats = set.stats(slow.id()).unwrap();
        assert_eq!(stats.messages_sent, 2);
        assert_eq!(stats.messages_dropped, 3);
        assert!(stats.is_backpressured);

        // The slow consumer saw a prefix of the stream.
        assert_eq!(slow.try_recv(), Some(chunk("0")));
        assert_eq!(slow.try_recv(), Some(chunk("1")));
        assert_eq!(slow.try_recv(), None);
    }

    #[test]
    fn test_backpressure_clears_after_drain() {
        let mut set = ConsumerSet::new();
        let mut consumer = set.add(1);

        set.broadcast(&chunk("a"));
        set.broadcast(&chunk("b"));
        assert!(set.stats(consumer.id()).unwrap().is_backpressured);

        consumer.try_recv();
        set.broadcast(&chunk("c"));
        assert!(!set.stats(consumer.id()).unwrap().is_backpressured);
    }

    #[test]
    fn test_remove_fires_termination_and_closes_queue() {
        let mut set = ConsumerSet::new();
        let mut consumer = set.add(4);
        set.broadcast(&chunk("queued"));

        let stats = set.remove(consumer.id()).unwrap();
        assert_eq!(stats.messages_sent, 1);
        assert!(consumer.is_terminated());
        assert!(set.is_empty());

        // Already-queued data is still readable, then the queue ends.
        assert_eq!(consumer.try_recv(), Some(chunk("queued")));
        assert_eq!(consumer.try_recv(), None);

        // Second removal is a no-op.
        assert!(set.remove(consumer.id()).is_none());
    }

    #[test]
    fn test_dropped_receiver_is_pruned_on_broadcast() {
        let mut set = ConsumerSet::new();
        let gone = set.add(4);
        let _kept = set.add(4);
        drop(gone);

        assert_eq!(set.broadcast(&chunk("x")), 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_close_all_terminates_everyone() {
        let mut set = ConsumerSet::new();
        let a = set.add(4);
        let b = set.add(4);

        assert_eq!(set.close_all(), 2);
        assert!(a.is_terminated());
        assert!(b.is_terminated());
        assert!(set.is_empty());
        assert_eq!(set.close_all(), 0);
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_removal() {
        let mut set = ConsumerSet::new();
        let mut consumer = set.add(4);
        let id = consumer.id();
        set.remove(id);
        assert_eq!(consumer.recv().await, None);
    }
}
