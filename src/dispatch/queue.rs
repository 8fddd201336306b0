// Bounded queue - lock-free SPSC ring with drop-on-full and a worker wake signal

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded as wake_channel};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

/// Result of a non-blocking push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue was full; the item was discarded and counted
    Dropped,
}

impl PushOutcome {
    pub fn is_queued(self) -> bool {
        self == PushOutcome::Queued
    }
}

/// Saturating drop counter shared by both halves
#[derive(Debug, Default)]
pub struct DropCounter {
    count: AtomicU32,
    // Set after a drop was logged, cleared by the next successful push
    reported: AtomicBool,
}

impl DropCounter {
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    fn record(&self) -> bool {
        let _ = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1));
        !self.reported.swap(true, Ordering::Relaxed)
    }

    fn clear_report(&self) {
        self.reported.store(false, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.reported.store(false, Ordering::Relaxed);
    }
}

pub struct QueueProducer<T> {
    inner: HeapProd<T>,
    drops: Arc<DropCounter>,
    wake: Sender<()>,
    name: &'static str,
}

pub struct QueueConsumer<T> {
    inner: HeapCons<T>,
    drops: Arc<DropCounter>,
    wake: Receiver<()>,
}

/// Create a queue holding exactly `capacity` items
pub fn bounded<T>(name: &'static str, capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let (producer, consumer) = HeapRb::<T>::new(capacity.max(1)).split();
    let (wake_tx, wake_rx) = wake_channel(1);
    let drops = Arc::new(DropCounter::default());
    (
        QueueProducer {
            inner: producer,
            drops: drops.clone(),
            wake: wake_tx,
            name,
        },
        QueueConsumer {
            inner: consumer,
            drops,
            wake: wake_rx,
        },
    )
}

impl<T> QueueProducer<T> {
    pub fn try_push(&mut self, item: T) -> PushOutcome {
        match self.inner.try_push(item) {
            Ok(()) => {
                self.drops.clear_report();
                let _ = self.wake.try_send(());
                PushOutcome::Queued
            }
            Err(_) => {
                if self.drops.record() {
                    debug!(queue = self.name, dropped = self.drops.get(), "queue full, dropping");
                }
                PushOutcome::Dropped
            }
        }
    }

    pub fn dropped(&self) -> u32 {
        self.drops.get()
    }

    pub fn drop_counter(&self) -> Arc<DropCounter> {
        self.drops.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }
}

impl<T> QueueConsumer<T> {
    pub fn try_pop(&mut self) -> Option<T> {
        self.inner.try_pop()
    }

    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.drops.get()
    }

    /// Block until a push signalled or the timeout elapsed
    pub fn wait(&self, timeout: Duration) -> bool {
        if !self.inner.is_empty() {
            return true;
        }
        match self.wake.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}
