// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-subscriber fan-out of ordered events.
//!
//! Each subscriber owns an unbounded FIFO buffer, so slow subscribers never
//! block publishers. Subscription and publication are serialized under one
//! lock: a subscriber joining mid-publish either sees the event or joined
//! after it, never a torn view. A subscriber whose backlog exceeds the
//! limit is evicted: a `Lagged` marker is queued and its stream terminates
//! after draining.

use marshal_core::{Envelope, Event};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;

struct SubscriberQueue {
    buf: Mutex<VecDeque<Envelope>>,
    notify: Notify,
    closed: AtomicBool,
}

impl SubscriberQueue {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

struct BusInner {
    next_id: u64,
    backlog_limit: usize,
    subscribers: HashMap<u64, Arc<SubscriberQueue>>,
}

/// Multi-subscriber publish channel.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

/// Ordered event stream for one subscriber. Yields `None` once closed and
/// drained.
pub struct EventStream {
    queue: Arc<SubscriberQueue>,
}

impl EventStream {
    pub async fn next(&mut self) -> Option<Envelope> {
        loop {
            let notified = self.queue.notify.notified();
            if let Some(envelope) = self.queue.buf.lock().pop_front() {
                return Some(envelope);
            }
            if self.queue.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }

    /// Drain without waiting; for tests and polling consumers.
    pub fn try_next(&mut self) -> Option<Envelope> {
        self.queue.buf.lock().pop_front()
    }
}

/// Close handle for one subscription. Dropping it unsubscribes.
pub struct SubscriberGuard {
    id: u64,
    bus: Weak<Mutex<BusInner>>,
    queue: Arc<SubscriberQueue>,
}

impl SubscriberGuard {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Terminate the stream and free the buffer.
    pub fn close(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.lock().subscribers.remove(&self.id);
        }
        self.queue.close();
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.close();
    }
}

impl EventBus {
    pub fn new(backlog_limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 0,
                backlog_limit,
                subscribers: HashMap::new(),
            })),
        }
    }

    /// Subscribe with an empty buffer. The stream yields only events
    /// published strictly after this call returns.
    pub fn subscribe(&self) -> (EventStream, SubscriberGuard) {
        self.subscribe_with(Vec::new())
    }

    /// Subscribe with `initial` events pre-queued.
    pub fn subscribe_with(&self, initial: Vec<Envelope>) -> (EventStream, SubscriberGuard) {
        self.subscribe_with_init(move || initial)
    }

    /// Subscribe with initial events computed under the publish lock.
    ///
    /// `init` runs while publication is held off, so the initial events
    /// reflect a state no publish can have moved past unseen: everything
    /// published afterwards reaches the new buffer, in order, behind them.
    /// `init` must not publish.
    pub fn subscribe_with_init(
        &self,
        init: impl FnOnce() -> Vec<Envelope>,
    ) -> (EventStream, SubscriberGuard) {
        let mut inner = self.inner.lock();
        let queue = Arc::new(SubscriberQueue {
            buf: Mutex::new(init().into()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });

        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, Arc::clone(&queue));
        drop(inner);
        queue.notify.notify_one();

        (
            EventStream { queue: Arc::clone(&queue) },
            SubscriberGuard { id, bus: Arc::downgrade(&self.inner), queue },
        )
    }

    /// Append to every live subscriber's buffer. Never blocks on a
    /// subscriber; evicts any whose backlog exceeds the limit.
    pub fn publish(&self, envelope: Envelope) {
        let mut inner = self.inner.lock();
        let limit = inner.backlog_limit;
        let mut evicted = Vec::new();

        for (id, queue) in &inner.subscribers {
            let mut buf = queue.buf.lock();
            if buf.len() >= limit {
                buf.push_back(Envelope { at_ms: envelope.at_ms, event: Event::Lagged });
                drop(buf);
                queue.close();
                evicted.push(*id);
                continue;
            }
            buf.push_back(envelope.clone());
            drop(buf);
            queue.notify.notify_one();
        }

        for id in evicted {
            tracing::warn!(subscriber = id, "evicting lagging subscriber");
            inner.subscribers.remove(&id);
        }
    }

    /// Drop one subscriber's buffer and terminate its stream.
    pub fn unsubscribe(&self, id: u64) {
        let queue = self.inner.lock().subscribers.remove(&id);
        if let Some(queue) = queue {
            queue.close();
        }
    }

    /// Terminate every stream; used at engine shutdown.
    pub fn close_all(&self) {
        let mut inner = self.inner.lock();
        for queue in inner.subscribers.values() {
            queue.close();
        }
        inner.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
