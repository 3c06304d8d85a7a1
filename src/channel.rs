// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Bounded FIFO hand-off between two pipeline units.
//!
//! Enqueueing never blocks: when the queue is full the offered item is
//! dropped and the queue keeps its oldest contents (drop-newest). The check
//! and the insert are a single `try_send`, so there is no window between
//! "not full" and "put" for another producer to fill the slot.
//!
//! The consumer keeps its own sender handle so that items already queued
//! stay readable after every producer is gone. Producer liveness is tracked
//! separately and reported through [`Take::Closed`] once the queue is empty.

use crate::error::PipelineError;
use kanal::{ReceiveErrorTimeout, Receiver, Sender};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Default capacity of the frame channel.
pub const DEFAULT_CAPACITY: usize = 30;

/// Creates a channel holding at most `capacity` items (minimum 1).
pub fn channel<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let capacity = capacity.max(1);
    let (tx, rx) = kanal::bounded(capacity);
    let live = Arc::new(AtomicUsize::new(1));
    (
        Producer {
            tx: tx.clone(),
            live: live.clone(),
            capacity,
        },
        Consumer {
            rx,
            _anchor: tx,
            live,
            capacity,
        },
    )
}

/// Sending half of a channel.
pub struct Producer<T> {
    tx: Sender<T>,
    live: Arc<AtomicUsize>,
    capacity: usize,
}

impl<T> Producer<T> {
    /// Enqueues without blocking.
    ///
    /// Returns [`PipelineError::ChannelFull`] when the item was dropped
    /// because the queue is at capacity, and [`PipelineError::ChannelClosed`]
    /// when the consumer is gone.
    pub fn offer(&self, item: T) -> Result<(), PipelineError> {
        match self.tx.try_send(item) {
            Ok(true) => Ok(()),
            Ok(false) => Err(PipelineError::ChannelFull),
            Err(_) => Err(PipelineError::ChannelClosed),
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        self.live.fetch_add(1, Ordering::AcqRel);
        Self {
            tx: self.tx.clone(),
            live: self.live.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Result of a blocking dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum Take<T> {
    Item(T),
    /// Nothing arrived within the timeout
    Empty,
    /// Every producer is gone and the queue is drained
    Closed,
}

/// Receiving half of a channel.
pub struct Consumer<T> {
    rx: Receiver<T>,
    _anchor: Sender<T>,
    live: Arc<AtomicUsize>,
    capacity: usize,
}

impl<T> Consumer<T> {
    /// Dequeues the oldest item if one is available.
    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok().flatten()
    }

    /// Waits up to `timeout` for the next item.
    pub fn take_timeout(&self, timeout: Duration) -> Take<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Take::Item(item),
            Err(ReceiveErrorTimeout::Timeout) if !self.is_closed() => Take::Empty,
            Err(_) => Take::Closed,
        }
    }

    /// All items currently queued, in arrival order.
    pub fn drain(&self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len());
        while let Some(item) = self.try_take() {
            items.push(item);
        }
        items
    }

    /// No producer is left and nothing remains queued.
    pub fn is_closed(&self) -> bool {
        self.live.load(Ordering::Acquire) == 0 && self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
