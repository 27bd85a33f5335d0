// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{num::NonZeroUsize, sync::Arc};

use relaycommon::DeliveryRequest;
use thiserror::Error;
use tokio::sync::{
    Mutex,
    mpsc::{self, error::TrySendError},
};

use crate::settings::OverflowPolicy;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity and the overflow policy is `reject`
    #[error("Dispatch queue is full")]
    QueueFull,
    /// All workers have stopped
    #[error("Dispatch queue is closed")]
    Closed,
}

/// Producer side of the dispatch queue. Cheap to clone; every request
/// handler holds one.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    sender: mpsc::Sender<DeliveryRequest>,
    overflow: OverflowPolicy,
}

/// Consumer side of the dispatch queue, shared by all workers. Whoever holds
/// the lock receives the next request, so every request reaches exactly one
/// worker and requests leave the queue in the order they entered it.
#[derive(Debug, Clone)]
pub struct PendingRequests {
    receiver: Arc<Mutex<mpsc::Receiver<DeliveryRequest>>>,
}

/// Create a bounded FIFO queue holding at most `capacity` requests.
pub fn queue(capacity: NonZeroUsize, overflow: OverflowPolicy) -> (DispatchQueue, PendingRequests) {
    let (sender, receiver) = mpsc::channel(capacity.get());
    (
        DispatchQueue { sender, overflow },
        PendingRequests {
            receiver: Arc::new(Mutex::new(receiver)),
        },
    )
}

impl DispatchQueue {
    /// Add a request to the queue. When the queue is full, this either waits
    /// for a free slot or fails with [`EnqueueError::QueueFull`], depending
    /// on the overflow policy.
    pub async fn enqueue(&self, request: DeliveryRequest) -> Result<(), EnqueueError> {
        match self.overflow {
            OverflowPolicy::Block => self
                .sender
                .send(request)
                .await
                .map_err(|_| EnqueueError::Closed),
            OverflowPolicy::Reject => self.sender.try_send(request).map_err(|e| match e {
                TrySendError::Full(_) => EnqueueError::QueueFull,
                TrySendError::Closed(_) => EnqueueError::Closed,
            }),
        }
    }

    /// Number of requests waiting for a worker.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PendingRequests {
    /// Wait for the next request. Returns `None` once every producer is gone
    /// and the queue is drained.
    pub(super) async fn next(&self) -> Option<DeliveryRequest> {
        self.receiver.lock().await.recv().await
    }
}
