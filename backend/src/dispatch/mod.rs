// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Handing translated requests to the push service.
//!
//! In synchronous mode the request handler pushes inline and reports the
//! real outcome. In queued mode it places the request on a bounded FIFO queue
//! serviced by a fixed pool of workers and answers right away. What happens
//! on a full queue is the [`OverflowPolicy`]: block the handler until a slot
//! frees up, or reject the request.

use std::sync::Arc;

use relaycommon::{DeliveryRequest, DispatchOutcome};
use thiserror::Error;

use crate::{
    push::{PushClients, PushNotificationError, PushNotificationProvider},
    settings::{DispatchMode, DispatchSettings},
};

mod queue;
#[cfg(test)]
mod tests;
mod worker;

pub use queue::{DispatchQueue, EnqueueError, PendingRequests, queue};
pub use worker::WorkerPool;

#[derive(Debug)]
pub enum Dispatch<P> {
    Synchronous(Arc<PushClients<P>>),
    Queued(DispatchQueue),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The push service answered (synchronous mode)
    Delivered(DispatchOutcome),
    /// The request waits for a worker (queued mode)
    Queued,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Enqueue(#[from] EnqueueError),
    #[error(transparent)]
    Push(#[from] PushNotificationError),
}

impl<P: PushNotificationProvider> Dispatch<P> {
    /// Set up dispatching as configured. In queued mode this spawns the
    /// worker pool, which the caller shuts down when the server stops.
    pub fn start(
        settings: &DispatchSettings,
        clients: Arc<PushClients<P>>,
    ) -> (Self, Option<WorkerPool>) {
        match settings.mode {
            DispatchMode::Synchronous => (Self::Synchronous(clients), None),
            DispatchMode::Queued => {
                let (queue, pending) = queue(settings.queue_capacity, settings.overflow);
                let worker_pool = WorkerPool::spawn(pending, clients, settings.workers);
                (Self::Queued(queue), Some(worker_pool))
            }
        }
    }

    pub fn mode(&self) -> DispatchMode {
        match self {
            Self::Synchronous(_) => DispatchMode::Synchronous,
            Self::Queued(_) => DispatchMode::Queued,
        }
    }

    pub async fn submit(&self, request: DeliveryRequest) -> Result<Submission, SubmitError> {
        match self {
            Self::Synchronous(clients) => {
                let outcome = clients.deliver(&request).await?;
                Ok(Submission::Delivered(outcome))
            }
            Self::Queued(queue) => {
                queue.enqueue(request).await.inspect_err(|e| {
                    tracing::debug!(
                        overflow = ?queue.overflow_policy(),
                        queue_capacity = queue.capacity(),
                        "Could not queue delivery request: {e}"
                    );
                })?;
                tracing::debug!(
                    queue_len = queue.len(),
                    queue_capacity = queue.capacity(),
                    "Queued delivery request"
                );
                Ok(Submission::Queued)
            }
        }
    }
}
