// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use relaycommon::DeliveryRequest;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::queue::PendingRequests;
use crate::push::{PushClients, PushNotificationProvider};

/// A fixed set of workers pulling from one dispatch queue.
#[derive(Debug)]
pub struct WorkerPool {
    cancellation_token: CancellationToken,
    worker_handles: Vec<JoinHandle<()>>,
}

struct Worker<P> {
    id: usize,
    pending: PendingRequests,
    clients: Arc<PushClients<P>>,
    cancellation_token: CancellationToken,
}

impl WorkerPool {
    /// Spawn `worker_count` workers onto the current tokio runtime. They run
    /// until [`WorkerPool::shutdown`] is called or the queue is closed and
    /// drained.
    pub fn spawn<P: PushNotificationProvider>(
        pending: PendingRequests,
        clients: Arc<PushClients<P>>,
        worker_count: NonZeroUsize,
    ) -> Self {
        info!(
            worker_count = worker_count.get(),
            "Spawning dispatch workers"
        );

        let cancellation_token = CancellationToken::new();
        let worker_handles = (0..worker_count.get())
            .map(|id| {
                let worker = Worker {
                    id,
                    pending: pending.clone(),
                    clients: clients.clone(),
                    cancellation_token: cancellation_token.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        Self {
            cancellation_token,
            worker_handles,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_handles.len()
    }

    pub fn has_active_workers(&self) -> bool {
        self.worker_handles.iter().any(|handle| !handle.is_finished())
    }

    /// Stop all workers. Deliveries in flight may complete within `timeout`;
    /// requests still waiting in the queue are dropped.
    pub async fn shutdown(self, timeout: Duration) {
        info!(
            worker_count = self.worker_handles.len(),
            "Shutting down dispatch workers"
        );
        self.cancellation_token.cancel();

        let join_all = async {
            for handle in self.worker_handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "Dispatch worker failed");
                }
            }
        };
        if tokio::time::timeout(timeout, join_all).await.is_err() {
            warn!(
                timeout_secs = timeout.as_secs(),
                "Dispatch workers did not stop in time"
            );
        }
    }
}

impl<P: PushNotificationProvider> Worker<P> {
    async fn run(self) {
        info!(worker_id = self.id, "Dispatch worker started");
        loop {
            let request = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                request = self.pending.next() => request,
            };
            let Some(request) = request else {
                break;
            };
            self.dispatch(request).await;
        }
        info!(worker_id = self.id, "Dispatch worker stopped");
    }

    /// Deliver a single request and report the outcome. The delivery runs in
    /// its own task so that even a panicking push client leaves the worker
    /// alive.
    async fn dispatch(&self, request: DeliveryRequest) {
        let message_id = request.message_id();
        let device_token = request.device_token().to_owned();
        let environment = request.environment();

        let clients = self.clients.clone();
        let delivery = tokio::spawn(async move { clients.deliver(&request).await });

        match delivery.await {
            Ok(Ok(outcome)) if outcome.accepted => info!(
                worker_id = self.id,
                %message_id,
                %device_token,
                %environment,
                status = outcome.status_code,
                downstream_id = outcome.downstream_id.as_deref().unwrap_or_default(),
                "Sent notification"
            ),
            Ok(Ok(outcome)) => warn!(
                worker_id = self.id,
                %message_id,
                %device_token,
                %environment,
                status = outcome.status_code,
                reason = outcome.reason.as_deref().unwrap_or_default(),
                "Push service rejected notification"
            ),
            Ok(Err(e)) => error!(
                worker_id = self.id,
                %message_id,
                %device_token,
                %environment,
                error = %e,
                "Failed to send notification"
            ),
            Err(e) => error!(
                worker_id = self.id,
                %message_id,
                error = %e,
                "Delivery task failed"
            ),
        }
    }
}
