// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The push client capability: delivering notifications to the push service.

use std::fmt::Debug;

use relaycommon::{DeliveryRequest, DispatchOutcome, Environment};
use thiserror::Error;

use crate::notification::Notification;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PushNotificationError {
    /// The request never got an answer from the push service
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The provider token could not be issued
    #[error("JWT creation error: {0}")]
    JwtCreationError(String),
    /// The notification can't be expressed as a push service request
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),
}

/// Sends notifications to one push service endpoint.
///
/// Implementations are shared by all dispatch workers and must be safe for
/// concurrent use. A rejection by the push service is a successful call
/// returning a [`DispatchOutcome`] that isn't accepted; errors are reserved
/// for failures to talk to the push service at all.
pub trait PushNotificationProvider: Sync + Send + Debug + 'static {
    fn push(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<DispatchOutcome, PushNotificationError>> + Send;
}

/// One push client per environment, built once at startup.
#[derive(Debug)]
pub struct PushClients<P> {
    development: P,
    production: P,
}

impl<P: PushNotificationProvider> PushClients<P> {
    pub fn new(development: P, production: P) -> Self {
        Self {
            development,
            production,
        }
    }

    pub fn for_environment(&self, environment: Environment) -> &P {
        match environment {
            Environment::Development => &self.development,
            Environment::Production => &self.production,
        }
    }

    /// Build the notification for `request` and push it through the client
    /// of the request's environment.
    pub async fn deliver(
        &self,
        request: &DeliveryRequest,
    ) -> Result<DispatchOutcome, PushNotificationError> {
        let notification = Notification::from_request(request);
        self.for_environment(request.environment())
            .push(&notification)
            .await
    }
}
