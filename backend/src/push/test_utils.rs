// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use relaycommon::DispatchOutcome;

use super::{PushNotificationError, PushNotificationProvider};
use crate::notification::Notification;

#[derive(Debug, Clone)]
enum ScriptedResponse {
    Reject { status_code: u16, reason: String },
    TransportError,
}

/// Records every notification it is asked to push. Pushes succeed unless a
/// response was scripted for the device token.
#[derive(Debug, Clone, Default)]
pub struct TestPushNotificationProvider {
    attempts: Arc<Mutex<Vec<Notification>>>,
    scripted: Arc<Mutex<HashMap<String, ScriptedResponse>>>,
}

impl TestPushNotificationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the push service reject notifications for `device_token`.
    pub fn reject_token(&self, device_token: &str, status_code: u16, reason: &str) {
        self.scripted.lock().unwrap().insert(
            device_token.to_owned(),
            ScriptedResponse::Reject {
                status_code,
                reason: reason.to_owned(),
            },
        );
    }

    /// Fail pushes to `device_token` as if the network was down.
    pub fn fail_token(&self, device_token: &str) {
        self.scripted
            .lock()
            .unwrap()
            .insert(device_token.to_owned(), ScriptedResponse::TransportError);
    }

    /// All notifications pushed so far, including failed attempts, in order.
    pub fn attempts(&self) -> Vec<Notification> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl PushNotificationProvider for TestPushNotificationProvider {
    async fn push(
        &self,
        notification: &Notification,
    ) -> Result<DispatchOutcome, PushNotificationError> {
        self.attempts.lock().unwrap().push(notification.clone());
        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get(&notification.device_token)
            .cloned();
        let downstream_id = Some(notification.message_id.to_string());
        match scripted {
            None => Ok(DispatchOutcome::accepted(200, downstream_id)),
            Some(ScriptedResponse::Reject {
                status_code,
                reason,
            }) => Ok(DispatchOutcome::rejected(
                status_code,
                downstream_id,
                Some(reason),
            )),
            Some(ScriptedResponse::TransportError) => Err(PushNotificationError::NetworkError(
                "connection refused".to_owned(),
            )),
        }
    }
}
