// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The notification object sent to APNs.
//!
//! The payload shows a placeholder alert and is marked mutable, so the
//! notification service extension on the device gets to decrypt the message
//! and replace the alert. The encrypted message travels in custom keys:
//!
//! * `p`: the Base85 encoded ciphertext
//! * `k`: the sender's public key (`dh` from `Crypto-Key`)
//! * `s`: the salt (`salt` from `Encryption`)
//! * `x`: auxiliary data from the relay path

use chrono::{DateTime, TimeDelta, Utc};
use relaycommon::{DeliveryRequest, Priority};
use serde_json::{Value, json};
use uuid::Uuid;

const PLACEHOLDER_ALERT: &str = "🎺";

pub const APNS_ID: &str = "apns-id";
pub const APNS_PUSH_TYPE: &str = "apns-push-type";
pub const APNS_PRIORITY: &str = "apns-priority";
pub const APNS_EXPIRATION: &str = "apns-expiration";
pub const APNS_COLLAPSE_ID: &str = "apns-collapse-id";

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message_id: Uuid,
    pub device_token: String,
    /// Absent means the push service attempts delivery only once
    pub expiration: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub collapse_id: Option<String>,
    pub payload: Value,
}

impl Notification {
    /// Build the notification for `request`. The expiration counts the TTL
    /// from the moment the request was received.
    pub fn from_request(request: &DeliveryRequest) -> Self {
        let mut payload = json!({
            "aps": {
                "alert": PLACEHOLDER_ALERT,
                "mutable-content": 1,
            },
            "p": request.encoded_payload(),
        });
        if let Some(auxiliary_data) = request.auxiliary_data() {
            payload["x"] = json!(auxiliary_data);
        }
        if let Some(public_key) = request.encryption_public_key() {
            payload["k"] = json!(public_key);
        }
        if let Some(salt) = request.encryption_salt() {
            payload["s"] = json!(salt);
        }

        let expiration = request.ttl_seconds().map(|ttl| {
            i64::try_from(ttl)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|ttl| request.received_at().checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        Self {
            message_id: request.message_id(),
            device_token: request.device_token().to_owned(),
            expiration,
            priority: request.priority(),
            collapse_id: request.collapse_key().map(ToOwned::to_owned),
            payload,
        }
    }

    pub fn apns_priority(&self) -> u8 {
        match self.priority {
            Priority::Low => 5,
            Priority::High => 10,
        }
    }

    /// The APNs request headers describing this notification. The topic and
    /// authorization headers belong to the provider.
    pub fn apns_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (APNS_ID, self.message_id.hyphenated().to_string()),
            (APNS_PUSH_TYPE, "alert".to_owned()),
            (APNS_PRIORITY, self.apns_priority().to_string()),
        ];
        if let Some(expiration) = self.expiration {
            headers.push((APNS_EXPIRATION, expiration.timestamp().to_string()));
        }
        if let Some(collapse_id) = &self.collapse_id {
            headers.push((APNS_COLLAPSE_ID, collapse_id.clone()));
        }
        headers
    }
}
