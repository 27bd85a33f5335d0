// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Normalized delivery requests and the outcome of delivering them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Selects between the sandbox and the production endpoint of the push
/// service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Interpret the environment segment of a relay path. Only `production`
    /// selects the production endpoint.
    pub fn from_path_segment(segment: &str) -> Self {
        if segment == "production" {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    High,
}

impl Priority {
    /// Map the value of a Web Push `Urgency` header. Missing or unknown
    /// values deliver with high priority.
    pub fn from_urgency(urgency: Option<&str>) -> Self {
        match urgency.map(str::trim) {
            Some("very-low") | Some("low") => Self::Low,
            _ => Self::High,
        }
    }
}

/// A web push message translated for the downstream push service.
///
/// Built once per inbound request and moved into the dispatcher, so it can't
/// change after it was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    message_id: Uuid,
    /// The TTL counts from here, not from when the request leaves the queue
    received_at: DateTime<Utc>,
    device_token: String,
    environment: Environment,
    encoded_payload: String,
    auxiliary_data: Option<String>,
    encryption_public_key: Option<String>,
    encryption_salt: Option<String>,
    ttl_seconds: Option<u64>,
    collapse_key: Option<String>,
    priority: Priority,
}

impl DeliveryRequest {
    /// Create a new request with a fresh message id and high priority,
    /// received now.
    pub fn new(device_token: String, environment: Environment, encoded_payload: String) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            received_at: Utc::now(),
            device_token,
            environment,
            encoded_payload,
            auxiliary_data: None,
            encryption_public_key: None,
            encryption_salt: None,
            ttl_seconds: None,
            collapse_key: None,
            priority: Priority::High,
        }
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    pub fn with_auxiliary_data(mut self, auxiliary_data: Option<String>) -> Self {
        self.auxiliary_data = auxiliary_data;
        self
    }

    pub fn with_encryption(mut self, public_key: String, salt: String) -> Self {
        self.encryption_public_key = Some(public_key);
        self.encryption_salt = Some(salt);
        self
    }

    pub fn with_ttl_seconds(mut self, ttl_seconds: Option<u64>) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn with_collapse_key(mut self, collapse_key: Option<String>) -> Self {
        self.collapse_key = collapse_key;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn device_token(&self) -> &str {
        &self.device_token
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn encoded_payload(&self) -> &str {
        &self.encoded_payload
    }

    pub fn auxiliary_data(&self) -> Option<&str> {
        self.auxiliary_data.as_deref()
    }

    pub fn encryption_public_key(&self) -> Option<&str> {
        self.encryption_public_key.as_deref()
    }

    pub fn encryption_salt(&self) -> Option<&str> {
        self.encryption_salt.as_deref()
    }

    pub fn ttl_seconds(&self) -> Option<u64> {
        self.ttl_seconds
    }

    pub fn collapse_key(&self) -> Option<&str> {
        self.collapse_key.as_deref()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

/// What the push service answered for a single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub accepted: bool,
    /// Identifier the push service assigned (or echoed) for the notification
    pub downstream_id: Option<String>,
    pub status_code: u16,
    pub reason: Option<String>,
}

impl DispatchOutcome {
    pub fn accepted(status_code: u16, downstream_id: Option<String>) -> Self {
        Self {
            accepted: true,
            downstream_id,
            status_code,
            reason: None,
        }
    }

    pub fn rejected(
        status_code: u16,
        downstream_id: Option<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            accepted: false,
            downstream_id,
            status_code,
            reason,
        }
    }
}
