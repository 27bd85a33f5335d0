// SPDX-FileCopyrightText: 2024 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::num::NonZeroUsize;

use relaycommon::Environment;
use serde::Deserialize;

/// Configuration for the relay.
#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub apns: ApnsSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub routing: RoutingSettings,
}

/// Configuration for the application.
#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub port: u16,
    pub host: String,
    // If this isn't present, the server listens in plaintext.
    pub tls: Option<TlsSettings>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TlsSettings {
    pub certpath: String,
    pub keypath: String,
}

/// Configuration of the connection to the Apple Push Notification service.
#[derive(Deserialize, Clone, Debug)]
pub struct ApnsSettings {
    /// Bundle id of the receiving app, sent as `apns-topic`
    pub topic: String,
    pub credentials: ApnsCredentials,
    /// PEM bundle replacing the built-in trust roots
    pub cacertpath: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_development_url")]
    pub development_url: String,
    #[serde(default = "default_production_url")]
    pub production_url: String,
}

impl ApnsSettings {
    pub fn url(&self, environment: Environment) -> &str {
        match environment {
            Environment::Development => &self.development_url,
            Environment::Production => &self.production_url,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum ApnsCredentials {
    /// PKCS#12 client certificate, either read from `path` or embedded as
    /// standard base64 in `base64`.
    Certificate {
        path: Option<String>,
        base64: Option<String>,
        password: Option<String>,
    },
    /// Provider token authentication with a `.p8` signing key.
    Token {
        keyid: String,
        teamid: String,
        privatekeypath: String,
    },
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// The request handler pushes inline and reports the real outcome.
    Synchronous,
    /// The request handler enqueues and answers immediately.
    #[default]
    Queued,
}

/// What happens to a request when the dispatch queue is full.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Wait for a free slot.
    Block,
    /// Fail immediately.
    #[default]
    Reject,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DispatchSettings {
    #[serde(default)]
    pub mode: DispatchMode,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    #[serde(default = "default_workers")]
    pub workers: NonZeroUsize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: NonZeroUsize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            overflow: OverflowPolicy::default(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// How the segments after `/relay-to/` are interpreted.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PathLayout {
    /// `/relay-to/{environment}/{token}[/...]`, falling back to
    /// `/relay-to/{token}` when only one segment is present.
    #[default]
    Environment,
    /// `/relay-to/{token}[/...]`
    Token,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct RoutingSettings {
    #[serde(default)]
    pub path_layout: PathLayout,
    /// Environment used when the path doesn't name one
    #[serde(default)]
    pub default_environment: Environment,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_development_url() -> String {
    "https://api.sandbox.push.apple.com".to_owned()
}

fn default_production_url() -> String {
    "https://api.push.apple.com".to_owned()
}

fn default_workers() -> NonZeroUsize {
    NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN)
}

fn default_queue_capacity() -> NonZeroUsize {
    NonZeroUsize::new(1024).unwrap_or(NonZeroUsize::MIN)
}
