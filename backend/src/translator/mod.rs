// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Translation of inbound web push requests into [`DeliveryRequest`]s.
//!
//! The relay path carries the device token, optionally preceded by an
//! environment selector and followed by auxiliary data that is forwarded
//! verbatim:
//!
//! ```text
//! /relay-to/{environment}/{device token}[/{auxiliary data...}]
//! /relay-to/{device token}[/{auxiliary data...}]
//! ```
//!
//! The body is the opaque ciphertext of the push message. It is never
//! decrypted, only re-encoded as Base85 text together with the public key and
//! salt from the `Crypto-Key` and `Encryption` headers.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use relaycommon::{DeliveryRequest, Environment, Priority, codec::base85};
use thiserror::Error;

use crate::settings::{PathLayout, RoutingSettings};

mod header_params;

pub use header_params::MalformedHeader;

const RELAY_SEGMENT: &str = "relay-to";

const CONTENT_ENCODING_AESGCM: &str = "aesgcm";

pub const HEADER_CONTENT_ENCODING: &str = "Content-Encoding";
pub const HEADER_CRYPTO_KEY: &str = "Crypto-Key";
pub const HEADER_ENCRYPTION: &str = "Encryption";
pub const HEADER_TTL: &str = "TTL";
pub const HEADER_TOPIC: &str = "Topic";
pub const HEADER_URGENCY: &str = "Urgency";

/// Read access to the headers of an inbound request.
pub trait HeaderSource {
    /// Returns the value of the header with the given name. Names are matched
    /// case-insensitively; values that aren't valid text count as missing.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for [(&str, &str)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }
}

/// Reasons an inbound request can't be relayed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// The path doesn't contain a device token
    #[error("Invalid relay path: {0}")]
    InvalidPath(String),
    /// The payload uses an encoding other than `aesgcm`
    #[error("Unsupported Content-Encoding: {0}")]
    UnsupportedEncoding(String),
    /// A parameter required for `aesgcm` is missing or its header is malformed
    #[error("Value {key} not found in header {header}")]
    MissingCryptoParam {
        header: &'static str,
        key: &'static str,
    },
    /// A parameter required for `aesgcm` is not valid base64
    #[error("Value {key} in header {header} is not valid base64")]
    MalformedCryptoParam {
        header: &'static str,
        key: &'static str,
    },
}

/// Turns the parts of an inbound HTTP request into a [`DeliveryRequest`].
#[derive(Debug, Clone, Default)]
pub struct RequestTranslator {
    routing: RoutingSettings,
}

struct RelayPath {
    environment: Environment,
    device_token: String,
    auxiliary_data: Option<String>,
}

impl RequestTranslator {
    pub fn new(routing: RoutingSettings) -> Self {
        Self { routing }
    }

    /// Translate a request given its path, headers and raw body.
    pub fn translate<H: HeaderSource + ?Sized>(
        &self,
        path: &str,
        headers: &H,
        body: &[u8],
    ) -> Result<DeliveryRequest, TranslationError> {
        let relay_path = self.parse_path(path)?;

        let content_encoding = headers.header(HEADER_CONTENT_ENCODING).unwrap_or_default();
        if !content_encoding
            .trim()
            .eq_ignore_ascii_case(CONTENT_ENCODING_AESGCM)
        {
            return Err(TranslationError::UnsupportedEncoding(
                content_encoding.to_owned(),
            ));
        }
        let public_key = encoded_value(headers, HEADER_CRYPTO_KEY, "dh")?;
        let salt = encoded_value(headers, HEADER_ENCRYPTION, "salt")?;

        // Invalid values are ignored rather than rejected.
        let ttl_seconds = headers
            .header(HEADER_TTL)
            .and_then(|seconds| seconds.trim().parse::<u64>().ok());

        let collapse_key = headers
            .header(HEADER_TOPIC)
            .filter(|topic| !topic.is_empty())
            .map(ToOwned::to_owned);

        let priority = Priority::from_urgency(headers.header(HEADER_URGENCY));

        let request = DeliveryRequest::new(
            relay_path.device_token,
            relay_path.environment,
            base85::encode(body),
        )
        .with_auxiliary_data(relay_path.auxiliary_data)
        .with_encryption(public_key, salt)
        .with_ttl_seconds(ttl_seconds)
        .with_collapse_key(collapse_key)
        .with_priority(priority);

        Ok(request)
    }

    fn parse_path(&self, path: &str) -> Result<RelayPath, TranslationError> {
        let invalid_path = || TranslationError::InvalidPath(path.to_owned());

        let mut segments = path.split('/');
        if segments.next() != Some("") || segments.next() != Some(RELAY_SEGMENT) {
            return Err(invalid_path());
        }
        let segments: Vec<&str> = segments.collect();
        // Trailing empty segments don't count when locating the token, but
        // they stay part of the auxiliary data.
        let significant = segments
            .iter()
            .rposition(|segment| !segment.is_empty())
            .map_or(0, |last| last + 1);

        let (environment, token_index) = match (self.routing.path_layout, significant) {
            (_, 0) => return Err(invalid_path()),
            (PathLayout::Environment, 1) | (PathLayout::Token, _) => {
                (self.routing.default_environment, 0)
            }
            (PathLayout::Environment, _) => (Environment::from_path_segment(segments[0]), 1),
        };

        let device_token = segments[token_index];
        if device_token.is_empty() {
            return Err(invalid_path());
        }

        let tail = &segments[token_index + 1..];
        let auxiliary_data = if tail.iter().all(|segment| segment.is_empty()) {
            None
        } else {
            Some(tail.join("/"))
        };

        Ok(RelayPath {
            environment,
            device_token: device_token.to_owned(),
            auxiliary_data,
        })
    }
}

/// Look up `key` in the parameter list of header `name` and re-encode its
/// base64url value as Base85.
fn encoded_value<H: HeaderSource + ?Sized>(
    headers: &H,
    name: &'static str,
    key: &'static str,
) -> Result<String, TranslationError> {
    let missing = TranslationError::MissingCryptoParam { header: name, key };

    let header = headers.header(name).ok_or_else(|| missing.clone())?;
    let key_values = header_params::parse_key_values(header).map_err(|e| {
        tracing::debug!(header = name, error = %e, "Malformed crypto header");
        missing.clone()
    })?;
    let value = key_values.get(key).ok_or(missing)?;

    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|_| TranslationError::MalformedCryptoParam { header: name, key })?;

    Ok(base85::encode(&bytes))
}
