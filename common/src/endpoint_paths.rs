// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

/// Relay endpoint. Everything below it is parsed by the request translator.
pub const ENDPOINT_RELAY: &str = "/relay-to";

/// Base of the `Location` returned for accepted messages
pub const ENDPOINT_MESSAGES: &str = "/messages";

/// Health check endpoint
pub const ENDPOINT_HEALTH_CHECK: &str = "/health_check";
