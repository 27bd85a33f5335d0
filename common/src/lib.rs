// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Data model and codecs shared by the relay backend and server.

pub mod codec;
pub mod delivery;
pub mod endpoint_paths;

pub use delivery::{DeliveryRequest, DispatchOutcome, Environment, Priority};
