// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Relay logic: translating Web Push requests and dispatching them to APNs.

#![deny(unreachable_pub)]

pub mod dispatch;
pub mod notification;
pub mod push;
pub mod settings;
pub mod translator;
