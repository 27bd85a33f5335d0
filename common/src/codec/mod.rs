// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Text codecs for payloads that have to travel through text-only fields.
//!
//! The downstream notification payload only accepts JSON strings and is
//! tightly size limited, so binary ciphertext and key material are carried as
//! Base85 (Z85 alphabet) text. Unlike Z85 proper, inputs don't have to be a
//! multiple of four bytes: a trailing partial block of `r` bytes is written as
//! `r + 1` symbols without any padding marker.

pub mod base85;
mod error;

pub use base85::{decode, encode, encoded_len};
pub use error::DecodeError;
