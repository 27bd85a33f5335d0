// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parameter lists of the `Crypto-Key` and `Encryption` headers.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Malformed header parameter {entry:?}")]
pub struct MalformedHeader {
    entry: String,
}

/// Parse a `key=value` list. Entries are separated by `;` (or `,` when a
/// sender lists several keys), surrounding whitespace and quotes are ignored
/// and later duplicates win.
pub(super) fn parse_key_values(value: &str) -> Result<HashMap<&str, &str>, MalformedHeader> {
    value
        .split([';', ','])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, value) = entry.split_once('=').ok_or_else(|| MalformedHeader {
                entry: entry.to_owned(),
            })?;
            Ok((key.trim(), value.trim().trim_matches('"')))
        })
        .collect()
}
