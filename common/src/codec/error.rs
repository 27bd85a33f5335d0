// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input contains a byte that is not part of the alphabet
    #[error("Invalid symbol {symbol:#04x} at position {position}")]
    InvalidSymbol { symbol: u8, position: usize },
    /// A trailing group of a single symbol can't encode any byte
    #[error("Invalid encoded length {0}")]
    InvalidLength(usize),
    /// The group starting at the given position doesn't fit its byte width
    #[error("Group at position {position} overflows")]
    Overflow { position: usize },
}
