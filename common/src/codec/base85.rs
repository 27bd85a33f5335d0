// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use super::DecodeError;

const ALPHABET: &[u8; 85] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ.-:+=^!/*?&<>()[]{}@%$#";

const INVALID: u8 = 0xff;

const DECODE_TABLE: [u8; 256] = {
    let mut table = [INVALID; 256];
    let mut index = 0;
    while index < ALPHABET.len() {
        table[ALPHABET[index] as usize] = index as u8;
        index += 1;
    }
    table
};

/// Number of symbols `encode` produces for `len` input bytes.
pub const fn encoded_len(len: usize) -> usize {
    let suffix = len % 4;
    let full_blocks = 5 * (len / 4);
    if suffix == 0 {
        full_blocks
    } else {
        full_blocks + suffix + 1
    }
}

/// Encode arbitrary bytes as Base85 text.
///
/// Every full 4-byte block is read as a big-endian `u32` and written as five
/// symbols, most significant first. A trailing partial block of `r` bytes is
/// read as a big-endian integer of `r` bytes and written as `r + 1` symbols.
pub fn encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(encoded_len(bytes.len()));

    let mut blocks = bytes.chunks_exact(4);
    for block in &mut blocks {
        let value = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
        push_symbols(&mut encoded, value, 5);
    }

    let suffix = blocks.remainder();
    if !suffix.is_empty() {
        let value = suffix
            .iter()
            .fold(0u32, |value, byte| (value << 8) | u32::from(*byte));
        push_symbols(&mut encoded, value, suffix.len() + 1);
    }

    encoded
}

fn push_symbols(encoded: &mut String, mut value: u32, count: usize) {
    let mut symbols = [0u8; 5];
    for symbol in symbols[..count].iter_mut().rev() {
        *symbol = ALPHABET[(value % 85) as usize];
        value /= 85;
    }
    encoded.extend(symbols[..count].iter().copied().map(char::from));
}

/// Decode Base85 text produced by [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let symbols = text.as_bytes();
    if symbols.len() % 5 == 1 {
        return Err(DecodeError::InvalidLength(symbols.len()));
    }

    let mut decoded = Vec::with_capacity(symbols.len() / 5 * 4 + 3);
    for (group_index, group) in symbols.chunks(5).enumerate() {
        let start = group_index * 5;

        let mut value = 0u64;
        for (offset, symbol) in group.iter().enumerate() {
            let digit = DECODE_TABLE[*symbol as usize];
            if digit == INVALID {
                return Err(DecodeError::InvalidSymbol {
                    symbol: *symbol,
                    position: start + offset,
                });
            }
            value = value * 85 + u64::from(digit);
        }

        // A full group carries four bytes, a partial one carries one byte less
        // than its number of symbols.
        let width = if group.len() == 5 { 4 } else { group.len() - 1 };
        if value >> (8 * width) != 0 {
            return Err(DecodeError::Overflow { position: start });
        }
        decoded.extend_from_slice(&value.to_be_bytes()[8 - width..]);
    }

    Ok(decoded)
}
