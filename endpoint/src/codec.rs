//! Token codec: hex text over position-keyed XOR over ROT13.
//!
//! Encoding applies ROT13, then XORs byte `i` with `KEY ^ (i & 7)`, then
//! renders the bytes as lowercase hex. Decoding runs the three stages in
//! reverse. The position index restarts at zero for every token, so a
//! fragment must be decoded on its own, never as part of a longer string.

use std::fmt::Write as _;

use crate::CodecError;

/// XOR key, masked into its lower bits before use.
const KEY: u8 = ((7 << 2) + 5) - 10;
const KEY_MASK: u8 = 0x5f;

/// Decode one token into its plaintext fragment.
///
/// # Errors
///
/// Returns [`CodecError::OddLength`] or [`CodecError::InvalidHex`] when the
/// token is not a well-formed hex byte string. A well-formed token that was
/// encoded some other way decodes to garbage rather than failing.
pub fn decode_token(token: &str) -> Result<String, CodecError> {
    let bytes = parse_hex(token)?;
    let unmasked: String = bytes
        .iter()
        .zip(position_keys())
        .map(|(byte, key)| char::from(byte ^ key))
        .collect();
    Ok(rot13(&unmasked))
}

/// Encode a plaintext fragment into a token.
///
/// # Errors
///
/// Returns [`CodecError::Unencodable`] for characters outside Latin-1, since
/// every character must fit in a single byte.
pub fn encode_token(fragment: &str) -> Result<String, CodecError> {
    let rotated = rot13(fragment);
    let mut out = String::with_capacity(rotated.len() * 2);
    for (ch, key) in rotated.chars().zip(position_keys()) {
        let byte = u8::try_from(ch).map_err(|_| CodecError::Unencodable(ch))?;
        // Writing into a String cannot fail.
        let _ = write!(out, "{:02x}", byte ^ key);
    }
    Ok(out)
}

/// Split an address into `pieces` fragments of near-equal length and encode
/// each one. `pieces` is clamped to `1..=len`.
///
/// # Errors
///
/// Propagates [`CodecError::Unencodable`] from [`encode_token`].
pub fn encode_address(address: &str, pieces: usize) -> Result<Vec<String>, CodecError> {
    let chars: Vec<char> = address.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }
    let pieces = pieces.clamp(1, chars.len());
    let chunk = chars.len().div_ceil(pieces);
    chars
        .chunks(chunk)
        .map(|fragment| encode_token(&fragment.iter().collect::<String>()))
        .collect()
}

fn position_keys() -> impl Iterator<Item = u8> {
    (0..8_u8).cycle().map(|position| (KEY & KEY_MASK) ^ position)
}

fn parse_hex(token: &str) -> Result<Vec<u8>, CodecError> {
    let digits = token.as_bytes();
    if digits.len() % 2 != 0 {
        return Err(CodecError::OddLength(digits.len()));
    }
    digits
        .chunks(2)
        .map(|pair| Ok((hex_value(pair[0])? << 4) | hex_value(pair[1])?))
        .collect()
}

fn hex_value(digit: u8) -> Result<u8, CodecError> {
    char::from(digit)
        .to_digit(16)
        .and_then(|value| u8::try_from(value).ok())
        .ok_or(CodecError::InvalidHex(char::from(digit)))
}

/// ROT13 over ASCII letters; everything else passes through. Self-inverse.
fn rot13(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            'a'..='z' => rotate(ch, b'a'),
            'A'..='Z' => rotate(ch, b'A'),
            _ => ch,
        })
        .collect()
}

fn rotate(ch: char, base: u8) -> char {
    let Ok(byte) = u8::try_from(ch) else {
        return ch;
    };
    char::from(base + (byte - base + 13) % 26)
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;
