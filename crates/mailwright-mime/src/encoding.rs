//! MIME encoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum line length for encoded body lines (RFC 2045).
pub const MAX_LINE_LENGTH: usize = 76;

/// Maximum number of raw bytes carried by one RFC 2047 encoded word.
///
/// 45 bytes become 60 Base64 characters, which keeps `=?utf-8?B?...?=` under
/// the 75 character limit for an encoded word.
const ENCODED_WORD_CHUNK: usize = 45;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 and breaks it into CRLF separated lines of at most
/// [`MAX_LINE_LENGTH`] characters.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    // Base64 output is pure ASCII, so byte chunks are char boundaries.
    for (index, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        result.push_str(&String::from_utf8_lossy(chunk));
    }

    result
}

/// Encodes data using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input (LF or CRLF) are kept as hard CRLF breaks; long
/// lines get soft breaks so no output line exceeds [`MAX_LINE_LENGTH`].
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() + data.len() / 8);

    for (index, line) in split_lines(data).enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }

        let mut line_length = 0;
        for (pos, &byte) in line.iter().enumerate() {
            let is_last = pos + 1 == line.len();
            let literal = match byte {
                b'!'..=b'<' | b'>'..=b'~' => true,
                // Whitespace at the end of a line must be encoded
                b' ' | b'\t' => !is_last,
                _ => false,
            };
            let width = if literal { 1 } else { 3 };
            // Leave room for the soft break marker unless the line ends here
            let limit = if is_last {
                MAX_LINE_LENGTH
            } else {
                MAX_LINE_LENGTH - 1
            };

            if line_length + width > limit {
                result.push_str("=\r\n");
                line_length = 0;
            }

            if literal {
                result.push(char::from(byte));
            } else {
                let _ = write!(result, "={byte:02X}");
            }
            line_length += width;
        }
    }

    result
}

/// Splits on LF, dropping a CR that precedes it.
fn split_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?B?encoded-text?=`. Text that is plain ASCII and does not
/// look like an encoded word is returned unchanged. Long values are split
/// into several encoded words separated by spaces, never splitting a
/// character.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if !needs_rfc2047(text) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_CHUNK {
            words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
    }

    words.join(" ")
}

/// Returns true if a header value has to be RFC 2047 encoded.
#[must_use]
pub fn needs_rfc2047(text: &str) -> bool {
    !text.is_ascii() || text.contains("=?")
}

/// Returns true if the data can be sent as `7bit`: ASCII without NUL or bare
/// CR, and no line longer than 998 octets.
#[must_use]
pub fn is_seven_bit_safe(data: &[u8]) -> bool {
    data.iter().all(|&b| b.is_ascii() && b != 0)
        && split_lines(data).all(|line| line.len() <= 998 && !line.contains(&b'\r'))
}
