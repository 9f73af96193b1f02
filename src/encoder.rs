//! PlantUML text encoding
//!
//! Diagram sources travel to the render server inside the URL path. The text is
//! deflated (raw stream, no zlib header or Adler-32 trailer) and the compressed
//! bytes are mapped through PlantUML's own 64-symbol alphabet. The alphabet is
//! *not* standard base64: digits come first, and there is no `=` padding.
//!
//! ```
//! use diagram_dl::encoder::encode;
//!
//! let token = encode("@startuml\nAlice -> Bob\n@enduml");
//! assert!(token.len() % 4 == 0);
//! assert_eq!(encode(""), "");
//! ```

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

/// Symbol table, indexed by 6-bit value
pub const ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

/// Encode diagram source text into a URL-safe token
///
/// Deterministic for a given input. The empty string maps to the empty token.
pub fn encode(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    encode64(&deflate(text.as_bytes()))
}

/// Map bytes to the PlantUML alphabet, three bytes to four symbols
///
/// A trailing group of one or two bytes is zero-filled and still yields four
/// symbols, so the output length is always `ceil(len / 3) * 4`.
pub fn encode64(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b1 = chunk[0];
        let b2 = chunk.get(1).copied().unwrap_or(0);
        let b3 = chunk.get(2).copied().unwrap_or(0);

        out.push(symbol(b1 >> 2));
        out.push(symbol(((b1 & 0x3) << 4) | (b2 >> 4)));
        out.push(symbol(((b2 & 0xF) << 2) | (b3 >> 6)));
        out.push(symbol(b3 & 0x3F));
    }
    out
}

#[inline]
fn symbol(value: u8) -> char {
    char::from(ALPHABET[usize::from(value & 0x3F)])
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(data.len() / 2 + 16),
        Compression::default(),
    );
    // Writes into a Vec cannot fail, so the empty fallback is never taken
    encoder
        .write_all(data)
        .and_then(|()| encoder.finish())
        .unwrap_or_default()
}
