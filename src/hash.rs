//! Digests: the hex codec and the fixed 20-byte SHA-1 identity of an object.

use core::fmt;
use sha1::{Digest as _, Sha1};

/// Encodes binary bytes as lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Decodes a lowercase (or mixed-case) hex string into bytes.
///
/// Returns `None` if the string has odd length or contains non-hex digits.
pub fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    let bytes = hex.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

/// The key to a git object: the SHA-1 of its canonical representation.
///
/// Example: `dcf3cb0c8270c187003d84fd359e5bb3904fe42a`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; 20]);

impl Hash {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn zero() -> Self {
        Self([0; 20])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 20]
    }

    /// Tries to parse a string into a hash.
    ///
    /// The string must be 40 characters long and only contain hex digits.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 40 {
            return None;
        }
        let bytes = decode_hex(hex)?;
        let mut array = [0; 20];
        array.copy_from_slice(&bytes);
        Some(Self(array))
    }

    pub fn to_bytes(&self) -> [u8; 20] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// Computes the SHA-1 digest of a canonical `<type> <len>\0<payload>` buffer.
    pub fn of_canonical(canonical: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(canonical);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", encode_hex(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let hex = "95d09f2b10159347eece71399a7e2e907ea3df4";
        let bin = decode_hex(hex).unwrap();
        assert_eq!(encode_hex(&bin), hex);
    }

    #[test]
    fn bin_round_trip() {
        let bin: [u8; 20] = core::array::from_fn(|i| i as u8);
        let hex = encode_hex(&bin);
        assert_eq!(decode_hex(&hex).unwrap(), bin);
    }

    #[test]
    fn hash_from_hex_rejects_wrong_length() {
        assert!(Hash::from_hex("abcd").is_none());
    }

    #[test]
    fn known_blob_digest() {
        let canonical = b"blob 11\0hello world";
        let hash = Hash::of_canonical(canonical);
        assert_eq!(hash.to_string(), "95d09f2b10159347eece71399a7e2e907ea3df4");
    }
}
