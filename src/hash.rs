//! SHA-512 digests as used by `core:sha512` and collection stream references.

use sha2::{Digest, Sha512};

/// Lowercase hex SHA-512 of `bytes`, always 128 characters.
pub fn sha512_hex(bytes: &[u8]) -> String {
    hex::encode(Sha512::digest(bytes))
}

/// True for exactly 128 hex digits, in either case.
pub fn is_sha512_hex(s: &str) -> bool {
    s.len() == 128 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
