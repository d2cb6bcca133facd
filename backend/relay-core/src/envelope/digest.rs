//! Authentication digests.

use sha2::{Digest, Sha512};

/// SHA-512 of `secret` as lowercase hex.
pub fn digest_hex(secret: &str) -> String {
    hex::encode(Sha512::digest(secret.as_bytes()))
}

/// Whether `candidate_hex` is the digest of `secret`.
///
/// The comparison is textual and case sensitive: clients must send
/// lowercase hex.
pub fn hash_match(secret: &str, candidate_hex: &str) -> bool {
    digest_hex(secret) == candidate_hex
}
