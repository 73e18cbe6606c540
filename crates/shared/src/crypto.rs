//! Cryptographic utilities for device token handling.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Computes SHA-256 hash of the input and returns it as a hex string.
fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares a supplied device token against the expected one in constant time.
///
/// Both values are run through HMAC-SHA256 keyed with the expected token and
/// the tags are compared with `verify_slice`, so timing does not depend on
/// where the inputs first differ or on their lengths.
pub fn tokens_match(expected: &str, supplied: &str) -> bool {
    let Ok(mut expected_mac) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    expected_mac.update(expected.as_bytes());
    let expected_tag = expected_mac.finalize().into_bytes();

    let Ok(mut supplied_mac) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    supplied_mac.update(supplied.as_bytes());
    supplied_mac.verify_slice(&expected_tag).is_ok()
}

/// Short, non-reversible fingerprint of a token for log output.
pub fn token_fingerprint(token: &str) -> String {
    sha256_hex(token)[..12].to_string()
}
