//! Salted one-way password hashing.
//!
//! Stored form is `hex(salt)$hex(sha3_256(salt || password))`. Verification
//! recomputes the digest and compares in constant time.

use rand::RngCore;
use sha3::{Digest, Sha3_256};

const SALT_LEN: usize = 16;

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(plain: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = digest(&salt, plain);
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

/// Check `plain` against a stored `salt$hash` string.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    let actual = digest(&salt, plain);
    constant_time_eq(&actual, &expected)
}

fn digest(salt: &[u8], plain: &str) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(salt);
    hasher.update(plain.as_bytes());
    hasher.finalize().into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
