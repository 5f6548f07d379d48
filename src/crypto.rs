// ABOUTME: Token secret generation, one-way hashing, and constant-time comparison
// ABOUTME: The only place raw token secrets are produced; storage only ever sees digests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::errors::{AppError, AppResult};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Raw entropy per token secret. Hex-encoded to 64 characters on the wire.
pub const TOKEN_SECRET_BYTES: usize = 32;

/// Hex length of a token secret as it appears in a composed `id.secret` token
pub const TOKEN_SECRET_HEX_LEN: usize = TOKEN_SECRET_BYTES * 2;

/// Generate a cryptographically random token secret, hex encoded.
///
/// # Errors
/// Returns an error if the system RNG fails - the service cannot mint
/// credentials securely without a working RNG.
pub fn generate_token_secret() -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; TOKEN_SECRET_BYTES];

    rng.fill(&mut bytes).map_err(|e| {
        tracing::error!("CRITICAL: system RNG failure while generating token secret: {e}");
        AppError::internal("System RNG failure - cannot generate secure token secret")
    })?;

    Ok(hex::encode(bytes))
}

/// One-way digest of a token secret for storage.
///
/// SHA-256 is sufficient here: the input is 256 bits of RNG output, not a
/// human-chosen password, so brute-forcing the digest is infeasible without
/// a key-stretching hash.
#[must_use]
pub fn hash_token_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison for secret digests.
///
/// Length mismatch short-circuits inside `subtle` without leaking position
/// information about the matching prefix.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verify a presented raw secret against a stored digest in constant time
#[must_use]
pub fn verify_token_secret(presented: &str, stored_hash: &str) -> bool {
    constant_time_eq(&hash_token_secret(presented), stored_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_secret_is_hex_and_unique() {
        let a = generate_token_secret().unwrap();
        let b = generate_token_secret().unwrap();
        assert_eq!(a.len(), TOKEN_SECRET_HEX_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_and_not_identity() {
        let secret = "deadbeef";
        let h1 = hash_token_secret(secret);
        let h2 = hash_token_secret(secret);
        assert_eq!(h1, h2);
        assert_ne!(h1, secret);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_verify_token_secret() {
        let secret = generate_token_secret().unwrap();
        let stored = hash_token_secret(&secret);
        assert!(verify_token_secret(&secret, &stored));
        assert!(!verify_token_secret("wrong", &stored));
    }

    #[test]
    fn test_constant_time_eq_length_mismatch() {
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("abcd", "abcd"));
    }
}
