//! Cryptographic primitives for the authentication exchange and the
//! content-addressed store.
//!
//! Provides three things:
//!   1. Challenge generation — random bytes, base64-encoded for the wire
//!   2. HMAC-SHA256 challenge responses, with constant-time verification
//!   3. SHA-256 derivations — storage directory names, content checksums
//!
//! Shared keys are owned by the caller; see the user store for how they are
//! held in memory.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Size of a challenge response: one HMAC-SHA256 output.
pub const RESPONSE_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed challenge: {0}")]
    Challenge(#[from] base64::DecodeError),
}

// ── Challenge / response ─────────────────────────────────────────────────────

/// Generate a challenge: `len` random bytes, base64-encoded. The encoded
/// form is what crosses the wire; verifiers decode it before keying the MAC.
pub fn generate_challenge(len: usize) -> Vec<u8> {
    let mut random = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut random);
    BASE64.encode(&random).into_bytes()
}

/// The expected response to a challenge:
/// `HMAC-SHA256(shared_key, base64_decode(challenge))`.
pub fn challenge_response(
    challenge: &[u8],
    shared_key: &[u8],
) -> Result<[u8; RESPONSE_SIZE], CryptoError> {
    let raw = BASE64.decode(challenge)?;
    let mut mac =
        HmacSha256::new_from_slice(shared_key).expect("hmac accepts keys of any length");
    mac.update(&raw);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; RESPONSE_SIZE];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// Verify a response against the challenge in constant time. A challenge
/// that fails to decode never verifies.
pub fn verify_response(challenge: &[u8], shared_key: &[u8], response: &[u8]) -> bool {
    let raw = match BASE64.decode(challenge) {
        Ok(raw) => raw,
        Err(_) => return false,
    };
    let mut mac =
        HmacSha256::new_from_slice(shared_key).expect("hmac accepts keys of any length");
    mac.update(&raw);
    mac.verify_slice(response).is_ok()
}

// ── Derivations ──────────────────────────────────────────────────────────────

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Per-user storage directory name, derived from the shared key. Knowing
/// the key is what grants access to the directory.
pub fn storage_dir_name(shared_key: &[u8]) -> String {
    sha256_hex(shared_key)
}

/// Content checksum as stored in file headers: the first 32 hex characters
/// of the SHA-256 digest.
pub fn content_checksum(data: &[u8]) -> String {
    let mut hex = sha256_hex(data);
    hex.truncate(32);
    hex
}

/// 8-byte content hash: the leading bytes of the SHA-256 digest. Names the
/// file on disk (hex-encoded) and identifies it on the wire.
pub fn content_hash(data: &[u8]) -> [u8; 8] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────
