//! Password-based sealing for `.subject` payloads.
//!
//! The key is `SHA3-256(salt || password)` and the payload is sealed with
//! AES-256-GCM:
//!
//! ```text
//! [12 bytes nonce][ciphertext + 16 byte tag]
//! ```
//!
//! A wrong password is an ordinary outcome, so [`unlock`] answers with an
//! `Option` instead of an error.

use crate::error::{ExchangeError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use log::{debug, trace};
use rand::rngs::OsRng;
use rand::RngCore;
use sha3::{Digest, Sha3_256};

pub const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> Aes256Gcm {
    let mut hasher = Sha3_256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    Aes256Gcm::new(&digest)
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Decrypts `ciphertext` with a key derived from `password` and `salt`.
/// Returns `None` when the password is wrong or the blob is too short to
/// have been produced by [`seal`].
pub fn unlock(password: &str, salt: &[u8; SALT_LEN], ciphertext: &[u8]) -> Option<Vec<u8>> {
    if ciphertext.len() < NONCE_LEN + TAG_LEN {
        debug!(
            "Ciphertext too short to unlock ({} bytes)",
            ciphertext.len()
        );
        return None;
    }
    let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
    let cipher = derive_key(password, salt);
    match cipher.decrypt(Nonce::from_slice(nonce), sealed) {
        Ok(plain) => {
            trace!("Unlocked {} bytes", plain.len());
            Some(plain)
        }
        Err(_) => {
            debug!("Unlock failed: authentication tag mismatch");
            None
        }
    }
}

pub fn seal(password: &str, salt: &[u8; SALT_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = derive_key(password, salt);
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| ExchangeError::Api(format!("Encryption failed: {}", e)))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}
