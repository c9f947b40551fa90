// ABOUTME: Secret vault encrypting credentials and shared passphrases at rest
// ABOUTME: Produces v1:<iv>:<tag>:<ciphertext> strings and fails closed on tamper
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::debug;
use zeroize::Zeroizing;

use super::{derive_key, IV_LEN, TAG_LEN};
use crate::errors::{AppError, AppResult, ErrorCode};

const SCHEME: &str = "v1";
const DECRYPT_FAILED: &str = "secret decryption failed";

/// Authenticated encryption for stored secrets
pub struct SecretVault {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl SecretVault {
    /// Create a vault keyed by SHA-256 of the master secret
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the master secret is empty
    pub fn new(master_secret: &str) -> AppResult<Self> {
        if master_secret.is_empty() {
            return Err(AppError::config("master secret must not be empty"));
        }
        Ok(Self {
            key: derive_key(master_secret.as_bytes())?,
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt a secret into the delimited storage format
    ///
    /// # Errors
    ///
    /// Returns an internal error if random generation or sealing fails
    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        let mut iv = [0u8; IV_LEN];
        self.rng
            .fill(&mut iv)
            .map_err(|_| AppError::internal("failed to generate IV"))?;

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut buffer)
            .map_err(|_| AppError::internal("secret encryption failed"))?;

        Ok(format!(
            "{SCHEME}:{}:{}:{}",
            STANDARD.encode(iv),
            STANDARD.encode(tag.as_ref()),
            STANDARD.encode(&buffer)
        ))
    }

    /// Decrypt a stored secret, verifying its authentication tag
    ///
    /// # Errors
    ///
    /// Returns `CryptoFailure` with a generic message on any malformed or
    /// tampered input
    pub fn decrypt(&self, stored: &str) -> AppResult<Zeroizing<String>> {
        self.decrypt_inner(stored).map_err(|reason| {
            debug!(reason, "vault decryption rejected");
            AppError::new(ErrorCode::CryptoFailure, DECRYPT_FAILED)
        })
    }

    fn decrypt_inner(&self, stored: &str) -> Result<Zeroizing<String>, &'static str> {
        let mut parts = stored.split(':');
        let (Some(scheme), Some(iv), Some(tag), Some(ciphertext), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err("malformed secret");
        };
        if scheme != SCHEME {
            return Err("unknown scheme");
        }

        let iv: [u8; IV_LEN] = STANDARD
            .decode(iv)
            .map_err(|_| "bad iv encoding")?
            .try_into()
            .map_err(|_| "bad iv length")?;
        let tag = STANDARD.decode(tag).map_err(|_| "bad tag encoding")?;
        if tag.len() != TAG_LEN {
            return Err("bad tag length");
        }
        let mut buffer = STANDARD
            .decode(ciphertext)
            .map_err(|_| "bad ciphertext encoding")?;
        buffer.extend_from_slice(&tag);

        let plaintext = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut buffer)
            .map_err(|_| "authentication failed")?;
        let text = String::from_utf8(plaintext.to_vec()).map_err(|_| "not utf-8")?;
        buffer.iter_mut().for_each(|b| *b = 0);
        Ok(Zeroizing::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let vault = SecretVault::new("master").unwrap();
        let stored = vault.encrypt("db-password").unwrap();
        assert!(stored.starts_with("v1:"));
        assert_eq!(stored.split(':').count(), 4);
        assert_eq!(vault.decrypt(&stored).unwrap().as_str(), "db-password");
    }

    #[test]
    fn test_each_encryption_uses_fresh_iv() {
        let vault = SecretVault::new("master").unwrap();
        assert_ne!(vault.encrypt("x").unwrap(), vault.encrypt("x").unwrap());
    }

    #[test]
    fn test_tampered_ciphertext_fails_closed() {
        let vault = SecretVault::new("master").unwrap();
        let stored = vault.encrypt("db-password").unwrap();
        let parts: Vec<&str> = stored.split(':').collect();
        let mut ct = STANDARD.decode(parts[3]).unwrap();
        ct[0] ^= 0x01;
        let tampered = format!("{}:{}:{}:{}", parts[0], parts[1], parts[2], STANDARD.encode(ct));

        let err = vault.decrypt(&tampered).unwrap_err();
        assert_eq!(err.code, ErrorCode::CryptoFailure);
        assert_eq!(err.message, DECRYPT_FAILED);
    }

    #[test]
    fn test_wrong_master_secret_fails() {
        let stored = SecretVault::new("one").unwrap().encrypt("pw").unwrap();
        assert!(SecretVault::new("two").unwrap().decrypt(&stored).is_err());
    }

    #[test]
    fn test_malformed_input_fails() {
        let vault = SecretVault::new("master").unwrap();
        for input in ["", "v1:abc", "v2:a:b:c", "v1:!!:!!:!!", "plaintext"] {
            assert!(vault.decrypt(input).is_err(), "accepted {input:?}");
        }
    }
}
