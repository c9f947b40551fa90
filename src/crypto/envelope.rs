// ABOUTME: Request envelope codec unwrapping optionally encrypted JSON bodies
// ABOUTME: Decodes {version, iv, ciphertext, tag} with a passphrase-derived AES-256-GCM key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::aead::{Aad, Nonce};
use ring::rand::{SecureRandom, SystemRandom};
use serde_json::Value;
use tracing::debug;

use super::{derive_key, IV_LEN, TAG_LEN};
use crate::errors::{AppError, AppResult};
use crate::models::envelope::ENVELOPE_VERSION;
use crate::models::EncryptedEnvelope;

/// Result of decoding an inbound body
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    /// Body arrived in plaintext
    Plain(Value),
    /// Body arrived inside a valid envelope
    Decrypted(Value),
}

impl DecodedBody {
    /// The JSON body regardless of how it arrived
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Plain(value) | Self::Decrypted(value) => value,
        }
    }

    /// Whether the body was wrapped in an envelope
    #[must_use]
    pub const fn was_encrypted(&self) -> bool {
        matches!(self, Self::Decrypted(_))
    }
}

/// Decode an inbound body, unwrapping an envelope when present
///
/// # Errors
///
/// Returns `CryptoFailure` (generic message) for malformed or undecodable
/// envelopes or a missing passphrase, and `PolicyViolation` when plaintext is disallowed
pub fn decode_body(
    body: Value,
    passphrase: Option<&str>,
    require_envelope: bool,
) -> AppResult<DecodedBody> {
    match EncryptedEnvelope::detect(&body) {
        Some(Err(e)) => {
            debug!(error = %e, "malformed request envelope");
            Err(AppError::crypto())
        }
        Some(Ok(envelope)) => {
            let passphrase = passphrase.ok_or_else(|| {
                debug!("envelope received but no passphrase is configured");
                AppError::crypto()
            })?;
            open_envelope(&envelope, passphrase).map(DecodedBody::Decrypted)
        }
        None if require_envelope => Err(AppError::policy_violation(
            "encrypted request envelope required",
        )),
        None => Ok(DecodedBody::Plain(body)),
    }
}

/// Decrypt an envelope and parse its JSON payload
///
/// # Errors
///
/// Returns `CryptoFailure` with a generic message for any failure
pub fn open_envelope(envelope: &EncryptedEnvelope, passphrase: &str) -> AppResult<Value> {
    open_inner(envelope, passphrase).map_err(|reason| {
        debug!(reason, "envelope rejected");
        AppError::crypto()
    })
}

fn open_inner(envelope: &EncryptedEnvelope, passphrase: &str) -> Result<Value, &'static str> {
    if envelope.version != ENVELOPE_VERSION {
        return Err("unsupported version");
    }
    let iv: [u8; IV_LEN] = STANDARD
        .decode(&envelope.iv)
        .map_err(|_| "bad iv encoding")?
        .try_into()
        .map_err(|_| "bad iv length")?;
    let tag = STANDARD
        .decode(&envelope.tag)
        .map_err(|_| "bad tag encoding")?;
    if tag.len() != TAG_LEN {
        return Err("bad tag length");
    }
    let mut buffer = STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|_| "bad ciphertext encoding")?;
    buffer.extend_from_slice(&tag);

    let key = derive_key(passphrase.as_bytes()).map_err(|_| "key derivation failed")?;
    let plaintext = key
        .open_in_place(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut buffer)
        .map_err(|_| "authentication failed")?;
    serde_json::from_slice(plaintext).map_err(|_| "payload is not json")
}

/// Encrypt a JSON body into an envelope (client helper)
///
/// # Errors
///
/// Returns an internal error if serialization or sealing fails
pub fn seal_envelope(body: &Value, passphrase: &str) -> AppResult<EncryptedEnvelope> {
    let mut iv = [0u8; IV_LEN];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| AppError::internal("failed to generate IV"))?;

    let mut buffer = serde_json::to_vec(body)
        .map_err(|e| AppError::internal(format!("failed to serialize body: {e}")))?;
    let key = derive_key(passphrase.as_bytes())?;
    let tag = key
        .seal_in_place_separate_tag(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut buffer)
        .map_err(|_| AppError::internal("envelope encryption failed"))?;

    Ok(EncryptedEnvelope {
        version: ENVELOPE_VERSION,
        iv: STANDARD.encode(iv),
        ciphertext: STANDARD.encode(&buffer),
        tag: STANDARD.encode(tag.as_ref()),
    })
}
