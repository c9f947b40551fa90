// ABOUTME: Symmetric cryptography for stored secrets and inbound request envelopes
// ABOUTME: AES-256-GCM via ring with SHA-256 derived keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Crypto
//!
//! Two consumers share one primitive. The [`vault`] protects credentials at
//! rest in the config store; the [`envelope`] codec unwraps optionally
//! encrypted request bodies. Both fail closed with generic messages.

use ring::aead::{LessSafeKey, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::digest::{digest, SHA256};

use crate::errors::{AppError, AppResult};

/// Request envelope codec
pub mod envelope;
/// Secret vault for credentials at rest
pub mod vault;

pub use envelope::{decode_body, open_envelope, seal_envelope, DecodedBody};
pub use vault::SecretVault;

/// Initialization vector length in bytes
pub const IV_LEN: usize = NONCE_LEN;
/// Authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Build an AES-256-GCM key from SHA-256 of the given material
pub(crate) fn derive_key(material: &[u8]) -> AppResult<LessSafeKey> {
    let hashed = digest(&SHA256, material);
    let unbound = UnboundKey::new(&AES_256_GCM, hashed.as_ref())
        .map_err(|_| AppError::internal("failed to build encryption key"))?;
    Ok(LessSafeKey::new(unbound))
}
