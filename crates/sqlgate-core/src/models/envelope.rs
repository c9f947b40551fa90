// ABOUTME: Wire shape of the optional encrypted request envelope
// ABOUTME: Version tag plus base64 IV, ciphertext and authentication tag
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use serde::{Deserialize, Serialize};

/// Only envelope version currently understood
pub const ENVELOPE_VERSION: u8 = 1;

const ENVELOPE_FIELDS: [&str; 3] = ["iv", "ciphertext", "tag"];

/// Encrypted wrapper around a JSON request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Envelope format version
    pub version: u8,
    /// Base64 12-byte initialization vector
    pub iv: String,
    /// Base64 ciphertext
    pub ciphertext: String,
    /// Base64 16-byte authentication tag
    pub tag: String,
}

impl EncryptedEnvelope {
    /// Extract an envelope from a request body
    ///
    /// Returns `None` for a plain body, and `Some(Err(_))` when the body has
    /// `ciphertext` or two of the envelope fields but is not a well-formed envelope.
    #[must_use]
    pub fn detect(body: &serde_json::Value) -> Option<Result<Self, serde_json::Error>> {
        let object = body.as_object()?;
        let present = ENVELOPE_FIELDS
            .iter()
            .filter(|field| object.contains_key(**field))
            .count();
        // A lone `iv` or `tag` may be an ordinary parameter name
        if !(object.contains_key("ciphertext") || present >= 2) {
            return None;
        }
        Some(serde_json::from_value(body.clone()))
    }
}
