// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential vault: AES-256-GCM custody of device-auth secrets.
//!
//! The blob layout is `base64url(nonce || ciphertext || tag)` over the JSON
//! encoding of [`CredentialBundle`]. The key is derived once from the
//! configured secret with SHA-256, so any process sharing the secret can
//! decrypt blobs minted by another.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::auth::CredentialBundle;
use crate::error::VaultError;

/// Nonce size for AES-256-GCM (96 bits).
const NONCE_LEN: usize = 12;

/// Stateless encrypt/decrypt of credential bundles.
#[derive(Clone)]
pub struct CredentialVault {
    key: [u8; 32],
}

impl CredentialVault {
    /// Derive the vault key from the configured secret.
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypt a credential bundle into an armored blob.
    pub fn encrypt(&self, bundle: &CredentialBundle) -> Result<String, VaultError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| VaultError::Encode)?;
        let plaintext = serde_json::to_vec(bundle).map_err(|_| VaultError::Encode)?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext =
            cipher.encrypt(&nonce, plaintext.as_slice()).map_err(|_| VaultError::Encode)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(blob))
    }

    /// Decrypt an armored blob back into a credential bundle.
    ///
    /// Every failure mode (bad armor, truncation, wrong key, tampering,
    /// undecodable JSON) collapses into [`VaultError::Corrupt`] so callers
    /// can surface one distinguishable reason.
    pub fn decrypt(&self, blob: &str) -> Result<CredentialBundle, VaultError> {
        let raw = URL_SAFE_NO_PAD.decode(blob).map_err(|_| VaultError::Corrupt)?;
        if raw.len() <= NONCE_LEN {
            return Err(VaultError::Corrupt);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| VaultError::Corrupt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Corrupt)?;

        serde_json::from_slice(&plaintext).map_err(|_| VaultError::Corrupt)
    }
}

#[cfg(test)]
#[path = "vault_tests.rs"]
mod vault_tests;
