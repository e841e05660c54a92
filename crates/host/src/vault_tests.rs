// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::CredentialVault;
use crate::error::VaultError;
use crate::test_support::test_bundle;

#[test]
fn round_trip_preserves_bundle() -> anyhow::Result<()> {
    let vault = CredentialVault::new("a-sufficiently-long-secret");
    let bundle = test_bundle("PlayerOne");

    let blob = vault.encrypt(&bundle)?;
    let decrypted = vault.decrypt(&blob)?;
    assert_eq!(decrypted, bundle);
    Ok(())
}

#[test]
fn bundle_without_client_token_round_trips() -> anyhow::Result<()> {
    let vault = CredentialVault::new("a-sufficiently-long-secret");
    let mut bundle = test_bundle("NoToken");
    bundle.client_token_used = None;

    let decrypted = vault.decrypt(&vault.encrypt(&bundle)?)?;
    assert_eq!(decrypted.client_token_used, None);
    Ok(())
}

#[test]
fn nonces_differ_between_encryptions() -> anyhow::Result<()> {
    let vault = CredentialVault::new("a-sufficiently-long-secret");
    let bundle = test_bundle("PlayerOne");
    assert_ne!(vault.encrypt(&bundle)?, vault.encrypt(&bundle)?);
    Ok(())
}

#[test]
fn wrong_key_is_corrupt() -> anyhow::Result<()> {
    let vault = CredentialVault::new("the-original-key-secret");
    let other = CredentialVault::new("a-different-key-secret!");

    let blob = vault.encrypt(&test_bundle("PlayerOne"))?;
    assert!(matches!(other.decrypt(&blob), Err(VaultError::Corrupt)));
    Ok(())
}

#[test]
fn tampered_blob_is_corrupt() -> anyhow::Result<()> {
    let vault = CredentialVault::new("a-sufficiently-long-secret");
    let blob = vault.encrypt(&test_bundle("PlayerOne"))?;

    // Flip a character somewhere past the nonce.
    let mut chars: Vec<char> = blob.chars().collect();
    let mid = chars.len() / 2;
    chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    assert!(matches!(vault.decrypt(&tampered), Err(VaultError::Corrupt)));
    Ok(())
}

#[test]
fn garbage_is_corrupt() {
    let vault = CredentialVault::new("a-sufficiently-long-secret");
    assert!(matches!(vault.decrypt("not base64 at all!!"), Err(VaultError::Corrupt)));
    assert!(matches!(vault.decrypt(""), Err(VaultError::Corrupt)));
    assert!(matches!(vault.decrypt("AAAA"), Err(VaultError::Corrupt)));
}
