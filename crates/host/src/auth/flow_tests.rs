// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flow behavior that needs no provider: pending-map bookkeeping.
//! The full state machine is exercised against a fake provider in
//! `tests/device_flow.rs`.

use super::*;
use crate::auth::provider::{IdentityClient, ProviderEndpoints};

fn offline_flow() -> DeviceAuthFlow {
    // The crate uses reqwest with `rustls-no-provider`; the binary installs a
    // default crypto provider in `main`. Test binaries must do the same before
    // building any client, or `Client::builder().build()` panics.
    let _ = rustls::crypto::ring::default_provider().install_default();
    // Points at nothing; none of these tests reach the network.
    let endpoints = ProviderEndpoints {
        token_url: "http://127.0.0.1:1/token".into(),
        device_authorization_url: "http://127.0.0.1:1/deviceAuthorization".into(),
        exchange_url: "http://127.0.0.1:1/exchange".into(),
        account_service_url: "http://127.0.0.1:1".into(),
    };
    DeviceAuthFlow::new(IdentityClient::new(endpoints), AuthClientSet::default())
}

#[tokio::test]
async fn poll_without_pending_fails() {
    let flow = offline_flow();
    assert!(matches!(flow.poll("nobody", None).await, Err(AuthError::NoPending)));
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let flow = offline_flow();
    assert!(!flow.cancel("nobody").await);
    assert!(!flow.cancel("nobody").await);
}

#[tokio::test]
async fn pending_is_empty_for_unknown_user() {
    let flow = offline_flow();
    assert!(flow.pending("nobody").await.is_none());
}
