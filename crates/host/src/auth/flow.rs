// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The device-code flow state machine.
//!
//! `INIT → AWAITING_USER_ACTION → {POLLING(pending) ⇄ POLLING(slow_down)} →
//! {SUCCESS, EXPIRED, DENIED, CANCELLED, ERROR}`; every terminal state
//! removes the in-memory pending entry. One pending flow per user; a second
//! `start` replaces the first and cancels its in-flight poll.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::auth::provider::IdentityClient;
use crate::auth::{AuthClientSet, CredentialBundle, DeviceCodeSession, TokenResponse};
use crate::error::AuthError;

/// Fallback verification page when the provider omits both link fields.
const DEFAULT_ACTIVATE_URL: &str = "https://www.epicgames.com/activate";

/// Callback invoked while polling with user-facing progress text.
pub type StatusSink = Box<dyn Fn(String) + Send + Sync>;

struct PendingAuth {
    session: DeviceCodeSession,
    cancel: CancellationToken,
}

/// Drives device-code logins and device-credential custody for all users.
pub struct DeviceAuthFlow {
    provider: IdentityClient,
    clients: AuthClientSet,
    pending: RwLock<HashMap<String, Arc<PendingAuth>>>,
}

impl DeviceAuthFlow {
    pub fn new(provider: IdentityClient, clients: AuthClientSet) -> Self {
        Self { provider, clients, pending: RwLock::new(HashMap::new()) }
    }

    /// Begin a device-code login for `user_id`.
    ///
    /// Obtains a service token from the primary client, requests a device
    /// code and stores the pending entry. Returns what the user needs to
    /// see: the short code and the verification link.
    pub async fn start(&self, user_id: &str) -> Result<DeviceCodeSession, AuthError> {
        let service = self.provider.client_credentials(self.clients.primary()).await?;
        let device = self.provider.request_device_code(&service.access_token).await?;

        let verification_link = match device.verification_uri_complete {
            Some(link) => link,
            None => {
                let base = device.verification_uri.as_deref().unwrap_or(DEFAULT_ACTIVATE_URL);
                format!("{base}?userCode={}", device.user_code)
            }
        };

        let session = DeviceCodeSession {
            device_code: device.device_code,
            user_code: device.user_code,
            verification_link,
            expires_in: device.expires_in,
            interval: device.interval,
        };

        let entry = Arc::new(PendingAuth { session: session.clone(), cancel: CancellationToken::new() });
        let displaced = self.pending.write().await.insert(user_id.to_owned(), entry);
        if let Some(prev) = displaced {
            // The old poll loop (if any) ends as cancelled instead of
            // spinning on a dead code.
            prev.cancel.cancel();
        }

        tracing::info!(user = %user_id, code = %session.user_code, "device code flow started");
        Ok(session)
    }

    /// The pending session for a user, if any.
    pub async fn pending(&self, user_id: &str) -> Option<DeviceCodeSession> {
        self.pending.read().await.get(user_id).map(|e| e.session.clone())
    }

    /// Poll until the user completes login, the code expires, access is
    /// denied, or the flow is cancelled. On success the durable credential
    /// bundle has already been minted (with client fallback if needed).
    pub async fn poll(
        &self,
        user_id: &str,
        on_status: Option<StatusSink>,
    ) -> Result<CredentialBundle, AuthError> {
        let entry = self
            .pending
            .read()
            .await
            .get(user_id)
            .map(Arc::clone)
            .ok_or(AuthError::NoPending)?;

        let started = tokio::time::Instant::now();
        let interval = Duration::from_secs(entry.session.interval);

        loop {
            if entry.cancel.is_cancelled() {
                return Err(AuthError::Cancelled);
            }

            let elapsed = started.elapsed().as_secs();
            if elapsed >= entry.session.expires_in {
                self.clear(user_id, &entry).await;
                return Err(AuthError::TimedOut);
            }

            match self
                .provider
                .redeem_device_code(self.clients.primary(), &entry.session.device_code)
                .await
            {
                Ok(token) => {
                    let result = self.mint_credentials(&token).await;
                    // The device code is consumed either way; the pending
                    // entry is gone even if minting failed.
                    self.clear(user_id, &entry).await;
                    return result;
                }
                Err(AuthError::Pending) => {
                    if let Some(cb) = &on_status {
                        let remaining = entry.session.expires_in.saturating_sub(elapsed);
                        cb(format!("Waiting for login... ({remaining}s remaining)"));
                    }
                    tokio::time::sleep(interval).await;
                }
                Err(AuthError::SlowDown) => {
                    tokio::time::sleep(interval * 2).await;
                }
                Err(AuthError::Expired) => {
                    self.clear(user_id, &entry).await;
                    return Err(AuthError::Expired);
                }
                Err(AuthError::Denied) => {
                    self.clear(user_id, &entry).await;
                    return Err(AuthError::Denied);
                }
                Err(AuthError::Http(e)) => {
                    // Transport failure, not a provider verdict. Tear down.
                    self.clear(user_id, &entry).await;
                    return Err(AuthError::Http(e));
                }
                Err(e) => {
                    tracing::warn!(user = %user_id, err = %e, "unexpected poll response, retrying");
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    /// Cancel a pending flow. Idempotent; returns whether one existed.
    pub async fn cancel(&self, user_id: &str) -> bool {
        match self.pending.write().await.remove(user_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Replay a device-auth grant to confirm stored credentials are still
    /// accepted. Returns the account's display name.
    pub async fn verify(
        &self,
        device_id: &str,
        account_id: &str,
        secret: &str,
        client_token: Option<&str>,
    ) -> Result<String, AuthError> {
        let token = match client_token {
            Some(t) => t.to_owned(),
            None => self.clients.default_verify_token(),
        };
        let grant =
            self.provider.device_auth_grant(&token, device_id, account_id, secret).await?;
        Ok(grant.display_name.unwrap_or_else(|| "Unknown".to_owned()))
    }

    /// Mint durable device credentials from a fresh user token.
    ///
    /// Tries the token as-is first. If the primary client lacks the
    /// permission, walks the configured fallback list: a fresh exchange
    /// code per attempt (they are single-use), redeemed against the
    /// fallback pair, then creation retried with that token.
    async fn mint_credentials(&self, token: &TokenResponse) -> Result<CredentialBundle, AuthError> {
        let account_id = token
            .account_id
            .as_deref()
            .ok_or_else(|| AuthError::Provider("token response missing account id".into()))?;
        let display_name = token.display_name.clone().unwrap_or_else(|| "Unknown".to_owned());

        match self.provider.create_device_auth(&token.access_token, account_id).await {
            Ok(da) => {
                tracing::info!(
                    client = %self.clients.primary().name,
                    account = %display_name,
                    "device credentials created"
                );
                return Ok(CredentialBundle {
                    device_id: da.device_id,
                    account_id: da.account_id,
                    secret: da.secret,
                    display_name,
                    client_token_used: Some(self.clients.primary().basic_token()),
                });
            }
            Err(AuthError::MissingPermission) => {
                tracing::info!(
                    client = %self.clients.primary().name,
                    "primary client refused device credential creation, trying fallbacks"
                );
            }
            Err(e) => return Err(e),
        }

        let mut last_err = AuthError::MissingPermission;
        for fallback in self.clients.device_auth_fallbacks() {
            let code = self.provider.exchange_code(&token.access_token).await?;
            let fb_token = match self.provider.redeem_exchange_code(fallback, &code).await {
                Ok(t) => t,
                Err(e @ AuthError::ClientDisabled) => {
                    tracing::warn!(client = %fallback.name, "fallback client disabled");
                    last_err = e;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.provider.create_device_auth(&fb_token.access_token, account_id).await {
                Ok(da) => {
                    tracing::info!(
                        client = %fallback.name,
                        account = %display_name,
                        "device credentials created via fallback client"
                    );
                    return Ok(CredentialBundle {
                        device_id: da.device_id,
                        account_id: da.account_id,
                        secret: da.secret,
                        display_name,
                        client_token_used: Some(fallback.basic_token()),
                    });
                }
                Err(e @ (AuthError::MissingPermission | AuthError::ClientDisabled)) => {
                    tracing::warn!(client = %fallback.name, err = %e, "fallback client refused");
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /// Remove the pending entry, but only if it is still the one this poll
    /// started with (a replacement flow must not be evicted).
    async fn clear(&self, user_id: &str, entry: &Arc<PendingAuth>) {
        let mut map = self.pending.write().await;
        if let Some(current) = map.get(user_id) {
            if Arc::ptr_eq(current, entry) {
                map.remove(user_id);
            }
        }
    }
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod flow_tests;
