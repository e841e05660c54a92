// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single authority over live sessions.
//!
//! One mutex serializes every start/stop, so duplicate and capacity checks
//! are atomic with respect to each other: a second `start` for the same
//! account waits for the first to fully complete (including any rollback)
//! before its own preconditions are evaluated. The in-memory map is the
//! authority; the store mirrors it for monitoring and restart recovery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::{ExtendError, StartError, StopError};
use crate::game::GameClientFactory;
use crate::session::{ConnState, LobbySession};
use crate::store::{AccountStatus, ActivityEntry, EndReason, SessionRecord, Store};
use crate::timefmt::{epoch_secs, format_uptime};
use crate::vault::CredentialVault;

/// Capacity and timing knobs, derived from the host config.
#[derive(Debug, Clone)]
pub struct RegistryLimits {
    pub max_sessions_per_user: usize,
    pub max_sessions_global: usize,
    pub default_timeout_minutes: u32,
    pub extension_minutes: u32,
    pub max_extensions: u32,
    /// How long `start` waits for readiness before reporting a soft start.
    pub start_grace: Duration,
    /// How long `stop` waits for the connection task to wind down.
    pub stop_grace: Duration,
}

/// Point-in-time status for one account's session.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStatusInfo {
    /// `online`, `starting` or `offline`.
    pub status: &'static str,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
}

pub struct SessionRegistry {
    live: Mutex<HashMap<String, Arc<LobbySession>>>,
    store: Arc<dyn Store>,
    vault: CredentialVault,
    factory: Arc<dyn GameClientFactory>,
    limits: RegistryLimits,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn Store>,
        vault: CredentialVault,
        factory: Arc<dyn GameClientFactory>,
        limits: RegistryLimits,
    ) -> Arc<Self> {
        Arc::new(Self { live: Mutex::new(HashMap::new()), store, vault, factory, limits })
    }

    pub fn limits(&self) -> &RegistryLimits {
        &self.limits
    }

    /// Start a session for an account.
    ///
    /// Precondition order: duplicate, per-user cap, global cap. Rejections
    /// have no side effects, not even a session record. Decryption failure
    /// aborts before anything is created. A connect failure inside the
    /// grace window rolls the freshly created record back to
    /// `stopped(error)`; grace expiry without a verdict registers the
    /// session anyway and reports it as still starting.
    pub async fn start(
        &self,
        account_id: &str,
        user_id: &str,
        username: &str,
        encrypted_credentials: &str,
    ) -> Result<String, StartError> {
        let mut live = self.live.lock().await;

        if live.contains_key(account_id) {
            return Err(StartError::AlreadyRunning(username.to_owned()));
        }
        let used = live.values().filter(|s| s.user_id == user_id).count();
        if used >= self.limits.max_sessions_per_user {
            return Err(StartError::UserCapReached {
                used,
                cap: self.limits.max_sessions_per_user,
            });
        }
        if live.len() >= self.limits.max_sessions_global {
            return Err(StartError::GlobalCapReached);
        }

        let credentials = self.vault.decrypt(encrypted_credentials)?;

        let record = self
            .store
            .create_session(account_id, user_id, self.limits.default_timeout_minutes)
            .await
            .map_err(StartError::Store)?;

        let client = match self.factory.build(&credentials) {
            Ok(client) => client,
            Err(e) => {
                let _ = self.store.end_session(&record.id, EndReason::Error).await;
                return Err(StartError::Connection {
                    username: username.to_owned(),
                    reason: e.to_string(),
                });
            }
        };

        let session = LobbySession::new(
            account_id.to_owned(),
            record.id.clone(),
            user_id.to_owned(),
            username.to_owned(),
            client,
            Arc::clone(&self.store),
        );
        session.connect().await;

        let message =
            match tokio::time::timeout(self.limits.start_grace, session.wait_ready()).await {
                Ok(Ok(())) => format!("`{username}` started successfully!"),
                Ok(Err(reason)) => {
                    session.stop(EndReason::Error, self.limits.stop_grace).await;
                    return Err(StartError::Connection { username: username.to_owned(), reason });
                }
                // Still connecting after the grace period: registered, not
                // yet confirmed ready.
                Err(_) => format!("`{username}` is starting, not ready yet"),
            };

        live.insert(account_id.to_owned(), Arc::clone(&session));
        drop(live);

        if let Err(e) = self.store.set_account_status(account_id, AccountStatus::Active).await {
            tracing::warn!(account = %username, err = %e, "failed to mark account active");
        }
        if let Err(e) = self.store.mark_account_used(account_id).await {
            tracing::warn!(account = %username, err = %e, "failed to bump account usage");
        }
        self.log(Some(record.id), user_id, "session_start", username).await;

        tracing::info!(account = %username, user = %user_id, "session started");
        Ok(message)
    }

    /// Stop a session. After this returns the account is guaranteed absent
    /// from the live map, whatever the underlying connection did during
    /// shutdown.
    pub async fn stop(&self, account_id: &str, reason: EndReason) -> Result<String, StopError> {
        let mut live = self.live.lock().await;
        let session = live.remove(account_id).ok_or(StopError::NotRunning)?;
        session.stop(reason, self.limits.stop_grace).await;
        drop(live);

        self.log(Some(session.record_id.clone()), &session.user_id, "session_stop", &session.username)
            .await;
        Ok(format!("`{}` stopped", session.username))
    }

    pub async fn get(&self, account_id: &str) -> Option<Arc<LobbySession>> {
        self.live.lock().await.get(account_id).map(Arc::clone)
    }

    pub async fn get_for_user(&self, user_id: &str) -> Vec<Arc<LobbySession>> {
        self.live
            .lock()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .map(Arc::clone)
            .collect()
    }

    pub async fn active_count(&self) -> usize {
        self.live.lock().await.len()
    }

    /// Stop every session owned by a user. Returns how many stopped.
    pub async fn stop_all_for_user(&self, user_id: &str, reason: EndReason) -> usize {
        let ids: Vec<String> = {
            let live = self.live.lock().await;
            live.iter()
                .filter(|(_, s)| s.user_id == user_id)
                .map(|(id, _)| id.clone())
                .collect()
        };
        let mut stopped = 0;
        for id in ids {
            if self.stop(&id, reason).await.is_ok() {
                stopped += 1;
            }
        }
        stopped
    }

    /// Stop everything. Returns how many stopped.
    pub async fn stop_all(&self, reason: EndReason) -> usize {
        let ids: Vec<String> = { self.live.lock().await.keys().cloned().collect() };
        let mut stopped = 0;
        for id in ids {
            if self.stop(&id, reason).await.is_ok() {
                stopped += 1;
            }
        }
        stopped
    }

    /// Status for one account's session, offline or not.
    pub async fn status(&self, account_id: &str) -> SessionStatusInfo {
        match self.get(account_id).await {
            None => SessionStatusInfo {
                status: "offline",
                running: false,
                username: None,
                started_at: None,
                last_activity: None,
                uptime: None,
            },
            Some(session) => {
                let running = session.is_running().await;
                let status = match session.state() {
                    ConnState::Ready => "online",
                    _ => "starting",
                };
                SessionStatusInfo {
                    status,
                    running,
                    username: Some(session.username.clone()),
                    started_at: Some(session.started_at),
                    last_activity: Some(session.last_activity()),
                    uptime: Some(format_uptime(epoch_secs().saturating_sub(session.started_at))),
                }
            }
        }
    }

    /// Grant one timeout extension to a running session.
    pub async fn extend(&self, account_id: &str) -> Result<SessionRecord, ExtendError> {
        let session = self.get(account_id).await.ok_or(ExtendError::NotRunning)?;
        let record = self
            .store
            .active_session_for_account(account_id)
            .await
            .map_err(ExtendError::Store)?
            .ok_or(ExtendError::NotRunning)?;

        if record.extensions_used >= self.limits.max_extensions {
            return Err(ExtendError::LimitReached(record.extensions_used));
        }

        self.store
            .extend_session(&record.id, self.limits.extension_minutes)
            .await
            .map_err(ExtendError::Store)?;
        // An extension is fresh activity; this also clears any idle warning.
        session.touch_activity().await;
        self.log(Some(record.id.clone()), &record.user_id, "extension", &session.username).await;

        self.store
            .active_session_for_account(account_id)
            .await
            .map_err(ExtendError::Store)?
            .ok_or(ExtendError::NotRunning)
    }

    /// Remove an account, cascading to its live session if one exists.
    pub async fn remove_account(&self, user_id: &str, name: &str) -> anyhow::Result<bool> {
        let Some(account) = self.store.account_by_name(user_id, name).await? else {
            return Ok(false);
        };
        let _ = self.stop(&account.id, EndReason::AccountRemoved).await;
        self.store.remove_account(user_id, name).await?;
        Ok(true)
    }

    async fn log(&self, session_id: Option<String>, user_id: &str, action: &str, username: &str) {
        let entry = ActivityEntry {
            session_id,
            user_id: user_id.to_owned(),
            action: action.to_owned(),
            detail: serde_json::json!({ "username": username }),
            at: epoch_secs(),
        };
        if let Err(e) = self.store.log_activity(entry).await {
            tracing::debug!(err = %e, "failed to append activity log");
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
