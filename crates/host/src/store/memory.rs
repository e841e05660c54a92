// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store with an optional JSON snapshot on disk.
//!
//! Backs development runs and tests. The snapshot is written atomically
//! (unique temp file + rename) after every mutation, so a restarted process
//! sees the same records, which is what the timeout sweeper needs
//! to close sessions orphaned by a crash.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::store::types::{
    Account, AccountStatus, ActivityEntry, CosmeticState, EndReason, NewAccount, SessionRecord,
    SessionStatus, User,
};
use crate::store::Store;
use crate::timefmt::epoch_secs;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    users: HashMap<String, User>,
    #[serde(default)]
    accounts: HashMap<String, Account>,
    #[serde(default)]
    sessions: HashMap<String, SessionRecord>,
    #[serde(default)]
    activity: Vec<ActivityEntry>,
}

/// See module docs.
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Purely in-memory store (tests, throwaway runs).
    pub fn new() -> Self {
        Self { inner: RwLock::new(Snapshot::default()), path: None }
    }

    /// Store mirrored to a JSON snapshot file, loaded if present.
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let snapshot = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Snapshot::default()
        };
        Ok(Self { inner: RwLock::new(snapshot), path: Some(path) })
    }

    /// Write the snapshot atomically (unique temp name + rename, so
    /// concurrent saves cannot interleave partial writes).
    fn persist(&self, snapshot: &Snapshot) {
        let Some(ref path) = self.path else {
            return;
        };
        if let Err(e) = save(path, snapshot) {
            tracing::warn!(err = %e, "failed to persist store snapshot");
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn save(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_or_create_user(&self, user_id: &str, username: &str) -> anyhow::Result<User> {
        let mut inner = self.inner.write().await;
        let now = epoch_secs();
        let user = inner
            .users
            .entry(user_id.to_owned())
            .and_modify(|u| {
                u.username = username.to_owned();
                u.last_active = now;
            })
            .or_insert_with(|| User {
                id: user_id.to_owned(),
                username: username.to_owned(),
                created_at: now,
                last_active: now,
                last_channel_id: None,
                total_sessions: 0,
            })
            .clone();
        self.persist(&inner);
        Ok(user)
    }

    async fn user(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn set_user_channel(&self, user_id: &str, channel_id: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.get_mut(user_id) {
            user.last_channel_id = Some(channel_id.to_owned());
            user.last_active = epoch_secs();
        }
        self.persist(&inner);
        Ok(())
    }

    async fn add_account(&self, account: NewAccount) -> anyhow::Result<Account> {
        let mut inner = self.inner.write().await;
        if inner.accounts.values().any(|a| a.provider_account_id == account.provider_account_id) {
            anyhow::bail!("account `{}` is already registered", account.display_name);
        }
        let record = Account {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: account.user_id,
            display_name: account.display_name,
            provider_account_id: account.provider_account_id,
            encrypted_credentials: account.encrypted_credentials,
            status: AccountStatus::Active,
            added_at: epoch_secs(),
            last_used: None,
            total_sessions: 0,
        };
        inner.accounts.insert(record.id.clone(), record.clone());
        self.persist(&inner);
        Ok(record)
    }

    async fn account(&self, id: &str) -> anyhow::Result<Option<Account>> {
        Ok(self.inner.read().await.accounts.get(id).cloned())
    }

    async fn account_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> anyhow::Result<Option<Account>> {
        Ok(self
            .inner
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.user_id == user_id && a.display_name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn accounts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Account>> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<Account> =
            inner.accounts.values().filter(|a| a.user_id == user_id).cloned().collect();
        accounts.sort_by_key(|a| a.added_at);
        Ok(accounts)
    }

    async fn set_account_status(&self, id: &str, status: AccountStatus) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(account) = inner.accounts.get_mut(id) {
            account.status = status;
        }
        self.persist(&inner);
        Ok(())
    }

    async fn mark_account_used(&self, id: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(account) = inner.accounts.get_mut(id) {
            account.last_used = Some(epoch_secs());
            account.total_sessions += 1;
        }
        self.persist(&inner);
        Ok(())
    }

    async fn remove_account(
        &self,
        user_id: &str,
        name: &str,
    ) -> anyhow::Result<Option<Account>> {
        let mut inner = self.inner.write().await;
        let id = inner
            .accounts
            .values()
            .find(|a| a.user_id == user_id && a.display_name.eq_ignore_ascii_case(name))
            .map(|a| a.id.clone());
        let removed = id.and_then(|id| inner.accounts.remove(&id));
        self.persist(&inner);
        Ok(removed)
    }

    async fn create_session(
        &self,
        account_id: &str,
        user_id: &str,
        timeout_minutes: u32,
    ) -> anyhow::Result<SessionRecord> {
        let mut inner = self.inner.write().await;
        let now = epoch_secs();
        let record = SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.to_owned(),
            user_id: user_id.to_owned(),
            started_at: now,
            ended_at: None,
            last_activity: now,
            status: SessionStatus::Active,
            timeout_minutes,
            extensions_used: 0,
            cosmetics: CosmeticState::default(),
            party: Default::default(),
            end_reason: None,
        };
        inner.sessions.insert(record.id.clone(), record.clone());
        if let Some(user) = inner.users.get_mut(user_id) {
            user.total_sessions += 1;
        }
        self.persist(&inner);
        Ok(record)
    }

    async fn session(&self, id: &str) -> anyhow::Result<Option<SessionRecord>> {
        Ok(self.inner.read().await.sessions.get(id).cloned())
    }

    async fn active_session_for_account(
        &self,
        account_id: &str,
    ) -> anyhow::Result<Option<SessionRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .values()
            .find(|s| s.account_id == account_id && s.status.is_live())
            .cloned())
    }

    async fn active_sessions_for_user(
        &self,
        user_id: &str,
    ) -> anyhow::Result<Vec<SessionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.status.is_live())
            .cloned()
            .collect())
    }

    async fn active_sessions(&self) -> anyhow::Result<Vec<SessionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.values().filter(|s| s.status.is_live()).cloned().collect())
    }

    async fn touch_session(&self, id: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.get_mut(id) {
            if session.status.is_live() {
                session.last_activity = epoch_secs();
                if session.status == SessionStatus::IdleWarning {
                    session.status = SessionStatus::Active;
                }
            }
        }
        self.persist(&inner);
        Ok(())
    }

    async fn set_session_status(&self, id: &str, status: SessionStatus) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.get_mut(id) {
            // Terminal records stay terminal.
            if session.status.is_live() {
                session.status = status;
            }
        }
        self.persist(&inner);
        Ok(())
    }

    async fn end_session(&self, id: &str, reason: EndReason) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.get_mut(id) {
            if session.status.is_live() {
                session.status = SessionStatus::Stopped;
                session.ended_at = Some(epoch_secs());
                session.end_reason = Some(reason);
            }
        }
        self.persist(&inner);
        Ok(())
    }

    async fn extend_session(&self, id: &str, minutes: u32) -> anyhow::Result<u32> {
        let mut inner = self.inner.write().await;
        let used = match inner.sessions.get_mut(id) {
            Some(session) if session.status.is_live() => {
                session.extensions_used += 1;
                session.timeout_minutes += minutes;
                session.extensions_used
            }
            _ => anyhow::bail!("no live session with id {id}"),
        };
        self.persist(&inner);
        Ok(used)
    }

    async fn set_session_cosmetics(
        &self,
        id: &str,
        cosmetics: &CosmeticState,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.get_mut(id) {
            session.cosmetics = cosmetics.clone();
        }
        self.persist(&inner);
        Ok(())
    }

    async fn log_activity(&self, entry: ActivityEntry) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        inner.activity.push(entry);
        self.persist(&inner);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
