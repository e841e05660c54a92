// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence seam consumed by the core.
//!
//! The registry's in-memory map is the authority for liveness and capacity;
//! the store is a mirror used for monitoring, restart recovery and audit.
//! Implementations serialize their own per-record writes.

pub mod memory;
pub mod types;

pub use types::{
    Account, AccountStatus, ActivityEntry, CosmeticState, EndReason, NewAccount, PartyInfo,
    SessionRecord, SessionStatus, User,
};

use async_trait::async_trait;

/// Store operations the core depends on. All methods are keyed by the ids
/// in [`types`]; errors are surfaced as-is for user-initiated operations
/// and swallowed-and-logged by the background sweep.
#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn get_or_create_user(&self, user_id: &str, username: &str) -> anyhow::Result<User>;
    async fn user(&self, user_id: &str) -> anyhow::Result<Option<User>>;
    /// Remember where to reach the user for proactive notifications.
    async fn set_user_channel(&self, user_id: &str, channel_id: &str) -> anyhow::Result<()>;

    // Accounts
    async fn add_account(&self, account: NewAccount) -> anyhow::Result<Account>;
    async fn account(&self, id: &str) -> anyhow::Result<Option<Account>>;
    async fn account_by_name(&self, user_id: &str, name: &str)
        -> anyhow::Result<Option<Account>>;
    async fn accounts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Account>>;
    async fn set_account_status(&self, id: &str, status: AccountStatus) -> anyhow::Result<()>;
    /// Bump usage counters when a session starts.
    async fn mark_account_used(&self, id: &str) -> anyhow::Result<()>;
    /// Remove an account by owner + display name; returns the removed
    /// account so callers can cascade (stop any live session).
    async fn remove_account(&self, user_id: &str, name: &str) -> anyhow::Result<Option<Account>>;

    // Sessions
    async fn create_session(
        &self,
        account_id: &str,
        user_id: &str,
        timeout_minutes: u32,
    ) -> anyhow::Result<SessionRecord>;
    async fn session(&self, id: &str) -> anyhow::Result<Option<SessionRecord>>;
    async fn active_session_for_account(
        &self,
        account_id: &str,
    ) -> anyhow::Result<Option<SessionRecord>>;
    async fn active_sessions_for_user(&self, user_id: &str)
        -> anyhow::Result<Vec<SessionRecord>>;
    async fn active_sessions(&self) -> anyhow::Result<Vec<SessionRecord>>;
    /// Refresh `last_activity`; also resets `idle_warning` back to `active`
    /// (the one permitted backward transition).
    async fn touch_session(&self, id: &str) -> anyhow::Result<()>;
    async fn set_session_status(&self, id: &str, status: SessionStatus) -> anyhow::Result<()>;
    /// Terminal transition. Idempotent: a second call with a different
    /// reason leaves the first outcome in place.
    async fn end_session(&self, id: &str, reason: EndReason) -> anyhow::Result<()>;
    /// Add `minutes` to the timeout budget and count the extension.
    /// Returns the new `extensions_used`.
    async fn extend_session(&self, id: &str, minutes: u32) -> anyhow::Result<u32>;
    async fn set_session_cosmetics(
        &self,
        id: &str,
        cosmetics: &CosmeticState,
    ) -> anyhow::Result<()>;

    // Audit
    async fn log_activity(&self, entry: ActivityEntry) -> anyhow::Result<()>;
}
