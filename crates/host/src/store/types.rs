// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted record types.

use serde::{Deserialize, Serialize};

/// Health of a managed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Error,
    Banned,
}

/// Lifecycle of a session record. Transitions only move forward:
/// `active → idle_warning → active|stopped` or `active → stopped`; the
/// warning-to-active reset happens on fresh activity and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    IdleWarning,
    Stopped,
}

impl SessionStatus {
    /// Live means not yet terminal.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Timeout,
    Manual,
    Error,
    Crash,
    AccountRemoved,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Manual => "manual",
            Self::Error => "error",
            Self::Crash => "crash",
            Self::AccountRemoved => "account_removed",
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A controlling user, keyed by their chat identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: u64,
    pub last_active: u64,
    /// Last channel the user interacted from; timeout warnings go here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_channel_id: Option<String>,
    #[serde(default)]
    pub total_sessions: u32,
}

/// A managed third-party account owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    /// Display name on the provider side; the handle users type in commands.
    pub display_name: String,
    /// The provider's account identifier.
    pub provider_account_id: String,
    /// Vault blob; only ever decrypted inside the registry at start.
    pub encrypted_credentials: String,
    pub status: AccountStatus,
    pub added_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<u64>,
    #[serde(default)]
    pub total_sessions: u32,
}

/// Fields required to register a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: String,
    pub display_name: String,
    pub provider_account_id: String,
    pub encrypted_credentials: String,
}

/// Current cosmetic loadout for a live session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmeticState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outfit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backpack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickaxe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emote: Option<String>,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub crown_count: u32,
}

/// Party membership snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyInfo {
    pub in_party: bool,
    pub party_size: u32,
    pub is_leader: bool,
}

impl Default for PartyInfo {
    fn default() -> Self {
        Self { in_party: false, party_size: 1, is_leader: false }
    }
}

/// One bounded-lifetime run of an automated connection for an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub account_id: String,
    pub user_id: String,
    pub started_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<u64>,
    pub last_activity: u64,
    pub status: SessionStatus,
    /// Idle budget in minutes, grown by extensions.
    pub timeout_minutes: u32,
    #[serde(default)]
    pub extensions_used: u32,
    #[serde(default)]
    pub cosmetics: CosmeticState,
    #[serde(default)]
    pub party: PartyInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
}

/// Append-only audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub user_id: String,
    /// `session_start`, `session_stop`, `timeout`, `extension`, ...
    pub action: String,
    #[serde(default)]
    pub detail: serde_json::Value,
    pub at: u64,
}
