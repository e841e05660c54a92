// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Configuration for the lobby host.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "lobbyhost", about = "Lobby bot session host")]
pub struct HostConfig {
    /// Directory for the store snapshot and other state.
    #[arg(long, env = "LOBBYHOST_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Secret the credential vault derives its key from.
    #[arg(long, env = "LOBBYHOST_ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: String,

    /// Default idle budget for new sessions, in minutes.
    #[arg(long, default_value_t = 30, env = "LOBBYHOST_SESSION_TIMEOUT_MINUTES")]
    pub session_timeout_minutes: u32,

    /// Idle warning threshold, in minutes of remaining budget.
    #[arg(long, default_value_t = 5, env = "LOBBYHOST_WARNING_THRESHOLD_MINUTES")]
    pub warning_threshold_minutes: u32,

    /// Minutes added per extension.
    #[arg(long, default_value_t = 15, env = "LOBBYHOST_EXTENSION_MINUTES")]
    pub extension_minutes: u32,

    /// Extensions allowed per session.
    #[arg(long, default_value_t = 2, env = "LOBBYHOST_MAX_EXTENSIONS")]
    pub max_extensions: u32,

    /// Concurrent sessions allowed per user.
    #[arg(long, default_value_t = 3, env = "LOBBYHOST_MAX_SESSIONS_PER_USER")]
    pub max_sessions_per_user: usize,

    /// Concurrent sessions allowed across all users.
    #[arg(long, default_value_t = 50, env = "LOBBYHOST_MAX_SESSIONS_GLOBAL")]
    pub max_sessions_global: usize,

    /// Timeout sweep interval in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "LOBBYHOST_SWEEP_INTERVAL_MS")]
    pub sweep_interval_ms: u64,

    /// How long `start` waits for readiness before reporting a soft start,
    /// in milliseconds.
    #[arg(long, default_value_t = 8_000, env = "LOBBYHOST_START_GRACE_MS")]
    pub start_grace_ms: u64,

    /// Bound on session shutdown, in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "LOBBYHOST_STOP_GRACE_MS")]
    pub stop_grace_ms: u64,

    /// Path to a JSON file with the ordered identity-client list. The
    /// compiled-in defaults are used when unset.
    #[arg(long, env = "LOBBYHOST_AUTH_CLIENTS")]
    pub auth_clients: Option<PathBuf>,

    /// Identity provider token endpoint override.
    #[arg(long, env = "LOBBYHOST_TOKEN_URL")]
    pub token_url: Option<String>,

    /// Identity provider device-authorization endpoint override.
    #[arg(long, env = "LOBBYHOST_DEVICE_AUTH_URL")]
    pub device_authorization_url: Option<String>,

    /// Identity provider exchange endpoint override.
    #[arg(long, env = "LOBBYHOST_EXCHANGE_URL")]
    pub exchange_url: Option<String>,

    /// Identity provider account-service base override.
    #[arg(long, env = "LOBBYHOST_ACCOUNT_SERVICE_URL")]
    pub account_service_url: Option<String>,

    /// Log filter (tracing `EnvFilter` syntax).
    #[arg(long, default_value = "info", env = "LOBBYHOST_LOG")]
    pub log_level: String,

    /// Log format: `text` or `json`.
    #[arg(long, default_value = "text", env = "LOBBYHOST_LOG_FORMAT")]
    pub log_format: String,
}

impl HostConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.encryption_key.len() < 16 {
            anyhow::bail!("encryption key must be at least 16 characters");
        }
        if self.session_timeout_minutes == 0 {
            anyhow::bail!("session timeout must be at least one minute");
        }
        if self.warning_threshold_minutes >= self.session_timeout_minutes {
            anyhow::bail!("warning threshold must be below the session timeout");
        }
        if self.max_sessions_per_user == 0 || self.max_sessions_global == 0 {
            anyhow::bail!("session caps must be at least 1");
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn start_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.start_grace_ms)
    }

    pub fn stop_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.stop_grace_ms)
    }

    /// Capacity and timing knobs for the registry.
    pub fn registry_limits(&self) -> crate::registry::RegistryLimits {
        crate::registry::RegistryLimits {
            max_sessions_per_user: self.max_sessions_per_user,
            max_sessions_global: self.max_sessions_global,
            default_timeout_minutes: self.session_timeout_minutes,
            extension_minutes: self.extension_minutes,
            max_extensions: self.max_extensions,
            start_grace: self.start_grace(),
            stop_grace: self.stop_grace(),
        }
    }

    /// Endpoint set with any overrides applied.
    pub fn provider_endpoints(&self) -> crate::auth::provider::ProviderEndpoints {
        let mut endpoints = crate::auth::provider::ProviderEndpoints::default();
        if let Some(ref url) = self.token_url {
            endpoints.token_url = url.clone();
        }
        if let Some(ref url) = self.device_authorization_url {
            endpoints.device_authorization_url = url.clone();
        }
        if let Some(ref url) = self.exchange_url {
            endpoints.exchange_url = url.clone();
        }
        if let Some(ref url) = self.account_service_url {
            endpoints.account_service_url = url.clone();
        }
        endpoints
    }

    /// Config for unit tests: tight timings, small caps.
    pub fn test() -> Self {
        Self {
            state_dir: None,
            encryption_key: "test-key-test-key-test-key".into(),
            session_timeout_minutes: 30,
            warning_threshold_minutes: 5,
            extension_minutes: 15,
            max_extensions: 2,
            max_sessions_per_user: 3,
            max_sessions_global: 50,
            sweep_interval_ms: 50,
            start_grace_ms: 500,
            stop_grace_ms: 500,
            auth_clients: None,
            token_url: None,
            device_authorization_url: None,
            exchange_url: None,
            account_service_url: None,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}
