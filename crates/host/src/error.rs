// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed errors surfaced at the public seams.
//!
//! Internal plumbing uses `anyhow`; these enums exist where callers need to
//! distinguish outcomes (capacity vs duplicate vs decryption, pending vs
//! denied) or render a short user-facing reason.

/// Errors from the device-code authentication flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The user has not completed login yet. Retried internally by `poll`.
    #[error("authorization pending")]
    Pending,

    /// Provider asked us to slow down. Retried internally with a doubled wait.
    #[error("polling too fast")]
    SlowDown,

    #[error("the code has expired, please try again")]
    Expired,

    #[error("access was denied")]
    Denied,

    #[error("authentication cancelled")]
    Cancelled,

    #[error("authentication timed out, please try again")]
    TimedOut,

    #[error("this client does not support the device-code grant")]
    UnsupportedGrant,

    #[error("the provider has disabled this client, please try again later")]
    ClientDisabled,

    #[error("client lacks permission to mint device credentials")]
    MissingPermission,

    #[error("credentials are expired or invalid")]
    InvalidGrant,

    #[error("no pending authentication for this user")]
    NoPending,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("identity provider unreachable: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from the credential vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("credential blob is corrupt or the encryption key is wrong")]
    Corrupt,

    #[error("failed to encode credentials")]
    Encode,
}

/// Errors from `SessionRegistry::start`. No state is mutated for the
/// rejection variants; `Connection` implies the session record was rolled
/// back to `stopped(error)`.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("`{0}` is already running")]
    AlreadyRunning(String),

    #[error("maximum concurrent sessions reached ({used}/{cap})")]
    UserCapReached { used: usize, cap: usize },

    #[error("server is at maximum capacity, please try again later")]
    GlobalCapReached,

    #[error(transparent)]
    Decryption(#[from] VaultError),

    #[error("`{username}` failed to connect: {reason}")]
    Connection { username: String, reason: String },

    #[error("storage error: {0}")]
    Store(anyhow::Error),
}

/// Errors from `SessionRegistry::stop`.
#[derive(Debug, thiserror::Error)]
pub enum StopError {
    #[error("no running session for this account")]
    NotRunning,
}

/// Errors from `SessionRegistry::extend`.
#[derive(Debug, thiserror::Error)]
pub enum ExtendError {
    #[error("no running session for this account")]
    NotRunning,

    #[error("no more extensions available ({0} used)")]
    LimitReached(u32),

    #[error("storage error: {0}")]
    Store(anyhow::Error),
}
