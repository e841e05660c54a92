// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The game-protocol seam.
//!
//! The real-time protocol itself is out of scope; the core consumes it
//! through [`GameClient`]. Inbound social events arrive on a single channel
//! returned by `connect` and are drained by the session's own loop; there
//! is no callback registration surface.

pub mod sim;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::auth::CredentialBundle;

/// Failure from the wrapped protocol client.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("not connected")]
    NotConnected,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Protocol(String),
}

/// Inbound events surfaced by the protocol client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Handshake complete; the session may apply state.
    Ready,
    PartyInvite { party_id: String, from: String },
    FriendRequest { account_id: String, inbound: bool },
    MemberJoined { display_name: String },
    MemberLeft { display_name: String },
    /// Connection ended; `error` is `None` for an orderly close.
    Disconnected { error: Option<String> },
}

/// One connection to the game service on behalf of one account.
///
/// Mutators return success/failure only; the session wrapper decides how
/// failures affect its own state.
#[async_trait]
pub trait GameClient: Send + Sync {
    /// Open the connection. Events arrive on the returned channel,
    /// including [`GameEvent::Ready`] once the handshake completes. The
    /// channel closing means the connection is gone.
    async fn connect(&self) -> Result<mpsc::Receiver<GameEvent>, GameError>;

    /// Close the connection. Infallible by contract; implementations
    /// swallow teardown errors.
    async fn close(&self);

    async fn leave_party(&self) -> Result<(), GameError>;
    async fn accept_party_invite(&self, party_id: &str) -> Result<(), GameError>;
    async fn accept_friend_request(&self, account_id: &str) -> Result<(), GameError>;

    async fn set_outfit(&self, asset: &str) -> Result<(), GameError>;
    async fn set_backpack(&self, asset: &str) -> Result<(), GameError>;
    async fn set_pickaxe(&self, asset: &str) -> Result<(), GameError>;
    async fn play_emote(&self, asset: &str) -> Result<(), GameError>;
    async fn set_banner_level(&self, level: u32) -> Result<(), GameError>;
    async fn set_crown_count(&self, count: u32) -> Result<(), GameError>;
}

/// Builds a protocol client from decrypted credentials. Implemented by the
/// embedding process (real client) and by [`sim::SimClientFactory`].
pub trait GameClientFactory: Send + Sync {
    fn build(&self, credentials: &CredentialBundle) -> anyhow::Result<Arc<dyn GameClient>>;
}
