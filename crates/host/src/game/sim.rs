// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loopback protocol client for development runs.
//!
//! Connects instantly, reports ready, accepts everything and succeeds at
//! every mutator. Lets the host binary run end-to-end without game-service
//! connectivity.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::auth::CredentialBundle;
use crate::game::{GameClient, GameClientFactory, GameError, GameEvent};

pub struct SimGameClient {
    events: Mutex<Option<mpsc::Sender<GameEvent>>>,
}

impl SimGameClient {
    pub fn new() -> Self {
        Self { events: Mutex::new(None) }
    }
}

impl Default for SimGameClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameClient for SimGameClient {
    async fn connect(&self) -> Result<mpsc::Receiver<GameEvent>, GameError> {
        let (tx, rx) = mpsc::channel(16);
        let _ = tx.send(GameEvent::Ready).await;
        *self.events.lock().await = Some(tx);
        Ok(rx)
    }

    async fn close(&self) {
        // Dropping the sender closes the event channel, which the session
        // loop observes as an orderly disconnect.
        self.events.lock().await.take();
    }

    async fn leave_party(&self) -> Result<(), GameError> {
        Ok(())
    }

    async fn accept_party_invite(&self, _party_id: &str) -> Result<(), GameError> {
        Ok(())
    }

    async fn accept_friend_request(&self, _account_id: &str) -> Result<(), GameError> {
        Ok(())
    }

    async fn set_outfit(&self, _asset: &str) -> Result<(), GameError> {
        Ok(())
    }

    async fn set_backpack(&self, _asset: &str) -> Result<(), GameError> {
        Ok(())
    }

    async fn set_pickaxe(&self, _asset: &str) -> Result<(), GameError> {
        Ok(())
    }

    async fn play_emote(&self, _asset: &str) -> Result<(), GameError> {
        Ok(())
    }

    async fn set_banner_level(&self, _level: u32) -> Result<(), GameError> {
        Ok(())
    }

    async fn set_crown_count(&self, _count: u32) -> Result<(), GameError> {
        Ok(())
    }
}

/// Factory handing out [`SimGameClient`]s regardless of credentials.
pub struct SimClientFactory;

impl GameClientFactory for SimClientFactory {
    fn build(&self, _credentials: &CredentialBundle) -> anyhow::Result<Arc<dyn GameClient>> {
        Ok(Arc::new(SimGameClient::new()))
    }
}
