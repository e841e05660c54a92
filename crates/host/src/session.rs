// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One live lobby session wrapping a game-protocol connection.
//!
//! The session owns its connection task and its own
//! `Connecting | Ready | Disconnected` state; the wrapped client is never
//! probed for internal state. Inbound events are drained from one channel
//! and mapped to handlers: invites and friend requests are accepted
//! unconditionally, and every accepted or membership event counts as
//! activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::game::{GameClient, GameEvent};
use crate::store::{CosmeticState, EndReason, Store};
use crate::timefmt::epoch_secs;

/// Connection lifecycle, set only by the session's own loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Ready,
    Disconnected,
}

pub struct LobbySession {
    pub account_id: String,
    pub record_id: String,
    pub user_id: String,
    /// Provider-side display name; used in every log line and message.
    pub username: String,
    pub started_at: u64,

    client: Arc<dyn GameClient>,
    store: Arc<dyn Store>,
    state_tx: watch::Sender<ConnState>,
    state_rx: watch::Receiver<ConnState>,
    last_activity: AtomicU64,
    last_error: std::sync::Mutex<Option<String>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LobbySession {
    pub fn new(
        account_id: String,
        record_id: String,
        user_id: String,
        username: String,
        client: Arc<dyn GameClient>,
        store: Arc<dyn Store>,
    ) -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(ConnState::Connecting);
        Arc::new(Self {
            account_id,
            record_id,
            user_id,
            username,
            started_at: epoch_secs(),
            client,
            store,
            state_tx,
            state_rx,
            last_activity: AtomicU64::new(epoch_secs()),
            last_error: std::sync::Mutex::new(None),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// Spawn the connection task. Readiness is observed via [`wait_ready`].
    ///
    /// [`wait_ready`]: Self::wait_ready
    pub async fn connect(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run().await });
        *self.task.lock().await = Some(handle);
    }

    async fn run(&self) {
        let mut events = match self.client.connect().await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!(account = %self.username, err = %e, "connection failed");
                self.set_error(e.to_string());
                let _ = self.state_tx.send(ConnState::Disconnected);
                return;
            }
        };

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    None => {
                        let _ = self.state_tx.send(ConnState::Disconnected);
                        break;
                    }
                    Some(event) => {
                        if !self.handle_event(event).await {
                            break;
                        }
                    }
                },
            }
        }
    }

    /// Map one inbound event to its handler. Returns `false` when the loop
    /// should end.
    async fn handle_event(&self, event: GameEvent) -> bool {
        match event {
            GameEvent::Ready => {
                tracing::info!(account = %self.username, "session ready");
                let _ = self.state_tx.send(ConnState::Ready);
                self.touch_activity().await;
            }
            GameEvent::PartyInvite { party_id, from } => {
                match self.client.accept_party_invite(&party_id).await {
                    Ok(()) => {
                        tracing::info!(account = %self.username, from = %from, "accepted party invite");
                        self.touch_activity().await;
                    }
                    Err(e) => {
                        tracing::warn!(account = %self.username, err = %e, "failed to accept party invite");
                    }
                }
            }
            GameEvent::FriendRequest { account_id, inbound } => {
                if inbound {
                    match self.client.accept_friend_request(&account_id).await {
                        Ok(()) => {
                            tracing::info!(account = %self.username, "accepted friend request");
                            self.touch_activity().await;
                        }
                        Err(e) => {
                            tracing::warn!(account = %self.username, err = %e, "failed to accept friend request");
                        }
                    }
                }
            }
            GameEvent::MemberJoined { .. } | GameEvent::MemberLeft { .. } => {
                self.touch_activity().await;
            }
            GameEvent::Disconnected { error } => {
                let _ = self.state_tx.send(ConnState::Disconnected);
                if let Some(err) = error {
                    tracing::error!(account = %self.username, err = %err, "connection lost");
                    self.set_error(err);
                    // The task died under us, not through stop(): record it.
                    if let Err(e) = self.store.end_session(&self.record_id, EndReason::Crash).await
                    {
                        tracing::warn!(err = %e, "failed to record session crash");
                    }
                }
                return false;
            }
        }
        true
    }

    /// Whether the connection task is still alive.
    pub async fn is_running(&self) -> bool {
        self.task.lock().await.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Whether the handshake has completed. A session can be running but
    /// not yet ready.
    pub fn is_ready(&self) -> bool {
        *self.state_rx.borrow() == ConnState::Ready
    }

    pub fn state(&self) -> ConnState {
        *self.state_rx.borrow()
    }

    /// Epoch seconds of the last meaningful interaction.
    pub fn last_activity(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    /// Block until the session is ready or the connection is gone. The
    /// error carries the connect failure reason when one was observed.
    pub async fn wait_ready(&self) -> Result<(), String> {
        let mut rx = self.state_rx.clone();
        loop {
            match *rx.borrow_and_update() {
                ConnState::Ready => return Ok(()),
                ConnState::Disconnected => return Err(self.take_error()),
                ConnState::Connecting => {}
            }
            if rx.changed().await.is_err() {
                return Err(self.take_error());
            }
        }
    }

    /// Refresh activity locally and in the store.
    pub async fn touch_activity(&self) {
        self.last_activity.store(epoch_secs(), Ordering::Relaxed);
        if let Err(e) = self.store.touch_session(&self.record_id).await {
            tracing::debug!(session = %self.record_id, err = %e, "failed to record activity");
        }
    }

    pub async fn set_outfit(&self, asset: &str) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.client.set_outfit(asset).await {
            Ok(()) => {
                self.touch_activity().await;
                true
            }
            Err(e) => {
                tracing::warn!(account = %self.username, err = %e, "failed to set outfit");
                false
            }
        }
    }

    pub async fn set_backpack(&self, asset: &str) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.client.set_backpack(asset).await {
            Ok(()) => {
                self.touch_activity().await;
                true
            }
            Err(e) => {
                tracing::warn!(account = %self.username, err = %e, "failed to set backpack");
                false
            }
        }
    }

    pub async fn set_pickaxe(&self, asset: &str) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.client.set_pickaxe(asset).await {
            Ok(()) => {
                self.touch_activity().await;
                true
            }
            Err(e) => {
                tracing::warn!(account = %self.username, err = %e, "failed to set pickaxe");
                false
            }
        }
    }

    pub async fn play_emote(&self, asset: &str) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.client.play_emote(asset).await {
            Ok(()) => {
                self.touch_activity().await;
                true
            }
            Err(e) => {
                tracing::warn!(account = %self.username, err = %e, "failed to play emote");
                false
            }
        }
    }

    pub async fn set_level(&self, level: u32) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.client.set_banner_level(level).await {
            Ok(()) => {
                self.touch_activity().await;
                true
            }
            Err(e) => {
                tracing::warn!(account = %self.username, err = %e, "failed to set level");
                false
            }
        }
    }

    pub async fn set_crown_count(&self, count: u32) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.client.set_crown_count(count).await {
            Ok(()) => {
                self.touch_activity().await;
                true
            }
            Err(e) => {
                tracing::warn!(account = %self.username, err = %e, "failed to set crown count");
                false
            }
        }
    }

    /// Apply a full cosmetic snapshot field by field. Every assigned field
    /// is attempted even after a failure; the result is `false` if any
    /// field failed. The snapshot is persisted regardless, mirroring what
    /// was requested.
    pub async fn apply_state(&self, cosmetics: &CosmeticState) -> bool {
        let mut ok = true;

        if let Some(ref outfit) = cosmetics.outfit {
            ok &= self.set_outfit(outfit).await;
        }
        if let Some(ref backpack) = cosmetics.backpack {
            ok &= self.set_backpack(backpack).await;
        }
        if let Some(ref pickaxe) = cosmetics.pickaxe {
            ok &= self.set_pickaxe(pickaxe).await;
        }
        if let Some(ref emote) = cosmetics.emote {
            ok &= self.play_emote(emote).await;
        }
        if cosmetics.level > 0 {
            ok &= self.set_level(cosmetics.level).await;
        }
        if cosmetics.crown_count > 0 {
            ok &= self.set_crown_count(cosmetics.crown_count).await;
        }

        if let Err(e) = self.store.set_session_cosmetics(&self.record_id, cosmetics).await {
            tracing::warn!(session = %self.record_id, err = %e, "failed to persist cosmetics");
        }
        ok
    }

    /// Graceful shutdown: leave any party, close the connection, cancel the
    /// task and wait up to `grace` for it, then mark the record stopped.
    /// Every step is best-effort; the session is gone when this returns.
    pub async fn stop(&self, reason: EndReason, grace: Duration) {
        if self.is_ready() {
            if let Err(e) = self.client.leave_party().await {
                tracing::debug!(account = %self.username, err = %e, "leave party failed during stop");
            }
        }
        self.client.close().await;
        self.cancel.cancel();

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(grace, handle).await.is_err() {
                tracing::warn!(account = %self.username, "connection task did not stop in time, aborting");
                abort.abort();
            }
        }
        let _ = self.state_tx.send(ConnState::Disconnected);

        if let Err(e) = self.store.end_session(&self.record_id, reason).await {
            tracing::warn!(session = %self.record_id, err = %e, "failed to mark session stopped");
        }
        tracing::info!(account = %self.username, reason = %reason, "session stopped");
    }

    fn set_error(&self, err: String) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(err);
        }
    }

    fn take_error(&self) -> String {
        self.last_error
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or_else(|| "connection closed during startup".to_owned())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
