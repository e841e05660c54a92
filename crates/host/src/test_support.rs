// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reusable fakes and fixtures shared by unit and integration tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::auth::CredentialBundle;
use crate::game::{GameClient, GameClientFactory, GameError, GameEvent};
use crate::monitor::Notifier;
use crate::store::{Account, NewAccount, Store};
use crate::vault::CredentialVault;

/// Poll an async condition until it holds or ~2s elapse.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}

/// Vault with a fixed key for round-trip tests.
pub fn test_vault() -> CredentialVault {
    CredentialVault::new("unit-test-vault-key")
}

/// A plausible credential bundle for `name`.
pub fn test_bundle(name: &str) -> CredentialBundle {
    CredentialBundle {
        device_id: format!("device-{name}"),
        account_id: format!("acct-{name}"),
        secret: "s3cr3t".to_owned(),
        display_name: name.to_owned(),
        client_token_used: Some("dGVzdDp0ZXN0".to_owned()),
    }
}

/// Create a user and an account with vault-encrypted test credentials.
pub async fn seed_account(
    store: &Arc<dyn Store>,
    vault: &CredentialVault,
    user_id: &str,
    name: &str,
) -> anyhow::Result<Account> {
    store.get_or_create_user(user_id, user_id).await?;
    let blob = vault
        .encrypt(&test_bundle(name))
        .map_err(|e| anyhow::anyhow!("failed to encrypt test bundle: {e}"))?;
    store
        .add_account(NewAccount {
            user_id: user_id.to_owned(),
            display_name: name.to_owned(),
            provider_account_id: format!("provider-{name}"),
            encrypted_credentials: blob,
        })
        .await
}

/// Scriptable game client: connect behavior and mutator outcomes are fixed
/// at construction; events can be injected while connected; every mutator
/// call is recorded.
pub struct MockGameClient {
    fail_connect: bool,
    emit_ready: bool,
    fail_mutators: bool,
    fail_leave: bool,
    events: Mutex<Option<mpsc::Sender<GameEvent>>>,
    calls: Mutex<Vec<String>>,
}

impl MockGameClient {
    /// Connects and reports ready immediately.
    pub fn ready() -> Arc<Self> {
        Arc::new(Self {
            fail_connect: false,
            emit_ready: true,
            fail_mutators: false,
            fail_leave: false,
            events: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Connects but never becomes ready.
    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            fail_connect: false,
            emit_ready: false,
            fail_mutators: false,
            fail_leave: false,
            events: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Refuses to connect.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_connect: true,
            emit_ready: false,
            fail_mutators: false,
            fail_leave: false,
            events: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Ready, but every mutator and leave-party call errors.
    pub fn faulty() -> Arc<Self> {
        Arc::new(Self {
            fail_connect: false,
            emit_ready: true,
            fail_mutators: true,
            fail_leave: true,
            events: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Push an event into the session's channel. Returns whether a
    /// connection existed to receive it.
    pub async fn inject(&self, event: GameEvent) -> bool {
        match self.events.lock().await.as_ref() {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Mutator calls recorded so far, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: String) -> Result<(), GameError> {
        self.calls.lock().await.push(call);
        if self.fail_mutators {
            Err(GameError::Protocol("mutator failed".to_owned()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GameClient for MockGameClient {
    async fn connect(&self) -> Result<mpsc::Receiver<GameEvent>, GameError> {
        if self.fail_connect {
            return Err(GameError::Connect("connection refused".to_owned()));
        }
        let (tx, rx) = mpsc::channel(16);
        if self.emit_ready {
            let _ = tx.send(GameEvent::Ready).await;
        }
        *self.events.lock().await = Some(tx);
        Ok(rx)
    }

    async fn close(&self) {
        self.events.lock().await.take();
    }

    async fn leave_party(&self) -> Result<(), GameError> {
        self.calls.lock().await.push("leave_party".to_owned());
        if self.fail_leave {
            Err(GameError::Protocol("leave failed".to_owned()))
        } else {
            Ok(())
        }
    }

    async fn accept_party_invite(&self, party_id: &str) -> Result<(), GameError> {
        self.record(format!("accept_party_invite:{party_id}")).await
    }

    async fn accept_friend_request(&self, account_id: &str) -> Result<(), GameError> {
        self.record(format!("accept_friend_request:{account_id}")).await
    }

    async fn set_outfit(&self, asset: &str) -> Result<(), GameError> {
        self.record(format!("set_outfit:{asset}")).await
    }

    async fn set_backpack(&self, asset: &str) -> Result<(), GameError> {
        self.record(format!("set_backpack:{asset}")).await
    }

    async fn set_pickaxe(&self, asset: &str) -> Result<(), GameError> {
        self.record(format!("set_pickaxe:{asset}")).await
    }

    async fn play_emote(&self, asset: &str) -> Result<(), GameError> {
        self.record(format!("play_emote:{asset}")).await
    }

    async fn set_banner_level(&self, level: u32) -> Result<(), GameError> {
        self.record(format!("set_banner_level:{level}")).await
    }

    async fn set_crown_count(&self, count: u32) -> Result<(), GameError> {
        self.record(format!("set_crown_count:{count}")).await
    }
}

/// Factory handing out pre-built clients in order; falls back to
/// [`MockGameClient::ready`] when the queue runs dry.
pub struct MockClientFactory {
    queue: std::sync::Mutex<VecDeque<Arc<MockGameClient>>>,
}

impl MockClientFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { queue: std::sync::Mutex::new(VecDeque::new()) })
    }

    pub fn with(clients: Vec<Arc<MockGameClient>>) -> Arc<Self> {
        Arc::new(Self { queue: std::sync::Mutex::new(clients.into_iter().collect()) })
    }

    pub fn push(&self, client: Arc<MockGameClient>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(client);
        }
    }
}

impl GameClientFactory for MockClientFactory {
    fn build(&self, _credentials: &CredentialBundle) -> anyhow::Result<Arc<dyn GameClient>> {
        let mut queue =
            self.queue.lock().map_err(|_| anyhow::anyhow!("factory queue poisoned"))?;
        let client = queue.pop_front().unwrap_or_else(MockGameClient::ready);
        Ok(client)
    }
}

/// Notifier that records deliveries, optionally failing each one.
pub struct RecordingNotifier {
    fail: bool,
    messages: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { fail: false, messages: Mutex::new(Vec::new()) })
    }

    /// Records the attempt, then reports a delivery failure.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true, messages: Mutex::new(Vec::new()) })
    }

    pub async fn messages(&self) -> Vec<(String, String, String)> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: &str, channel_id: &str, text: &str) -> anyhow::Result<()> {
        self.messages
            .lock()
            .await
            .push((user_id.to_owned(), channel_id.to_owned(), text.to_owned()));
        if self.fail {
            anyhow::bail!("delivery failed");
        }
        Ok(())
    }
}
