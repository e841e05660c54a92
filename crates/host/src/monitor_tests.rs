// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::HostConfig;
use crate::monitor::{spawn_timeout_monitor, sweep, MonitorConfig};
use crate::registry::{RegistryLimits, SessionRegistry};
use crate::store::memory::MemoryStore;
use crate::store::{EndReason, SessionStatus, Store};
use crate::test_support::{seed_account, test_vault, MockClientFactory, RecordingNotifier};

struct Ctx {
    store: Arc<dyn Store>,
    registry: Arc<SessionRegistry>,
}

fn ctx_with_timeout(default_timeout_minutes: u32) -> Ctx {
    let mut limits: RegistryLimits = HostConfig::test().registry_limits();
    limits.default_timeout_minutes = default_timeout_minutes;
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let factory: Arc<dyn crate::game::GameClientFactory> = MockClientFactory::new();
    let registry = SessionRegistry::new(Arc::clone(&store), test_vault(), factory, limits);
    Ctx { store, registry }
}

/// Seed a user (with a notification channel) and a started session whose
/// idle budget is `timeout_minutes`.
async fn started_session(ctx: &Ctx, user: &str, name: &str) -> anyhow::Result<String> {
    let account = seed_account(&ctx.store, &test_vault(), user, name).await?;
    ctx.store.set_user_channel(user, "chan-1").await?;
    ctx.registry
        .start(&account.id, user, name, &account.encrypted_credentials)
        .await
        .map_err(|e| anyhow::anyhow!("start failed: {e}"))?;
    Ok(account.id)
}

#[tokio::test]
async fn expired_session_is_stopped_with_timeout_reason() -> anyhow::Result<()> {
    // Zero idle budget: expired on the first sweep.
    let ctx = ctx_with_timeout(0);
    let account_id = started_session(&ctx, "u1", "PlayerOne").await?;
    let recorder = RecordingNotifier::new();
    let notifier: Arc<dyn crate::monitor::Notifier> = recorder.clone();

    sweep(&ctx.registry, &ctx.store, &notifier, 5).await?;

    assert!(ctx.registry.get(&account_id).await.is_none());
    let records = ctx.store.active_sessions().await?;
    assert!(records.is_empty());

    let messages = recorder.messages().await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].2.contains("inactivity"), "text: {}", messages[0].2);
    Ok(())
}

#[tokio::test]
async fn orphaned_record_is_closed_directly() -> anyhow::Result<()> {
    // A record with no live instance behind it (as after a process restart).
    let ctx = ctx_with_timeout(0);
    let record = ctx.store.create_session("ghost-acct", "u1", 0).await?;
    let recorder = RecordingNotifier::new();
    let notifier: Arc<dyn crate::monitor::Notifier> = recorder.clone();

    sweep(&ctx.registry, &ctx.store, &notifier, 5).await?;

    let closed = ctx.store.session(&record.id).await?.ok_or_else(|| anyhow::anyhow!("gone"))?;
    assert_eq!(closed.status, SessionStatus::Stopped);
    assert_eq!(closed.end_reason, Some(EndReason::Timeout));
    Ok(())
}

#[tokio::test]
async fn warning_fires_exactly_once() -> anyhow::Result<()> {
    // 3-minute budget, 5-minute threshold: inside the warning window from
    // the first sweep, never past the deadline during the test.
    let ctx = ctx_with_timeout(3);
    let account_id = started_session(&ctx, "u1", "PlayerOne").await?;
    let recorder = RecordingNotifier::new();
    let notifier: Arc<dyn crate::monitor::Notifier> = recorder.clone();

    sweep(&ctx.registry, &ctx.store, &notifier, 5).await?;
    sweep(&ctx.registry, &ctx.store, &notifier, 5).await?;
    sweep(&ctx.registry, &ctx.store, &notifier, 5).await?;

    let record = ctx
        .store
        .active_session_for_account(&account_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no record"))?;
    assert_eq!(record.status, SessionStatus::IdleWarning);

    let messages = recorder.messages().await;
    assert_eq!(messages.len(), 1, "warning re-notified: {messages:?}");
    assert!(messages[0].2.contains("will stop in"), "text: {}", messages[0].2);
    Ok(())
}

#[tokio::test]
async fn healthy_session_is_left_alone() -> anyhow::Result<()> {
    let ctx = ctx_with_timeout(30);
    let account_id = started_session(&ctx, "u1", "PlayerOne").await?;
    let recorder = RecordingNotifier::new();
    let notifier: Arc<dyn crate::monitor::Notifier> = recorder.clone();

    sweep(&ctx.registry, &ctx.store, &notifier, 5).await?;

    assert!(ctx.registry.get(&account_id).await.is_some());
    let record = ctx
        .store
        .active_session_for_account(&account_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no record"))?;
    assert_eq!(record.status, SessionStatus::Active);
    assert!(recorder.messages().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn delivery_failure_does_not_abort_the_tick() -> anyhow::Result<()> {
    let ctx = ctx_with_timeout(3);
    let a = started_session(&ctx, "u1", "One").await?;
    let b = started_session(&ctx, "u2", "Two").await?;
    let recorder = RecordingNotifier::failing();
    let notifier: Arc<dyn crate::monitor::Notifier> = recorder.clone();

    sweep(&ctx.registry, &ctx.store, &notifier, 5).await?;

    // Both sessions got their one-shot transition despite failed delivery.
    for account_id in [&a, &b] {
        let record = ctx
            .store
            .active_session_for_account(account_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no record"))?;
        assert_eq!(record.status, SessionStatus::IdleWarning);
    }
    assert_eq!(recorder.messages().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn missing_channel_skips_notification_but_still_warns() -> anyhow::Result<()> {
    let ctx = ctx_with_timeout(3);
    let account = seed_account(&ctx.store, &test_vault(), "u1", "PlayerOne").await?;
    // No channel recorded for u1.
    ctx.registry
        .start(&account.id, "u1", "PlayerOne", &account.encrypted_credentials)
        .await
        .map_err(|e| anyhow::anyhow!("start failed: {e}"))?;
    let recorder = RecordingNotifier::new();
    let notifier: Arc<dyn crate::monitor::Notifier> = recorder.clone();

    sweep(&ctx.registry, &ctx.store, &notifier, 5).await?;

    let record = ctx
        .store
        .active_session_for_account(&account.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no record"))?;
    assert_eq!(record.status, SessionStatus::IdleWarning);
    assert!(recorder.messages().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn monitor_task_stops_on_shutdown() -> anyhow::Result<()> {
    let ctx = ctx_with_timeout(30);
    let recorder = RecordingNotifier::new();
    let notifier: Arc<dyn crate::monitor::Notifier> = recorder.clone();
    let shutdown = CancellationToken::new();

    let handle = spawn_timeout_monitor(
        Arc::clone(&ctx.registry),
        Arc::clone(&ctx.store),
        notifier,
        MonitorConfig { interval: Duration::from_millis(20), warning_threshold_minutes: 5 },
        shutdown.clone(),
    );

    tokio::time::sleep(Duration::from_millis(60)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle).await??;
    Ok(())
}
