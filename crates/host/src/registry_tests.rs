// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::config::HostConfig;
use crate::error::{ExtendError, StartError, StopError};
use crate::registry::{RegistryLimits, SessionRegistry};
use crate::store::memory::MemoryStore;
use crate::store::{Account, EndReason, SessionStatus, Store};
use crate::test_support::{seed_account, test_vault, MockClientFactory, MockGameClient};

struct Ctx {
    store: Arc<dyn Store>,
    factory: Arc<MockClientFactory>,
    registry: Arc<SessionRegistry>,
}

fn ctx_with_limits(limits: RegistryLimits) -> Ctx {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let factory = MockClientFactory::new();
    let factory_handle: Arc<dyn crate::game::GameClientFactory> = factory.clone();
    let registry = SessionRegistry::new(Arc::clone(&store), test_vault(), factory_handle, limits);
    Ctx { store, factory, registry }
}

fn ctx() -> Ctx {
    ctx_with_limits(HostConfig::test().registry_limits())
}

async fn seeded(ctx: &Ctx, user: &str, name: &str) -> anyhow::Result<Account> {
    seed_account(&ctx.store, &test_vault(), user, name).await
}

async fn start(ctx: &Ctx, account: &Account) -> Result<String, StartError> {
    ctx.registry
        .start(
            &account.id,
            &account.user_id,
            &account.display_name,
            &account.encrypted_credentials,
        )
        .await
}

#[tokio::test]
async fn start_then_stop_round_trip() -> anyhow::Result<()> {
    let ctx = ctx();
    let account = seeded(&ctx, "u1", "PlayerOne").await?;

    let message = start(&ctx, &account).await?;
    assert!(message.contains("started"), "message: {message}");
    assert!(ctx.registry.get(&account.id).await.is_some());
    assert_eq!(ctx.registry.active_count().await, 1);

    let record = ctx
        .store
        .active_session_for_account(&account.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no session record"))?;
    assert_eq!(record.status, SessionStatus::Active);

    ctx.registry.stop(&account.id, EndReason::Manual).await?;
    assert!(ctx.registry.get(&account.id).await.is_none());

    let ended = ctx.store.session(&record.id).await?.ok_or_else(|| anyhow::anyhow!("gone"))?;
    assert_eq!(ended.status, SessionStatus::Stopped);
    assert_eq!(ended.end_reason, Some(EndReason::Manual));
    Ok(())
}

#[tokio::test]
async fn duplicate_start_is_rejected() -> anyhow::Result<()> {
    let ctx = ctx();
    let account = seeded(&ctx, "u1", "PlayerOne").await?;

    start(&ctx, &account).await?;
    let second = start(&ctx, &account).await;
    assert!(matches!(second, Err(StartError::AlreadyRunning(_))));
    assert_eq!(ctx.registry.active_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_starts_for_one_account_yield_one_success() -> anyhow::Result<()> {
    let ctx = ctx();
    let account = seeded(&ctx, "u1", "PlayerOne").await?;

    let (a, b) = tokio::join!(start(&ctx, &account), start(&ctx, &account));
    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "a: {a:?}, b: {b:?}");
    assert_eq!(ctx.registry.active_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn fourth_session_for_user_hits_cap() -> anyhow::Result<()> {
    // Per-user cap is 3 in the test config.
    let ctx = ctx();
    for name in ["One", "Two", "Three"] {
        let account = seeded(&ctx, "u1", name).await?;
        start(&ctx, &account).await?;
    }

    let fourth = seeded(&ctx, "u1", "Four").await?;
    let result = start(&ctx, &fourth).await;
    assert!(matches!(result, Err(StartError::UserCapReached { used: 3, cap: 3 })));

    // Live count unchanged and no session row created for the rejection.
    assert_eq!(ctx.registry.get_for_user("u1").await.len(), 3);
    assert_eq!(ctx.store.active_sessions().await?.len(), 3);
    assert!(ctx.store.active_session_for_account(&fourth.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn global_cap_applies_across_users() -> anyhow::Result<()> {
    let mut limits = HostConfig::test().registry_limits();
    limits.max_sessions_global = 2;
    let ctx = ctx_with_limits(limits);

    let a = seeded(&ctx, "u1", "One").await?;
    let b = seeded(&ctx, "u2", "Two").await?;
    let c = seeded(&ctx, "u3", "Three").await?;
    start(&ctx, &a).await?;
    start(&ctx, &b).await?;

    assert!(matches!(start(&ctx, &c).await, Err(StartError::GlobalCapReached)));
    assert_eq!(ctx.registry.active_count().await, 2);
    assert_eq!(ctx.store.active_sessions().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn corrupt_credentials_abort_before_any_record() -> anyhow::Result<()> {
    let ctx = ctx();
    let account = seeded(&ctx, "u1", "PlayerOne").await?;

    let result =
        ctx.registry.start(&account.id, "u1", "PlayerOne", "not-a-valid-blob").await;
    assert!(matches!(result, Err(StartError::Decryption(_))));
    assert!(ctx.registry.get(&account.id).await.is_none());
    assert!(ctx.store.active_sessions().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn connect_failure_rolls_back_session_record() -> anyhow::Result<()> {
    let ctx = ctx();
    ctx.factory.push(MockGameClient::failing());
    let account = seeded(&ctx, "u1", "PlayerOne").await?;

    let result = start(&ctx, &account).await;
    assert!(matches!(result, Err(StartError::Connection { .. })));
    assert!(ctx.registry.get(&account.id).await.is_none());

    // The record was created, then rolled back to stopped(error).
    let records = ctx.store.active_sessions().await?;
    assert!(records.is_empty(), "live records left: {records:?}");
    Ok(())
}

#[tokio::test]
async fn slow_connection_is_a_soft_success() -> anyhow::Result<()> {
    let ctx = ctx();
    ctx.factory.push(MockGameClient::silent());
    let account = seeded(&ctx, "u1", "PlayerOne").await?;

    let message = start(&ctx, &account).await?;
    assert!(message.contains("starting"), "message: {message}");

    let session =
        ctx.registry.get(&account.id).await.ok_or_else(|| anyhow::anyhow!("not registered"))?;
    assert!(session.is_running().await);
    assert!(!session.is_ready());
    Ok(())
}

#[tokio::test]
async fn stop_survives_faulty_shutdown() -> anyhow::Result<()> {
    let ctx = ctx();
    ctx.factory.push(MockGameClient::faulty());
    let account = seeded(&ctx, "u1", "PlayerOne").await?;
    start(&ctx, &account).await?;

    ctx.registry.stop(&account.id, EndReason::Manual).await?;
    assert!(ctx.registry.get(&account.id).await.is_none());

    let records = ctx.store.active_sessions().await?;
    assert!(records.is_empty());
    Ok(())
}

#[tokio::test]
async fn stop_unknown_account_fails() {
    let ctx = ctx();
    let result = ctx.registry.stop("nope", EndReason::Manual).await;
    assert!(matches!(result, Err(StopError::NotRunning)));
}

#[tokio::test]
async fn bulk_stops_only_touch_their_scope() -> anyhow::Result<()> {
    let ctx = ctx();
    for (user, name) in [("u1", "One"), ("u1", "Two"), ("u2", "Three")] {
        let account = seeded(&ctx, user, name).await?;
        start(&ctx, &account).await?;
    }

    assert_eq!(ctx.registry.stop_all_for_user("u1", EndReason::Manual).await, 2);
    assert_eq!(ctx.registry.active_count().await, 1);

    assert_eq!(ctx.registry.stop_all(EndReason::Manual).await, 1);
    assert_eq!(ctx.registry.active_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn extend_bumps_budget_until_limit() -> anyhow::Result<()> {
    let ctx = ctx();
    let account = seeded(&ctx, "u1", "PlayerOne").await?;
    start(&ctx, &account).await?;

    let first = ctx.registry.extend(&account.id).await?;
    assert_eq!(first.extensions_used, 1);
    assert_eq!(first.timeout_minutes, 45);

    let second = ctx.registry.extend(&account.id).await?;
    assert_eq!(second.extensions_used, 2);
    assert_eq!(second.timeout_minutes, 60);

    let third = ctx.registry.extend(&account.id).await;
    assert!(matches!(third, Err(ExtendError::LimitReached(2))));

    // The rejection changed nothing.
    let record = ctx
        .store
        .active_session_for_account(&account.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no record"))?;
    assert_eq!(record.extensions_used, 2);
    assert_eq!(record.timeout_minutes, 60);
    Ok(())
}

#[tokio::test]
async fn extend_requires_running_session() -> anyhow::Result<()> {
    let ctx = ctx();
    let account = seeded(&ctx, "u1", "PlayerOne").await?;
    let result = ctx.registry.extend(&account.id).await;
    assert!(matches!(result, Err(ExtendError::NotRunning)));
    Ok(())
}

#[tokio::test]
async fn remove_account_cascades_to_live_session() -> anyhow::Result<()> {
    let ctx = ctx();
    let account = seeded(&ctx, "u1", "PlayerOne").await?;
    start(&ctx, &account).await?;
    let record = ctx
        .store
        .active_session_for_account(&account.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no record"))?;

    assert!(ctx.registry.remove_account("u1", "PlayerOne").await?);
    assert!(ctx.registry.get(&account.id).await.is_none());
    assert!(ctx.store.account_by_name("u1", "PlayerOne").await?.is_none());

    let ended = ctx.store.session(&record.id).await?.ok_or_else(|| anyhow::anyhow!("gone"))?;
    assert_eq!(ended.end_reason, Some(EndReason::AccountRemoved));
    Ok(())
}

#[tokio::test]
async fn status_tracks_lifecycle() -> anyhow::Result<()> {
    let ctx = ctx();
    let account = seeded(&ctx, "u1", "PlayerOne").await?;

    assert_eq!(ctx.registry.status(&account.id).await.status, "offline");

    start(&ctx, &account).await?;
    let status = ctx.registry.status(&account.id).await;
    assert_eq!(status.status, "online");
    assert!(status.running);
    assert_eq!(status.username.as_deref(), Some("PlayerOne"));

    ctx.registry.stop(&account.id, EndReason::Manual).await?;
    assert_eq!(ctx.registry.status(&account.id).await.status, "offline");
    Ok(())
}
