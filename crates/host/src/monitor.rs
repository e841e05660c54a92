// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background timeout sweeper.
//!
//! One task, one tick per interval: every live session record is checked
//! against its idle budget. Sessions inside the warning window get exactly
//! one notification; sessions past the deadline are force-stopped with
//! reason `timeout`. A record with no live instance behind it (process
//! restart, crashed task) is closed directly so orphaned rows cannot
//! accumulate. Per-session failures are logged and never abort the tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::SessionRegistry;
use crate::store::{ActivityEntry, EndReason, SessionRecord, SessionStatus, Store};
use crate::timefmt::{epoch_secs, format_remaining, remaining_secs};

/// Delivery seam for proactive user notifications. The chat surface
/// implements this; the host only knows user + channel + text.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, channel_id: &str, text: &str) -> anyhow::Result<()>;
}

/// Fallback notifier that writes notifications to the log. Used when no
/// chat surface is attached.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &str, channel_id: &str, text: &str) -> anyhow::Result<()> {
        tracing::info!(user = %user_id, channel = %channel_id, "{text}");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Sessions with this much (or less) time left get the one-shot warning.
    pub warning_threshold_minutes: u32,
}

/// Spawn the sweeper. It runs until the shutdown token fires.
pub fn spawn_timeout_monitor(
    registry: Arc<SessionRegistry>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            if let Err(e) =
                sweep(&registry, &store, &notifier, config.warning_threshold_minutes).await
            {
                // Store unavailable this tick; liveness over strictness.
                tracing::warn!(err = %e, "timeout sweep failed");
            }
        }
    })
}

/// One pass over all live session records.
pub async fn sweep(
    registry: &SessionRegistry,
    store: &Arc<dyn Store>,
    notifier: &Arc<dyn Notifier>,
    warning_threshold_minutes: u32,
) -> anyhow::Result<()> {
    let sessions = store.active_sessions().await?;
    let warn_secs = u64::from(warning_threshold_minutes) * 60;
    let now = epoch_secs();

    for record in sessions {
        if let Err(e) = check_session(registry, store, notifier, &record, warn_secs, now).await {
            tracing::warn!(session = %record.id, err = %e, "timeout check failed");
        }
    }
    Ok(())
}

async fn check_session(
    registry: &SessionRegistry,
    store: &Arc<dyn Store>,
    notifier: &Arc<dyn Notifier>,
    record: &SessionRecord,
    warn_secs: u64,
    now: u64,
) -> anyhow::Result<()> {
    let remaining = remaining_secs(record.last_activity, record.timeout_minutes, now);

    if remaining == 0 {
        handle_timeout(registry, store, notifier, record).await
    } else if remaining <= warn_secs && record.status != SessionStatus::IdleWarning {
        send_warning(store, notifier, record, remaining).await
    } else {
        Ok(())
    }
}

async fn handle_timeout(
    registry: &SessionRegistry,
    store: &Arc<dyn Store>,
    notifier: &Arc<dyn Notifier>,
    record: &SessionRecord,
) -> anyhow::Result<()> {
    let username = store
        .account(&record.account_id)
        .await?
        .map(|a| a.display_name)
        .unwrap_or_else(|| "Unknown".to_owned());

    tracing::info!(session = %record.id, account = %username, "session timed out");

    if registry.stop(&record.account_id, EndReason::Timeout).await.is_err() {
        // No live instance behind this record; close it directly.
        store.end_session(&record.id, EndReason::Timeout).await?;
    }

    if let Some(channel) = notification_channel(store, &record.user_id).await {
        let text = format!("`{username}` stopped due to inactivity");
        if let Err(e) = notifier.notify(&record.user_id, &channel, &text).await {
            tracing::debug!(user = %record.user_id, err = %e, "could not deliver timeout notice");
        }
    }

    store
        .log_activity(ActivityEntry {
            session_id: Some(record.id.clone()),
            user_id: record.user_id.clone(),
            action: "timeout".to_owned(),
            detail: serde_json::json!({ "username": username }),
            at: epoch_secs(),
        })
        .await?;
    Ok(())
}

async fn send_warning(
    store: &Arc<dyn Store>,
    notifier: &Arc<dyn Notifier>,
    record: &SessionRecord,
    remaining: u64,
) -> anyhow::Result<()> {
    // Transition first: the warning is one-shot even when delivery fails.
    store.set_session_status(&record.id, SessionStatus::IdleWarning).await?;

    let Some(channel) = notification_channel(store, &record.user_id).await else {
        return Ok(());
    };
    let username = store
        .account(&record.account_id)
        .await?
        .map(|a| a.display_name)
        .unwrap_or_else(|| "Unknown".to_owned());

    let text = format!(
        "`{username}` will stop in {}. Extend the session to keep it running",
        format_remaining(remaining)
    );
    if let Err(e) = notifier.notify(&record.user_id, &channel, &text).await {
        tracing::debug!(user = %record.user_id, err = %e, "could not deliver idle warning");
    }
    Ok(())
}

async fn notification_channel(store: &Arc<dyn Store>, user_id: &str) -> Option<String> {
    match store.user(user_id).await {
        Ok(user) => user.and_then(|u| u.last_channel_id),
        Err(e) => {
            tracing::debug!(user = %user_id, err = %e, "could not resolve notification channel");
            None
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod monitor_tests;
