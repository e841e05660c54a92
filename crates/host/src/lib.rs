// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lobbyhost: remotely operated lobby-bot sessions with device-code
//! authentication, bounded concurrency and idle-timeout eviction.

pub mod auth;
pub mod config;
pub mod error;
pub mod game;
pub mod monitor;
pub mod registry;
pub mod session;
pub mod store;
pub mod test_support;
pub mod timefmt;
pub mod vault;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::flow::DeviceAuthFlow;
use crate::auth::provider::IdentityClient;
use crate::auth::AuthClientSet;
use crate::config::HostConfig;
use crate::game::GameClientFactory;
use crate::monitor::{spawn_timeout_monitor, MonitorConfig, Notifier};
use crate::registry::SessionRegistry;
use crate::store::memory::MemoryStore;
use crate::store::{EndReason, Store};
use crate::vault::CredentialVault;

/// The service objects, constructed once at process start and passed by
/// handle to consumers.
pub struct Host {
    pub config: HostConfig,
    pub store: Arc<dyn Store>,
    pub vault: CredentialVault,
    pub auth: Arc<DeviceAuthFlow>,
    pub registry: Arc<SessionRegistry>,
    pub shutdown: CancellationToken,
}

impl Host {
    pub fn new(config: HostConfig, factory: Arc<dyn GameClientFactory>) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match config.state_dir {
            Some(ref dir) => Arc::new(MemoryStore::open(dir.join("store.json"))?),
            None => Arc::new(MemoryStore::new()),
        };
        let vault = CredentialVault::new(&config.encryption_key);

        let clients = match config.auth_clients {
            Some(ref path) => AuthClientSet::load(path)?,
            None => AuthClientSet::default(),
        };
        let auth = Arc::new(DeviceAuthFlow::new(
            IdentityClient::new(config.provider_endpoints()),
            clients,
        ));

        let registry = SessionRegistry::new(
            Arc::clone(&store),
            vault.clone(),
            factory,
            config.registry_limits(),
        );

        Ok(Self { config, store, vault, auth, registry, shutdown: CancellationToken::new() })
    }

    /// Spawn the timeout sweeper; it runs until [`Host::shutdown`] fires.
    pub fn spawn_monitor(&self, notifier: Arc<dyn Notifier>) -> JoinHandle<()> {
        spawn_timeout_monitor(
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            notifier,
            MonitorConfig {
                interval: self.config.sweep_interval(),
                warning_threshold_minutes: self.config.warning_threshold_minutes,
            },
            self.shutdown.clone(),
        )
    }
}

/// Run the host until ctrl-c, then stop every live session.
pub async fn run(
    config: HostConfig,
    factory: Arc<dyn GameClientFactory>,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<()> {
    let host = Host::new(config, factory)?;
    let monitor = host.spawn_monitor(notifier);
    tracing::info!("lobbyhost running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    host.shutdown.cancel();
    let stopped = host.registry.stop_all(EndReason::Manual).await;
    if stopped > 0 {
        tracing::info!(stopped, "sessions stopped at shutdown");
    }
    let _ = monitor.await;
    Ok(())
}
