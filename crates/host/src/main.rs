// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tracing::error;

use lobbyhost::config::HostConfig;
use lobbyhost::game::sim::SimClientFactory;
use lobbyhost::monitor::LogNotifier;

#[tokio::main]
async fn main() {
    let config = HostConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    let _ = rustls::crypto::ring::default_provider().install_default();

    // No game-protocol client is linked into the standalone binary; the
    // loopback factory lets the host run end-to-end without one.
    let factory = Arc::new(SimClientFactory);
    let notifier = Arc::new(LogNotifier);

    if let Err(e) = lobbyhost::run(config, factory, notifier).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &HostConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).init();
        }
    }
}
