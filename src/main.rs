// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay daemon.
//!
//! `oracle-relay` polls every configured chain and relays eligible requests.
//! `oracle-relay recycle` recycles expired requests once and exits.
//!
//! Settlement goes through [`DryRunSettlement`]: directives are logged, not
//! broadcast. Plug a signing [`SettlementSink`](oracle_relay::ledger::SettlementSink)
//! in its place to settle for real.

use std::env;
use std::sync::Arc;

use chrono::Utc;
use oracle_relay::config::{RelayConfig, RelaySettings, LOG_FORMAT_ENV};
use oracle_relay::ledger::{DryRunSettlement, NodeLedger};
use oracle_relay::oracle::OracleClient;
use oracle_relay::relay::{RelayEngine, RelayPoller, RelayPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let settings = RelaySettings::from_env().expect("Invalid relay settings");
    let config = RelayConfig::from_file(&settings.config_path).expect("Failed to load relay config");
    for chain_id in &settings.chains {
        config.for_chain(chain_id).expect("Relay chain missing from config");
    }

    let engine = Arc::new(RelayEngine::new(
        config,
        settings.chains.clone(),
        RelayPolicy::new(settings.min_reward),
        NodeLedger::new().expect("Failed to build ledger client"),
        DryRunSettlement,
        OracleClient::new().expect("Failed to build oracle client"),
    ));

    if env::args().nth(1).as_deref() == Some("recycle") {
        for chain_id in &settings.chains {
            match engine.recycle_expired(chain_id, Utc::now()).await {
                Ok(outcomes) => info!(chain_id = %chain_id, count = outcomes.len(), "Recycle finished"),
                Err(e) => warn!(chain_id = %chain_id, error = %e, "Recycle failed"),
            }
        }
        return;
    }

    info!(
        config = %settings.config_path,
        chains = ?settings.chains,
        min_reward = settings.min_reward,
        "Oracle relay starting"
    );

    let shutdown = CancellationToken::new();
    let poller = RelayPoller::new(engine).with_interval(settings.poll_interval);
    let handle = tokio::spawn(poller.run(shutdown.clone()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown requested");
    shutdown.cancel();
    if let Err(e) = handle.await {
        warn!(error = %e, "Relay poller task failed");
    }
}
