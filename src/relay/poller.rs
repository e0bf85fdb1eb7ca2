// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay Poller
//!
//! Runs a relay pass every `poll_interval` (default 30 s) until shut down.
//! The engine itself is a single-pass batch; this loop is the scheduler the
//! binary uses.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. A pass in progress finishes
//! its current request before the loop notices cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::engine::RelayEngine;
use crate::config::DEFAULT_POLL_INTERVAL;
use crate::ledger::{LedgerReader, SettlementSink};
use crate::oracle::OracleGateway;

pub struct RelayPoller<L, S, O> {
    engine: Arc<RelayEngine<L, S, O>>,
    poll_interval: Duration,
}

impl<L, S, O> RelayPoller<L, S, O>
where
    L: LedgerReader,
    S: SettlementSink,
    O: OracleGateway,
{
    pub fn new(engine: Arc<RelayEngine<L, S, O>>) -> Self {
        Self {
            engine,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the poller loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(poller.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            chains = ?self.engine.chains(),
            "Relay poller starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Relay poller shutting down");
                return;
            }

            let report = self.engine.run_pass(Utc::now()).await;
            if !report.network_errors.is_empty() {
                warn!(
                    pass_id = %report.pass_id,
                    networks = report.network_errors.len(),
                    "Relay poller: some networks could not be polled"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Relay poller shutting down");
                    return;
                }
            }
        }
    }
}
