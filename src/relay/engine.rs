// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One relay pass over every configured network.
//!
//! Requests are handled one at a time: check eligibility, resolve an oracle
//! URL for the pool, query it, submit the fulfillment. A failure is logged
//! with its reason and the pass moves on to the next request.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::eligibility::{Eligibility, IneligibleReason, RelayPolicy};
use super::settled::SettledCache;
use super::RelayError;
use crate::config::{NetworkConfig, RelayConfig};
use crate::error::ProtocolError;
use crate::ledger::{
    parse_pending_requests, LedgerError, LedgerReader, PendingRequest, SettlementDirective,
    SettlementSink,
};
use crate::oracle::OracleGateway;

/// Why a request was left alone this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Ineligible(IneligibleReason),
    /// Past its window; waits for a recycle.
    Expired,
    /// Settled by this relay recently; the ledger has not caught up yet.
    AlreadySettled { tx_id: String },
    /// No configured oracle serves the identity the patch was encrypted for.
    NoOracle { identity: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Ineligible(reason) => write!(f, "{reason}"),
            SkipReason::Expired => write!(f, "expired"),
            SkipReason::AlreadySettled { tx_id } => write!(f, "already settled in {tx_id}"),
            SkipReason::NoOracle { identity } => write!(f, "no oracle URL for {identity}"),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Fulfilled { oracle_url: String, tx_id: String },
    Recycled { tx_id: String },
    Skipped(SkipReason),
    Failed(RelayError),
}

#[derive(Debug)]
pub struct RequestOutcome {
    pub chain_id: String,
    pub key: String,
    pub outcome: Outcome,
}

/// Everything that happened in one pass.
#[derive(Debug)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub requests: Vec<RequestOutcome>,
    /// Networks that could not be listed at all.
    pub network_errors: Vec<(String, RelayError)>,
}

impl PassReport {
    fn new() -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            requests: Vec::new(),
            network_errors: Vec::new(),
        }
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.requests.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn fulfilled(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Fulfilled { .. }))
    }

    pub fn recycled(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Recycled { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn outcome(&self, key: &str) -> Option<&Outcome> {
        self.requests
            .iter()
            .find(|r| r.key == key)
            .map(|r| &r.outcome)
    }
}

pub struct RelayEngine<L, S, O> {
    config: RelayConfig,
    chains: Vec<String>,
    policy: RelayPolicy,
    ledger: L,
    sink: S,
    oracle: O,
    settled: SettledCache,
}

fn log_outcome(chain_id: &str, key: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Fulfilled { oracle_url, tx_id } => info!(
            chain_id = %chain_id,
            key = %key,
            oracle_url = %oracle_url,
            tx_id = %tx_id,
            "Fulfilled pending request"
        ),
        Outcome::Recycled { tx_id } => info!(
            chain_id = %chain_id,
            key = %key,
            tx_id = %tx_id,
            "Recycled expired request"
        ),
        Outcome::Skipped(reason) => info!(
            chain_id = %chain_id,
            key = %key,
            reason = %reason,
            "Skipping pending request"
        ),
        Outcome::Failed(error) => warn!(
            chain_id = %chain_id,
            key = %key,
            reason = error.code(),
            error = %error,
            "Pending request failed"
        ),
    }
}

impl<L, S, O> RelayEngine<L, S, O>
where
    L: LedgerReader,
    S: SettlementSink,
    O: OracleGateway,
{
    pub fn new(
        config: RelayConfig,
        chains: Vec<String>,
        policy: RelayPolicy,
        ledger: L,
        sink: S,
        oracle: O,
    ) -> Self {
        Self {
            config,
            chains,
            policy,
            ledger,
            sink,
            oracle,
            settled: SettledCache::default(),
        }
    }

    pub fn with_settled_cache(mut self, settled: SettledCache) -> Self {
        self.settled = settled;
        self
    }

    pub fn chains(&self) -> &[String] {
        &self.chains
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Relay every eligible pending request on every configured network.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> PassReport {
        let mut report = PassReport::new();
        let span = info_span!("relay_pass", pass_id = %report.pass_id);

        async {
            for chain_id in &self.chains {
                if let Err(e) = self.run_network(chain_id, now, &mut report).await {
                    warn!(chain_id = %chain_id, error = %e, "Relay pass skipped network");
                    report.network_errors.push((chain_id.clone(), e));
                }
            }
            info!(
                fulfilled = report.fulfilled(),
                skipped = report.skipped(),
                failed = report.failed(),
                network_errors = report.network_errors.len(),
                "Relay pass complete"
            );
        }
        .instrument(span)
        .await;

        report
    }

    async fn pending_requests(
        &self,
        network: &NetworkConfig,
    ) -> Result<Vec<(String, Result<PendingRequest, LedgerError>)>, RelayError> {
        let node_url = network.node_url()?;
        let entries = self
            .ledger
            .account_data(node_url, &network.dapps.requests)
            .await?;
        Ok(parse_pending_requests(&entries, &network.dapps.requests))
    }

    async fn run_network(
        &self,
        chain_id: &str,
        now: DateTime<Utc>,
        report: &mut PassReport,
    ) -> Result<(), RelayError> {
        let network = self.config.for_chain(chain_id)?;
        let relayer_address = network.relayer()?;
        let relayer = bs58::decode(relayer_address).into_vec().map_err(|e| {
            ProtocolError::malformed(format!("relayer address `{relayer_address}`: {e}"))
        })?;

        for (key, parsed) in self.pending_requests(network).await? {
            let outcome = match parsed {
                Ok(request) => {
                    self.relay_request(chain_id, network, &relayer, &request, now)
                        .await
                }
                Err(e) => Outcome::Failed(RelayError::Ledger(e)),
            };
            log_outcome(chain_id, &key, &outcome);
            report.requests.push(RequestOutcome {
                chain_id: chain_id.to_string(),
                key,
                outcome,
            });
        }
        Ok(())
    }

    async fn relay_request(
        &self,
        chain_id: &str,
        network: &NetworkConfig,
        relayer: &[u8],
        request: &PendingRequest,
        now: DateTime<Utc>,
    ) -> Outcome {
        match self.policy.evaluate(request, now) {
            Eligibility::Eligible => {}
            Eligibility::Ineligible(reason) => {
                return Outcome::Skipped(SkipReason::Ineligible(reason))
            }
            Eligibility::Recyclable => return Outcome::Skipped(SkipReason::Expired),
        }
        if let Some(tx_id) = self.settled.get(&request.key) {
            return Outcome::Skipped(SkipReason::AlreadySettled { tx_id });
        }

        let identity = &request.action.action.patch.oracle_identity;
        let Some(oracle_url) = network.for_pool(&request.pool).find_oracle_url(identity) else {
            return Outcome::Skipped(SkipReason::NoOracle {
                identity: identity.clone(),
            });
        };

        match self.dispatch(chain_id, &oracle_url, relayer, request).await {
            Ok(tx_id) => {
                self.settled.insert(&request.key, &tx_id);
                Outcome::Fulfilled { oracle_url, tx_id }
            }
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Query then settle. Nothing is retained if either step fails.
    async fn dispatch(
        &self,
        chain_id: &str,
        oracle_url: &str,
        relayer: &[u8],
        request: &PendingRequest,
    ) -> Result<String, RelayError> {
        let response = self
            .oracle
            .query(oracle_url, &request.action, relayer)
            .await?;
        if response.message.action_id != request.action_id {
            return Err(ProtocolError::ActionIdMismatch {
                expected: request.action_id.to_string(),
                actual: response.message.action_id.to_string(),
            }
            .into());
        }

        let directive = SettlementDirective::Fulfill {
            contract: request.settlement_target.clone(),
            request_key: request.key.clone(),
            response,
            pool: request.pool.clone(),
            tx_id: request.tx_id.clone(),
        };
        self.sink
            .submit(chain_id, &directive)
            .await
            .map_err(RelayError::SettlementRejected)
    }

    /// Recycle every expired request on one network.
    ///
    /// An operator action, never part of [`run_pass`](Self::run_pass).
    pub async fn recycle_expired(
        &self,
        chain_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<RequestOutcome>, RelayError> {
        let network = self.config.for_chain(chain_id)?;
        let mut outcomes = Vec::new();

        for (key, parsed) in self.pending_requests(network).await? {
            let Ok(request) = parsed else {
                continue;
            };
            if !request.is_expired_at(now) {
                continue;
            }
            let directive = SettlementDirective::Recycle {
                contract: request.settlement_target.clone(),
                key: key.clone(),
            };
            let outcome = match self.sink.submit(chain_id, &directive).await {
                Ok(tx_id) => Outcome::Recycled { tx_id },
                Err(e) => Outcome::Failed(RelayError::SettlementRejected(e)),
            };
            log_outcome(chain_id, &key, &outcome);
            outcomes.push(RequestOutcome {
                chain_id: chain_id.to_string(),
                key,
                outcome,
            });
        }
        Ok(outcomes)
    }
}
