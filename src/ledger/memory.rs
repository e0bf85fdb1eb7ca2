// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory ledger for tests and local simulation.
//!
//! Serves account data like a node and applies settlement directives the way
//! the contracts would: settled or recycled requests disappear, published
//! responses and registered quotes appear. Settling a request twice is
//! rejected, as the requests contract would.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use super::entries::{DataEntry, EntryValue};
use super::registry::PublishedResponse;
use super::{LedgerError, LedgerReader, SettlementDirective, SettlementSink};
use crate::attestation::quote::HEADER_LEN;
use crate::attestation::QuoteBody;
use crate::codec::Encode;

/// A directive accepted by [`InMemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub chain_id: String,
    pub tx_id: String,
    pub directive: SettlementDirective,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Vec<DataEntry>>,
    submissions: Vec<Submission>,
    rejected: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    /// Account receiving data transactions.
    submitter: String,
    state: Mutex<State>,
}

impl InMemoryLedger {
    pub fn new(submitter: impl Into<String>) -> Self {
        Self {
            submitter: submitter.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Unreachable("in-memory ledger lock poisoned".to_string()))
    }

    pub fn insert(&self, address: &str, entries: Vec<DataEntry>) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let account = state.accounts.entry(address.to_string()).or_default();
        for entry in entries {
            account.retain(|existing| existing.key != entry.key);
            account.push(entry);
        }
        Ok(())
    }

    pub fn entries(&self, address: &str) -> Vec<DataEntry> {
        self.lock()
            .ok()
            .and_then(|state| state.accounts.get(address).cloned())
            .unwrap_or_default()
    }

    /// Make every settlement of `request_key` fail.
    pub fn reject(&self, request_key: &str) -> Result<(), LedgerError> {
        self.lock()?.rejected.insert(request_key.to_string());
        Ok(())
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.lock()
            .map(|state| state.submissions.clone())
            .unwrap_or_default()
    }
}

/// Drop the record `key` from `contract`, failing if it is not there.
fn settle_request(state: &mut State, contract: &str, key: &str) -> Result<(), LedgerError> {
    if state.rejected.contains(key) {
        return Err(LedgerError::Rejected(format!("request `{key}` rejected")));
    }
    let prefix = format!("{key}:");
    let account = state.accounts.entry(contract.to_string()).or_default();
    let before = account.len();
    account.retain(|entry| !entry.key.starts_with(&prefix));
    if account.len() == before {
        return Err(LedgerError::Rejected(format!(
            "request `{key}` is not pending"
        )));
    }
    Ok(())
}

fn upsert(state: &mut State, address: &str, entry: DataEntry) {
    let account = state.accounts.entry(address.to_string()).or_default();
    account.retain(|existing| existing.key != entry.key);
    account.push(entry);
}

impl LedgerReader for InMemoryLedger {
    async fn account_data(
        &self,
        _node_url: &str,
        address: &str,
    ) -> Result<Vec<DataEntry>, LedgerError> {
        Ok(self
            .lock()?
            .accounts
            .get(address)
            .cloned()
            .unwrap_or_default())
    }
}

impl SettlementSink for InMemoryLedger {
    async fn submit(
        &self,
        chain_id: &str,
        directive: &SettlementDirective,
    ) -> Result<String, LedgerError> {
        directive.args()?;
        let mut state = self.lock()?;

        match directive {
            SettlementDirective::Fulfill {
                contract,
                request_key,
                ..
            } => settle_request(&mut state, contract, request_key)?,
            SettlementDirective::Recycle { contract, key } => {
                settle_request(&mut state, contract, key)?
            }
            SettlementDirective::Publish {
                contract,
                response,
                pool,
            } => upsert(
                &mut state,
                contract,
                DataEntry::new(
                    PublishedResponse::key(&response.message.action_id, pool),
                    EntryValue::Binary(response.message.data_item.encode()),
                ),
            ),
            SettlementDirective::StoreBlobs { blobs } => {
                for (key, blob) in blobs {
                    upsert(
                        &mut state,
                        &self.submitter,
                        DataEntry::new(key.clone(), EntryValue::Binary(blob.clone())),
                    );
                }
            }
            SettlementDirective::RegisterQuote {
                contract,
                registration,
            } => {
                let body = registration
                    .signed_region
                    .get(HEADER_LEN..)
                    .ok_or_else(|| LedgerError::InvalidEntry("quote shorter than its header".to_string()))
                    .and_then(|body| {
                        QuoteBody::from_bytes(body)
                            .map_err(|e| LedgerError::InvalidEntry(e.to_string()))
                    })?;
                let id = bs58::encode(body.measurement_id()).into_string();
                upsert(
                    &mut state,
                    contract,
                    DataEntry::new(
                        format!("{id}:quote"),
                        EntryValue::Binary(registration.signed_region.clone()),
                    ),
                );
                upsert(
                    &mut state,
                    contract,
                    DataEntry::new(
                        format!("{id}:qe-report"),
                        EntryValue::Binary(registration.qe_report.clone()),
                    ),
                );
            }
        }

        let tx_id = Uuid::new_v4().to_string();
        debug!(
            chain_id = %chain_id,
            function = directive.function(),
            tx_id = %tx_id,
            "In-memory settlement applied"
        );
        state.submissions.push(Submission {
            chain_id: chain_id.to_string(),
            tx_id: tx_id.clone(),
            directive: directive.clone(),
        });
        Ok(tx_id)
    }
}
