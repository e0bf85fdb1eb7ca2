// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pending requests stored by the requests contract.
//!
//! A request is the record `pool:actionId:txId` (each segment base58) with
//! the fields `action`, `proof`, `after`, `before`, `owner` and `reward`.

use chrono::{DateTime, Utc};

use super::entries::{group_fields_by_key, DataEntry, Fields};
use super::LedgerError;
use crate::codec::Decode;
use crate::error::ProtocolError;
use crate::models::{Action, ActionId, ActionProof, FullPoolId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub key: String,
    pub pool: FullPoolId,
    pub action_id: ActionId,
    pub tx_id: Vec<u8>,
    pub action: ActionProof,
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
    /// Base58 ledger address of the request owner.
    pub owner: String,
    pub reward: i64,
    /// Requests contract that holds the record and settles it.
    pub settlement_target: String,
}

fn timestamp(record: &Fields<'_>, field: &str) -> Result<DateTime<Utc>, LedgerError> {
    let seconds = record.integer(field)?;
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        LedgerError::InvalidEntry(format!("field `{field}` is out of range: {seconds}"))
    })
}

impl PendingRequest {
    /// Parse one grouped record. Rejects records whose stored action does
    /// not hash to the action ID in the key.
    pub fn parse(key: &str, record: &Fields<'_>, contract: &str) -> Result<Self, LedgerError> {
        let segments: Vec<&str> = key.split(':').collect();
        let [pool, action_id, tx_id] = segments.as_slice() else {
            return Err(LedgerError::InvalidEntry(format!(
                "request key `{key}` must have 3 segments"
            )));
        };

        let pool = FullPoolId::from_base58(pool)?;
        let action_id = ActionId::from_base58(action_id)?;
        let tx_id = bs58::decode(tx_id)
            .into_vec()
            .map_err(|e| ProtocolError::malformed(format!("tx id `{tx_id}`: {e}")))?;

        let action = Action::decode(record.binary("action")?)?;
        let action = ActionProof {
            action,
            proof: record.binary("proof")?.to_vec(),
        };
        action.verify_id(&action_id)?;

        Ok(Self {
            key: key.to_string(),
            pool,
            action_id,
            tx_id,
            action,
            after: timestamp(record, "after")?,
            before: timestamp(record, "before")?,
            owner: bs58::encode(record.binary("owner")?).into_string(),
            reward: record.integer("reward")?,
            settlement_target: contract.to_string(),
        })
    }

    /// `now` falls inside `[after, before)`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.after <= now && now < self.before
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.before
    }
}

/// Parse every request record of a requests contract account.
///
/// Each record is parsed independently so one bad record only costs itself.
pub fn parse_pending_requests(
    entries: &[DataEntry],
    contract: &str,
) -> Vec<(String, Result<PendingRequest, LedgerError>)> {
    group_fields_by_key(entries)
        .iter()
        .map(|(key, fields)| {
            let record = Fields::new(key, fields);
            (key.clone(), PendingRequest::parse(key, &record, contract))
        })
        .collect()
}

/// Look up a single request by key.
pub fn find_request(entries: &[DataEntry], key: &str, contract: &str) -> Option<PendingRequest> {
    let prefix = format!("{key}:");
    let own: Vec<DataEntry> = entries
        .iter()
        .filter(|entry| {
            entry
                .key
                .strip_prefix(&prefix)
                .is_some_and(|field| !field.contains(':'))
        })
        .cloned()
        .collect();
    let groups = group_fields_by_key(&own);
    let fields = groups.get(key)?;
    PendingRequest::parse(key, &Fields::new(key, fields), contract).ok()
}
