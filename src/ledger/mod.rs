// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger collaborator
//!
//! The relay only reads account key/value data and hands settlement
//! directives to a sink. Transaction building, signing and broadcast live
//! behind [`SettlementSink`].
//!
//! | Contract | Keys read | Functions called |
//! |----------|-----------|------------------|
//! | requests | `pool:actionId:txId:field` | `fulfill`, `recycle` |
//! | responses | `actionId:poolAddress:poolId` | `publish` |
//! | private / attested / whitelist pools | `a:b:publicKey` | |
//! | quotes | `quoteId:quote`, `quoteId:qe-report` | `register` |

pub mod entries;
pub mod memory;
pub mod node;
pub mod registry;
pub mod requests;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use base64ct::{Base64, Encoding};
use serde::{Serialize, Serializer};
use tracing::info;

use crate::attestation::QuoteRegistration;
use crate::codec::Encode;
use crate::error::ProtocolError;
use crate::models::{FullPoolId, OracleResponse};

pub use entries::{group_fields_by_key, parse_account_data, DataEntry, EntryValue};
pub use memory::InMemoryLedger;
pub use node::NodeLedger;
pub use registry::{
    parse_published_responses, parse_quote_entries, parse_registered_oracles, PublishedResponse,
    QuoteEntry, RegisteredOracle,
};
pub use requests::{parse_pending_requests, PendingRequest};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger node unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid ledger entry: {0}")]
    InvalidEntry(String),

    #[error("Settlement rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Reads account key/value data from a ledger node.
pub trait LedgerReader: Send + Sync {
    fn account_data(
        &self,
        node_url: &str,
        address: &str,
    ) -> impl Future<Output = Result<Vec<DataEntry>, LedgerError>> + Send;
}

/// Builds, signs and broadcasts settlement transactions.
///
/// Returns the id of the transaction carrying the directive.
pub trait SettlementSink: Send + Sync {
    fn submit(
        &self,
        chain_id: &str,
        directive: &SettlementDirective,
    ) -> impl Future<Output = Result<String, LedgerError>> + Send;
}

impl<T: LedgerReader> LedgerReader for Arc<T> {
    fn account_data(
        &self,
        node_url: &str,
        address: &str,
    ) -> impl Future<Output = Result<Vec<DataEntry>, LedgerError>> + Send {
        (**self).account_data(node_url, address)
    }
}

impl<T: SettlementSink> SettlementSink for Arc<T> {
    fn submit(
        &self,
        chain_id: &str,
        directive: &SettlementDirective,
    ) -> impl Future<Output = Result<String, LedgerError>> + Send {
        (**self).submit(chain_id, directive)
    }
}

/// A typed contract call argument, serialized the way invoke transactions
/// carry them: `{"type": "binary", "value": "<base64>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CallArg {
    Binary(#[serde(serialize_with = "as_base64")] Vec<u8>),
    String(String),
    Integer(i64),
    List(Vec<CallArg>),
}

fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&Base64::encode_string(bytes))
}

/// Something the relay or an operator wants settled on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementDirective {
    /// Deliver an oracle response for a pending request.
    Fulfill {
        contract: String,
        request_key: String,
        response: OracleResponse,
        pool: FullPoolId,
        tx_id: Vec<u8>,
    },
    /// Return an expired request's reward to its owner.
    Recycle { contract: String, key: String },
    /// Store a signed response in the responses contract.
    Publish {
        contract: String,
        response: OracleResponse,
        pool: FullPoolId,
    },
    /// Binary data entries on the submitter's own account.
    StoreBlobs { blobs: BTreeMap<String, Vec<u8>> },
    RegisterQuote {
        contract: String,
        registration: QuoteRegistration,
    },
}

impl SettlementDirective {
    /// Contract function invoked, or `data` for plain data transactions.
    pub fn function(&self) -> &'static str {
        match self {
            SettlementDirective::Fulfill { .. } => "fulfill",
            SettlementDirective::Recycle { .. } => "recycle",
            SettlementDirective::Publish { .. } => "publish",
            SettlementDirective::StoreBlobs { .. } => "data",
            SettlementDirective::RegisterQuote { .. } => "register",
        }
    }

    /// Address of the invoked contract, `None` for data transactions.
    pub fn contract(&self) -> Option<&str> {
        match self {
            SettlementDirective::Fulfill { contract, .. }
            | SettlementDirective::Recycle { contract, .. }
            | SettlementDirective::Publish { contract, .. }
            | SettlementDirective::RegisterQuote { contract, .. } => Some(contract),
            SettlementDirective::StoreBlobs { .. } => None,
        }
    }

    pub fn args(&self) -> Result<Vec<CallArg>, LedgerError> {
        let args = match self {
            SettlementDirective::Fulfill {
                response,
                pool,
                tx_id,
                ..
            } => vec![
                CallArg::Binary(response.encode()),
                CallArg::Binary(pool.to_bytes()?),
                CallArg::Binary(tx_id.clone()),
            ],
            SettlementDirective::Recycle { key, .. } => vec![CallArg::String(key.clone())],
            SettlementDirective::Publish { response, pool, .. } => vec![
                CallArg::Binary(response.encode()),
                CallArg::Binary(pool.address_bytes()?),
                CallArg::Binary(pool.id.clone()),
            ],
            SettlementDirective::StoreBlobs { .. } => Vec::new(),
            SettlementDirective::RegisterQuote { registration, .. } => vec![
                CallArg::Binary(registration.signed_region.clone()),
                CallArg::Binary(registration.signature.clone()),
                CallArg::Binary(registration.attestation_key.clone()),
                CallArg::Binary(registration.qe_report.clone()),
                CallArg::Binary(registration.qe_report_signature.clone()),
                CallArg::Binary(registration.auth_data.clone()),
                CallArg::List(
                    registration
                        .chain
                        .iter()
                        .map(|der| CallArg::Binary(der.clone()))
                        .collect(),
                ),
                CallArg::Binary(registration.submitter.clone()),
                CallArg::List(
                    registration
                        .crl_keys()
                        .into_iter()
                        .map(CallArg::String)
                        .collect(),
                ),
            ],
        };
        Ok(args)
    }
}

/// The two transactions registering a quote: CRL blobs first, then the call.
pub fn quote_registration_directives(
    quotes_contract: &str,
    registration: QuoteRegistration,
) -> Vec<SettlementDirective> {
    vec![
        SettlementDirective::StoreBlobs {
            blobs: registration.crl_blobs.clone(),
        },
        SettlementDirective::RegisterQuote {
            contract: quotes_contract.to_string(),
            registration,
        },
    ]
}

/// Logs directives instead of broadcasting them.
#[derive(Debug, Clone, Default)]
pub struct DryRunSettlement;

impl SettlementSink for DryRunSettlement {
    async fn submit(
        &self,
        chain_id: &str,
        directive: &SettlementDirective,
    ) -> Result<String, LedgerError> {
        let args = directive.args()?;
        let tx_id = format!("dry-run-{}", uuid::Uuid::new_v4());
        info!(
            chain_id = %chain_id,
            contract = directive.contract().unwrap_or("-"),
            function = directive.function(),
            args = %serde_json::to_string(&args).unwrap_or_default(),
            tx_id = %tx_id,
            "Dry run: settlement not broadcast"
        );
        Ok(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionId, DataItem, OracleMessage};
    use alloy::primitives::B256;

    fn pool() -> FullPoolId {
        let mut raw = vec![1u8, b'R'];
        raw.extend([7u8; 24]);
        raw.push(0xaa);
        FullPoolId::from_bytes(&raw).unwrap()
    }

    fn response() -> OracleResponse {
        OracleResponse {
            message: OracleMessage {
                action_id: ActionId(B256::repeat_byte(1)),
                data_item: DataItem::success(10, b"v".to_vec()),
                relayer: vec![2],
            },
            signature: vec![3; 65],
        }
    }

    #[test]
    fn fulfill_args_are_response_pool_tx() {
        let directive = SettlementDirective::Fulfill {
            contract: "3Mrequests".to_string(),
            request_key: "k".to_string(),
            response: response(),
            pool: pool(),
            tx_id: vec![9, 9],
        };
        assert_eq!(directive.function(), "fulfill");
        let args = directive.args().unwrap();
        assert_eq!(args[0], CallArg::Binary(response().encode()));
        assert_eq!(args[1], CallArg::Binary(pool().to_bytes().unwrap()));
        assert_eq!(args[2], CallArg::Binary(vec![9, 9]));
    }

    #[test]
    fn publish_splits_pool_address_and_id() {
        let directive = SettlementDirective::Publish {
            contract: "3Mresponses".to_string(),
            response: response(),
            pool: pool(),
        };
        let args = directive.args().unwrap();
        assert_eq!(args[1], CallArg::Binary(pool().address_bytes().unwrap()));
        assert_eq!(args[2], CallArg::Binary(vec![0xaa]));
    }

    #[test]
    fn call_args_serialize_as_typed_values() {
        let args = vec![
            CallArg::Binary(vec![1, 2, 3]),
            CallArg::String("k".to_string()),
            CallArg::List(vec![CallArg::Integer(5)]),
        ];
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"type": "binary", "value": "AQID"},
                {"type": "string", "value": "k"},
                {"type": "list", "value": [{"type": "integer", "value": 5}]}
            ])
        );
    }

    #[test]
    fn recycle_takes_the_request_key() {
        let directive = SettlementDirective::Recycle {
            contract: "c".to_string(),
            key: "pool:id:tx".to_string(),
        };
        assert_eq!(
            directive.args().unwrap(),
            vec![CallArg::String("pool:id:tx".to_string())]
        );
        assert_eq!(directive.contract(), Some("c"));
    }

    #[tokio::test]
    async fn dry_run_returns_synthetic_id() {
        let directive = SettlementDirective::Recycle {
            contract: "c".to_string(),
            key: "k".to_string(),
        };
        let id = DryRunSettlement.submit("R", &directive).await.unwrap();
        assert!(id.starts_with("dry-run-"));
    }

    #[tokio::test]
    async fn dry_run_surfaces_unencodable_pools() {
        let directive = SettlementDirective::Fulfill {
            contract: "c".to_string(),
            request_key: "k".to_string(),
            response: response(),
            pool: FullPoolId::new("not-base58-0", vec![]),
            tx_id: vec![],
        };
        assert!(matches!(
            DryRunSettlement.submit("R", &directive).await,
            Err(LedgerError::Protocol(_))
        ));
    }
}
