// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Oracle service interface
//!
//! | Endpoint | Response |
//! |----------|----------|
//! | `GET /pubkey` | hex public key, optionally `0x` prefixed |
//! | `GET /address` | settlement identity of the oracle |
//! | `GET /quote` | [`JsonQuote`](crate::attestation::JsonQuote) |
//! | `POST /query` | [`JsonOracleResponse`] for a base64 [`ActionProof`] |
//!
//! [`OracleClient`] talks to a real oracle, [`SimulatedOracle`] serves the
//! same endpoints in-process.

pub mod client;
pub mod simulator;

use std::future::Future;

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::models::{ActionId, ActionProof, DataItem, OracleMessage, OracleResponse};

pub use client::OracleClient;
pub use simulator::{Responder, SimulatedOracle};

/// Result encoding requested from the oracle.
pub const RESULT_FORMAT: &str = "ride";

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle unreachable: {0}")]
    Unreachable(String),

    #[error("Oracle returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Asks an oracle to execute an action for a relayer.
pub trait OracleGateway: Send + Sync {
    fn query(
        &self,
        oracle_url: &str,
        action: &ActionProof,
        relayer: &[u8],
    ) -> impl Future<Output = Result<OracleResponse, OracleError>> + Send;
}

/// `POST /query` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Base64 [`ActionProof`] encoding.
    pub action: String,
    /// Hex relayer identity.
    pub relayer: String,
    pub format: String,
}

impl QueryRequest {
    pub fn new(action: &ActionProof, relayer: &[u8]) -> Self {
        Self {
            action: Base64::encode_string(&crate::codec::Encode::encode(action)),
            relayer: alloy::hex::encode(relayer),
            format: RESULT_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonDataItem {
    pub timestamp: i64,
    pub error: i64,
    /// Base64.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOracleMessage {
    /// Base64.
    pub action_id: String,
    pub data_item: JsonDataItem,
    /// Hex.
    pub relayer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonSignature {
    pub r: String,
    pub s: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOracleResponse {
    pub msg: JsonOracleMessage,
    pub sig: JsonSignature,
}

fn b64(field: &str, text: &str) -> ProtocolResult<Vec<u8>> {
    Base64::decode_vec(text).map_err(|e| ProtocolError::malformed(format!("{field}: {e}")))
}

fn hex(field: &str, text: &str) -> ProtocolResult<Vec<u8>> {
    let text = text.strip_prefix("0x").unwrap_or(text);
    alloy::hex::decode(text).map_err(|e| ProtocolError::malformed(format!("{field}: {e}")))
}

impl TryFrom<JsonOracleResponse> for OracleResponse {
    type Error = ProtocolError;

    /// Signature bytes are `r ∥ s ∥ v`, or `r ∥ s` when no `v` is given.
    fn try_from(json: JsonOracleResponse) -> Result<Self, Self::Error> {
        let mut signature = b64("sig.r", &json.sig.r)?;
        signature.extend(b64("sig.s", &json.sig.s)?);
        if let Some(v) = json.sig.v {
            signature.push(v);
        }

        Ok(OracleResponse {
            message: OracleMessage {
                action_id: ActionId::from_slice(&b64("msg.action_id", &json.msg.action_id)?)?,
                data_item: DataItem {
                    timestamp: json.msg.data_item.timestamp,
                    error: json.msg.data_item.error,
                    value: b64("msg.data_item.value", &json.msg.data_item.value)?,
                },
                relayer: hex("msg.relayer", &json.msg.relayer)?,
            },
            signature,
        })
    }
}

impl From<&OracleResponse> for JsonOracleResponse {
    fn from(response: &OracleResponse) -> Self {
        let msg = &response.message;
        let sig = &response.signature;
        let half = sig.len().min(64) / 2;
        JsonOracleResponse {
            msg: JsonOracleMessage {
                action_id: Base64::encode_string(msg.action_id.as_bytes()),
                data_item: JsonDataItem {
                    timestamp: msg.data_item.timestamp,
                    error: msg.data_item.error,
                    value: Base64::encode_string(&msg.data_item.value),
                },
                relayer: alloy::hex::encode(&msg.relayer),
            },
            sig: JsonSignature {
                r: Base64::encode_string(&sig[..half]),
                s: Base64::encode_string(&sig[half..2 * half]),
                v: sig.get(64).copied(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    fn response(signature: Vec<u8>) -> OracleResponse {
        OracleResponse {
            message: OracleMessage {
                action_id: ActionId(B256::repeat_byte(3)),
                data_item: DataItem::success(1_700_000_000, b"42".to_vec()),
                relayer: vec![1, 82, 7],
            },
            signature,
        }
    }

    #[test]
    fn recoverable_signature_concatenates_r_s_v() {
        let original = response((0..65).collect());
        let json = JsonOracleResponse::from(&original);
        assert_eq!(json.sig.v, Some(64));
        assert_eq!(json.msg.relayer, "015207");
        assert_eq!(OracleResponse::try_from(json).unwrap(), original);
    }

    #[test]
    fn signature_without_v_is_accepted() {
        let original = response(vec![9; 64]);
        let json = JsonOracleResponse::from(&original);
        assert_eq!(json.sig.v, None);
        let text = serde_json::to_string(&json).unwrap();
        assert!(!text.contains("\"v\""));

        let parsed: JsonOracleResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(OracleResponse::try_from(parsed).unwrap().signature.len(), 64);
    }

    #[test]
    fn bad_action_id_is_malformed() {
        let mut json = JsonOracleResponse::from(&response(vec![0; 65]));
        json.msg.action_id = Base64::encode_string(&[1, 2, 3]);
        assert!(OracleResponse::try_from(json).is_err());
    }

    #[test]
    fn query_request_encodes_action_and_relayer() {
        use crate::codec::Decode;
        use crate::models::{HttpMethod, UnencryptedAction};

        let key = crate::crypto::generate_secret_key();
        let proof = UnencryptedAction::from_parts::<&str>(
            HttpMethod::Get,
            "https://example.com/x",
            &[],
            "",
            "uint",
            ".x",
        )
        .unwrap()
        .encrypt(&key.public_key(), crate::models::ANY_ORACLE, &key)
        .unwrap()
        .with_empty_proof();

        let request = QueryRequest::new(&proof, &[0xab, 0xcd]);
        assert_eq!(request.relayer, "abcd");
        assert_eq!(request.format, "ride");
        let decoded = ActionProof::decode(&Base64::decode_vec(&request.action).unwrap()).unwrap();
        assert_eq!(decoded, proof);
    }
}
