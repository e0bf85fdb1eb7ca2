// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process oracle serving the oracle HTTP interface.
//!
//! It does the oracle half of the protocol: open the proof, decrypt the
//! patch, hand both to a [`Responder`] and sign the resulting message with a
//! recoverable secp256k1 signature over `keccak256(OracleMessage)`. It does
//! not execute HTTP requests.

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64ct::{Base64, Encoding};
use k256::{ecdsa::SigningKey, elliptic_curve::sec1::ToEncodedPoint, SecretKey};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::{JsonOracleResponse, QueryRequest, RESULT_FORMAT};
use crate::attestation::{JsonQuote, Quote};
use crate::codec::Decode;
use crate::models::{Action, ActionProof, DataItem, OracleMessage, OracleResponse, PrivatePatch};

/// Produces the result for a decrypted action.
pub type Responder = Arc<dyn Fn(&Action, &PrivatePatch) -> DataItem + Send + Sync>;

pub struct SimulatedOracle {
    secret: SecretKey,
    signer: PrivateKeySigner,
    address: String,
    quote: Option<Quote>,
    responder: Responder,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

impl SimulatedOracle {
    pub fn new(secret: SecretKey, address: impl Into<String>, responder: Responder) -> Self {
        let signer = PrivateKeySigner::from_signing_key(SigningKey::from(&secret));
        Self {
            secret,
            signer,
            address: address.into(),
            quote: None,
            responder,
        }
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quote = Some(quote);
        self
    }

    /// Ethereum-style address of the signing key.
    pub fn signer_address(&self) -> alloy::primitives::Address {
        self.signer.address()
    }

    pub fn public_key_hex(&self) -> String {
        format!(
            "0x{}",
            alloy::hex::encode(self.secret.public_key().to_encoded_point(false).as_bytes())
        )
    }

    /// Execute one query the way the oracle would.
    pub fn answer(&self, request: &QueryRequest) -> ApiResult<OracleResponse> {
        if request.format != RESULT_FORMAT {
            return Err(bad_request(format!("unsupported format `{}`", request.format)));
        }
        let raw = Base64::decode_vec(&request.action)
            .map_err(|e| bad_request(format!("action is not base64: {e}")))?;
        let proved = ActionProof::decode(&raw).map_err(|e| bad_request(e.to_string()))?;
        let relayer = alloy::hex::decode(request.relayer.trim_start_matches("0x"))
            .map_err(|e| bad_request(format!("relayer is not hex: {e}")))?;

        let patch = match proved.open(&self.secret).map_err(|e| bad_request(e.to_string()))? {
            Some(sender) => proved
                .action
                .patch
                .decrypt(&self.secret, &sender)
                .map_err(|e| bad_request(e.to_string()))?,
            None => PrivatePatch::empty(),
        };

        let message = OracleMessage {
            action_id: proved.id(),
            data_item: (self.responder)(&proved.action, &patch),
            relayer,
        };
        let signature = self
            .signer
            .sign_hash_sync(&message.digest())
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

        Ok(OracleResponse {
            message,
            signature: signature.as_bytes().to_vec(),
        })
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/pubkey", get(pubkey))
            .route("/address", get(address))
            .route("/quote", get(quote))
            .route("/query", post(query))
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// Serve until `shutdown` fires.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        info!(%addr, "Simulated oracle listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    }
}

async fn pubkey(State(oracle): State<Arc<SimulatedOracle>>) -> String {
    oracle.public_key_hex()
}

async fn address(State(oracle): State<Arc<SimulatedOracle>>) -> String {
    oracle.address.clone()
}

async fn quote(State(oracle): State<Arc<SimulatedOracle>>) -> ApiResult<Json<JsonQuote>> {
    oracle
        .quote
        .as_ref()
        .map(|q| Json(JsonQuote::from(q)))
        .ok_or((StatusCode::NOT_FOUND, "no quote available".to_string()))
}

async fn query(
    State(oracle): State<Arc<SimulatedOracle>>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<JsonOracleResponse>> {
    let response = oracle.answer(&request).inspect_err(|(status, message)| {
        warn!(%status, error = %message, "Rejected oracle query");
    })?;
    Ok(Json(JsonOracleResponse::from(&response)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_secret_key;
    use crate::models::{HttpMethod, UnencryptedAction, ANY_ORACLE};
    use alloy::primitives::Signature;

    fn echo_patch_body() -> Responder {
        Arc::new(|_action, patch| {
            DataItem::success(1_700_000_000, patch.body.clone().unwrap_or_default().into_bytes())
        })
    }

    fn action() -> UnencryptedAction {
        UnencryptedAction::from_parts::<&str>(
            HttpMethod::Post,
            "https://api.example.com/v1/quote",
            &[],
            "",
            "string",
            ".",
        )
        .unwrap()
    }

    #[test]
    fn answers_private_action_with_recoverable_signature() {
        let secret = generate_secret_key();
        let oracle = SimulatedOracle::new(secret.clone(), "3Moracle", echo_patch_body());
        let sender = generate_secret_key();

        let patch = PrivatePatch::from_parts::<&str>(None, &[], Some("hidden")).unwrap();
        let proved = action()
            .with_patch(patch)
            .encrypt(&secret.public_key(), "3Moracle", &sender)
            .unwrap()
            .add_proof(&secret.public_key(), &sender)
            .unwrap();

        let response = oracle.answer(&QueryRequest::new(&proved, &[7, 7])).unwrap();
        assert_eq!(response.message.action_id, proved.id());
        assert_eq!(response.message.data_item.value, b"hidden");
        assert_eq!(response.message.relayer, vec![7, 7]);
        assert_eq!(response.signature.len(), 65);

        let signature = Signature::try_from(response.signature.as_slice()).unwrap();
        let recovered = signature
            .recover_address_from_prehash(&response.message.digest())
            .unwrap();
        assert_eq!(recovered, oracle.signer_address());
    }

    #[test]
    fn public_action_needs_no_proof() {
        let secret = generate_secret_key();
        let oracle = SimulatedOracle::new(secret.clone(), "3Moracle", echo_patch_body());
        let proved = action()
            .encrypt(&secret.public_key(), ANY_ORACLE, &secret)
            .unwrap()
            .with_empty_proof();

        let response = oracle.answer(&QueryRequest::new(&proved, &[1])).unwrap();
        assert!(response.message.data_item.value.is_empty());
    }

    #[test]
    fn rejects_unknown_format_and_garbage() {
        let oracle = SimulatedOracle::new(generate_secret_key(), "x", echo_patch_body());
        let request = QueryRequest {
            action: "AAAA".to_string(),
            relayer: "00".to_string(),
            format: "json".to_string(),
        };
        assert_eq!(oracle.answer(&request).unwrap_err().0, StatusCode::BAD_REQUEST);

        let request = QueryRequest {
            format: RESULT_FORMAT.to_string(),
            ..request
        };
        assert_eq!(oracle.answer(&request).unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn public_key_is_prefixed_uncompressed_hex() {
        let oracle = SimulatedOracle::new(generate_secret_key(), "x", echo_patch_body());
        let key = oracle.public_key_hex();
        assert!(key.starts_with("0x04"));
        assert_eq!(key.len(), 2 + 130);
    }
}
