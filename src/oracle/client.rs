// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for oracle services.

use std::time::Duration;

use k256::PublicKey;
use reqwest::{Client, Response};
use tracing::debug;

use super::{JsonOracleResponse, OracleError, OracleGateway, QueryRequest};
use crate::attestation::{JsonQuote, Quote};
use crate::crypto::parse_public_key_hex;
use crate::error::ProtocolError;
use crate::models::{ActionProof, OracleResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct OracleClient {
    http: Client,
}

impl OracleClient {
    pub fn new() -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OracleError::Unreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    fn endpoint(base_url: &str, path: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    async fn checked(url: &str, response: Response) -> Result<Response, OracleError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(OracleError::Status {
            url: url.to_string(),
            status,
            body,
        })
    }

    async fn get(&self, base_url: &str, path: &str) -> Result<Response, OracleError> {
        let url = Self::endpoint(base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| OracleError::Unreachable(format!("GET {url} failed: {e}")))?;
        Self::checked(&url, response).await
    }

    async fn get_text(&self, base_url: &str, path: &str) -> Result<String, OracleError> {
        self.get(base_url, path)
            .await?
            .text()
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| OracleError::InvalidResponse(format!("GET {path} body: {e}")))
    }

    /// The key actions for this oracle are encrypted to.
    pub async fn public_key(&self, base_url: &str) -> Result<PublicKey, OracleError> {
        let text = self.get_text(base_url, "/pubkey").await?;
        parse_public_key_hex(&text).map_err(|e| OracleError::Protocol(ProtocolError::Crypto(e)))
    }

    /// The oracle's settlement identity.
    pub async fn address(&self, base_url: &str) -> Result<String, OracleError> {
        self.get_text(base_url, "/address").await
    }

    pub async fn quote(&self, base_url: &str) -> Result<Quote, OracleError> {
        let json: JsonQuote = self
            .get(base_url, "/quote")
            .await?
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(format!("GET /quote invalid JSON: {e}")))?;
        Quote::try_from(json).map_err(|e| OracleError::InvalidResponse(format!("quote: {e}")))
    }

    pub async fn query(
        &self,
        base_url: &str,
        action: &ActionProof,
        relayer: &[u8],
    ) -> Result<OracleResponse, OracleError> {
        let url = Self::endpoint(base_url, "/query");
        debug!(url = %url, action_id = %action.id(), "Querying oracle");

        let response = self
            .http
            .post(&url)
            .json(&QueryRequest::new(action, relayer))
            .send()
            .await
            .map_err(|e| OracleError::Unreachable(format!("POST {url} failed: {e}")))?;
        let json: JsonOracleResponse = Self::checked(&url, response)
            .await?
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(format!("POST /query invalid JSON: {e}")))?;

        Ok(OracleResponse::try_from(json)?)
    }
}

impl OracleGateway for OracleClient {
    async fn query(
        &self,
        oracle_url: &str,
        action: &ActionProof,
        relayer: &[u8],
    ) -> Result<OracleResponse, OracleError> {
        OracleClient::query(self, oracle_url, action, relayer).await
    }
}
