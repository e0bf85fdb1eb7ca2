// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger node REST reader.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::entries::{parse_account_data, DataEntry};
use super::{LedgerError, LedgerReader};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct NodeLedger {
    http: Client,
}

impl NodeLedger {
    pub fn new() -> Result<Self, LedgerError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Unreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    fn data_url(node_url: &str, address: &str) -> String {
        format!("{}/addresses/data/{address}", node_url.trim_end_matches('/'))
    }
}

impl LedgerReader for NodeLedger {
    async fn account_data(
        &self,
        node_url: &str,
        address: &str,
    ) -> Result<Vec<DataEntry>, LedgerError> {
        let url = Self::data_url(node_url, address);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::Unreachable(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Unreachable(format!(
                "GET {url} returned {status}: {body}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::Unreachable(format!("GET {url} body: {e}")))?;
        let entries = parse_account_data(&body)?;
        debug!(address = %address, entries = entries.len(), "Fetched account data");
        Ok(entries)
    }
}
