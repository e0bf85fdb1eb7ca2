// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::fmt;

use crate::error::{ProtocolError, ProtocolResult};

/// Length of a raw ledger address.
pub const ADDRESS_LEN: usize = 26;

/// A pool: the ledger address of its contract plus an id suffix.
///
/// Private pools use `owner ∥ id`, attested pools `quotesAddress ∥ oracleId`.
/// An empty suffix is the default pool of that address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullPoolId {
    pub address: String,
    pub id: Vec<u8>,
}

impl FullPoolId {
    pub fn new(address: impl Into<String>, id: Vec<u8>) -> Self {
        Self {
            address: address.into(),
            id,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() < ADDRESS_LEN {
            return Err(ProtocolError::malformed(format!(
                "pool id of {} bytes is shorter than an address",
                bytes.len()
            )));
        }
        let (address, id) = bytes.split_at(ADDRESS_LEN);
        Ok(Self::new(bs58::encode(address).into_string(), id.to_vec()))
    }

    /// Parse the base58 form used as the first segment of request keys.
    pub fn from_base58(text: &str) -> ProtocolResult<Self> {
        let raw = bs58::decode(text)
            .into_vec()
            .map_err(|e| ProtocolError::malformed(format!("pool `{text}`: {e}")))?;
        Self::from_bytes(&raw)
    }

    pub fn address_bytes(&self) -> ProtocolResult<Vec<u8>> {
        let raw = bs58::decode(&self.address)
            .into_vec()
            .map_err(|e| ProtocolError::malformed(format!("address `{}`: {e}", self.address)))?;
        if raw.len() != ADDRESS_LEN {
            return Err(ProtocolError::malformed(format!(
                "address `{}` decodes to {} bytes",
                self.address,
                raw.len()
            )));
        }
        Ok(raw)
    }

    pub fn to_bytes(&self) -> ProtocolResult<Vec<u8>> {
        let mut raw = self.address_bytes()?;
        raw.extend_from_slice(&self.id);
        Ok(raw)
    }

    /// Hex id suffix, or `Default` for the address's default pool.
    pub fn format_id(&self) -> String {
        if self.id.is_empty() {
            "Default".to_string()
        } else {
            alloy::hex::encode(&self.id)
        }
    }
}

impl fmt::Display for FullPoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.format_id())
    }
}
