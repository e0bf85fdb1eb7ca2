// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed oracle results.

use alloy::primitives::{keccak256, B256};

use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::{ProtocolError, ProtocolResult};
use crate::models::action::ActionId;

/// Length of a recoverable `r ∥ s ∥ v` signature.
pub const SIGNATURE_LEN: usize = 65;

/// One oracle result. `error == 0` means success; otherwise `value` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub timestamp: i64,
    pub error: i64,
    pub value: Vec<u8>,
}

impl DataItem {
    pub fn success(timestamp: i64, value: Vec<u8>) -> Self {
        Self {
            timestamp,
            error: 0,
            value,
        }
    }

    pub fn failure(timestamp: i64, error: i64) -> Self {
        Self {
            timestamp,
            error,
            value: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error == 0
    }
}

impl Encode for DataItem {
    fn encode_to(&self, w: &mut Writer) {
        w.i64(self.timestamp).i64(self.error).bytes(&self.value);
    }
}

impl Decode for DataItem {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        let item = Self {
            timestamp: r.i64()?,
            error: r.i64()?,
            value: r.bytes()?,
        };
        if item.error != 0 && !item.value.is_empty() {
            return Err(ProtocolError::malformed(format!(
                "data item with error {} carries a value",
                item.error
            )));
        }
        Ok(item)
    }
}

/// What an oracle commits to: a result for one action, addressed to one relayer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleMessage {
    pub action_id: ActionId,
    pub data_item: DataItem,
    pub relayer: Vec<u8>,
}

impl OracleMessage {
    /// Digest the oracle signs.
    pub fn digest(&self) -> B256 {
        keccak256(self.encode())
    }
}

impl Encode for OracleMessage {
    fn encode_to(&self, w: &mut Writer) {
        w.bytes(self.action_id.as_bytes()).bytes(&self.relayer);
        self.data_item.encode_to(w);
    }
}

impl Decode for OracleMessage {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        let action_id = ActionId::from_slice(&r.bytes()?)?;
        let relayer = r.bytes()?;
        Ok(Self {
            action_id,
            data_item: r.decode()?,
            relayer,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResponse {
    pub message: OracleMessage,
    pub signature: Vec<u8>,
}

impl Encode for OracleResponse {
    fn encode_to(&self, w: &mut Writer) {
        self.message.encode_to(w);
        w.bytes(&self.signature);
    }
}

impl Decode for OracleResponse {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        Ok(Self {
            message: r.decode()?,
            signature: r.bytes()?,
        })
    }
}
