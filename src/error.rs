// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Protocol-level errors shared by the codec, the action model and the
//! field encryption engine.
//!
//! Every variant here is fatal to the single action, proof or relay item being
//! processed. None of them abort a whole relay pass; the engine catches them
//! per request and logs a skip reason.

use crate::crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Truncated, over-length or otherwise undecodable buffer.
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    /// Recomputed action ID disagrees with the one it was referenced by.
    #[error("Action ID mismatch: expected {expected}, computed {actual}")]
    ActionIdMismatch { expected: String, actual: String },

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid header `{0}`: expected `key:value`")]
    InvalidHeader(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Crypto failure: {0}")]
    Crypto(#[from] CryptoError),
}

impl ProtocolError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEncoding(message.into())
    }

    /// Short machine-readable code used in skip-with-reason log lines.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::MalformedEncoding(_) => "malformed_encoding",
            ProtocolError::ActionIdMismatch { .. } => "action_id_mismatch",
            ProtocolError::UnsupportedMethod(_) => "unsupported_method",
            ProtocolError::InvalidHeader(_) => "invalid_header",
            ProtocolError::InvalidUrl(_) => "invalid_url",
            ProtocolError::Crypto(_) => "crypto_failure",
        }
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
