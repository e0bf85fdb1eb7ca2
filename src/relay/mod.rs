// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay matching engine
//!
//! A pending request moves through:
//!
//! ```text
//! Pending -> Eligible -> Dispatched -> Fulfilled
//!                                   \-> Failed (still Pending next pass)
//! Pending -> Recyclable (now >= before, recycled by an operator)
//! ```
//!
//! Eligibility is recomputed from ledger state on every pass, so the engine
//! keeps no state that matters for correctness.

pub mod eligibility;
pub mod engine;
pub mod poller;
pub mod settled;

pub use eligibility::{Eligibility, IneligibleReason, RelayPolicy, SUBMISSION_FEE};
pub use engine::{Outcome, PassReport, RelayEngine, RequestOutcome, SkipReason};
pub use poller::RelayPoller;
pub use settled::SettledCache;

use crate::config::ConfigError;
use crate::error::ProtocolError;
use crate::ledger::LedgerError;
use crate::oracle::OracleError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Oracle query failed: {0}")]
    OracleUnreachable(#[from] OracleError),

    #[error("Settlement rejected: {0}")]
    SettlementRejected(LedgerError),

    #[error("Ledger read failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RelayError {
    /// Short machine-readable code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::OracleUnreachable(_) => "oracle_unreachable",
            RelayError::SettlementRejected(_) => "settlement_rejected",
            RelayError::Ledger(LedgerError::Protocol(e)) | RelayError::Protocol(e) => e.code(),
            RelayError::Ledger(_) => "ledger",
            RelayError::Config(_) => "config",
        }
    }
}
