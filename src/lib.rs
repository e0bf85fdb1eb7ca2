// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Oracle Relay - encrypted oracle actions for TDX-attested oracles
//!
//! A client builds an HTTP-shaped action, encrypts its private fields for one
//! oracle and proves it. The action is stored on chain as a pending request;
//! the relay finds it, asks an eligible oracle for a signed result and hands
//! the result to settlement.
//!
//! ## Modules
//!
//! - `codec` - Canonical length-prefixed binary encoding
//! - `crypto` - ECDH + HKDF + AES-GCM field encryption
//! - `models` - Actions, patches, proofs, oracle results, pool ids
//! - `attestation` - TDX quote layout, JSON form, PCK chain and CRLs
//! - `oracle` - Oracle HTTP client and an in-process simulated oracle
//! - `ledger` - Ledger data reading and settlement directives
//! - `relay` - Relay matching engine and poller
//! - `config` - Environment and network configuration

pub mod attestation;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod models;
pub mod oracle;
pub mod relay;
