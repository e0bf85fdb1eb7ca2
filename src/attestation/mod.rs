// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # TDX attestation quotes
//!
//! Fixed-offset binary model of a TDX v4 quote, the JSON form served by an
//! oracle's `/quote` endpoint, and the certificate-chain helpers needed to
//! register a quote on chain.
//!
//! Nothing here verifies signatures. The model exposes structure to a
//! verifier and derives the oracle identity and public key from the body.

pub mod certs;
pub mod json;
pub mod quote;

pub use certs::{crl_blob_key, parse_pem_chain, QuoteRegistration};
pub use json::JsonQuote;
pub use quote::{QeCertificationData, QeReport, Quote, QuoteBody, QuoteHeader, QuoteSignatureData};

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("Truncated {section}: need {needed} bytes, have {available}")]
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Unsupported quote version {0}")]
    UnsupportedVersion(u16),

    #[error("Unsupported certification data type {0}")]
    UnsupportedCertificationType(u16),

    #[error("Invalid quote field: {0}")]
    InvalidField(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("PEM error: {0}")]
    Pem(String),

    #[error("CRL fetch failed: {0}")]
    CrlFetch(String),
}
