// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PCK certificate chain handling and quote registration.
//!
//! Registering a quote on chain needs the CRLs of every certificate in its
//! chain stored as blobs first. The CRL locations come from the CRL
//! distribution points extension of each certificate.

use std::collections::BTreeMap;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::oid_registry::OID_X509_EXT_CRL_DISTRIBUTION_POINTS;
use x509_parser::prelude::{parse_x509_certificate, X509Certificate};

use super::quote::Quote;
use super::QuoteError;

/// Intel SGX extensions carried by PCK certificates.
pub const OID_SGX_EXTENSIONS: &str = "1.2.840.113741.1.13.1";

const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Decode a PEM chain into DER certificates, in order.
///
/// Non-certificate blocks are skipped; trailing NUL padding is tolerated.
pub fn parse_pem_chain(pem_chain: &[u8]) -> Result<Vec<Vec<u8>>, QuoteError> {
    let end = pem_chain
        .iter()
        .rposition(|b| *b != 0)
        .map_or(0, |i| i + 1);
    let blocks = pem::parse_many(&pem_chain[..end]).map_err(|e| QuoteError::Pem(e.to_string()))?;
    Ok(blocks
        .into_iter()
        .filter(|block| block.tag() == CERTIFICATE_TAG)
        .map(|block| block.into_contents())
        .collect())
}

fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>, QuoteError> {
    let (_, cert) = parse_x509_certificate(der)
        .map_err(|e| QuoteError::Certificate(format!("invalid DER: {e}")))?;
    Ok(cert)
}

/// Subject of a DER certificate, for logs.
pub fn subject(der: &[u8]) -> Result<String, QuoteError> {
    Ok(parse_certificate(der)?.subject().to_string())
}

/// Raw value of the extension identified by a dotted OID, if present.
pub fn extension_value(der: &[u8], oid: &str) -> Result<Option<Vec<u8>>, QuoteError> {
    let cert = parse_certificate(der)?;
    Ok(cert
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == oid)
        .map(|ext| ext.value.to_vec()))
}

/// URIs listed in a certificate's CRL distribution points.
pub fn crl_distribution_points(der: &[u8]) -> Result<Vec<String>, QuoteError> {
    let cert = parse_certificate(der)?;
    let Some(ext) = cert
        .tbs_certificate
        .get_extension_unique(&OID_X509_EXT_CRL_DISTRIBUTION_POINTS)
        .map_err(|e| QuoteError::Certificate(e.to_string()))?
    else {
        return Ok(Vec::new());
    };

    let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() else {
        return Err(QuoteError::Certificate(
            "unparseable CRL distribution points".to_string(),
        ));
    };

    let mut urls = Vec::new();
    for point in points.points.iter() {
        let Some(DistributionPointName::FullName(names)) = &point.distribution_point else {
            continue;
        };
        for name in names {
            if let GeneralName::URI(uri) = name {
                if !uri.is_empty() {
                    urls.push(uri.to_string());
                }
            }
        }
    }
    Ok(urls)
}

/// Every CRL URL across a chain, first occurrence wins.
pub fn chain_crl_urls(chain: &[Vec<u8>]) -> Result<Vec<String>, QuoteError> {
    let mut urls: Vec<String> = Vec::new();
    for der in chain {
        for url in crl_distribution_points(der)? {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    Ok(urls)
}

/// Ledger key of a stored CRL: `crl:<base58(sha256(crl))>`.
pub fn crl_blob_key(crl: &[u8]) -> String {
    format!("crl:{}", bs58::encode(Sha256::digest(crl)).into_string())
}

/// Download every CRL. Any failure aborts the whole fetch.
pub async fn fetch_crls(http: &Client, urls: &[String]) -> Result<Vec<Vec<u8>>, QuoteError> {
    let mut crls = Vec::with_capacity(urls.len());
    for url in urls {
        let response = http
            .get(url)
            .send()
            .await
            .map_err(|e| QuoteError::CrlFetch(format!("GET {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(QuoteError::CrlFetch(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| QuoteError::CrlFetch(format!("GET {url} body: {e}")))?;
        debug!(url = %url, size = body.len(), "Fetched CRL");
        crls.push(body.to_vec());
    }
    Ok(crls)
}

/// Arguments of the quote `register` call plus the CRL blobs it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRegistration {
    /// Header and body.
    pub signed_region: Vec<u8>,
    pub signature: Vec<u8>,
    pub attestation_key: Vec<u8>,
    pub qe_report: Vec<u8>,
    pub qe_report_signature: Vec<u8>,
    pub auth_data: Vec<u8>,
    /// DER chain without the root, which the verifier already pins.
    pub chain: Vec<Vec<u8>>,
    pub submitter: Vec<u8>,
    pub crl_blobs: BTreeMap<String, Vec<u8>>,
}

impl QuoteRegistration {
    /// Assemble a registration from a quote and already fetched CRLs.
    pub fn new(quote: &Quote, submitter: Vec<u8>, crls: Vec<Vec<u8>>) -> Result<Self, QuoteError> {
        let cert = &quote.signature.certification;
        let mut chain = parse_pem_chain(&cert.pem_chain)?;
        if chain.is_empty() {
            return Err(QuoteError::Certificate("empty certificate chain".to_string()));
        }
        chain.pop();

        let crl_blobs = crls
            .into_iter()
            .map(|crl| (crl_blob_key(&crl), crl))
            .collect();

        Ok(Self {
            signed_region: quote.signed_region(),
            signature: quote.signature.signature.to_vec(),
            attestation_key: quote.signature.attestation_key.to_vec(),
            qe_report: cert.report.to_bytes().to_vec(),
            qe_report_signature: cert.report_signature.to_vec(),
            auth_data: cert.auth_data.clone(),
            chain,
            submitter,
            crl_blobs,
        })
    }

    /// Fetch the chain's CRLs and assemble the registration.
    pub async fn prepare(
        http: &Client,
        quote: &Quote,
        submitter: Vec<u8>,
    ) -> Result<Self, QuoteError> {
        let chain = parse_pem_chain(&quote.signature.certification.pem_chain)?;
        let urls = chain_crl_urls(&chain)?;
        let crls = fetch_crls(http, &urls).await?;
        info!(
            certificates = chain.len(),
            crls = crls.len(),
            oracle_id = %alloy::hex::encode(quote.body.measurement_id()),
            "Prepared quote registration"
        );
        Self::new(quote, submitter, crls)
    }

    pub fn crl_keys(&self) -> Vec<String> {
        self.crl_blobs.keys().cloned().collect()
    }
}
