// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Binary TDX v4 quote layout.
//!
//! All integers are little-endian. Header, body and QE report are fixed-size
//! blocks read by offset; the signature section is length-prefixed:
//!
//! ```text
//! header(48) ∥ body(584) ∥ u32 sigLen ∥ signatureData(sigLen)
//!
//! signatureData = signature(64) ∥ attestationKey(64)
//!               ∥ u16 certType(=6) ∥ u32 certLen ∥ qeCertificationData(certLen)
//!
//! qeCertificationData = qeReport(384) ∥ qeReportSignature(64)
//!                     ∥ u16 authLen ∥ authData
//!                     ∥ u16 chainType ∥ u32 chainLen ∥ pemChain
//! ```

use k256::PublicKey;
use sha2::{Digest, Sha256};

use super::QuoteError;
use crate::crypto::{parse_public_key, CryptoError};

pub const QUOTE_VERSION: u16 = 4;
pub const HEADER_LEN: usize = 48;
pub const BODY_LEN: usize = 584;
pub const QE_REPORT_LEN: usize = 384;
pub const SIGNATURE_LEN: usize = 64;

/// Certification data carrying a QE report (the only type TDX quotes use).
pub const CERT_TYPE_QE_REPORT: u16 = 6;
/// Inner certification data: PCK leaf, intermediate and root, PEM encoded.
pub const CERT_TYPE_PCK_CHAIN: u16 = 5;

/// Body bytes covered by the oracle id: everything except report data.
const MEASURED_LEN: usize = 520;

fn ensure(section: &'static str, buf: &[u8], needed: usize) -> Result<(), QuoteError> {
    if buf.len() < needed {
        return Err(QuoteError::Truncated {
            section,
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

// Callers check the length first.
fn array<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

fn put(out: &mut [u8], at: usize, bytes: &[u8]) {
    out[at..at + bytes.len()].copy_from_slice(bytes);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteHeader {
    pub version: u16,
    pub attestation_key_type: u16,
    pub tee_type: u32,
    pub reserved: [u8; 4],
    pub qe_vendor_id: [u8; 16],
    pub user_data: [u8; 20],
}

impl QuoteHeader {
    /// Read the header from the first 48 bytes of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, QuoteError> {
        ensure("quote header", buf, HEADER_LEN)?;
        Ok(Self {
            version: u16::from_le_bytes(array(buf, 0)),
            attestation_key_type: u16::from_le_bytes(array(buf, 2)),
            tee_type: u32::from_le_bytes(array(buf, 4)),
            reserved: array(buf, 8),
            qe_vendor_id: array(buf, 12),
            user_data: array(buf, 28),
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        put(&mut out, 0, &self.version.to_le_bytes());
        put(&mut out, 2, &self.attestation_key_type.to_le_bytes());
        put(&mut out, 4, &self.tee_type.to_le_bytes());
        put(&mut out, 8, &self.reserved);
        put(&mut out, 12, &self.qe_vendor_id);
        put(&mut out, 28, &self.user_data);
        out
    }
}

/// TD report body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBody {
    pub tcb_svn: [u8; 16],
    pub mr_seam: [u8; 48],
    pub mr_signer_seam: [u8; 48],
    pub seam_attributes: [u8; 8],
    pub td_attributes: [u8; 8],
    pub xfam: [u8; 8],
    pub mr_td: [u8; 48],
    pub mr_config_id: [u8; 48],
    pub mr_owner: [u8; 48],
    pub mr_owner_config: [u8; 48],
    pub rtmr: [[u8; 48]; 4],
    /// By convention the oracle's raw secp256k1 public key (`x ∥ y`).
    pub report_data: [u8; 64],
}

impl QuoteBody {
    pub fn from_bytes(buf: &[u8]) -> Result<Self, QuoteError> {
        ensure("quote body", buf, BODY_LEN)?;
        Ok(Self {
            tcb_svn: array(buf, 0),
            mr_seam: array(buf, 16),
            mr_signer_seam: array(buf, 64),
            seam_attributes: array(buf, 112),
            td_attributes: array(buf, 120),
            xfam: array(buf, 128),
            mr_td: array(buf, 136),
            mr_config_id: array(buf, 184),
            mr_owner: array(buf, 232),
            mr_owner_config: array(buf, 280),
            rtmr: [
                array(buf, 328),
                array(buf, 376),
                array(buf, 424),
                array(buf, 472),
            ],
            report_data: array(buf, 520),
        })
    }

    pub fn to_bytes(&self) -> [u8; BODY_LEN] {
        let mut out = [0u8; BODY_LEN];
        put(&mut out, 0, &self.tcb_svn);
        put(&mut out, 16, &self.mr_seam);
        put(&mut out, 64, &self.mr_signer_seam);
        put(&mut out, 112, &self.seam_attributes);
        put(&mut out, 120, &self.td_attributes);
        put(&mut out, 128, &self.xfam);
        put(&mut out, 136, &self.mr_td);
        put(&mut out, 184, &self.mr_config_id);
        put(&mut out, 232, &self.mr_owner);
        put(&mut out, 280, &self.mr_owner_config);
        for (i, rtmr) in self.rtmr.iter().enumerate() {
            put(&mut out, 328 + i * 48, rtmr);
        }
        put(&mut out, 520, &self.report_data);
        out
    }

    /// Oracle id in an attested pool: SHA-256 of the body without report data.
    pub fn measurement_id(&self) -> [u8; 32] {
        let body = self.to_bytes();
        Sha256::digest(&body[..MEASURED_LEN]).into()
    }

    /// Oracle id in a whitelisted attested pool, bound to the quotes contract.
    pub fn measurement_id_for(&self, quotes_address: &[u8]) -> [u8; 32] {
        let body = self.to_bytes();
        let mut hasher = Sha256::new();
        hasher.update(quotes_address);
        hasher.update(&body[..MEASURED_LEN]);
        hasher.finalize().into()
    }

    /// The public key committed in report data.
    pub fn oracle_public_key(&self) -> Result<PublicKey, CryptoError> {
        parse_public_key(&self.report_data)
    }
}

/// SGX report of the quoting enclave.
///
/// Reserved regions are not modelled and serialize as zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QeReport {
    pub cpu_svn: [u8; 16],
    pub misc_select: u32,
    pub isv_ext_prod_id: [u8; 16],
    pub attributes: [u8; 16],
    pub mr_enclave: [u8; 32],
    pub mr_signer: [u8; 32],
    pub config_id: [u8; 64],
    pub isv_prod_id: u16,
    pub isv_svn: u16,
    pub config_svn: u16,
    pub isv_family_id: [u8; 16],
    pub report_data: [u8; 64],
}

impl QeReport {
    pub fn from_bytes(buf: &[u8]) -> Result<Self, QuoteError> {
        ensure("QE report", buf, QE_REPORT_LEN)?;
        Ok(Self {
            cpu_svn: array(buf, 0),
            misc_select: u32::from_le_bytes(array(buf, 16)),
            isv_ext_prod_id: array(buf, 32),
            attributes: array(buf, 48),
            mr_enclave: array(buf, 64),
            mr_signer: array(buf, 128),
            config_id: array(buf, 192),
            isv_prod_id: u16::from_le_bytes(array(buf, 256)),
            isv_svn: u16::from_le_bytes(array(buf, 258)),
            config_svn: u16::from_le_bytes(array(buf, 260)),
            isv_family_id: array(buf, 304),
            report_data: array(buf, 320),
        })
    }

    pub fn to_bytes(&self) -> [u8; QE_REPORT_LEN] {
        let mut out = [0u8; QE_REPORT_LEN];
        put(&mut out, 0, &self.cpu_svn);
        put(&mut out, 16, &self.misc_select.to_le_bytes());
        put(&mut out, 32, &self.isv_ext_prod_id);
        put(&mut out, 48, &self.attributes);
        put(&mut out, 64, &self.mr_enclave);
        put(&mut out, 128, &self.mr_signer);
        put(&mut out, 192, &self.config_id);
        put(&mut out, 256, &self.isv_prod_id.to_le_bytes());
        put(&mut out, 258, &self.isv_svn.to_le_bytes());
        put(&mut out, 260, &self.config_svn.to_le_bytes());
        put(&mut out, 304, &self.isv_family_id);
        put(&mut out, 320, &self.report_data);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QeCertificationData {
    /// Outer certification data type, always [`CERT_TYPE_QE_REPORT`].
    pub certification_type: u16,
    pub report: QeReport,
    pub report_signature: [u8; SIGNATURE_LEN],
    pub auth_data: Vec<u8>,
    /// Inner certification data type, normally [`CERT_TYPE_PCK_CHAIN`].
    pub chain_type: u16,
    /// PEM-encoded certificate chain, leaf first.
    pub pem_chain: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSignatureData {
    /// ECDSA P-256 `r ∥ s` over header and body.
    pub signature: [u8; SIGNATURE_LEN],
    /// Attestation public key `x ∥ y`.
    pub attestation_key: [u8; 64],
    pub certification: QeCertificationData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub header: QuoteHeader,
    pub body: QuoteBody,
    pub signature: QuoteSignatureData,
}

/// Little-endian cursor over one length-delimited section.
struct Section<'a> {
    name: &'static str,
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, buf: &'a [u8]) -> Self {
        Self {
            name,
            buf,
            offset: 0,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], QuoteError> {
        let available = self.buf.len() - self.offset;
        if len > available {
            return Err(QuoteError::Truncated {
                section: self.name,
                needed: len,
                available,
            });
        }
        let out = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(out)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], QuoteError> {
        Ok(array(self.take(N)?, 0))
    }

    fn u16(&mut self) -> Result<u16, QuoteError> {
        Ok(u16::from_le_bytes(self.fixed()?))
    }

    fn u32(&mut self) -> Result<u32, QuoteError> {
        Ok(u32::from_le_bytes(self.fixed()?))
    }

    fn sized_u16(&mut self) -> Result<&'a [u8], QuoteError> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    fn sized_u32(&mut self) -> Result<&'a [u8], QuoteError> {
        let len = self.u32()? as usize;
        self.take(len)
    }
}

fn len_u16(what: &str, len: usize) -> Result<u16, QuoteError> {
    u16::try_from(len).map_err(|_| QuoteError::InvalidField(format!("{what} too long: {len}")))
}

fn len_u32(what: &str, len: usize) -> Result<u32, QuoteError> {
    u32::try_from(len).map_err(|_| QuoteError::InvalidField(format!("{what} too long: {len}")))
}

impl QeCertificationData {
    fn parse(buf: &[u8]) -> Result<Self, QuoteError> {
        let mut section = Section::new("QE certification data", buf);
        let report = QeReport::from_bytes(section.take(QE_REPORT_LEN)?)?;
        let report_signature = section.fixed()?;
        let auth_data = section.sized_u16()?.to_vec();
        let chain_type = section.u16()?;
        let pem_chain = section.sized_u32()?.to_vec();
        Ok(Self {
            certification_type: CERT_TYPE_QE_REPORT,
            report,
            report_signature,
            auth_data,
            chain_type,
            pem_chain,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<(), QuoteError> {
        out.extend_from_slice(&self.report.to_bytes());
        out.extend_from_slice(&self.report_signature);
        out.extend_from_slice(&len_u16("auth data", self.auth_data.len())?.to_le_bytes());
        out.extend_from_slice(&self.auth_data);
        out.extend_from_slice(&self.chain_type.to_le_bytes());
        out.extend_from_slice(&len_u32("certificate chain", self.pem_chain.len())?.to_le_bytes());
        out.extend_from_slice(&self.pem_chain);
        Ok(())
    }
}

impl Quote {
    /// Parse a complete binary quote.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, QuoteError> {
        let mut outer = Section::new("quote", buf);
        let header = QuoteHeader::from_bytes(outer.take(HEADER_LEN)?)?;
        if header.version != QUOTE_VERSION {
            return Err(QuoteError::UnsupportedVersion(header.version));
        }
        let body = QuoteBody::from_bytes(outer.take(BODY_LEN)?)?;

        let mut sig = Section::new("quote signature data", outer.sized_u32()?);
        let signature = sig.fixed()?;
        let attestation_key = sig.fixed()?;
        let certification_type = sig.u16()?;
        if certification_type != CERT_TYPE_QE_REPORT {
            return Err(QuoteError::UnsupportedCertificationType(certification_type));
        }
        let certification = QeCertificationData::parse(sig.sized_u32()?)?;

        Ok(Self {
            header,
            body,
            signature: QuoteSignatureData {
                signature,
                attestation_key,
                certification,
            },
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, QuoteError> {
        let mut certification = Vec::new();
        self.signature.certification.write(&mut certification)?;

        let mut sig = Vec::with_capacity(2 * SIGNATURE_LEN + 6 + certification.len());
        sig.extend_from_slice(&self.signature.signature);
        sig.extend_from_slice(&self.signature.attestation_key);
        sig.extend_from_slice(&self.signature.certification.certification_type.to_le_bytes());
        sig.extend_from_slice(&len_u32("certification data", certification.len())?.to_le_bytes());
        sig.extend_from_slice(&certification);

        let mut out = self.signed_region();
        out.extend_from_slice(&len_u32("signature data", sig.len())?.to_le_bytes());
        out.extend_from_slice(&sig);
        Ok(out)
    }

    /// Header and body, the bytes covered by the quote signature.
    pub fn signed_region(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + BODY_LEN);
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.body.to_bytes());
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::{generate_secret_key, raw_public_key};

    pub(crate) fn sample_header() -> QuoteHeader {
        QuoteHeader {
            version: QUOTE_VERSION,
            attestation_key_type: 2,
            tee_type: 0x81,
            reserved: [0; 4],
            qe_vendor_id: [0x93; 16],
            user_data: [0x11; 20],
        }
    }

    pub(crate) fn sample_body(report_data: [u8; 64]) -> QuoteBody {
        QuoteBody {
            tcb_svn: [1; 16],
            mr_seam: [2; 48],
            mr_signer_seam: [3; 48],
            seam_attributes: [4; 8],
            td_attributes: [5; 8],
            xfam: [6; 8],
            mr_td: [7; 48],
            mr_config_id: [8; 48],
            mr_owner: [9; 48],
            mr_owner_config: [10; 48],
            rtmr: [[11; 48], [12; 48], [13; 48], [14; 48]],
            report_data,
        }
    }

    pub(crate) fn sample_report() -> QeReport {
        QeReport {
            cpu_svn: [0x21; 16],
            misc_select: 0xdead_beef,
            isv_ext_prod_id: [0; 16],
            attributes: [0x22; 16],
            mr_enclave: [0x23; 32],
            mr_signer: [0x24; 32],
            config_id: [0; 64],
            isv_prod_id: 1,
            isv_svn: 8,
            config_svn: 0,
            isv_family_id: [0; 16],
            report_data: [0x25; 64],
        }
    }

    pub(crate) fn sample_quote(pem_chain: Vec<u8>) -> Quote {
        Quote {
            header: sample_header(),
            body: sample_body([0x42; 64]),
            signature: QuoteSignatureData {
                signature: [0x31; 64],
                attestation_key: [0x32; 64],
                certification: QeCertificationData {
                    certification_type: CERT_TYPE_QE_REPORT,
                    report: sample_report(),
                    report_signature: [0x33; 64],
                    auth_data: vec![0x34; 32],
                    chain_type: CERT_TYPE_PCK_CHAIN,
                    pem_chain,
                },
            },
        }
    }

    #[test]
    fn header_fields_sit_at_fixed_offsets() {
        let bytes = sample_header().to_bytes();
        assert_eq!(&bytes[0..2], &[4, 0]);
        assert_eq!(&bytes[2..4], &[2, 0]);
        assert_eq!(&bytes[4..8], &[0x81, 0, 0, 0]);
        assert_eq!(&bytes[12..28], &[0x93; 16]);
        assert_eq!(&bytes[28..48], &[0x11; 20]);
        assert_eq!(QuoteHeader::from_bytes(&bytes).unwrap(), sample_header());
    }

    #[test]
    fn body_fields_sit_at_fixed_offsets() {
        let body = sample_body([0x42; 64]);
        let bytes = body.to_bytes();
        assert_eq!(bytes[15], 1);
        assert_eq!(bytes[16], 2);
        assert_eq!(bytes[136], 7);
        assert_eq!(bytes[327], 10);
        assert_eq!(bytes[328], 11);
        assert_eq!(bytes[519], 14);
        assert_eq!(&bytes[520..], &[0x42; 64]);
        assert_eq!(QuoteBody::from_bytes(&bytes).unwrap(), body);
    }

    #[test]
    fn qe_report_round_trips_at_documented_offsets() {
        let report = sample_report();
        let bytes = report.to_bytes();
        assert_eq!(&bytes[16..20], &0xdead_beefu32.to_le_bytes());
        assert_eq!(&bytes[48..64], &[0x22; 16]);
        assert_eq!(&bytes[64..96], &[0x23; 32]);
        assert_eq!(&bytes[128..160], &[0x24; 32]);
        assert_eq!(&bytes[256..258], &[1, 0]);
        assert_eq!(&bytes[258..260], &[8, 0]);
        assert_eq!(&bytes[320..384], &[0x25; 64]);
        assert_eq!(QeReport::from_bytes(&bytes).unwrap(), report);
    }

    #[test]
    fn short_buffers_report_truncation() {
        assert!(matches!(
            QuoteHeader::from_bytes(&[0; 47]),
            Err(QuoteError::Truncated { needed: 48, available: 47, .. })
        ));
        assert!(QuoteBody::from_bytes(&[0; 583]).is_err());
        assert!(QeReport::from_bytes(&[0; 100]).is_err());
    }

    #[test]
    fn full_quote_round_trips() {
        let quote = sample_quote(b"-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----\n\0".to_vec());
        let bytes = quote.to_bytes().unwrap();
        assert_eq!(Quote::from_bytes(&bytes).unwrap(), quote);
    }

    #[test]
    fn truncated_quote_names_the_section() {
        let bytes = sample_quote(vec![b'x'; 10]).to_bytes().unwrap();
        let err = Quote::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, QuoteError::Truncated { section: "quote", .. }));
    }

    #[test]
    fn non_qe_certification_type_is_rejected() {
        let mut quote = sample_quote(Vec::new());
        quote.signature.certification.certification_type = 5;
        let bytes = quote.to_bytes().unwrap();
        assert!(matches!(
            Quote::from_bytes(&bytes),
            Err(QuoteError::UnsupportedCertificationType(5))
        ));
    }

    #[test]
    fn other_versions_are_rejected() {
        let mut quote = sample_quote(Vec::new());
        quote.header.version = 5;
        let bytes = quote.to_bytes().unwrap();
        assert!(matches!(
            Quote::from_bytes(&bytes),
            Err(QuoteError::UnsupportedVersion(5))
        ));
    }

    #[test]
    fn identity_excludes_report_data() {
        let a = sample_body([1; 64]);
        let b = sample_body([2; 64]);
        assert_eq!(a.measurement_id(), b.measurement_id());
        assert_ne!(a.measurement_id(), a.measurement_id_for(b"quotes"));
        assert_ne!(a.measurement_id_for(b"quotes"), a.measurement_id_for(b"other"));

        let mut c = sample_body([1; 64]);
        c.rtmr[3][0] ^= 1;
        assert_ne!(a.measurement_id(), c.measurement_id());
    }

    #[test]
    fn report_data_carries_oracle_key() {
        let secret = generate_secret_key();
        let body = sample_body(raw_public_key(&secret.public_key()));
        assert_eq!(body.oracle_public_key().unwrap(), secret.public_key());
        assert!(sample_body([0; 64]).oracle_public_key().is_err());
    }
}
