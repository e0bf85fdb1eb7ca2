// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON quote served by an oracle's `/quote` endpoint. Byte fields are base64.

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

use super::quote::{QeCertificationData, QeReport, Quote, QuoteBody, QuoteHeader, QuoteSignatureData};
use super::QuoteError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonQuote {
    pub quote_header: JsonQuoteHeader,
    pub td_quote_body: JsonQuoteBody,
    pub quote_signature_data: JsonSignatureData,
    #[serde(default)]
    pub quote_signature_data_len: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonQuoteHeader {
    pub version: u16,
    pub attestation_key_type: u16,
    pub tee_type: u32,
    pub qe_vendor_id: String,
    pub user_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonQuoteBody {
    pub tcb_svn: String,
    pub mrseam: String,
    pub mrsignerseam: String,
    pub seamattributes: String,
    pub tdattributes: String,
    pub xfam: String,
    pub mrtd: String,
    pub mrconfigid: String,
    pub mrowner: String,
    pub mrownerconfig: String,
    pub rtmr0: String,
    pub rtmr1: String,
    pub rtmr2: String,
    pub rtmr3: String,
    pub reportdata: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEcdsaSignature {
    pub r: String,
    pub s: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonPoint {
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSignatureData {
    pub quote_signature: JsonEcdsaSignature,
    pub ecdsa_attestation_key: JsonPoint,
    pub qe_certification_data: JsonOuterCertification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOuterCertification {
    pub certification_data_type: u16,
    #[serde(default)]
    pub size: u32,
    pub certification_data: JsonQeCertification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonQeCertification {
    pub qe_report: JsonQeReport,
    pub qe_report_signature: JsonEcdsaSignature,
    pub qe_authentication_data: JsonSizedData,
    pub qe_certification_data: JsonInnerCertification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSizedData {
    pub data: String,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonInnerCertification {
    pub certification_data_type: u16,
    /// Base64 of the PEM chain text.
    pub certification_data: String,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonQeReport {
    pub cpu_svn: String,
    pub miscselect: u32,
    pub attributes: String,
    pub mrenclave: String,
    pub mrsigner: String,
    #[serde(rename = "isv_prodID")]
    pub isv_prod_id: u16,
    pub isv_svn: u16,
    pub report_data: String,
}

fn b64(field: &str, text: &str) -> Result<Vec<u8>, QuoteError> {
    Base64::decode_vec(text).map_err(|e| QuoteError::InvalidField(format!("{field}: {e}")))
}

fn fixed<const N: usize>(field: &str, text: &str) -> Result<[u8; N], QuoteError> {
    let raw = b64(field, text)?;
    raw.as_slice().try_into().map_err(|_| {
        QuoteError::InvalidField(format!("{field}: expected {N} bytes, got {}", raw.len()))
    })
}

fn pair<const N: usize>(field: &str, a: &str, b: &str) -> Result<[u8; N], QuoteError> {
    let mut raw = b64(field, a)?;
    raw.extend(b64(field, b)?);
    raw.as_slice().try_into().map_err(|_| {
        QuoteError::InvalidField(format!("{field}: expected {N} bytes, got {}", raw.len()))
    })
}

fn enc(bytes: &[u8]) -> String {
    Base64::encode_string(bytes)
}

fn signature(bytes: &[u8; 64]) -> JsonEcdsaSignature {
    JsonEcdsaSignature {
        r: enc(&bytes[..32]),
        s: enc(&bytes[32..]),
    }
}

impl TryFrom<JsonQuote> for Quote {
    type Error = QuoteError;

    fn try_from(json: JsonQuote) -> Result<Self, Self::Error> {
        let h = &json.quote_header;
        let header = QuoteHeader {
            version: h.version,
            attestation_key_type: h.attestation_key_type,
            tee_type: h.tee_type,
            reserved: [0; 4],
            qe_vendor_id: fixed("qe_vendor_id", &h.qe_vendor_id)?,
            user_data: fixed("user_data", &h.user_data)?,
        };

        let b = &json.td_quote_body;
        let body = QuoteBody {
            tcb_svn: fixed("tcb_svn", &b.tcb_svn)?,
            mr_seam: fixed("mrseam", &b.mrseam)?,
            mr_signer_seam: fixed("mrsignerseam", &b.mrsignerseam)?,
            seam_attributes: fixed("seamattributes", &b.seamattributes)?,
            td_attributes: fixed("tdattributes", &b.tdattributes)?,
            xfam: fixed("xfam", &b.xfam)?,
            mr_td: fixed("mrtd", &b.mrtd)?,
            mr_config_id: fixed("mrconfigid", &b.mrconfigid)?,
            mr_owner: fixed("mrowner", &b.mrowner)?,
            mr_owner_config: fixed("mrownerconfig", &b.mrownerconfig)?,
            rtmr: [
                fixed("rtmr0", &b.rtmr0)?,
                fixed("rtmr1", &b.rtmr1)?,
                fixed("rtmr2", &b.rtmr2)?,
                fixed("rtmr3", &b.rtmr3)?,
            ],
            report_data: fixed("reportdata", &b.reportdata)?,
        };

        let s = &json.quote_signature_data;
        let outer = &s.qe_certification_data;
        let qe = &outer.certification_data;
        let r = &qe.qe_report;
        let report = QeReport {
            cpu_svn: fixed("cpu_svn", &r.cpu_svn)?,
            misc_select: r.miscselect,
            isv_ext_prod_id: [0; 16],
            attributes: fixed("attributes", &r.attributes)?,
            mr_enclave: fixed("mrenclave", &r.mrenclave)?,
            mr_signer: fixed("mrsigner", &r.mrsigner)?,
            config_id: [0; 64],
            isv_prod_id: r.isv_prod_id,
            isv_svn: r.isv_svn,
            config_svn: 0,
            isv_family_id: [0; 16],
            report_data: fixed("qe report_data", &r.report_data)?,
        };

        Ok(Quote {
            header,
            body,
            signature: QuoteSignatureData {
                signature: pair("quote_signature", &s.quote_signature.r, &s.quote_signature.s)?,
                attestation_key: pair(
                    "ecdsa_attestation_key",
                    &s.ecdsa_attestation_key.x,
                    &s.ecdsa_attestation_key.y,
                )?,
                certification: QeCertificationData {
                    certification_type: outer.certification_data_type,
                    report,
                    report_signature: pair(
                        "qe_report_signature",
                        &qe.qe_report_signature.r,
                        &qe.qe_report_signature.s,
                    )?,
                    auth_data: b64("qe_authentication_data", &qe.qe_authentication_data.data)?,
                    chain_type: qe.qe_certification_data.certification_data_type,
                    pem_chain: b64(
                        "certification_data",
                        &qe.qe_certification_data.certification_data,
                    )?,
                },
            },
        })
    }
}

impl From<&Quote> for JsonQuote {
    fn from(quote: &Quote) -> Self {
        let h = &quote.header;
        let b = &quote.body;
        let sig = &quote.signature;
        let cert = &sig.certification;
        let r = &cert.report;

        JsonQuote {
            quote_header: JsonQuoteHeader {
                version: h.version,
                attestation_key_type: h.attestation_key_type,
                tee_type: h.tee_type,
                qe_vendor_id: enc(&h.qe_vendor_id),
                user_data: enc(&h.user_data),
            },
            td_quote_body: JsonQuoteBody {
                tcb_svn: enc(&b.tcb_svn),
                mrseam: enc(&b.mr_seam),
                mrsignerseam: enc(&b.mr_signer_seam),
                seamattributes: enc(&b.seam_attributes),
                tdattributes: enc(&b.td_attributes),
                xfam: enc(&b.xfam),
                mrtd: enc(&b.mr_td),
                mrconfigid: enc(&b.mr_config_id),
                mrowner: enc(&b.mr_owner),
                mrownerconfig: enc(&b.mr_owner_config),
                rtmr0: enc(&b.rtmr[0]),
                rtmr1: enc(&b.rtmr[1]),
                rtmr2: enc(&b.rtmr[2]),
                rtmr3: enc(&b.rtmr[3]),
                reportdata: enc(&b.report_data),
            },
            quote_signature_data: JsonSignatureData {
                quote_signature: signature(&sig.signature),
                ecdsa_attestation_key: JsonPoint {
                    x: enc(&sig.attestation_key[..32]),
                    y: enc(&sig.attestation_key[32..]),
                },
                qe_certification_data: JsonOuterCertification {
                    certification_data_type: cert.certification_type,
                    size: 0,
                    certification_data: JsonQeCertification {
                        qe_report: JsonQeReport {
                            cpu_svn: enc(&r.cpu_svn),
                            miscselect: r.misc_select,
                            attributes: enc(&r.attributes),
                            mrenclave: enc(&r.mr_enclave),
                            mrsigner: enc(&r.mr_signer),
                            isv_prod_id: r.isv_prod_id,
                            isv_svn: r.isv_svn,
                            report_data: enc(&r.report_data),
                        },
                        qe_report_signature: signature(&cert.report_signature),
                        qe_authentication_data: JsonSizedData {
                            data: enc(&cert.auth_data),
                            size: cert.auth_data.len() as u32,
                        },
                        qe_certification_data: JsonInnerCertification {
                            certification_data_type: cert.chain_type,
                            certification_data: enc(&cert.pem_chain),
                            size: cert.pem_chain.len() as u32,
                        },
                    },
                },
            },
            quote_signature_data_len: 0,
        }
    }
}
