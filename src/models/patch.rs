// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Private patch: request fields hidden from public view.
//!
//! A [`PrivatePatch`] is what the caller writes; an [`EncryptedPatch`] is what
//! goes on chain. Header and parameter keys stay in the clear, values are
//! encrypted one by one, each under its own nonce.

use k256::{PublicKey, SecretKey};
use url::Url;

use crate::codec::{Decode, Encode, Reader, Writer};
use crate::crypto::{CryptoError, FieldCipher};
use crate::error::{ProtocolError, ProtocolResult};
use crate::models::http::{parse_headers, query_parameters, QueryParameter, RequestHeader};

/// Identity that lets any oracle serve an action.
pub const ANY_ORACLE: &str = "0x0000000000000000000000000000000000000000";

const SUFFIX_BASE: &str = "https://placeholder";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivatePatch {
    pub path_suffix: Option<String>,
    pub headers: Vec<RequestHeader>,
    pub parameters: Vec<QueryParameter>,
    pub body: Option<String>,
}

impl PrivatePatch {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a patch from a URL suffix, `key:value` headers and a body.
    ///
    /// A suffix starting with `?` only carries query parameters. Anything else
    /// is resolved like a relative URL; the resulting path keeps its leading
    /// `/` only if the caller wrote one, so `v3/price` appends to the base
    /// path while `/v3/price` stays absolute.
    pub fn from_parts<S: AsRef<str>>(
        url_suffix: Option<&str>,
        headers: &[S],
        body: Option<&str>,
    ) -> ProtocolResult<Self> {
        let headers = parse_headers(headers)?;
        let mut path_suffix = None;
        let mut parameters = Vec::new();

        if let Some(suffix) = url_suffix.filter(|s| !s.is_empty()) {
            let parsed = Url::parse(SUFFIX_BASE)
                .and_then(|base| base.join(suffix))
                .map_err(|e| ProtocolError::InvalidUrl(format!("{suffix}: {e}")))?;
            parameters = query_parameters(&parsed);

            if !suffix.starts_with('?') {
                let path = parsed.path();
                let path = match path.strip_prefix('/') {
                    Some(stripped) if !suffix.starts_with('/') => stripped,
                    _ => path,
                };
                if !path.is_empty() {
                    path_suffix = Some(path.to_string());
                }
            }
        }

        Ok(Self {
            path_suffix,
            headers,
            parameters,
            body: body.filter(|b| !b.is_empty()).map(str::to_string),
        })
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.path_suffix.is_none()
            && self.headers.is_empty()
            && self.parameters.is_empty()
            && self.body.is_none()
    }

    /// Encrypt every present field for the oracle behind `cipher`.
    pub fn encrypt(
        &self,
        cipher: &FieldCipher,
        oracle_identity: &str,
    ) -> Result<EncryptedPatch, CryptoError> {
        let seal_opt = |value: &Option<String>| -> Result<Option<Vec<u8>>, CryptoError> {
            value.as_deref().map(|v| cipher.seal(v.as_bytes())).transpose()
        };

        let headers = self
            .headers
            .iter()
            .map(|h| -> Result<HeaderPatch, CryptoError> {
                Ok(HeaderPatch::new(&h.key, cipher.seal(h.value.as_bytes())?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let parameters = self
            .parameters
            .iter()
            .map(|p| -> Result<ParameterPatch, CryptoError> {
                Ok(ParameterPatch::new(&p.key, cipher.seal(p.value.as_bytes())?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EncryptedPatch {
            path_suffix: seal_opt(&self.path_suffix)?,
            headers,
            parameters,
            body: seal_opt(&self.body)?,
            oracle_identity: oracle_identity.to_string(),
        })
    }
}

/// Header with a plaintext key and an encrypted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPatch {
    pub key: String,
    pub ciphertext: Vec<u8>,
}

impl HeaderPatch {
    pub fn new(key: impl Into<String>, ciphertext: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            ciphertext,
        }
    }
}

impl Encode for HeaderPatch {
    fn encode_to(&self, w: &mut Writer) {
        w.string(&self.key).bytes(&self.ciphertext);
    }
}

impl Decode for HeaderPatch {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        Ok(Self::new(r.string()?, r.bytes()?))
    }
}

/// Query parameter with a plaintext key and an encrypted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPatch {
    pub key: String,
    pub ciphertext: Vec<u8>,
}

impl ParameterPatch {
    pub fn new(key: impl Into<String>, ciphertext: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            ciphertext,
        }
    }
}

impl Encode for ParameterPatch {
    fn encode_to(&self, w: &mut Writer) {
        w.string(&self.key).bytes(&self.ciphertext);
    }
}

impl Decode for ParameterPatch {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        Ok(Self::new(r.string()?, r.bytes()?))
    }
}

/// The on-chain form of a private patch.
///
/// Absent optional fields are encoded as zero-length `bytes`, and a
/// zero-length field decodes back to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPatch {
    pub path_suffix: Option<Vec<u8>>,
    pub headers: Vec<HeaderPatch>,
    pub parameters: Vec<ParameterPatch>,
    pub body: Option<Vec<u8>>,
    pub oracle_identity: String,
}

impl EncryptedPatch {
    /// The canonical empty patch, addressed to any oracle.
    pub fn empty() -> Self {
        Self {
            path_suffix: None,
            headers: Vec::new(),
            parameters: Vec::new(),
            body: None,
            oracle_identity: ANY_ORACLE.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path_suffix.is_none()
            && self.headers.is_empty()
            && self.parameters.is_empty()
            && self.body.is_none()
    }

    pub fn targets_any_oracle(&self) -> bool {
        self.oracle_identity == ANY_ORACLE
    }

    /// Oracle side: restore the plaintext patch.
    pub fn decrypt(
        &self,
        oracle_secret: &SecretKey,
        sender_public: &PublicKey,
    ) -> ProtocolResult<PrivatePatch> {
        let cipher = FieldCipher::for_recipient(sender_public, oracle_secret)?;
        let open = |ciphertext: &[u8]| -> ProtocolResult<String> {
            let plain = cipher.open(ciphertext)?;
            String::from_utf8(plain)
                .map_err(|e| ProtocolError::malformed(format!("patch field is not UTF-8: {e}")))
        };

        Ok(PrivatePatch {
            path_suffix: self.path_suffix.as_deref().map(open).transpose()?,
            headers: self
                .headers
                .iter()
                .map(|h| -> ProtocolResult<RequestHeader> {
                    Ok(RequestHeader::new(&h.key, open(&h.ciphertext)?))
                })
                .collect::<ProtocolResult<_>>()?,
            parameters: self
                .parameters
                .iter()
                .map(|p| -> ProtocolResult<QueryParameter> {
                    Ok(QueryParameter::new(&p.key, open(&p.ciphertext)?))
                })
                .collect::<ProtocolResult<_>>()?,
            body: self.body.as_deref().map(open).transpose()?,
        })
    }
}

fn optional_bytes(raw: Vec<u8>) -> Option<Vec<u8>> {
    (!raw.is_empty()).then_some(raw)
}

impl Encode for EncryptedPatch {
    fn encode_to(&self, w: &mut Writer) {
        w.bytes(self.path_suffix.as_deref().unwrap_or_default())
            .list(&self.headers)
            .list(&self.parameters)
            .bytes(self.body.as_deref().unwrap_or_default())
            .string(&self.oracle_identity);
    }
}

impl Decode for EncryptedPatch {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        Ok(Self {
            path_suffix: optional_bytes(r.bytes()?),
            headers: r.list(HeaderPatch::decode_from)?,
            parameters: r.list(ParameterPatch::decode_from)?,
            body: optional_bytes(r.bytes()?),
            oracle_identity: r.string()?,
        })
    }
}
