// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Actions and proofs
//!
//! ```text
//! UnencryptedAction --encrypt--> Action --add_proof--> ActionProof
//! ```
//!
//! The action ID is `keccak256(Action::encode())`. The proof binds the
//! encrypted patch to its sender: `rawSenderPublic(64) ∥ encrypt(actionId)`,
//! or nothing at all when the patch is empty.

use std::fmt;

use alloy::primitives::{keccak256, B256};
use k256::{PublicKey, SecretKey};

use crate::codec::{Decode, Encode, Reader, Writer};
use crate::crypto::{parse_public_key, raw_public_key, FieldCipher, RAW_PUBLIC_KEY_LEN};
use crate::error::{ProtocolError, ProtocolResult};
use crate::models::http::{HttpMethod, HttpRequest};
use crate::models::patch::{EncryptedPatch, PrivatePatch};

/// Content hash of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(pub B256);

impl ActionId {
    pub fn from_slice(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() != 32 {
            return Err(ProtocolError::malformed(format!(
                "action id must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(B256::from_slice(bytes)))
    }

    /// Parse the base58 form used in ledger keys.
    pub fn from_base58(text: &str) -> ProtocolResult<Self> {
        let raw = bs58::decode(text)
            .into_vec()
            .map_err(|e| ProtocolError::malformed(format!("action id `{text}`: {e}")))?;
        Self::from_slice(&raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0.as_slice()).into_string()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", alloy::hex::encode(self.0))
    }
}

/// An action whose private patch is still plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnencryptedAction {
    pub request: HttpRequest,
    pub patch: PrivatePatch,
    pub schema: String,
    pub filter: String,
}

impl UnencryptedAction {
    pub fn new(
        request: HttpRequest,
        patch: PrivatePatch,
        schema: impl Into<String>,
        filter: impl Into<String>,
    ) -> Self {
        Self {
            request,
            patch,
            schema: schema.into(),
            filter: filter.into(),
        }
    }

    /// Build from a method, a full URL and `key:value` headers, with an empty patch.
    pub fn from_parts<S: AsRef<str>>(
        method: HttpMethod,
        url: &str,
        headers: &[S],
        body: impl Into<String>,
        schema: impl Into<String>,
        filter: impl Into<String>,
    ) -> ProtocolResult<Self> {
        let request = HttpRequest::from_parts(method, url, headers, body)?;
        Ok(Self::new(request, PrivatePatch::empty(), schema, filter))
    }

    pub fn with_patch(mut self, patch: PrivatePatch) -> Self {
        self.patch = patch;
        self
    }

    /// Encrypt the patch for one oracle. An empty patch becomes the
    /// canonical empty patch and no key material is touched.
    pub fn encrypt(
        &self,
        oracle_public: &PublicKey,
        oracle_identity: &str,
        sender: &SecretKey,
    ) -> ProtocolResult<Action> {
        let patch = if self.patch.is_empty() {
            EncryptedPatch::empty()
        } else {
            let cipher = FieldCipher::for_sender(oracle_public, sender)?;
            self.patch.encrypt(&cipher, oracle_identity)?
        };

        Ok(Action {
            request: self.request.clone(),
            patch,
            schema: self.schema.clone(),
            filter: self.filter.clone(),
        })
    }
}

/// The hash-committed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub request: HttpRequest,
    pub patch: EncryptedPatch,
    pub schema: String,
    pub filter: String,
}

impl Action {
    pub fn id(&self) -> ActionId {
        ActionId(keccak256(self.encode()))
    }

    /// Attach the sender proof.
    pub fn add_proof(
        self,
        oracle_public: &PublicKey,
        sender: &SecretKey,
    ) -> ProtocolResult<ActionProof> {
        if self.patch.is_empty() {
            return Ok(self.with_empty_proof());
        }

        let cipher = FieldCipher::for_sender(oracle_public, sender)?;
        let mut proof = raw_public_key(&sender.public_key()).to_vec();
        proof.extend(cipher.seal(self.id().as_bytes())?);

        Ok(ActionProof {
            action: self,
            proof,
        })
    }

    pub fn with_empty_proof(self) -> ActionProof {
        ActionProof {
            action: self,
            proof: Vec::new(),
        }
    }
}

impl Encode for Action {
    fn encode_to(&self, w: &mut Writer) {
        self.request.encode_to(w);
        self.patch.encode_to(w);
        w.string(&self.schema).string(&self.filter);
    }
}

impl Decode for Action {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        Ok(Self {
            request: r.decode()?,
            patch: r.decode()?,
            schema: r.string()?,
            filter: r.string()?,
        })
    }
}

/// An action together with its sender proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionProof {
    pub action: Action,
    pub proof: Vec<u8>,
}

impl ActionProof {
    pub fn id(&self) -> ActionId {
        self.action.id()
    }

    /// Fail with [`ProtocolError::ActionIdMismatch`] unless the recomputed ID
    /// equals `expected`.
    pub fn verify_id(&self, expected: &ActionId) -> ProtocolResult<()> {
        let actual = self.id();
        if actual != *expected {
            return Err(ProtocolError::ActionIdMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Oracle side: check the proof and recover the sender key.
    ///
    /// Returns `None` for an empty proof on an empty patch. A proof whose
    /// decrypted payload is not this action's ID is an
    /// [`ProtocolError::ActionIdMismatch`].
    pub fn open(&self, oracle_secret: &SecretKey) -> ProtocolResult<Option<PublicKey>> {
        if self.proof.is_empty() {
            if self.action.patch.is_empty() {
                return Ok(None);
            }
            return Err(ProtocolError::malformed("encrypted patch without proof"));
        }
        if self.proof.len() <= RAW_PUBLIC_KEY_LEN {
            return Err(ProtocolError::malformed(format!(
                "proof of {} bytes is too short",
                self.proof.len()
            )));
        }

        let (raw_sender, sealed_id) = self.proof.split_at(RAW_PUBLIC_KEY_LEN);
        let sender = parse_public_key(raw_sender)?;
        let cipher = FieldCipher::for_recipient(&sender, oracle_secret)?;
        let claimed = ActionId::from_slice(&cipher.open(sealed_id)?)?;
        self.verify_id(&claimed)?;
        Ok(Some(sender))
    }
}

impl Encode for ActionProof {
    fn encode_to(&self, w: &mut Writer) {
        self.action.encode_to(w);
        w.bytes(&self.proof);
    }
}

impl Decode for ActionProof {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        Ok(Self {
            action: r.decode()?,
            proof: r.bytes()?,
        })
    }
}

/// Any of the three action forms a caller may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionForm {
    Unencrypted(UnencryptedAction),
    Encrypted(Action),
    Proved(ActionProof),
}

impl ActionForm {
    /// Bring any form up to a proved action for `oracle_public`.
    pub fn into_proof(
        self,
        oracle_public: &PublicKey,
        oracle_identity: &str,
        sender: &SecretKey,
    ) -> ProtocolResult<ActionProof> {
        match self {
            ActionForm::Unencrypted(action) => action
                .encrypt(oracle_public, oracle_identity, sender)?
                .add_proof(oracle_public, sender),
            ActionForm::Encrypted(action) => action.add_proof(oracle_public, sender),
            ActionForm::Proved(proved) => Ok(proved),
        }
    }
}
