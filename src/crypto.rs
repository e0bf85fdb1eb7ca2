// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Field Encryption Engine
//!
//! Encrypts individual action fields for a single oracle.
//!
//! 1. ECDH on secp256k1: `shared = recipientPublic * senderSecret`, kept as the
//!    full uncompressed point (65 bytes).
//! 2. HKDF-SHA256 over `senderPublic(65, uncompressed) ∥ shared` with empty
//!    salt and info, producing a 32-byte key.
//! 3. AES-256-GCM with a fresh 16-byte random nonce per field.
//!
//! Output framing is `nonce(16) ∥ tag(16) ∥ ciphertext`.
//!
//! Key material is always passed in explicitly. Sender keys are ephemeral:
//! generate one with [`generate_secret_key`], use it for one action proof and
//! drop it (`SecretKey` zeroizes on drop).

use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, Aead, KeyInit},
    aes::Aes256,
    AesGcm,
};
use hkdf::Hkdf;
use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

/// AES-256-GCM with the 16-byte nonce used on the wire.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub const NONCE_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// Uncompressed public key without the `0x04` SEC1 tag.
pub const RAW_PUBLIC_KEY_LEN: usize = 64;

/// Errors from key handling, key derivation and AEAD.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("Key derivation failed")]
    KeyDerivation,

    #[error("AEAD encryption or authentication failed")]
    Aead,

    #[error("Ciphertext too short: {0} bytes")]
    Truncated(usize),
}

/// Generate a fresh ephemeral sender key.
pub fn generate_secret_key() -> SecretKey {
    SecretKey::random(&mut OsRng)
}

/// Parse a secp256k1 public key.
///
/// Accepts SEC1 compressed (33), SEC1 uncompressed (65) and raw `x ∥ y` (64)
/// encodings.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    let parsed = if bytes.len() == RAW_PUBLIC_KEY_LEN {
        let mut sec1 = Vec::with_capacity(RAW_PUBLIC_KEY_LEN + 1);
        sec1.push(0x04);
        sec1.extend_from_slice(bytes);
        PublicKey::from_sec1_bytes(&sec1)
    } else {
        PublicKey::from_sec1_bytes(bytes)
    };
    parsed.map_err(|e| CryptoError::InvalidPublicKey(format!("{} bytes: {e}", bytes.len())))
}

/// Parse a hex public key, with or without a `0x` prefix.
pub fn parse_public_key_hex(text: &str) -> Result<PublicKey, CryptoError> {
    let trimmed = text.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes =
        alloy::hex::decode(hex).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    parse_public_key(&bytes)
}

/// Parse a raw 32-byte secret scalar.
pub fn parse_secret_key(bytes: &[u8]) -> Result<SecretKey, CryptoError> {
    SecretKey::from_slice(bytes).map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))
}

/// Uncompressed public key without the SEC1 tag byte.
pub fn raw_public_key(key: &PublicKey) -> [u8; RAW_PUBLIC_KEY_LEN] {
    let encoded = key.to_encoded_point(false);
    let mut raw = [0u8; RAW_PUBLIC_KEY_LEN];
    raw.copy_from_slice(&encoded.as_bytes()[1..]);
    raw
}

fn shared_point(public: &PublicKey, secret: &SecretKey) -> Vec<u8> {
    let point = (public.to_projective() * *secret.to_nonzero_scalar()).to_affine();
    point.to_encoded_point(false).as_bytes().to_vec()
}

fn derive_key(sender_public: &PublicKey, shared: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
    let mut ikm = sender_public.to_encoded_point(false).as_bytes().to_vec();
    ikm.extend_from_slice(shared);

    let mut okm = [0u8; KEY_LEN];
    Hkdf::<Sha256>::new(None, &ikm)
        .expand(&[], &mut okm)
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(okm)
}

/// Symmetric cipher bound to one (sender, recipient) pair.
///
/// Both sides derive the same key: the sender from `(recipientPublic,
/// senderSecret)`, the oracle from `(senderPublic, recipientSecret)`.
pub struct FieldCipher {
    cipher: Aes256Gcm16,
}

impl FieldCipher {
    /// Sender side.
    pub fn for_sender(recipient: &PublicKey, sender: &SecretKey) -> Result<Self, CryptoError> {
        let shared = shared_point(recipient, sender);
        Self::from_key(derive_key(&sender.public_key(), &shared)?)
    }

    /// Recipient (oracle) side.
    pub fn for_recipient(
        sender_public: &PublicKey,
        recipient: &SecretKey,
    ) -> Result<Self, CryptoError> {
        let shared = shared_point(sender_public, recipient);
        Self::from_key(derive_key(sender_public, &shared)?)
    }

    fn from_key(key: [u8; KEY_LEN]) -> Result<Self, CryptoError> {
        let cipher = Aes256Gcm16::new_from_slice(&key).map_err(|_| CryptoError::KeyDerivation)?;
        Ok(Self { cipher })
    }

    /// Encrypt one field under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        self.seal_with_nonce(plaintext, &nonce)
    }

    fn seal_with_nonce(
        &self,
        plaintext: &[u8],
        nonce: &[u8; NONCE_LEN],
    ) -> Result<Vec<u8>, CryptoError> {
        let sealed = self
            .cipher
            .encrypt(GenericArray::from_slice(nonce), plaintext)
            .map_err(|_| CryptoError::Aead)?;
        // aes-gcm appends the tag; the wire format puts it before the body.
        let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut framed = Vec::with_capacity(NONCE_LEN + sealed.len());
        framed.extend_from_slice(nonce);
        framed.extend_from_slice(tag);
        framed.extend_from_slice(body);
        Ok(framed)
    }

    /// Decrypt one `nonce ∥ tag ∥ ciphertext` field.
    pub fn open(&self, framed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if framed.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Truncated(framed.len()));
        }
        let (nonce, rest) = framed.split_at(NONCE_LEN);
        let (tag, body) = rest.split_at(TAG_LEN);

        let mut sealed = Vec::with_capacity(rest.len());
        sealed.extend_from_slice(body);
        sealed.extend_from_slice(tag);

        self.cipher
            .decrypt(GenericArray::from_slice(nonce), sealed.as_slice())
            .map_err(|_| CryptoError::Aead)
    }
}

/// Encrypt a single message for `recipient`.
pub fn encrypt(
    plaintext: &[u8],
    recipient: &PublicKey,
    sender: &SecretKey,
) -> Result<Vec<u8>, CryptoError> {
    FieldCipher::for_sender(recipient, sender)?.seal(plaintext)
}

/// Decrypt a single message produced by [`encrypt`].
pub fn decrypt(
    framed: &[u8],
    sender_public: &PublicKey,
    recipient: &SecretKey,
) -> Result<Vec<u8>, CryptoError> {
    FieldCipher::for_recipient(sender_public, recipient)?.open(framed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn key(byte: u8) -> SecretKey {
        parse_secret_key(&[byte; 32]).unwrap()
    }

    #[test]
    fn matches_independent_known_answer() {
        let sender = key(0x11);
        let recipient = key(0x22);

        assert_eq!(
            alloy::hex::encode(recipient.public_key().to_encoded_point(false).as_bytes()),
            "04466d7fcae563e5cb09a0d1870bb580344804617879a14949cf22285f1bae3f27\
             6728176c3c6431f8eeda4538dc37c865e2784f3a9e77d044f33e407797e1278a"
        );

        let nonce: [u8; NONCE_LEN] = core::array::from_fn(|i| i as u8);
        let framed = FieldCipher::for_sender(&recipient.public_key(), &sender)
            .unwrap()
            .seal_with_nonce(b"X-Api-Key secret", &nonce)
            .unwrap();

        assert_eq!(
            alloy::hex::encode(&framed),
            "000102030405060708090a0b0c0d0e0f\
             fb144dec40e9f18c9f79e8e8be784b4e\
             c54238344c8f59e97f9071e16951b17f"
        );
    }

    #[test]
    fn recipient_decrypts_sender_output() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();

        let framed = encrypt(b"token=abc", &recipient.public_key(), &sender).unwrap();
        assert_eq!(framed.len(), NONCE_LEN + TAG_LEN + 9);

        let plain = decrypt(&framed, &sender.public_key(), &recipient).unwrap();
        assert_eq!(plain, b"token=abc");
    }

    #[test]
    fn wrong_recipient_fails_authentication() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();
        let other = generate_secret_key();

        let framed = encrypt(b"secret", &recipient.public_key(), &sender).unwrap();
        assert_eq!(
            decrypt(&framed, &sender.public_key(), &other),
            Err(CryptoError::Aead)
        );
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();

        let mut framed = encrypt(b"secret", &recipient.public_key(), &sender).unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0x01;
        assert!(decrypt(&framed, &sender.public_key(), &recipient).is_err());
    }

    #[test]
    fn short_input_is_truncated_not_empty_plaintext() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();
        assert_eq!(
            decrypt(&[0u8; 20], &sender.public_key(), &recipient),
            Err(CryptoError::Truncated(20))
        );
    }

    #[test]
    fn nonces_are_never_reused_within_one_cipher() {
        let sender = generate_secret_key();
        let recipient = generate_secret_key();
        let cipher = FieldCipher::for_sender(&recipient.public_key(), &sender).unwrap();

        let mut nonces = HashSet::new();
        for _ in 0..1000 {
            let framed = cipher.seal(b"same field").unwrap();
            assert!(nonces.insert(framed[..NONCE_LEN].to_vec()));
        }
    }

    #[test]
    fn public_key_encodings_are_interchangeable() {
        let secret = generate_secret_key();
        let public = secret.public_key();

        let raw = raw_public_key(&public);
        let compressed = public.to_encoded_point(true);
        let uncompressed = public.to_encoded_point(false);

        assert_eq!(parse_public_key(&raw).unwrap(), public);
        assert_eq!(parse_public_key(compressed.as_bytes()).unwrap(), public);
        assert_eq!(parse_public_key(uncompressed.as_bytes()).unwrap(), public);

        let hex = format!("0x{}", alloy::hex::encode(uncompressed.as_bytes()));
        assert_eq!(parse_public_key_hex(&hex).unwrap(), public);
    }

    #[test]
    fn garbage_public_key_is_rejected() {
        assert!(matches!(
            parse_public_key(&[1, 2, 3]),
            Err(CryptoError::InvalidPublicKey(_))
        ));
        assert!(parse_public_key_hex("zz").is_err());
    }
}
