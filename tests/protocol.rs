// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client and oracle halves of a private action, joined only by the
//! canonical encoding.

use oracle_relay::codec::{Decode, Encode};
use oracle_relay::crypto::generate_secret_key;
use oracle_relay::error::ProtocolError;
use oracle_relay::models::{
    ActionForm, ActionProof, HttpMethod, PrivatePatch, QueryParameter, RequestHeader,
    UnencryptedAction,
};

const ORACLE: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

fn private_quote_action() -> UnencryptedAction {
    let patch = PrivatePatch::from_parts(
        Some("v3/price?symbol=BTCUSDT&apikey=k-123"),
        &["X-Api-Key: secret", "X-Trace:  spaced  "],
        Some(r#"{"account":"alice"}"#),
    )
    .unwrap();
    UnencryptedAction::from_parts(
        HttpMethod::Post,
        "https://api.example.com/base/?lang=en",
        &["Accept: application/json"],
        "",
        "uint",
        ".price|tonumber",
    )
    .unwrap()
    .with_patch(patch)
}

#[test]
fn oracle_recovers_exactly_what_the_client_hid() {
    let oracle = generate_secret_key();
    let sender = generate_secret_key();
    let unencrypted = private_quote_action();

    let proved = unencrypted
        .encrypt(&oracle.public_key(), ORACLE, &sender)
        .unwrap()
        .add_proof(&oracle.public_key(), &sender)
        .unwrap();
    let wire = proved.encode();

    // Oracle side sees only bytes.
    let received = ActionProof::decode(&wire).unwrap();
    assert_eq!(received.id(), proved.id());
    assert_eq!(received.action.patch.oracle_identity, ORACLE);
    assert!(!received.action.patch.targets_any_oracle());

    let sender_public = received.open(&oracle).unwrap().unwrap();
    assert_eq!(sender_public, sender.public_key());
    let patch = received
        .action
        .patch
        .decrypt(&oracle, &sender_public)
        .unwrap();

    assert_eq!(patch, unencrypted.patch);
    assert_eq!(patch.path_suffix.as_deref(), Some("v3/price"));
    assert_eq!(
        patch.parameters,
        vec![
            QueryParameter::new("symbol", "BTCUSDT"),
            QueryParameter::new("apikey", "k-123"),
        ]
    );
    assert_eq!(patch.headers[1], RequestHeader::new("X-Trace", "spaced"));
    assert_eq!(
        received.action.request.display_line(),
        "POST https://api.example.com/base/?lang=en"
    );
}

#[test]
fn plaintext_never_reaches_the_wire() {
    let oracle = generate_secret_key();
    let sender = generate_secret_key();
    let wire = private_quote_action()
        .encrypt(&oracle.public_key(), ORACLE, &sender)
        .unwrap()
        .add_proof(&oracle.public_key(), &sender)
        .unwrap()
        .encode();

    for secret in ["secret", "k-123", "alice", "v3/price"] {
        assert!(
            !wire.windows(secret.len()).any(|w| w == secret.as_bytes()),
            "`{secret}` leaked"
        );
    }
    // Header names stay public.
    assert!(wire.windows(9).any(|w| w == b"X-Api-Key"));
}

#[test]
fn another_oracle_cannot_open_the_proof() {
    let oracle = generate_secret_key();
    let sender = generate_secret_key();
    let proved = private_quote_action()
        .encrypt(&oracle.public_key(), ORACLE, &sender)
        .unwrap()
        .add_proof(&oracle.public_key(), &sender)
        .unwrap();

    let err = proved.open(&generate_secret_key()).unwrap_err();
    assert_eq!(err.code(), "crypto_failure");
}

#[test]
fn proof_is_bound_to_the_action() {
    let oracle = generate_secret_key();
    let sender = generate_secret_key();
    let mut proved = private_quote_action()
        .encrypt(&oracle.public_key(), ORACLE, &sender)
        .unwrap()
        .add_proof(&oracle.public_key(), &sender)
        .unwrap();

    proved.action.filter = ".price".to_string();
    assert!(matches!(
        proved.open(&oracle),
        Err(ProtocolError::ActionIdMismatch { .. })
    ));
}

#[test]
fn every_form_reaches_a_proof_for_the_same_request() {
    let oracle = generate_secret_key();
    let sender = generate_secret_key();
    let unencrypted = private_quote_action();
    let encrypted = unencrypted
        .encrypt(&oracle.public_key(), ORACLE, &sender)
        .unwrap();
    let proved = encrypted
        .clone()
        .add_proof(&oracle.public_key(), &sender)
        .unwrap();

    let forms = [
        ActionForm::Unencrypted(unencrypted.clone()),
        ActionForm::Encrypted(encrypted.clone()),
        ActionForm::Proved(proved.clone()),
    ];
    for form in forms {
        let out = form
            .into_proof(&oracle.public_key(), ORACLE, &sender)
            .unwrap();
        assert_eq!(out.action.request, unencrypted.request);
        let sender_public = out.open(&oracle).unwrap().unwrap();
        assert_eq!(
            out.action.patch.decrypt(&oracle, &sender_public).unwrap(),
            unencrypted.patch
        );
    }

    // Already proved actions pass through untouched.
    let again = ActionForm::Proved(proved.clone())
        .into_proof(&generate_secret_key().public_key(), "0x0", &generate_secret_key())
        .unwrap();
    assert_eq!(again, proved);
}

#[test]
fn trailing_bytes_are_rejected() {
    let oracle = generate_secret_key();
    let sender = generate_secret_key();
    let mut wire = private_quote_action()
        .encrypt(&oracle.public_key(), ORACLE, &sender)
        .unwrap()
        .add_proof(&oracle.public_key(), &sender)
        .unwrap()
        .encode();
    wire.push(0);
    assert!(ActionProof::decode(&wire).is_err());
}
