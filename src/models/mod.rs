// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Protocol data model: requests, private patches, actions, proofs, results
//! and pool identities.

pub mod action;
pub mod http;
pub mod patch;
pub mod pool;
pub mod response;

pub use action::{Action, ActionForm, ActionId, ActionProof, UnencryptedAction};
pub use http::{HttpMethod, HttpRequest, QueryParameter, RequestHeader};
pub use patch::{EncryptedPatch, HeaderPatch, ParameterPatch, PrivatePatch, ANY_ORACLE};
pub use pool::FullPoolId;
pub use response::{DataItem, OracleMessage, OracleResponse};
