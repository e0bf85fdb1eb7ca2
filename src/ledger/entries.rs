// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account key/value entries as served by the node REST API.

use std::collections::BTreeMap;

use base64ct::{Base64, Encoding};
use serde::Deserialize;
use serde_json::Value;

use super::LedgerError;

const BASE64_PREFIX: &str = "base64:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    Binary(Vec<u8>),
    Integer(i64),
    String(String),
    Boolean(bool),
}

impl EntryValue {
    /// Registry entries count as set when their value is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            EntryValue::Binary(b) => !b.is_empty(),
            EntryValue::Integer(i) => *i != 0,
            EntryValue::String(s) => !s.is_empty(),
            EntryValue::Boolean(b) => *b,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EntryValue::Binary(_) => "binary",
            EntryValue::Integer(_) => "integer",
            EntryValue::String(_) => "string",
            EntryValue::Boolean(_) => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    pub key: String,
    pub value: EntryValue,
}

impl DataEntry {
    pub fn new(key: impl Into<String>, value: EntryValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    key: String,
    #[serde(rename = "type")]
    kind: String,
    value: Value,
}

/// Decode a node `binary` value, with or without its `base64:` prefix.
pub fn decode_binary(text: &str) -> Result<Vec<u8>, LedgerError> {
    let body = text.strip_prefix(BASE64_PREFIX).unwrap_or(text);
    Base64::decode_vec(body).map_err(|e| LedgerError::InvalidEntry(format!("bad base64: {e}")))
}

impl TryFrom<RawEntry> for DataEntry {
    type Error = LedgerError;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let invalid = |what: &str| {
            LedgerError::InvalidEntry(format!("{}: {what} ({})", raw.key, raw.value))
        };
        let value = match (raw.kind.as_str(), &raw.value) {
            ("binary", Value::String(s)) => EntryValue::Binary(decode_binary(s)?),
            ("integer", Value::Number(n)) => {
                EntryValue::Integer(n.as_i64().ok_or_else(|| invalid("integer out of range"))?)
            }
            ("integer", Value::String(_)) => return Err(invalid("integer is too large")),
            ("string", Value::String(s)) => EntryValue::String(s.clone()),
            ("boolean", Value::Bool(b)) => EntryValue::Boolean(*b),
            (kind, _) => return Err(invalid(&format!("unexpected {kind} value"))),
        };
        Ok(DataEntry::new(raw.key, value))
    }
}

/// Parse a node `/addresses/data/{address}` response body.
pub fn parse_account_data(body: &str) -> Result<Vec<DataEntry>, LedgerError> {
    let raw: Vec<RawEntry> = serde_json::from_str(body)
        .map_err(|e| LedgerError::InvalidEntry(format!("account data is not valid JSON: {e}")))?;
    raw.into_iter().map(DataEntry::try_from).collect()
}

/// Group `record:field` entries by record, splitting on the last `:`.
///
/// Keys without a separator are not records and are skipped.
pub fn group_fields_by_key(entries: &[DataEntry]) -> BTreeMap<String, BTreeMap<String, EntryValue>> {
    let mut groups: BTreeMap<String, BTreeMap<String, EntryValue>> = BTreeMap::new();
    for entry in entries {
        if let Some((record, field)) = entry.key.rsplit_once(':') {
            groups
                .entry(record.to_string())
                .or_default()
                .insert(field.to_string(), entry.value.clone());
        }
    }
    groups
}

/// Typed field access over one grouped record.
pub struct Fields<'a> {
    record: &'a str,
    fields: &'a BTreeMap<String, EntryValue>,
}

impl<'a> Fields<'a> {
    pub fn new(record: &'a str, fields: &'a BTreeMap<String, EntryValue>) -> Self {
        Self { record, fields }
    }

    fn get(&self, field: &str) -> Result<&'a EntryValue, LedgerError> {
        self.fields.get(field).ok_or_else(|| {
            LedgerError::InvalidEntry(format!("{}: missing field `{field}`", self.record))
        })
    }

    fn mismatch(&self, field: &str, expected: &str, actual: &EntryValue) -> LedgerError {
        LedgerError::InvalidEntry(format!(
            "{}: field `{field}` is {}, expected {expected}",
            self.record,
            actual.kind()
        ))
    }

    pub fn binary(&self, field: &str) -> Result<&'a [u8], LedgerError> {
        match self.get(field)? {
            EntryValue::Binary(b) => Ok(b),
            other => Err(self.mismatch(field, "binary", other)),
        }
    }

    pub fn integer(&self, field: &str) -> Result<i64, LedgerError> {
        match self.get(field)? {
            EntryValue::Integer(i) => Ok(*i),
            other => Err(self.mismatch(field, "integer", other)),
        }
    }
}
