// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pool registries, registered quotes and published responses.

use super::entries::{decode_binary, group_fields_by_key, DataEntry, EntryValue, Fields};
use super::LedgerError;
use crate::attestation::quote::HEADER_LEN;
use crate::attestation::{QeReport, QuoteBody, QuoteError, QuoteHeader};
use crate::codec::Decode;
use crate::models::{ActionId, DataItem, FullPoolId};

fn base58_segment(key: &str, segment: &str) -> Result<Vec<u8>, LedgerError> {
    bs58::decode(segment)
        .into_vec()
        .map_err(|e| LedgerError::InvalidEntry(format!("key `{key}`: segment `{segment}`: {e}")))
}

fn split_three<'a>(key: &'a str) -> Result<[&'a str; 3], LedgerError> {
    let segments: Vec<&str> = key.split(':').collect();
    match segments.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(LedgerError::InvalidEntry(format!(
            "key `{key}` must have 3 segments"
        ))),
    }
}

/// An oracle key registered in one of the pool contracts.
///
/// All three registries use `prefix:id:publicKey` keys, where `prefix` is the
/// pool owner (private and whitelist pools) or the quotes contract (attested
/// pools). The full pool id is `registry ∥ prefix ∥ id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredOracle {
    pub pool: FullPoolId,
    /// Base58 owner or quotes contract address.
    pub prefix: String,
    pub id: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl RegisteredOracle {
    pub fn parse(registry: &str, key: &str) -> Result<Self, LedgerError> {
        let [prefix, id, public_key] = split_three(key)?;
        let prefix_bytes = base58_segment(key, prefix)?;
        let id = base58_segment(key, id)?;
        let mut suffix = prefix_bytes.clone();
        suffix.extend_from_slice(&id);

        Ok(Self {
            pool: FullPoolId::new(registry, suffix),
            prefix: bs58::encode(prefix_bytes).into_string(),
            id,
            public_key: base58_segment(key, public_key)?,
        })
    }

    /// Attested pool entry an oracle presenting `body` would occupy.
    pub fn attested(
        body: &QuoteBody,
        quotes_address: &str,
        pool_address: &str,
    ) -> Result<Self, LedgerError> {
        let quotes = base58_segment(quotes_address, quotes_address)?;
        let id = body.measurement_id().to_vec();
        Ok(Self::from_quote(body, quotes, id, pool_address))
    }

    /// Whitelist pool entry: the id also commits to the quotes contract.
    pub fn whitelisted(
        body: &QuoteBody,
        owner_address: &str,
        quotes_address: &str,
        pool_address: &str,
    ) -> Result<Self, LedgerError> {
        let owner = base58_segment(owner_address, owner_address)?;
        let quotes = base58_segment(quotes_address, quotes_address)?;
        let id = body.measurement_id_for(&quotes).to_vec();
        Ok(Self::from_quote(body, owner, id, pool_address))
    }

    fn from_quote(body: &QuoteBody, prefix: Vec<u8>, id: Vec<u8>, pool_address: &str) -> Self {
        let mut suffix = prefix.clone();
        suffix.extend_from_slice(&id);
        Self {
            pool: FullPoolId::new(pool_address, suffix),
            prefix: bs58::encode(prefix).into_string(),
            id,
            public_key: body.report_data.to_vec(),
        }
    }
}

/// Oracles in a registry account. Entries whose value is not truthy were
/// removed and are skipped.
pub fn parse_registered_oracles(
    registry: &str,
    entries: &[DataEntry],
) -> Result<Vec<RegisteredOracle>, LedgerError> {
    entries
        .iter()
        .filter(|entry| entry.value.is_truthy())
        .map(|entry| RegisteredOracle::parse(registry, &entry.key))
        .collect()
}

/// A quote registered in the quotes contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteEntry {
    pub id: Vec<u8>,
    pub header: QuoteHeader,
    pub body: QuoteBody,
    pub qe_report: QeReport,
}

impl QuoteEntry {
    fn parse(key: &str, record: &Fields<'_>) -> Result<Self, LedgerError> {
        let invalid = |e: QuoteError| {
            LedgerError::InvalidEntry(format!("quote `{key}`: {e}"))
        };
        let quote = record.binary("quote")?;
        let header = QuoteHeader::from_bytes(quote).map_err(invalid)?;
        let body = QuoteBody::from_bytes(&quote[HEADER_LEN..]).map_err(invalid)?;
        Ok(Self {
            id: base58_segment(key, key)?,
            header,
            body,
            qe_report: QeReport::from_bytes(record.binary("qe-report")?).map_err(invalid)?,
        })
    }
}

/// Quotes grouped from `quoteId:quote` and `quoteId:qe-report` entries.
///
/// Non-quote records such as stored CRL blobs are skipped.
pub fn parse_quote_entries(entries: &[DataEntry]) -> Result<Vec<QuoteEntry>, LedgerError> {
    group_fields_by_key(entries)
        .iter()
        .filter(|(_, fields)| fields.contains_key("quote"))
        .map(|(key, fields)| QuoteEntry::parse(key, &Fields::new(key, fields)))
        .collect()
}

/// A response stored by the responses contract under
/// `actionId:poolAddress:poolId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedResponse {
    pub action_id: ActionId,
    pub pool: FullPoolId,
    pub data_item: DataItem,
}

impl PublishedResponse {
    pub fn key(action_id: &ActionId, pool: &FullPoolId) -> String {
        format!(
            "{}:{}:{}",
            action_id.to_base58(),
            pool.address,
            bs58::encode(&pool.id).into_string()
        )
    }

    pub fn parse(entry: &DataEntry) -> Result<Self, LedgerError> {
        let key = &entry.key;
        let [action_id, address, id] = split_three(key)?;
        let value = match &entry.value {
            EntryValue::Binary(bytes) => bytes.clone(),
            EntryValue::String(text) => decode_binary(text)?,
            other => {
                return Err(LedgerError::InvalidEntry(format!(
                    "response `{key}` is {}, expected binary",
                    other.kind()
                )))
            }
        };
        Ok(Self {
            action_id: ActionId::from_slice(&base58_segment(key, action_id)?)?,
            pool: FullPoolId::new(
                bs58::encode(base58_segment(key, address)?).into_string(),
                base58_segment(key, id)?,
            ),
            data_item: DataItem::decode(&value)?,
        })
    }
}

pub fn parse_published_responses(
    entries: &[DataEntry],
) -> Result<Vec<PublishedResponse>, LedgerError> {
    entries.iter().map(PublishedResponse::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::quote::tests::{sample_body, sample_header, sample_report};
    use crate::codec::Encode;
    use alloy::primitives::B256;

    fn address(tag: u8) -> String {
        let mut raw = vec![1u8, b'R'];
        raw.extend([tag; 24]);
        bs58::encode(raw).into_string()
    }

    fn b58(bytes: &[u8]) -> String {
        bs58::encode(bytes).into_string()
    }

    #[test]
    fn registry_keys_expand_to_full_pool_ids() {
        let owner = address(1);
        let entries = vec![
            DataEntry::new(
                format!("{owner}:{}:{}", b58(&[0xaa]), b58(&[4; 64])),
                EntryValue::Boolean(true),
            ),
            DataEntry::new(
                format!("{owner}:{}:{}", b58(&[0xbb]), b58(&[5; 64])),
                EntryValue::Boolean(false),
            ),
        ];
        let oracles = parse_registered_oracles(&address(9), &entries).unwrap();
        assert_eq!(oracles.len(), 1);

        let oracle = &oracles[0];
        assert_eq!(oracle.pool.address, address(9));
        let mut suffix = bs58::decode(&owner).into_vec().unwrap();
        suffix.push(0xaa);
        assert_eq!(oracle.pool.id, suffix);
        assert_eq!(oracle.prefix, owner);
        assert_eq!(oracle.public_key, vec![4; 64]);
    }

    #[test]
    fn malformed_registry_key_is_rejected() {
        assert!(RegisteredOracle::parse("x", "only:two").is_err());
        assert!(RegisteredOracle::parse("x", "a:0:b").is_err());
    }

    #[test]
    fn attested_entries_derive_ids_from_the_quote_body() {
        let body = sample_body([0x42; 64]);
        let quotes = address(2);
        let attested = RegisteredOracle::attested(&body, &quotes, &address(3)).unwrap();
        assert_eq!(attested.id, body.measurement_id().to_vec());
        assert_eq!(attested.public_key, body.report_data.to_vec());
        assert_eq!(attested.prefix, quotes);

        let whitelisted =
            RegisteredOracle::whitelisted(&body, &address(4), &quotes, &address(3)).unwrap();
        assert_ne!(whitelisted.id, attested.id);
        assert_eq!(whitelisted.prefix, address(4));
    }

    #[test]
    fn quotes_are_grouped_and_parsed() {
        let mut quote = sample_header().to_bytes().to_vec();
        quote.extend_from_slice(&sample_body([0x42; 64]).to_bytes());
        let id = [7u8; 32];
        let entries = vec![
            DataEntry::new(format!("{}:quote", b58(&id)), EntryValue::Binary(quote)),
            DataEntry::new(
                format!("{}:qe-report", b58(&id)),
                EntryValue::Binary(sample_report().to_bytes().to_vec()),
            ),
            DataEntry::new("crl:abc", EntryValue::Binary(vec![1])),
        ];
        let quotes = parse_quote_entries(&entries).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].id, id.to_vec());
        assert_eq!(quotes[0].header, sample_header());
        assert_eq!(quotes[0].body, sample_body([0x42; 64]));
        assert_eq!(quotes[0].qe_report, sample_report());
    }

    #[test]
    fn truncated_quote_is_invalid() {
        let entries = vec![
            DataEntry::new("abc:quote", EntryValue::Binary(vec![0; 60])),
            DataEntry::new("abc:qe-report", EntryValue::Binary(vec![0; 384])),
        ];
        assert!(matches!(
            parse_quote_entries(&entries),
            Err(LedgerError::InvalidEntry(_))
        ));
    }

    #[test]
    fn published_response_key_matches_parse() {
        let pool = FullPoolId::new(address(6), vec![1, 2]);
        let action_id = ActionId(B256::repeat_byte(8));
        let item = DataItem::success(5, b"ok".to_vec());
        let entry = DataEntry::new(
            PublishedResponse::key(&action_id, &pool),
            EntryValue::Binary(item.encode()),
        );

        let parsed = parse_published_responses(&[entry]).unwrap();
        assert_eq!(parsed[0].action_id, action_id);
        assert_eq!(parsed[0].pool, pool);
        assert_eq!(parsed[0].data_item, item);
    }
}
