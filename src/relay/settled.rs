// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache of requests this relay already settled.
//!
//! The node keeps serving a fulfilled request until the settlement lands, so
//! the next pass would dispatch it again. Remembering settled keys for a while
//! avoids that wasted oracle query. Losing an entry is harmless: the requests
//! contract rejects a second fulfillment.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

pub const DEFAULT_CAPACITY: usize = 4096;
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Settlement transaction id + when it was recorded.
struct SettledEntry {
    tx_id: String,
    inserted_at: Instant,
}

pub struct SettledCache {
    cache: Mutex<LruCache<String, SettledEntry>>,
    ttl: Duration,
}

impl SettledCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Settlement tx id of `request_key`, if settled within the TTL.
    pub fn get(&self, request_key: &str) -> Option<String> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(request_key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.tx_id.clone());
            }
            cache.pop(request_key);
        }
        None
    }

    pub fn insert(&self, request_key: &str, tx_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                request_key.to_string(),
                SettledEntry {
                    tx_id: tx_id.to_string(),
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SettledCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}
