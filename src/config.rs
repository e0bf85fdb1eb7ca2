// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Process settings come from the environment; per-network endpoints, contract
//! addresses and oracle URLs come from a JSON file.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RELAY_CONFIG` | Path to the network JSON config | `relay.json` |
//! | `RELAY_CHAINS` | Comma separated chain ids to relay on | `R` |
//! | `RELAY_MIN_REWARD` | Minimum margin above the submission fee, in base units | `100000` |
//! | `RELAY_POLL_INTERVAL_SECS` | Seconds between relay passes | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |
//!
//! ## Network file
//!
//! ```json
//! {
//!   "networks": {
//!     "R": {
//!       "nodeUrls": ["https://node.example"],
//!       "relayer": "3M...",
//!       "dApps": { "requests": "3M...", "responses": "3M...", "quotes": "3M...",
//!                  "privatePools": "3M...", "attestedPools": "3M...",
//!                  "attestedWhitelistPools": "3M..." },
//!       "pools": { "<poolAddress>": { "<poolIdHex>": {
//!         "addresses": { "<oracleIdentity>": { "urls": ["https://oracle"] } } } } }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::models::{FullPoolId, ANY_ORACLE};

pub const RELAY_CONFIG_ENV: &str = "RELAY_CONFIG";
pub const DEFAULT_RELAY_CONFIG: &str = "relay.json";

pub const RELAY_CHAINS_ENV: &str = "RELAY_CHAINS";
pub const DEFAULT_RELAY_CHAINS: &str = "R";

/// Margin a request's reward must carry on top of the submission fee.
pub const RELAY_MIN_REWARD_ENV: &str = "RELAY_MIN_REWARD";
/// 0.001 of a 10^8-unit coin.
pub const DEFAULT_MIN_REWARD: i64 = 100_000;

pub const RELAY_POLL_INTERVAL_ENV: &str = "RELAY_POLL_INTERVAL_SECS";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid JSON in config: {0}")]
    Json(String),

    #[error("Invalid chain id: {chain_id}. Known chain ids: {known}")]
    UnknownChain { chain_id: String, known: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Filled from the `networks` map key.
    #[serde(skip)]
    pub chain_id: String,
    pub node_urls: Vec<String>,
    #[serde(rename = "dApps")]
    pub dapps: DAppsConfig,
    /// Pool address, then hex pool id suffix (`""` for the default pool).
    #[serde(default)]
    pub pools: BTreeMap<String, BTreeMap<String, PoolConfig>>,
    /// Base58 address the relay settles from and oracles address results to.
    #[serde(default)]
    pub relayer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DAppsConfig {
    pub attested_pools: String,
    pub attested_whitelist_pools: String,
    pub private_pools: String,
    pub quotes: String,
    pub requests: String,
    pub responses: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub addresses: BTreeMap<String, OracleEndpoints>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleEndpoints {
    pub urls: Vec<String>,
}

impl RelayConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: RelayConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        for (chain_id, network) in config.networks.iter_mut() {
            network.chain_id = chain_id.clone();
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn for_chain(&self, chain_id: &str) -> Result<&NetworkConfig, ConfigError> {
        self.networks
            .get(chain_id)
            .ok_or_else(|| ConfigError::UnknownChain {
                chain_id: chain_id.to_string(),
                known: self
                    .networks
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl NetworkConfig {
    /// A random node, spreading reads over the configured set.
    pub fn find_node_url(&self) -> Option<&str> {
        self.node_urls
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    pub fn node_url(&self) -> Result<&str, ConfigError> {
        self.find_node_url().ok_or_else(|| {
            ConfigError::Invalid(format!("no node URLs defined for chain {}", self.chain_id))
        })
    }

    /// Oracles configured for a pool; an unknown pool has none.
    pub fn for_pool(&self, pool: &FullPoolId) -> PoolConfig {
        self.pools
            .get(&pool.address)
            .and_then(|by_id| by_id.get(&alloy::hex::encode(&pool.id)))
            .cloned()
            .unwrap_or_default()
    }

    /// Name of the contract deployed at `address`, if it is one of ours.
    pub fn find_dapp_name(&self, address: &str) -> Option<&'static str> {
        let d = &self.dapps;
        [
            ("attestedPools", &d.attested_pools),
            ("attestedWhitelistPools", &d.attested_whitelist_pools),
            ("privatePools", &d.private_pools),
            ("quotes", &d.quotes),
            ("requests", &d.requests),
            ("responses", &d.responses),
        ]
        .into_iter()
        .find(|(_, deployed)| deployed.as_str() == address)
        .map(|(name, _)| name)
    }

    pub fn relayer(&self) -> Result<&str, ConfigError> {
        self.relayer.as_deref().ok_or_else(|| {
            ConfigError::Invalid(format!("no relayer address for chain {}", self.chain_id))
        })
    }
}

impl PoolConfig {
    /// A random URL serving `identity`; the wildcard identity may use any
    /// configured oracle of the pool.
    pub fn find_oracle_url(&self, identity: &str) -> Option<String> {
        let urls: Vec<&String> = if identity == ANY_ORACLE {
            self.addresses.values().flat_map(|o| o.urls.iter()).collect()
        } else {
            self.addresses
                .get(identity)
                .map(|o| o.urls.iter().collect())
                .unwrap_or_default()
        };
        urls.choose(&mut rand::thread_rng()).map(|url| url.to_string())
    }
}

/// Process settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    pub config_path: String,
    pub chains: Vec<String>,
    pub min_reward: i64,
    pub poll_interval: Duration,
}

impl RelaySettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let chains = lookup(RELAY_CHAINS_ENV)
            .unwrap_or_else(|| DEFAULT_RELAY_CHAINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if chains.is_empty() {
            return Err(ConfigError::Invalid(format!("{RELAY_CHAINS_ENV} is empty")));
        }

        let min_reward = match lookup(RELAY_MIN_REWARD_ENV) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|e| {
                ConfigError::Invalid(format!("{RELAY_MIN_REWARD_ENV}={raw}: {e}"))
            })?,
            None => DEFAULT_MIN_REWARD,
        };
        if min_reward < 0 {
            return Err(ConfigError::Invalid(format!(
                "{RELAY_MIN_REWARD_ENV} must be >= 0, got {min_reward}"
            )));
        }

        let poll_interval = match lookup(RELAY_POLL_INTERVAL_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "{RELAY_POLL_INTERVAL_ENV}={raw}: expected a positive number of seconds"
                    )))
                }
            },
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            config_path: lookup(RELAY_CONFIG_ENV)
                .unwrap_or_else(|| DEFAULT_RELAY_CONFIG.to_string()),
            chains,
            min_reward,
            poll_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const CONFIG: &str = r#"{
        "networks": {
            "R": {
                "nodeUrls": ["https://node-a.example", "https://node-b.example"],
                "relayer": "3Mrelayer",
                "dApps": {
                    "attestedPools": "3Mattested",
                    "attestedWhitelistPools": "3Mwhitelist",
                    "privatePools": "3Mprivate",
                    "quotes": "3Mquotes",
                    "requests": "3Mrequests",
                    "responses": "3Mresponses"
                },
                "pools": {
                    "3Mprivate": {
                        "aabb": { "addresses": {
                            "3Moracle1": { "urls": ["http://o1"] },
                            "3Moracle2": { "urls": ["http://o2", "http://o3"] }
                        } },
                        "": { "addresses": {} }
                    }
                }
            },
            "T": {
                "nodeUrls": [],
                "dApps": {
                    "attestedPools": "", "attestedWhitelistPools": "", "privatePools": "",
                    "quotes": "", "requests": "", "responses": ""
                }
            }
        }
    }"#;

    fn network() -> NetworkConfig {
        RelayConfig::from_json_str(CONFIG)
            .unwrap()
            .for_chain("R")
            .unwrap()
            .clone()
    }

    #[test]
    fn unknown_chain_lists_known_ones() {
        let config = RelayConfig::from_json_str(CONFIG).unwrap();
        let err = config.for_chain("W").unwrap_err();
        assert_eq!(err.to_string(), "Invalid chain id: W. Known chain ids: R, T");
    }

    #[test]
    fn chain_id_is_filled_from_the_map_key() {
        assert_eq!(network().chain_id, "R");
    }

    #[test]
    fn node_url_is_one_of_the_configured() {
        let network = network();
        let url = network.find_node_url().unwrap();
        assert!(network.node_urls.iter().any(|u| u == url));

        let config = RelayConfig::from_json_str(CONFIG).unwrap();
        let empty = config.for_chain("T").unwrap();
        assert!(empty.find_node_url().is_none());
        assert!(empty.node_url().is_err());
        assert!(empty.relayer().is_err());
    }

    #[test]
    fn pools_resolve_by_address_and_hex_id() {
        let network = network();
        let pool = network.for_pool(&FullPoolId::new("3Mprivate", vec![0xaa, 0xbb]));
        assert_eq!(pool.find_oracle_url("3Moracle1").as_deref(), Some("http://o1"));
        assert!(pool.find_oracle_url("3Munknown").is_none());

        let any = pool.find_oracle_url(ANY_ORACLE).unwrap();
        assert!(["http://o1", "http://o2", "http://o3"].contains(&any.as_str()));

        let missing = network.for_pool(&FullPoolId::new("3Mother", vec![]));
        assert!(missing.find_oracle_url(ANY_ORACLE).is_none());
        let default = network.for_pool(&FullPoolId::new("3Mprivate", vec![]));
        assert!(default.addresses.is_empty());
    }

    #[test]
    fn dapp_names_by_address() {
        let network = network();
        assert_eq!(network.find_dapp_name("3Mrequests"), Some("requests"));
        assert_eq!(network.find_dapp_name("3Mquotes"), Some("quotes"));
        assert_eq!(network.find_dapp_name("3Mnobody"), None);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = RelayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.networks.len(), 2);

        let err = RelayConfig::from_file(file.path().with_extension("missing")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_json_is_reported() {
        assert!(matches!(
            RelayConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn settings_defaults_and_overrides() {
        let defaults = RelaySettings::from_lookup(|_| None).unwrap();
        assert_eq!(defaults.config_path, DEFAULT_RELAY_CONFIG);
        assert_eq!(defaults.chains, vec!["R"]);
        assert_eq!(defaults.min_reward, DEFAULT_MIN_REWARD);
        assert_eq!(defaults.poll_interval, DEFAULT_POLL_INTERVAL);

        let vars: HashMap<&str, &str> = [
            (RELAY_CHAINS_ENV, "R, T"),
            (RELAY_MIN_REWARD_ENV, "5"),
            (RELAY_POLL_INTERVAL_ENV, "2"),
            (RELAY_CONFIG_ENV, "/etc/relay.json"),
        ]
        .into_iter()
        .collect();
        let settings = RelaySettings::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(settings.chains, vec!["R", "T"]);
        assert_eq!(settings.min_reward, 5);
        assert_eq!(settings.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.config_path, "/etc/relay.json");
    }

    #[test]
    fn zero_margin_still_covers_the_fee() {
        let settings = RelaySettings::from_lookup(|k| {
            (k == RELAY_MIN_REWARD_ENV).then(|| "0".to_string())
        })
        .unwrap();
        assert_eq!(settings.min_reward, 0);
        assert_eq!(
            crate::relay::RelayPolicy::new(settings.min_reward).required_reward(),
            crate::relay::SUBMISSION_FEE
        );

        let err = RelaySettings::from_lookup(|k| {
            (k == RELAY_MIN_REWARD_ENV).then(|| "-400000".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains(RELAY_MIN_REWARD_ENV)));
    }

    #[test]
    fn bad_settings_are_rejected() {
        assert!(RelaySettings::from_lookup(|k| {
            (k == RELAY_POLL_INTERVAL_ENV).then(|| "0".to_string())
        })
        .is_err());
        assert!(RelaySettings::from_lookup(|k| {
            (k == RELAY_MIN_REWARD_ENV).then(|| "lots".to_string())
        })
        .is_err());
        assert!(RelaySettings::from_lookup(|k| {
            (k == RELAY_MIN_REWARD_ENV).then(|| "-1".to_string())
        })
        .is_err());
        assert!(RelaySettings::from_lookup(|k| (k == RELAY_CHAINS_ENV).then(|| " , ".to_string()))
            .is_err());
    }
}
