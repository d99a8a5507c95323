use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::chains;
use crate::error::RecapError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: General,
    pub server: Server,
    pub http: Http,
    pub providers: Providers,
    pub prices: Prices,
    #[serde(default)]
    pub nameplates: Nameplates,
    pub observability: Option<Observability>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_format() -> String {
    "json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
    pub alchemy: Alchemy,
    pub covalent: Covalent,
    pub helius: Helius,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Alchemy {
    /// Canonical chain slug -> JSON-RPC base URL (the API key is appended as a path segment).
    pub endpoints: BTreeMap<String, String>,
    pub max_count: u32,
    #[serde(default = "default_true")]
    pub assume_descending: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Covalent {
    pub base_url: String,
    pub page_size: u32,
    #[serde(default = "default_true")]
    pub assume_descending: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Helius {
    pub base_url: String,
    pub rpc_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prices {
    pub base_url: String,
}

fn default_true() -> bool {
    true
}

/// Badge thresholds. Tunable policy; defaults mirror the product's launch values.
#[derive(Debug, Clone, Deserialize)]
pub struct Nameplates {
    pub gas_guzzler_min_usd: f64,
    pub nft_collector_min_nfts: u64,
    pub chain_hopper_min_chains: usize,
    pub defi_degen_min_transactions: u64,
}

impl Default for Nameplates {
    fn default() -> Self {
        Self {
            gas_guzzler_min_usd: 500.0,
            nft_collector_min_nfts: 10,
            chain_hopper_min_chains: 3,
            defi_degen_min_transactions: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Observability {
    pub prometheus_port: u16,
}

impl Config {
    /// Load from `RECAP_CONFIG` if set, else `config/default.toml`.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("RECAP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse recap config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.server.port > 0, "server.port must be > 0");
        anyhow::ensure!(self.http.timeout_secs > 0, "http.timeout_secs must be > 0");
        anyhow::ensure!(
            self.providers.covalent.page_size > 0,
            "providers.covalent.page_size must be > 0"
        );
        anyhow::ensure!(
            self.providers.alchemy.max_count > 0,
            "providers.alchemy.max_count must be > 0"
        );
        for slug in self.providers.alchemy.endpoints.keys() {
            anyhow::ensure!(
                chains::by_slug(slug).is_some(),
                "providers.alchemy.endpoints has unknown chain: {slug}"
            );
        }
        anyhow::ensure!(
            self.nameplates.gas_guzzler_min_usd >= 0.0,
            "nameplates.gas_guzzler_min_usd must be >= 0"
        );
        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

/// Provider API keys. Read once at startup and passed into each client.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub alchemy_api_key: Option<String>,
    pub covalent_api_key: Option<String>,
    pub helius_api_key: Option<String>,
}

pub const ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";
pub const COVALENT_API_KEY: &str = "COVALENT_API_KEY";
pub const HELIUS_API_KEY: &str = "HELIUS_API_KEY";

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            alchemy_api_key: get(ALCHEMY_API_KEY),
            covalent_api_key: get(COVALENT_API_KEY),
            helius_api_key: get(HELIUS_API_KEY),
        }
    }

    pub fn alchemy(&self) -> Result<&str, RecapError> {
        self.alchemy_api_key
            .as_deref()
            .ok_or(RecapError::MissingCredential(ALCHEMY_API_KEY))
    }

    pub fn covalent(&self) -> Result<&str, RecapError> {
        self.covalent_api_key
            .as_deref()
            .ok_or(RecapError::MissingCredential(COVALENT_API_KEY))
    }

    pub fn helius(&self) -> Result<&str, RecapError> {
        self.helius_api_key
            .as_deref()
            .ok_or(RecapError::MissingCredential(HELIUS_API_KEY))
    }
}
