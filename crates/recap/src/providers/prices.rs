//! Native-token spot prices from CoinGecko `simple/price`.

use anyhow::{Context, Result};
use common::chains::{ChainSpec, ALL_CHAINS};
use common::config;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use super::ensure_success;
use crate::metrics::record_api_call;

const PROVIDER: &str = "coingecko";

/// Chain slug -> USD price of the chain's native token.
pub type ChainPrices = BTreeMap<String, f64>;

pub trait PriceSource {
    /// Never fails; unknown or unreachable prices read as zero.
    fn native_prices(&self) -> impl std::future::Future<Output = ChainPrices> + Send;
}

#[derive(Debug, Deserialize)]
pub struct UsdQuote {
    pub usd: Option<f64>,
}

pub fn zero_prices(chains: &[ChainSpec]) -> ChainPrices {
    chains.iter().map(|c| (c.slug.to_string(), 0.0)).collect()
}

/// Map a `simple/price` body (coin id -> quote) back onto chain slugs.
pub fn prices_by_chain(chains: &[ChainSpec], quotes: &HashMap<String, UsdQuote>) -> ChainPrices {
    chains
        .iter()
        .map(|c| {
            let usd = quotes
                .get(c.coingecko_id)
                .and_then(|q| q.usd)
                .filter(|p| p.is_finite() && *p >= 0.0)
                .unwrap_or(0.0);
            (c.slug.to_string(), usd)
        })
        .collect()
}

pub struct CoinGeckoPrices {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoPrices {
    pub fn new(cfg: &config::Prices, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_quotes(&self) -> Result<HashMap<String, UsdQuote>> {
        let ids: BTreeSet<&str> = ALL_CHAINS.iter().map(|c| c.coingecko_id).collect();
        let ids = ids.into_iter().collect::<Vec<_>>().join(",");
        let resp = self
            .client
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .send()
            .await
            .context("coingecko simple/price request failed")?;
        let resp = ensure_success(resp, "coingecko simple/price").await?;
        resp.json()
            .await
            .context("failed to deserialize coingecko simple/price response")
    }
}

impl PriceSource for CoinGeckoPrices {
    async fn native_prices(&self) -> ChainPrices {
        let start = Instant::now();
        let res = self.fetch_quotes().await;
        record_api_call(PROVIDER, "simple_price", start, &res);
        match res {
            Ok(quotes) => prices_by_chain(&ALL_CHAINS, &quotes),
            Err(e) => {
                tracing::warn!(error = %e, "native price lookup failed; USD gas left unpriced");
                zero_prices(&ALL_CHAINS)
            }
        }
    }
}
