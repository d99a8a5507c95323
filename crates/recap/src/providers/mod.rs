pub mod alchemy;
pub mod covalent;
pub mod helius;
pub mod prices;

use anyhow::{Context, Result};
use common::chains::ChainSpec;
use common::types::Transaction;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

/// Run `fetch` for every chain concurrently and flatten the results.
/// One failing chain fails the whole call; partial results are discarded.
pub async fn fetch_all_chains<'c, I, F, Fut>(chains: I, fetch: F) -> Result<Vec<Transaction>>
where
    I: IntoIterator<Item = &'c ChainSpec>,
    F: FnMut(&'c ChainSpec) -> Fut,
    Fut: Future<Output = Result<Vec<Transaction>>>,
{
    let per_chain = try_join_all(chains.into_iter().map(fetch)).await?;
    Ok(per_chain.into_iter().flatten().collect())
}

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> JsonRpcRequest<'a, P> {
    pub fn new(id: impl Into<serde_json::Value>, method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.into(),
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub id: serde_json::Value,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl<T> JsonRpcResponse<T> {
    /// The `result`, or an error if the call failed or returned nothing.
    pub fn into_result(self, method: &str) -> Result<T> {
        if let Some(err) = self.error {
            anyhow::bail!("{method} failed: {} (code {})", err.message, err.code);
        }
        self.result
            .with_context(|| format!("{method} returned neither result nor error"))
    }
}

/// Fail with the status and body on a non-2xx response.
pub async fn ensure_success(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("{what} returned {status}: {body}")
}

/// Parse a `0x`-prefixed hex quantity as used by Ethereum JSON-RPC.
pub fn parse_hex_u128(s: &str) -> Option<u128> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    if digits.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(digits, 16).ok()
}
