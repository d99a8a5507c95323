//! Solana provider: Helius enhanced-transactions REST API plus DAS `getAssetBatch`
//! for mint symbols.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::chains::{ChainSpec, SOLANA_MAINNET};
use common::config;
use common::types::{TokenRef, Transaction};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use super::{ensure_success, JsonRpcRequest, JsonRpcResponse};
use crate::metrics::record_api_call;
use crate::normalize::{normalize, token_ref, RawRecord};
use crate::orchestrator::TransactionSource;
use crate::paging::{collect_year, year_of_unix, CursorPager, Ordering, Page};

const PROVIDER: &str = "helius";
/// DAS caps `getAssetBatch` at 1000 ids; smaller batches keep responses small.
pub const ASSET_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeliusTransaction {
    pub signature: String,
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub fee: u64,
    pub token_transfers: Option<Vec<TokenTransfer>>,
    pub native_transfers: Option<Vec<NativeTransfer>>,
    pub events: Option<HeliusEvents>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub mint: Option<String>,
    pub to_user_account: Option<String>,
    pub token_standard: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTransfer {
    pub to_user_account: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeliusEvents {
    pub nft: Option<serde_json::Value>,
}

impl HeliusTransaction {
    fn token_transfers(&self) -> &[TokenTransfer] {
        self.token_transfers.as_deref().unwrap_or_default()
    }

    fn native_transfers(&self) -> &[NativeTransfer] {
        self.native_transfers.as_deref().unwrap_or_default()
    }
}

impl RawRecord for HeliusTransaction {
    fn group_key(&self) -> &str {
        &self.signature
    }

    /// First native recipient, else the first token recipient.
    fn recipient(&self) -> Option<&str> {
        match self.native_transfers().first() {
            Some(native) => native.to_user_account.as_deref(),
            None => self
                .token_transfers()
                .first()
                .and_then(|t| t.to_user_account.as_deref()),
        }
    }

    fn token_refs(&self, _chain: &ChainSpec) -> Vec<TokenRef> {
        self.token_transfers()
            .iter()
            .filter_map(|t| t.mint.as_deref().filter(|m| !m.is_empty()))
            .map(|mint| token_ref(None, mint))
            .collect()
    }

    fn is_nft(&self) -> bool {
        let nft_event = self
            .events
            .as_ref()
            .and_then(|e| e.nft.as_ref())
            .is_some_and(|v| !v.is_null());
        nft_event
            || self.token_transfers().iter().any(|t| {
                t.token_standard
                    .as_deref()
                    .is_some_and(|s| s.starts_with("NonFungible"))
            })
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp?, 0)
    }

    fn native_fee_base_units(&self) -> Option<u128> {
        Some(u128::from(self.fee))
    }
}

#[derive(Debug, Deserialize)]
pub struct Asset {
    pub id: String,
    pub content: Option<AssetContent>,
}

#[derive(Debug, Deserialize)]
pub struct AssetContent {
    pub metadata: Option<AssetMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct AssetMetadata {
    pub symbol: Option<String>,
}

/// Mint -> symbol for every asset that carries a non-empty symbol.
pub fn symbols_from_assets(assets: Vec<Option<Asset>>) -> HashMap<String, String> {
    assets
        .into_iter()
        .flatten()
        .filter_map(|asset| {
            let symbol = asset.content?.metadata?.symbol?;
            let symbol = symbol.trim();
            (!symbol.is_empty()).then(|| (asset.id, symbol.to_string()))
        })
        .collect()
}

/// Replace placeholder symbols (the mint itself) with resolved ones.
pub fn apply_symbols(txs: &mut [Transaction], symbols: &HashMap<String, String>) {
    for token in txs.iter_mut().flat_map(|tx| tx.tokens.iter_mut()) {
        if let Some(symbol) = symbols.get(&token.contract_address) {
            token.symbol.clone_from(symbol);
        }
    }
}

pub struct HeliusClient {
    client: reqwest::Client,
    base_url: String,
    rpc_url: String,
    api_key: String,
}

impl HeliusClient {
    pub fn new(cfg: &config::Helius, api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            rpc_url: cfg.rpc_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn transactions_url(&self, address: &str) -> String {
        format!("{}/v0/addresses/{}/transactions", self.base_url, address)
    }

    async fn fetch_page_before(
        &self,
        address: &str,
        before: Option<&str>,
    ) -> Result<Page<HeliusTransaction, String>> {
        let mut query = vec![("api-key", self.api_key.as_str())];
        if let Some(sig) = before {
            query.push(("before", sig));
        }
        let resp = self
            .client
            .get(self.transactions_url(address))
            .query(&query)
            .send()
            .await
            .context("helius transactions request failed")?;
        let resp = ensure_success(resp, "helius transactions").await?;
        let items: Vec<HeliusTransaction> = resp
            .json()
            .await
            .context("failed to deserialize helius transactions response")?;

        let next_cursor = items.last().map(|tx| tx.signature.clone());
        Ok(Page { items, next_cursor })
    }

    async fn fetch_asset_batch(&self, mints: &[String]) -> Result<HashMap<String, String>> {
        let body = JsonRpcRequest::new("asset-symbols", "getAssetBatch", json!({ "ids": mints }));
        let resp = self
            .client
            .post(&self.rpc_url)
            .query(&[("api-key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("getAssetBatch request failed")?;
        let resp = ensure_success(resp, "getAssetBatch").await?;
        let parsed: JsonRpcResponse<Vec<Option<Asset>>> = resp
            .json()
            .await
            .context("failed to deserialize getAssetBatch response")?;
        Ok(symbols_from_assets(parsed.into_result("getAssetBatch")?))
    }

    /// Best effort: a failed batch leaves its mints unresolved.
    pub async fn resolve_symbols(&self, mints: &[String]) -> HashMap<String, String> {
        let mut symbols = HashMap::new();
        for batch in mints.chunks(ASSET_BATCH_SIZE) {
            let start = Instant::now();
            let res = self.fetch_asset_batch(batch).await;
            record_api_call(PROVIDER, "get_asset_batch", start, &res);
            match res {
                Ok(found) => symbols.extend(found),
                Err(e) => {
                    tracing::warn!(size = batch.len(), error = %e, "mint symbol lookup failed");
                }
            }
        }
        symbols
    }
}

impl TransactionSource for HeliusClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_transactions(&self, address: &str, year: i32) -> Result<Vec<Transaction>> {
        let pager = SignaturePager {
            client: self,
            address,
        };
        let scan = collect_year(&pager, year).await?;
        let mut txs = normalize(&scan.items, &HashMap::new(), &SOLANA_MAINNET);

        let mints: Vec<String> = txs
            .iter()
            .flat_map(|tx| tx.tokens.iter().map(|t| t.contract_address.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !mints.is_empty() {
            let symbols = self.resolve_symbols(&mints).await;
            apply_symbols(&mut txs, &symbols);
        }

        tracing::info!(
            provider = PROVIDER,
            chain = SOLANA_MAINNET.slug,
            pages = scan.pages,
            transactions = txs.len(),
            mints = mints.len(),
            "chain fetched"
        );
        metrics::counter!("recap_transactions_normalized_total", "chain" => SOLANA_MAINNET.slug)
            .increment(txs.len() as u64);
        Ok(txs)
    }
}

struct SignaturePager<'a> {
    client: &'a HeliusClient,
    address: &'a str,
}

impl CursorPager for SignaturePager<'_> {
    type Item = HeliusTransaction;
    type Cursor = String;

    /// Helius returns signatures newest first.
    fn ordering(&self) -> Ordering {
        Ordering::NewestFirst
    }

    fn item_year(&self, item: &HeliusTransaction) -> Option<i32> {
        year_of_unix(item.timestamp?)
    }

    async fn fetch_page(&self, cursor: Option<&String>) -> Result<Page<HeliusTransaction, String>> {
        let start = Instant::now();
        let res = self
            .client
            .fetch_page_before(self.address, cursor.map(String::as_str))
            .await;
        record_api_call(PROVIDER, "transactions", start, &res);
        res
    }
}
