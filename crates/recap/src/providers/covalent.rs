//! Fallback EVM tier: Covalent (GoldRush) `transactions_v3`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::chains::{self, ChainSpec, NATIVE_TOKEN_ADDRESS};
use common::config;
use common::types::{TokenRef, Transaction};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::ensure_success;
use crate::metrics::record_api_call;
use crate::normalize::{normalize, token_ref, RawRecord};
use crate::orchestrator::TransactionSource;
use crate::paging::{collect_year, year_of, CursorPager, Ordering, Page};

const PROVIDER: &str = "covalent";
const TRANSFER_EVENTS: [&str; 3] = ["Transfer", "TransferSingle", "TransferBatch"];

#[derive(Debug, Deserialize)]
pub struct CovalentResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub error: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsPage {
    #[serde(default)]
    pub items: Vec<CovalentTransaction>,
    pub links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
pub struct PageLinks {
    /// Older page.
    pub prev: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CovalentTransaction {
    pub tx_hash: String,
    pub block_signed_at: Option<DateTime<Utc>>,
    pub to_address: Option<String>,
    pub value: Option<String>,
    pub gas_spent: Option<u64>,
    pub gas_price: Option<u64>,
    pub gas_quote: Option<f64>,
    pub log_events: Option<Vec<LogEvent>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogEvent {
    pub sender_address: Option<String>,
    pub sender_contract_ticker_symbol: Option<String>,
    pub supports_erc: Option<Vec<String>>,
    #[serde(default)]
    pub raw_log_topics: Vec<String>,
    pub decoded: Option<DecodedEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecodedEvent {
    pub name: String,
}

impl LogEvent {
    fn event_name(&self) -> Option<&str> {
        self.decoded.as_ref().map(|d| d.name.as_str())
    }

    fn is_transfer(&self) -> bool {
        self.event_name()
            .is_some_and(|name| TRANSFER_EVENTS.contains(&name))
    }

    /// ERC-721 `Transfer` indexes the token id, giving it a fourth topic.
    pub fn is_nft(&self) -> bool {
        let nft_standard = self.supports_erc.as_ref().is_some_and(|ercs| {
            ercs.iter()
                .any(|e| e.eq_ignore_ascii_case("erc721") || e.eq_ignore_ascii_case("erc1155"))
        });
        nft_standard
            || match self.event_name() {
                Some("TransferSingle" | "TransferBatch") => true,
                Some("Transfer") => self.raw_log_topics.len() == 4,
                _ => false,
            }
    }
}

impl CovalentTransaction {
    fn events(&self) -> impl Iterator<Item = &LogEvent> {
        self.log_events.iter().flatten()
    }

    fn moves_native_value(&self) -> bool {
        self.value
            .as_deref()
            .is_some_and(|v| !v.trim_start_matches('0').is_empty())
    }
}

impl RawRecord for CovalentTransaction {
    fn group_key(&self) -> &str {
        &self.tx_hash
    }

    fn recipient(&self) -> Option<&str> {
        self.to_address.as_deref()
    }

    fn token_refs(&self, chain: &ChainSpec) -> Vec<TokenRef> {
        let mut tokens: Vec<TokenRef> = self
            .events()
            .filter(|e| e.is_transfer())
            .filter_map(|e| {
                let contract = e.sender_address.as_deref().filter(|a| !a.is_empty())?;
                Some(token_ref(e.sender_contract_ticker_symbol.as_deref(), contract))
            })
            .collect();
        if self.moves_native_value() {
            tokens.push(token_ref(Some(chain.native_symbol), NATIVE_TOKEN_ADDRESS));
        }
        tokens
    }

    fn is_nft(&self) -> bool {
        self.events().any(LogEvent::is_nft)
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.block_signed_at
    }

    fn native_fee_base_units(&self) -> Option<u128> {
        let spent = u128::from(self.gas_spent?);
        let price = u128::from(self.gas_price?);
        Some(spent.saturating_mul(price))
    }

    fn fee_quote_usd(&self) -> Option<f64> {
        self.gas_quote.filter(|q| q.is_finite())
    }
}

pub struct CovalentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    ordering: Ordering,
}

impl CovalentClient {
    pub fn new(cfg: &config::Covalent, api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            page_size: cfg.page_size,
            ordering: Ordering::from_assumption(cfg.assume_descending),
        })
    }

    pub fn first_page_url(&self, chain: &ChainSpec, address: &str) -> String {
        format!(
            "{}/{}/address/{}/transactions_v3/?quote-currency=USD&page-size={}",
            self.base_url, chain.covalent_slug, address, self.page_size
        )
    }

    pub async fn fetch_chain_transactions(
        &self,
        chain: &ChainSpec,
        address: &str,
        year: i32,
    ) -> Result<Vec<Transaction>> {
        let pager = TransactionsPager {
            client: self,
            first_url: self.first_page_url(chain, address),
        };
        let scan = collect_year(&pager, year)
            .await
            .with_context(|| format!("covalent transactions failed on {}", chain.slug))?;

        let txs = normalize(&scan.items, &HashMap::new(), chain);
        tracing::info!(
            provider = PROVIDER,
            chain = chain.slug,
            pages = scan.pages,
            transactions = txs.len(),
            "chain fetched"
        );
        metrics::counter!("recap_transactions_normalized_total", "chain" => chain.slug)
            .increment(txs.len() as u64);
        Ok(txs)
    }

    async fn fetch_page_at(&self, url: &str) -> Result<Page<CovalentTransaction, String>> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("covalent transactions_v3 request failed")?;
        let resp = ensure_success(resp, "covalent transactions_v3").await?;
        let body: CovalentResponse<TransactionsPage> = resp
            .json()
            .await
            .context("failed to deserialize covalent transactions_v3 response")?;
        page_from_response(body)
    }
}

/// Unwrap the envelope; the cursor is the link to the next older page.
pub fn page_from_response(
    body: CovalentResponse<TransactionsPage>,
) -> Result<Page<CovalentTransaction, String>> {
    if body.error {
        anyhow::bail!(
            "covalent error: {}",
            body.error_message.as_deref().unwrap_or("unknown")
        );
    }
    let data = body.data.context("covalent response has no data")?;
    Ok(Page {
        items: data.items,
        next_cursor: data
            .links
            .and_then(|l| l.prev)
            .filter(|url| !url.is_empty()),
    })
}

impl TransactionSource for CovalentClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_transactions(&self, address: &str, year: i32) -> Result<Vec<Transaction>> {
        super::fetch_all_chains(chains::EVM_CHAINS.iter(), |chain| {
            self.fetch_chain_transactions(chain, address, year)
        })
        .await
    }
}

struct TransactionsPager<'a> {
    client: &'a CovalentClient,
    first_url: String,
}

impl CursorPager for TransactionsPager<'_> {
    type Item = CovalentTransaction;
    type Cursor = String;

    fn ordering(&self) -> Ordering {
        self.client.ordering
    }

    fn item_year(&self, item: &CovalentTransaction) -> Option<i32> {
        item.block_signed_at.map(year_of)
    }

    async fn fetch_page(
        &self,
        cursor: Option<&String>,
    ) -> Result<Page<CovalentTransaction, String>> {
        let url = cursor.unwrap_or(&self.first_url);
        let start = Instant::now();
        let res = self.client.fetch_page_at(url).await;
        record_api_call(PROVIDER, "transactions_v3", start, &res);
        res
    }
}
