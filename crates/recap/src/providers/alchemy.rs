//! Primary EVM tier: Alchemy `alchemy_getAssetTransfers` plus batched receipts for fees.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::chains::{self, ChainSpec, NATIVE_TOKEN_ADDRESS};
use common::config;
use common::types::{TokenRef, Transaction};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use super::{ensure_success, parse_hex_u128, JsonRpcRequest, JsonRpcResponse};
use crate::gas::{self, GasReceipt, ReceiptBatcher};
use crate::metrics::record_api_call;
use crate::normalize::{normalize, token_ref, RawRecord};
use crate::orchestrator::TransactionSource;
use crate::paging::{collect_year, year_of, CursorPager, Ordering, Page};

const PROVIDER: &str = "alchemy";
const CATEGORIES: [&str; 4] = ["external", "erc20", "erc721", "erc1155"];
const NFT_CATEGORIES: [&str; 3] = ["erc721", "erc1155", "specialnft"];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlchemyTransfer {
    pub unique_id: String,
    pub hash: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub asset: Option<String>,
    pub category: String,
    pub raw_contract: Option<RawContract>,
    pub metadata: Option<TransferMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContract {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    pub block_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransfersResult {
    pub transfers: Vec<AlchemyTransfer>,
    pub page_key: Option<String>,
}

impl RawRecord for AlchemyTransfer {
    fn group_key(&self) -> &str {
        &self.hash
    }

    fn recipient(&self) -> Option<&str> {
        self.to.as_deref()
    }

    fn token_refs(&self, chain: &ChainSpec) -> Vec<TokenRef> {
        let contract = self
            .raw_contract
            .as_ref()
            .and_then(|c| c.address.as_deref())
            .filter(|a| !a.is_empty());
        match contract {
            Some(addr) => vec![token_ref(self.asset.as_deref(), addr)],
            None if self.category == "external" || self.category == "internal" => {
                let symbol = self.asset.as_deref().unwrap_or(chain.native_symbol);
                vec![token_ref(Some(symbol), NATIVE_TOKEN_ADDRESS)]
            }
            None => vec![],
        }
    }

    fn is_nft(&self) -> bool {
        NFT_CATEGORIES.contains(&self.category.as_str())
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.metadata.as_ref().and_then(|m| m.block_timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    fn address_field(self) -> &'static str {
        match self {
            Self::Inbound => "toAddress",
            Self::Outbound => "fromAddress",
        }
    }
}

/// Params object for one `alchemy_getAssetTransfers` call.
pub fn asset_transfers_params(
    address: &str,
    direction: Direction,
    max_count: u32,
    page_key: Option<&str>,
) -> serde_json::Value {
    let mut params = json!({
        "fromBlock": "0x0",
        "toBlock": "latest",
        "category": CATEGORIES,
        "withMetadata": true,
        "excludeZeroValue": false,
        "order": "desc",
        "maxCount": format!("{max_count:#x}"),
    });
    params[direction.address_field()] = json!(address);
    if let Some(key) = page_key {
        params["pageKey"] = json!(key);
    }
    params
}

/// Keep the first occurrence of each `uniqueId` across both directions.
/// Outbound comes first so the wallet's own sends decide each group's counterparty.
pub fn merge_transfers(
    inbound: Vec<AlchemyTransfer>,
    outbound: Vec<AlchemyTransfer>,
) -> Vec<AlchemyTransfer> {
    let mut seen = HashSet::new();
    outbound
        .into_iter()
        .chain(inbound)
        .filter(|t| seen.insert(t.unique_id.clone()))
        .collect()
}

/// Hashes of transactions the wallet sent. Only these carry a fee paid by the wallet.
pub fn sent_hashes(transfers: &[AlchemyTransfer], address: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    transfers
        .iter()
        .filter(|t| {
            t.from
                .as_deref()
                .is_some_and(|from| from.eq_ignore_ascii_case(address))
        })
        .filter(|t| seen.insert(t.hash.as_str()))
        .map(|t| t.hash.clone())
        .collect()
}

pub struct AlchemyClient {
    client: reqwest::Client,
    endpoints: BTreeMap<String, String>,
    api_key: String,
    max_count: u32,
    ordering: Ordering,
}

impl AlchemyClient {
    pub fn new(
        cfg: &config::Alchemy,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            endpoints: cfg.endpoints.clone(),
            api_key: api_key.to_string(),
            max_count: cfg.max_count,
            ordering: Ordering::from_assumption(cfg.assume_descending),
        })
    }

    /// Supported EVM chains that have a configured endpoint.
    pub fn chains(&self) -> Vec<&'static ChainSpec> {
        chains::EVM_CHAINS
            .iter()
            .filter(|c| self.endpoints.contains_key(c.slug))
            .collect()
    }

    pub fn rpc_url(&self, chain: &ChainSpec) -> Result<String> {
        let base = self
            .endpoints
            .get(chain.slug)
            .with_context(|| format!("no alchemy endpoint for {}", chain.slug))?;
        Ok(format!("{}/{}", base.trim_end_matches('/'), self.api_key))
    }

    /// Inbound and outbound transfers for one chain within `year`, deduplicated.
    pub async fn fetch_chain_transfers(
        &self,
        chain: &ChainSpec,
        address: &str,
        year: i32,
    ) -> Result<Vec<AlchemyTransfer>> {
        let url = self.rpc_url(chain)?;
        let inbound = AssetTransferPager {
            client: self,
            url: &url,
            address,
            direction: Direction::Inbound,
        };
        let outbound = AssetTransferPager {
            client: self,
            url: &url,
            address,
            direction: Direction::Outbound,
        };

        let (inbound, outbound) =
            tokio::try_join!(collect_year(&inbound, year), collect_year(&outbound, year))?;
        Ok(merge_transfers(inbound.items, outbound.items))
    }

    pub async fn fetch_chain_transactions(
        &self,
        chain: &ChainSpec,
        address: &str,
        year: i32,
    ) -> Result<Vec<Transaction>> {
        let transfers = self
            .fetch_chain_transfers(chain, address, year)
            .await
            .with_context(|| format!("alchemy transfers failed on {}", chain.slug))?;

        let hashes = sent_hashes(&transfers, address);
        let rpc = ReceiptRpc {
            client: &self.client,
            url: self.rpc_url(chain)?,
        };
        let gas_by_hash = gas::resolve_gas(&rpc, chain.slug, &hashes).await;

        let txs = normalize(&transfers, &gas_by_hash, chain);
        tracing::info!(
            provider = PROVIDER,
            chain = chain.slug,
            transfers = transfers.len(),
            transactions = txs.len(),
            "chain fetched"
        );
        metrics::counter!("recap_transactions_normalized_total", "chain" => chain.slug)
            .increment(txs.len() as u64);
        Ok(txs)
    }

    async fn fetch_transfers_page(
        &self,
        url: &str,
        address: &str,
        direction: Direction,
        page_key: Option<&str>,
    ) -> Result<Page<AlchemyTransfer, String>> {
        let params = asset_transfers_params(address, direction, self.max_count, page_key);
        let body = JsonRpcRequest::new(1, "alchemy_getAssetTransfers", [params]);

        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("alchemy_getAssetTransfers request failed")?;
        let resp = ensure_success(resp, "alchemy_getAssetTransfers").await?;
        let parsed: JsonRpcResponse<AssetTransfersResult> = resp
            .json()
            .await
            .context("failed to deserialize alchemy_getAssetTransfers response")?;
        let result = parsed.into_result("alchemy_getAssetTransfers")?;

        Ok(Page {
            items: result.transfers,
            next_cursor: result.page_key.filter(|k| !k.is_empty()),
        })
    }
}

impl TransactionSource for AlchemyClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_transactions(&self, address: &str, year: i32) -> Result<Vec<Transaction>> {
        super::fetch_all_chains(self.chains(), |chain| {
            self.fetch_chain_transactions(chain, address, year)
        })
        .await
    }
}

struct AssetTransferPager<'a> {
    client: &'a AlchemyClient,
    url: &'a str,
    address: &'a str,
    direction: Direction,
}

impl CursorPager for AssetTransferPager<'_> {
    type Item = AlchemyTransfer;
    type Cursor = String;

    fn ordering(&self) -> Ordering {
        self.client.ordering
    }

    fn item_year(&self, item: &AlchemyTransfer) -> Option<i32> {
        item.occurred_at().map(year_of)
    }

    async fn fetch_page(&self, cursor: Option<&String>) -> Result<Page<AlchemyTransfer, String>> {
        let start = Instant::now();
        let res = self
            .client
            .fetch_transfers_page(self.url, self.address, self.direction, cursor.map(String::as_str))
            .await;
        record_api_call(PROVIDER, "asset_transfers", start, &res);
        res
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptResult {
    gas_used: String,
    effective_gas_price: Option<String>,
}

struct ReceiptRpc<'a> {
    client: &'a reqwest::Client,
    url: String,
}

/// Map a JSON-RPC batch response back onto the requested hashes by `id`.
fn receipts_from_batch(
    hashes: &[String],
    responses: Vec<JsonRpcResponse<Option<ReceiptResult>>>,
) -> Vec<(String, GasReceipt)> {
    responses
        .into_iter()
        .filter_map(|resp| {
            let idx = usize::try_from(resp.id.as_u64()?).ok()?;
            let hash = hashes.get(idx)?;
            let receipt = resp.result.flatten()?;
            let gas_used = parse_hex_u128(&receipt.gas_used)?;
            let gas_price = parse_hex_u128(receipt.effective_gas_price.as_deref()?)?;
            Some((
                hash.clone(),
                GasReceipt {
                    gas_used,
                    gas_price,
                },
            ))
        })
        .collect()
}

impl ReceiptBatcher for ReceiptRpc<'_> {
    async fn fetch_receipts(&self, hashes: &[String]) -> Result<Vec<(String, GasReceipt)>> {
        let batch: Vec<_> = hashes
            .iter()
            .enumerate()
            .map(|(i, h)| JsonRpcRequest::new(i, "eth_getTransactionReceipt", [h.as_str()]))
            .collect();

        let start = Instant::now();
        let res = async {
            let resp = self
                .client
                .post(&self.url)
                .json(&batch)
                .send()
                .await
                .context("eth_getTransactionReceipt batch request failed")?;
            let resp = ensure_success(resp, "eth_getTransactionReceipt batch").await?;
            let parsed: Vec<JsonRpcResponse<Option<ReceiptResult>>> = resp
                .json()
                .await
                .context("failed to deserialize receipt batch")?;
            Ok::<_, anyhow::Error>(parsed)
        }
        .await;
        record_api_call(PROVIDER, "receipts", start, &res);

        Ok(receipts_from_batch(hashes, res?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::chains::ETH_MAINNET;
    use std::collections::HashMap;

    const PAGE: &str = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "transfers": [
                {
                    "blockNum": "0x12a05f2",
                    "uniqueId": "0xaaa:log:1",
                    "hash": "0xaaa",
                    "from": "0xwallet",
                    "to": "0xmarket",
                    "value": null,
                    "erc721TokenId": "0x01",
                    "asset": "PUNK",
                    "category": "erc721",
                    "rawContract": {"value": null, "address": "0xPunks", "decimal": null},
                    "metadata": {"blockTimestamp": "2024-05-01T10:00:00.000Z"}
                },
                {
                    "blockNum": "0x12a05f2",
                    "uniqueId": "0xaaa:external",
                    "hash": "0xaaa",
                    "from": "0xwallet",
                    "to": "0xmarket",
                    "value": 0.5,
                    "asset": "ETH",
                    "category": "external",
                    "rawContract": {"value": "0x6f05b59d3b20000", "address": null, "decimal": "0x12"},
                    "metadata": {"blockTimestamp": "2024-05-01T10:00:00.000Z"}
                }
            ],
            "pageKey": "c1a2b3"
        }
    }"#;

    fn parse_page() -> AssetTransfersResult {
        let resp: JsonRpcResponse<AssetTransfersResult> = serde_json::from_str(PAGE).unwrap();
        resp.into_result("alchemy_getAssetTransfers").unwrap()
    }

    #[test]
    fn test_parse_asset_transfers_page() {
        let result = parse_page();
        assert_eq!(result.transfers.len(), 2);
        assert_eq!(result.page_key.as_deref(), Some("c1a2b3"));
        assert_eq!(
            result.transfers[0].occurred_at().map(year_of),
            Some(2024)
        );
    }

    #[test]
    fn test_params_for_each_direction() {
        let inbound = asset_transfers_params("0xw", Direction::Inbound, 1000, None);
        assert_eq!(inbound["toAddress"], "0xw");
        assert!(inbound.get("fromAddress").is_none());
        assert_eq!(inbound["maxCount"], "0x3e8");
        assert_eq!(inbound["order"], "desc");
        assert!(inbound.get("pageKey").is_none());

        let outbound = asset_transfers_params("0xw", Direction::Outbound, 1000, Some("k2"));
        assert_eq!(outbound["fromAddress"], "0xw");
        assert_eq!(outbound["pageKey"], "k2");
        assert_eq!(outbound["category"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_merge_dedups_by_unique_id() {
        let page = parse_page();
        let merged = merge_transfers(page.transfers.clone(), page.transfers);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_normalize_alchemy_group() {
        let page = parse_page();
        let txs = normalize(&page.transfers, &HashMap::new(), &ETH_MAINNET);
        assert_eq!(txs.len(), 1);
        assert!(txs[0].is_nft_transfer);
        assert_eq!(txs[0].counterparty_address, "0xmarket");
        let tokens: Vec<(&str, &str)> = txs[0]
            .tokens
            .iter()
            .map(|t| (t.symbol.as_str(), t.contract_address.as_str()))
            .collect();
        assert_eq!(
            tokens,
            vec![("PUNK", "0xPunks"), ("ETH", NATIVE_TOKEN_ADDRESS)]
        );
    }

    fn transfer(
        unique_id: &str,
        from: &str,
        to: &str,
        asset: &str,
        contract: Option<&str>,
    ) -> AlchemyTransfer {
        AlchemyTransfer {
            unique_id: unique_id.to_string(),
            hash: unique_id.split(':').next().unwrap().to_string(),
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            asset: Some(asset.to_string()),
            category: if contract.is_some() { "erc20" } else { "external" }.to_string(),
            raw_contract: Some(RawContract {
                address: contract.map(str::to_string),
            }),
            metadata: None,
        }
    }

    #[test]
    fn test_swap_counterparty_is_router() {
        let usdc_in = transfer("0xswap:log:3", "0xpool", "0xwallet", "USDC", Some("0xa0b8"));
        let eth_out = transfer("0xswap:external", "0xwallet", "0xrouter", "ETH", None);

        let merged = merge_transfers(vec![usdc_in], vec![eth_out]);
        let txs = normalize(&merged, &HashMap::new(), &ETH_MAINNET);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].counterparty_address, "0xrouter");
        assert_eq!(txs[0].tokens.len(), 2);
    }

    #[test]
    fn test_sent_hashes_skip_receive_only_transactions() {
        let transfers = vec![
            transfer("0xswap:external", "0xwallet", "0xrouter", "ETH", None),
            transfer("0xswap:log:3", "0xpool", "0xwallet", "USDC", Some("0xa0b8")),
            transfer("0xdrop:log:0", "0xspammer", "0xwallet", "SCAM", Some("0x5c")),
            transfer("0xsend:external", "0xWALLET", "0xfriend", "ETH", None),
        ];
        assert_eq!(
            sent_hashes(&transfers, "0xwallet"),
            vec!["0xswap".to_string(), "0xsend".to_string()]
        );
        assert!(sent_hashes(&transfers[1..3], "0xwallet").is_empty());
    }

    #[test]
    fn test_receipts_from_batch_matches_ids_and_skips_nulls() {
        let json = r#"[
            {"jsonrpc":"2.0","id":1,"result":{"gasUsed":"0x5208","effectiveGasPrice":"0x3b9aca00"}},
            {"jsonrpc":"2.0","id":0,"result":null},
            {"jsonrpc":"2.0","id":2,"error":{"code":-32000,"message":"limit"}}
        ]"#;
        let responses: Vec<JsonRpcResponse<Option<ReceiptResult>>> =
            serde_json::from_str(json).unwrap();
        let hashes = vec!["0xa".to_string(), "0xb".to_string(), "0xc".to_string()];

        let got = receipts_from_batch(&hashes, responses);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, "0xb");
        assert_eq!(got[0].1.gas_used, 21_000);
        assert_eq!(got[0].1.gas_price, 1_000_000_000);
    }

    #[test]
    fn test_chains_follow_configured_endpoints() {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(
            "base-mainnet".to_string(),
            "https://base-mainnet.g.alchemy.com/v2/".to_string(),
        );
        let cfg = config::Alchemy {
            endpoints,
            max_count: 1000,
            assume_descending: true,
        };
        let client = AlchemyClient::new(&cfg, "key123", Duration::from_secs(5)).unwrap();
        let slugs: Vec<&str> = client.chains().iter().map(|c| c.slug).collect();
        assert_eq!(slugs, vec!["base-mainnet"]);
        assert_eq!(
            client.rpc_url(&chains::BASE_MAINNET).unwrap(),
            "https://base-mainnet.g.alchemy.com/v2/key123"
        );
        assert!(client.rpc_url(&ETH_MAINNET).is_err());
    }
}
