use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A token touched by a transaction. `symbol` falls back to the contract/mint
/// address when the provider does not supply one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub symbol: String,
    pub contract_address: String,
}

/// Fee paid for a transaction, in native units and USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GasSpent {
    pub native: f64,
    pub usd: f64,
}

impl GasSpent {
    pub fn add(&mut self, other: GasSpent) {
        self.native += other.native;
        self.usd += other.usd;
    }
}

/// Provider-agnostic transaction. One per distinct hash/signature per chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub chain_id: u64,
    pub chain_name: String,
    pub counterparty_address: String,
    pub tokens: Vec<TokenRef>,
    pub is_nft_transfer: bool,
    pub gas_spent: GasSpent,
    /// Only used for year bucketing; never aggregated.
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopToken {
    pub symbol: String,
    pub count: u64,
}

/// Aggregate bundle fed to the nameplate classifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecapStats {
    pub transactions_by_chain: BTreeMap<String, u64>,
    pub nft_count: u64,
    pub gas_spent_by_chain: BTreeMap<String, GasSpent>,
}

/// Final per-wallet, per-year summary returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecap {
    pub address: String,
    pub year: i32,
    pub top_token: Option<TopToken>,
    pub unique_counterparty_count: u64,
    pub nft_count: u64,
    pub gas_spent_by_chain: BTreeMap<String, GasSpent>,
    pub nameplates: Vec<String>,
    pub transactions_by_chain: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_recap_serializes_camel_case() {
        let mut by_chain = BTreeMap::new();
        by_chain.insert("eth-mainnet".to_string(), 3);

        let recap = WalletRecap {
            address: "0xabc".to_string(),
            year: 2024,
            top_token: None,
            unique_counterparty_count: 2,
            nft_count: 0,
            gas_spent_by_chain: BTreeMap::new(),
            nameplates: vec![],
            transactions_by_chain: by_chain,
        };

        let json = serde_json::to_value(&recap).unwrap();
        assert_eq!(json["uniqueCounterpartyCount"], 2);
        assert_eq!(json["transactionsByChain"]["eth-mainnet"], 3);
        assert!(json["topToken"].is_null());
    }

    #[test]
    fn test_gas_spent_add_accumulates_both_fields() {
        let mut total = GasSpent::default();
        total.add(GasSpent {
            native: 0.5,
            usd: 10.0,
        });
        total.add(GasSpent {
            native: 0.25,
            usd: 5.0,
        });
        assert!((total.native - 0.75).abs() < 1e-12);
        assert!((total.usd - 15.0).abs() < 1e-12);
    }
}
