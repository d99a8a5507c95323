//! Pure reductions over canonical transactions.

use common::types::{GasSpent, TopToken, Transaction};
use std::collections::{BTreeMap, HashMap, HashSet};

pub fn count_by_chain(txs: &[Transaction]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for tx in txs {
        *counts.entry(tx.chain_name.clone()).or_insert(0) += 1;
    }
    counts
}

/// Most frequent token symbol, counted at most once per transaction.
///
/// On a tie the symbol that reached the winning count first keeps the title.
pub fn find_top_token(txs: &[Transaction]) -> Option<TopToken> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    let mut best: Option<(&str, u64)> = None;

    for tx in txs {
        let mut seen = HashSet::new();
        for token in &tx.tokens {
            let symbol = token.symbol.as_str();
            if !seen.insert(symbol) {
                continue;
            }
            let count = counts.entry(symbol).or_insert(0);
            *count += 1;
            if best.is_none_or(|(_, top)| *count > top) {
                best = Some((symbol, *count));
            }
        }
    }

    best.map(|(symbol, count)| TopToken {
        symbol: symbol.to_string(),
        count,
    })
}

pub fn count_unique_counterparties(txs: &[Transaction]) -> u64 {
    txs.iter()
        .map(|tx| tx.counterparty_address.trim())
        .filter(|addr| !addr.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<HashSet<_>>()
        .len() as u64
}

pub fn count_nft_transfers(txs: &[Transaction]) -> u64 {
    txs.iter().filter(|tx| tx.is_nft_transfer).count() as u64
}

pub fn sum_gas_by_chain(txs: &[Transaction]) -> BTreeMap<String, GasSpent> {
    let mut sums: BTreeMap<String, GasSpent> = BTreeMap::new();
    for tx in txs {
        sums.entry(tx.chain_name.clone())
            .or_default()
            .add(tx.gas_spent);
    }
    sums
}

pub fn total_gas_usd(gas_by_chain: &BTreeMap<String, GasSpent>) -> f64 {
    gas_by_chain.values().map(|g| g.usd).sum()
}

/// Chains with at least one transaction.
pub fn active_chain_count(counts: &BTreeMap<String, u64>) -> usize {
    counts.values().filter(|c| **c > 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use common::types::TokenRef;

    fn tx(chain: &str, to: &str, symbols: &[&str]) -> Transaction {
        Transaction {
            chain_id: 1,
            chain_name: chain.to_string(),
            counterparty_address: to.to_string(),
            tokens: symbols
                .iter()
                .map(|s| TokenRef {
                    symbol: s.to_string(),
                    contract_address: format!("0x{s}"),
                })
                .collect(),
            is_nft_transfer: false,
            gas_spent: GasSpent::default(),
            occurred_at: DateTime::from_timestamp(1_710_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_chain_counts_sum_to_len() {
        let txs = vec![
            tx("eth-mainnet", "0xa", &[]),
            tx("base-mainnet", "0xb", &[]),
            tx("eth-mainnet", "0xc", &[]),
        ];
        let counts = count_by_chain(&txs);
        assert_eq!(counts.values().sum::<u64>(), txs.len() as u64);
        assert_eq!(counts["eth-mainnet"], 2);
    }

    #[test]
    fn test_nft_count_monotonic_when_appending() {
        let mut txs = Vec::new();
        let mut last = 0;
        for i in 0..6 {
            let mut t = tx("eth-mainnet", "0xa", &[]);
            t.is_nft_transfer = i % 2 == 0;
            txs.push(t);
            let now = count_nft_transfers(&txs);
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 3);
    }

    #[test]
    fn test_top_token_empty_is_none() {
        assert_eq!(find_top_token(&[]), None);
        assert_eq!(find_top_token(&[tx("eth-mainnet", "0xa", &[])]), None);
    }

    #[test]
    fn test_top_token_dominant_symbol() {
        let txs = vec![
            tx("eth-mainnet", "0xa", &["USDC", "WETH"]),
            tx("eth-mainnet", "0xa", &["USDC"]),
            tx("base-mainnet", "0xb", &["DAI", "USDC", "USDC"]),
        ];
        let top = find_top_token(&txs).unwrap();
        assert_eq!(top.symbol, "USDC");
        assert_eq!(top.count, 3);
    }

    #[test]
    fn test_top_token_tie_goes_to_first_to_reach_max() {
        let txs = vec![
            tx("eth-mainnet", "0xa", &["WETH"]),
            tx("eth-mainnet", "0xa", &["USDC"]),
            tx("eth-mainnet", "0xa", &["USDC"]),
            tx("eth-mainnet", "0xa", &["WETH"]),
        ];
        let top = find_top_token(&txs).unwrap();
        assert_eq!(top.symbol, "USDC");
        assert_eq!(top.count, 2);
    }

    #[test]
    fn test_unique_counterparties_case_insensitive_skip_empty() {
        let txs = vec![
            tx("eth-mainnet", "0xAbC", &[]),
            tx("eth-mainnet", "0xabc", &[]),
            tx("eth-mainnet", "", &[]),
            tx("base-mainnet", "0xdef", &[]),
        ];
        assert_eq!(count_unique_counterparties(&txs), 2);
    }

    #[test]
    fn test_gas_sums_per_chain() {
        let mut a = tx("eth-mainnet", "0xa", &[]);
        a.gas_spent = GasSpent {
            native: 0.01,
            usd: 30.0,
        };
        let mut b = tx("eth-mainnet", "0xb", &[]);
        b.gas_spent = GasSpent {
            native: 0.02,
            usd: 60.0,
        };
        let c = tx("base-mainnet", "0xc", &[]);

        let sums = sum_gas_by_chain(&[a, b, c]);
        assert!((sums["eth-mainnet"].native - 0.03).abs() < 1e-12);
        assert!((sums["eth-mainnet"].usd - 90.0).abs() < 1e-9);
        assert_eq!(sums["base-mainnet"], GasSpent::default());
        assert!((total_gas_usd(&sums) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_active_chain_count_ignores_zero() {
        let mut counts = BTreeMap::new();
        counts.insert("eth-mainnet".to_string(), 4);
        counts.insert("base-mainnet".to_string(), 0);
        counts.insert("bnb-mainnet".to_string(), 1);
        assert_eq!(active_chain_count(&counts), 2);
    }
}
