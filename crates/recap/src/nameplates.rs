use common::config::Nameplates;
use common::types::RecapStats;
use std::fmt;

use crate::aggregators::{active_chain_count, total_gas_usd};

/// Badges, declared in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Nameplate {
    GasGuzzler,
    NftCollector,
    ChainHopper,
    DefiDegen,
}

impl Nameplate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GasGuzzler => "Gas Guzzler",
            Self::NftCollector => "NFT Collector",
            Self::ChainHopper => "Chain Hopper",
            Self::DefiDegen => "DeFi Degen",
        }
    }
}

impl fmt::Display for Nameplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NameplateThresholds {
    pub gas_guzzler_min_usd: f64,
    pub nft_collector_min_nfts: u64,
    pub chain_hopper_min_chains: usize,
    pub defi_degen_min_transactions: u64,
}

impl NameplateThresholds {
    pub fn from_config(cfg: &Nameplates) -> Self {
        Self {
            gas_guzzler_min_usd: cfg.gas_guzzler_min_usd,
            nft_collector_min_nfts: cfg.nft_collector_min_nfts,
            chain_hopper_min_chains: cfg.chain_hopper_min_chains,
            defi_degen_min_transactions: cfg.defi_degen_min_transactions,
        }
    }
}

impl Default for NameplateThresholds {
    fn default() -> Self {
        Self::from_config(&Nameplates::default())
    }
}

/// Gas and NFT thresholds are strict; chain and transaction thresholds are inclusive.
pub fn classify(stats: &RecapStats, thresholds: &NameplateThresholds) -> Vec<Nameplate> {
    let total_usd = total_gas_usd(&stats.gas_spent_by_chain);
    let total_txs: u64 = stats.transactions_by_chain.values().sum();
    let active_chains = active_chain_count(&stats.transactions_by_chain);

    let mut plates = Vec::new();
    if total_usd > thresholds.gas_guzzler_min_usd {
        plates.push(Nameplate::GasGuzzler);
    }
    if stats.nft_count > thresholds.nft_collector_min_nfts {
        plates.push(Nameplate::NftCollector);
    }
    if active_chains >= thresholds.chain_hopper_min_chains {
        plates.push(Nameplate::ChainHopper);
    }
    if total_txs >= thresholds.defi_degen_min_transactions {
        plates.push(Nameplate::DefiDegen);
    }
    plates.sort();
    plates
}
