use common::address::normalize_address;
use common::error::RecapError;
use common::types::{RecapStats, Transaction, WalletRecap};
use std::future::Future;
use std::time::Instant;

use crate::aggregators::{
    count_by_chain, count_nft_transfers, count_unique_counterparties, find_top_token,
    sum_gas_by_chain,
};
use crate::nameplates::{classify, NameplateThresholds};
use crate::orchestrator::{Orchestrator, TransactionSource};
use crate::providers::prices::{ChainPrices, PriceSource};

/// Entry point used by the HTTP and CLI surfaces.
pub trait WalletRecapper: Send + Sync + 'static {
    fn get_wallet_recap(
        &self,
        address: &str,
        year: i32,
    ) -> impl Future<Output = Result<WalletRecap, RecapError>> + Send;
}

/// Fill in USD fees that the provider did not quote, using the chain's spot price.
pub fn enrich_usd(txs: &mut [Transaction], prices: &ChainPrices) {
    for tx in txs.iter_mut().filter(|tx| needs_price(tx)) {
        if let Some(price) = prices.get(&tx.chain_name) {
            tx.gas_spent.usd = tx.gas_spent.native * price;
        }
    }
}

fn needs_price(tx: &Transaction) -> bool {
    tx.gas_spent.usd == 0.0 && tx.gas_spent.native > 0.0
}

/// Reduce a wallet's transactions for one year into its recap.
pub fn build_recap(
    address: &str,
    year: i32,
    txs: &[Transaction],
    thresholds: &NameplateThresholds,
) -> WalletRecap {
    let stats = RecapStats {
        transactions_by_chain: count_by_chain(txs),
        nft_count: count_nft_transfers(txs),
        gas_spent_by_chain: sum_gas_by_chain(txs),
    };
    let nameplates = classify(&stats, thresholds)
        .into_iter()
        .map(|n| n.as_str().to_string())
        .collect();

    WalletRecap {
        address: address.to_string(),
        year,
        top_token: find_top_token(txs),
        unique_counterparty_count: count_unique_counterparties(txs),
        nft_count: stats.nft_count,
        gas_spent_by_chain: stats.gas_spent_by_chain,
        nameplates,
        transactions_by_chain: stats.transactions_by_chain,
    }
}

pub struct RecapService<P, F, S, Pr> {
    orchestrator: Orchestrator<P, F, S>,
    prices: Pr,
    thresholds: NameplateThresholds,
}

impl<P, F, S, Pr> RecapService<P, F, S, Pr>
where
    P: TransactionSource + Send + Sync + 'static,
    F: TransactionSource + Send + Sync + 'static,
    S: TransactionSource + Send + Sync + 'static,
    Pr: PriceSource + Send + Sync + 'static,
{
    pub fn new(
        orchestrator: Orchestrator<P, F, S>,
        prices: Pr,
        thresholds: NameplateThresholds,
    ) -> Self {
        Self {
            orchestrator,
            prices,
            thresholds,
        }
    }

    async fn recap(&self, raw_address: &str, year: i32) -> Result<WalletRecap, RecapError> {
        let address = normalize_address(raw_address)?;
        let mut txs = self.orchestrator.fetch_transactions(&address, year).await?;

        if txs.iter().any(needs_price) {
            let prices = self.prices.native_prices().await;
            enrich_usd(&mut txs, &prices);
        }

        Ok(build_recap(&address, year, &txs, &self.thresholds))
    }
}

impl<P, F, S, Pr> WalletRecapper for RecapService<P, F, S, Pr>
where
    P: TransactionSource + Send + Sync + 'static,
    F: TransactionSource + Send + Sync + 'static,
    S: TransactionSource + Send + Sync + 'static,
    Pr: PriceSource + Send + Sync + 'static,
{
    async fn get_wallet_recap(&self, address: &str, year: i32) -> Result<WalletRecap, RecapError> {
        let start = Instant::now();
        let res = self.recap(address, year).await;

        let outcome = match &res {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::counter!("recap_recaps_built_total", "outcome" => outcome).increment(1);
        match &res {
            Ok(recap) => tracing::info!(
                address = %recap.address,
                year,
                nameplates = ?recap.nameplates,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "recap built"
            ),
            Err(e) => tracing::warn!(year, error = %e, "recap failed"),
        }
        res
    }
}
