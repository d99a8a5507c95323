use anyhow::Result;
use common::address::network_family;
use common::chains::NetworkFamily;
use common::error::RecapError;
use common::types::Transaction;

/// One provider tier: fetches every chain it covers for a wallet and year.
pub trait TransactionSource {
    fn name(&self) -> &'static str;

    fn fetch_transactions(
        &self,
        address: &str,
        year: i32,
    ) -> impl std::future::Future<Output = Result<Vec<Transaction>>> + Send;
}

/// Routes a wallet to its network family and applies EVM tier fallback.
pub struct Orchestrator<P, F, S> {
    primary: P,
    fallback: F,
    solana: S,
}

impl<P, F, S> Orchestrator<P, F, S>
where
    P: TransactionSource + Sync,
    F: TransactionSource + Sync,
    S: TransactionSource + Sync,
{
    pub fn new(primary: P, fallback: F, solana: S) -> Self {
        Self {
            primary,
            fallback,
            solana,
        }
    }

    /// All canonical transactions for `address` in `year`.
    ///
    /// Provider errors are logged here and collapse into [`RecapError::Unavailable`].
    pub async fn fetch_transactions(
        &self,
        address: &str,
        year: i32,
    ) -> Result<Vec<Transaction>, RecapError> {
        match network_family(address) {
            NetworkFamily::Solana => fetch_tier(&self.solana, address, year).await,
            NetworkFamily::Evm => self.fetch_evm(address, year).await,
        }
    }

    async fn fetch_evm(&self, address: &str, year: i32) -> Result<Vec<Transaction>, RecapError> {
        if let Ok(txs) = fetch_tier(&self.primary, address, year).await {
            return Ok(txs);
        }

        tracing::warn!(
            from = self.primary.name(),
            to = self.fallback.name(),
            year,
            "primary tier failed; falling back"
        );
        metrics::counter!(
            "recap_provider_fallbacks_total",
            "from" => self.primary.name(),
            "to" => self.fallback.name()
        )
        .increment(1);

        fetch_tier(&self.fallback, address, year).await
    }
}

async fn fetch_tier<T: TransactionSource + Sync>(
    source: &T,
    address: &str,
    year: i32,
) -> Result<Vec<Transaction>, RecapError> {
    match source.fetch_transactions(address, year).await {
        Ok(txs) => {
            tracing::info!(
                provider = source.name(),
                transactions = txs.len(),
                "provider tier succeeded"
            );
            Ok(txs)
        }
        Err(e) => {
            tracing::error!(provider = source.name(), error = format!("{e:#}"), "provider tier failed");
            Err(RecapError::Unavailable)
        }
    }
}
