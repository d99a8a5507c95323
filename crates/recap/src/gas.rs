use anyhow::Result;
use std::collections::{HashMap, HashSet};

/// Upstream JSON-RPC batch limit for receipt lookups.
pub const GAS_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasReceipt {
    pub gas_used: u128,
    pub gas_price: u128,
}

impl GasReceipt {
    /// Fee in the chain's base unit (wei).
    pub fn fee_base_units(&self) -> u128 {
        self.gas_used.saturating_mul(self.gas_price)
    }
}

/// Fetches receipts for one batch of hashes. Hashes with no receipt are simply
/// left out of the returned list.
pub trait ReceiptBatcher {
    fn fetch_receipts(
        &self,
        hashes: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<(String, GasReceipt)>>> + Send;
}

/// Resolve gas data for `hashes` in batches of [`GAS_BATCH_SIZE`].
///
/// A failed batch is logged and skipped; callers treat a missing hash as
/// "fee unknown".
pub async fn resolve_gas<B: ReceiptBatcher + Sync>(
    batcher: &B,
    chain: &str,
    hashes: &[String],
) -> HashMap<String, GasReceipt> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = hashes
        .iter()
        .filter(|h| seen.insert(h.to_ascii_lowercase()))
        .cloned()
        .collect();

    let mut receipts = HashMap::with_capacity(unique.len());
    for (batch_idx, batch) in unique.chunks(GAS_BATCH_SIZE).enumerate() {
        match batcher.fetch_receipts(batch).await {
            Ok(found) => {
                receipts.extend(found.into_iter().map(|(h, r)| (h.to_ascii_lowercase(), r)));
            }
            Err(e) => {
                tracing::warn!(
                    chain,
                    batch = batch_idx,
                    size = batch.len(),
                    error = %e,
                    "gas receipt batch failed; fees default to zero"
                );
            }
        }
    }

    tracing::debug!(
        chain,
        requested = unique.len(),
        resolved = receipts.len(),
        "gas receipts resolved"
    );
    receipts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeBatcher {
        batches: Mutex<Vec<Vec<String>>>,
        fail_batch: Option<usize>,
    }

    impl FakeBatcher {
        fn new(fail_batch: Option<usize>) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail_batch,
            }
        }
    }

    impl ReceiptBatcher for FakeBatcher {
        async fn fetch_receipts(&self, hashes: &[String]) -> Result<Vec<(String, GasReceipt)>> {
            let idx = {
                let mut batches = self.batches.lock().unwrap();
                batches.push(hashes.to_vec());
                batches.len() - 1
            };
            if self.fail_batch == Some(idx) {
                anyhow::bail!("batch {idx} rejected");
            }
            Ok(hashes
                .iter()
                // Pretend every hash ending in "0" has no receipt yet.
                .filter(|h| !h.ends_with('0'))
                .map(|h| {
                    (
                        h.clone(),
                        GasReceipt {
                            gas_used: 21_000,
                            gas_price: 10,
                        },
                    )
                })
                .collect())
        }
    }

    fn hashes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("0x{i:04}")).collect()
    }

    #[tokio::test]
    async fn test_batches_are_capped_at_100() {
        let batcher = FakeBatcher::new(None);
        let result = resolve_gas(&batcher, "eth-mainnet", &hashes(250)).await;

        let sizes: Vec<usize> = batcher
            .batches
            .lock()
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        // 25 of the 250 hashes end in '0'.
        assert_eq!(result.len(), 225);
    }

    #[tokio::test]
    async fn test_duplicate_hashes_requested_once() {
        let batcher = FakeBatcher::new(None);
        let input = vec![
            "0xAB1".to_string(),
            "0xab1".to_string(),
            "0xab2".to_string(),
        ];
        let result = resolve_gas(&batcher, "eth-mainnet", &input).await;
        assert_eq!(batcher.batches.lock().unwrap()[0].len(), 2);
        assert!(result.contains_key("0xab1"));
    }

    #[tokio::test]
    async fn test_failed_batch_is_omitted_not_fatal() {
        let batcher = FakeBatcher::new(Some(0));
        let result = resolve_gas(&batcher, "eth-mainnet", &hashes(150)).await;
        // Only the second batch (hashes 100..150) resolves; 5 of those end in '0'.
        assert_eq!(result.len(), 45);
        assert!(!result.contains_key("0x0001"));
        assert!(result.contains_key("0x0101"));
    }

    #[test]
    fn test_fee_base_units_saturates() {
        let r = GasReceipt {
            gas_used: u128::MAX,
            gas_price: 2,
        };
        assert_eq!(r.fee_base_units(), u128::MAX);
    }
}
