use chrono::{DateTime, Utc};
use common::chains::ChainSpec;
use common::types::{GasSpent, TokenRef, Transaction};
use std::collections::{HashMap, HashSet};

use crate::gas::GasReceipt;

/// A provider-native record that belongs to one logical transaction.
///
/// Several records may share a `group_key` (e.g. one per token transfer in the
/// same transaction hash); they collapse into a single [`Transaction`].
pub trait RawRecord {
    /// Transaction hash or signature.
    fn group_key(&self) -> &str;
    fn recipient(&self) -> Option<&str>;
    fn token_refs(&self, chain: &ChainSpec) -> Vec<TokenRef>;
    fn is_nft(&self) -> bool;
    fn occurred_at(&self) -> Option<DateTime<Utc>>;

    /// Fee carried on the record itself, in base units.
    fn native_fee_base_units(&self) -> Option<u128> {
        None
    }

    /// Provider-supplied USD value of the fee.
    fn fee_quote_usd(&self) -> Option<f64> {
        None
    }
}

/// Build a token entry, using the contract address as the symbol when none is known.
pub fn token_ref(symbol: Option<&str>, contract_address: &str) -> TokenRef {
    let symbol = symbol
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(contract_address);
    TokenRef {
        symbol: symbol.to_string(),
        contract_address: contract_address.to_string(),
    }
}

#[derive(Default)]
struct Group {
    key: String,
    counterparty: Option<String>,
    tokens: Vec<TokenRef>,
    seen_contracts: HashSet<String>,
    is_nft: bool,
    occurred_at: Option<DateTime<Utc>>,
    fee_base_units: Option<u128>,
    fee_usd: Option<f64>,
}

impl Group {
    fn absorb<R: RawRecord>(&mut self, record: &R, chain: &ChainSpec) {
        if self.counterparty.is_none() {
            self.counterparty = record
                .recipient()
                .map(str::trim)
                .filter(|to| !to.is_empty())
                .map(str::to_string);
        }
        for token in record.token_refs(chain) {
            if self
                .seen_contracts
                .insert(token.contract_address.to_ascii_lowercase())
            {
                self.tokens.push(token);
            }
        }
        self.is_nft |= record.is_nft();
        self.occurred_at = self.occurred_at.or_else(|| record.occurred_at());
        self.fee_base_units = self.fee_base_units.or_else(|| record.native_fee_base_units());
        self.fee_usd = self.fee_usd.or_else(|| record.fee_quote_usd());
    }

    fn finish(self, gas_by_hash: &HashMap<String, GasReceipt>, chain: &ChainSpec) -> Transaction {
        let fee_base_units = gas_by_hash
            .get(&self.key.to_ascii_lowercase())
            .map(GasReceipt::fee_base_units)
            .or(self.fee_base_units);

        Transaction {
            chain_id: chain.chain_id,
            chain_name: chain.slug.to_string(),
            counterparty_address: self.counterparty.unwrap_or_default(),
            tokens: self.tokens,
            is_nft_transfer: self.is_nft,
            gas_spent: GasSpent {
                native: fee_base_units.map_or(0.0, |units| chain.to_native_units(units)),
                usd: self.fee_usd.unwrap_or(0.0),
            },
            occurred_at: self.occurred_at.unwrap_or_default(),
        }
    }
}

/// Collapse provider records into canonical transactions, one per distinct
/// `group_key`, in first-seen order.
pub fn normalize<R: RawRecord>(
    records: &[R],
    gas_by_hash: &HashMap<String, GasReceipt>,
    chain: &ChainSpec,
) -> Vec<Transaction> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for record in records {
        let key = record.group_key();
        if key.is_empty() {
            continue;
        }
        let idx = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                key: key.to_string(),
                ..Group::default()
            });
            groups.len() - 1
        });
        groups[idx].absorb(record, chain);
    }

    groups
        .into_iter()
        .map(|g| g.finish(gas_by_hash, chain))
        .collect()
}
