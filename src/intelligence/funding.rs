/// Funding source tracing for flagged wallets.
///
/// The funder of a wallet is taken from the earliest transaction that credits
/// it with a meaningful amount of SOL: the first other account whose lamport
/// balance fell in that transaction.

use dashmap::DashMap;
use ferret_core::FundingSource;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::client::{ChainDataSource, RawTransaction};
use crate::config::FundingSettings;
use crate::error::Result;

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// wallet -> funding source, shared across a run.
#[derive(Debug, Default)]
pub struct FundingCache {
    sources: DashMap<String, FundingSource>,
}

impl FundingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, wallet: &str) -> Option<FundingSource> {
        self.sources.get(wallet).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, source: FundingSource) {
        self.sources.insert(source.wallet.clone(), source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// All cached sources ordered by wallet.
    pub fn snapshot(&self) -> Vec<FundingSource> {
        let mut all: Vec<FundingSource> = self.sources.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.wallet.cmp(&b.wallet));
        all
    }
}

/// `(funder, amount_sol)` if `tx` credits `wallet` by at least `min_lamports`
/// and another account paid for it.
pub fn funding_from_transaction(wallet: &str, tx: &RawTransaction, min_lamports: u64) -> Option<(String, f64)> {
    let meta = tx.meta.as_ref()?;
    let keys = tx.account_keys();
    let idx = keys.iter().position(|k| *k == wallet)?;

    let pre = *meta.pre_balances.get(idx)?;
    let post = *meta.post_balances.get(idx)?;
    if post <= pre || post - pre < min_lamports {
        return None;
    }

    let funder = keys.iter().enumerate().find_map(|(i, key)| {
        if i == idx {
            return None;
        }
        match (meta.pre_balances.get(i), meta.post_balances.get(i)) {
            (Some(before), Some(after)) if after < before => Some(key.to_string()),
            _ => None,
        }
    })?;

    Some((funder, (post - pre) as f64 / LAMPORTS_PER_SOL))
}

pub struct FundingTracer<S: ChainDataSource> {
    source: Arc<S>,
    settings: FundingSettings,
}

impl<S: ChainDataSource> FundingTracer<S> {
    pub fn new(source: Arc<S>, settings: FundingSettings) -> Self {
        Self { source, settings }
    }

    /// Cached result when present, otherwise walks the wallet's oldest
    /// signatures oldest-first.
    #[instrument(skip(self, cache), level = "debug")]
    pub async fn trace(&self, wallet: &str, cache: &FundingCache) -> Result<FundingSource> {
        if let Some(known) = cache.get(wallet) {
            return Ok(known);
        }

        let signatures = self.source.fetch_signatures(wallet, self.settings.signature_limit).await?;
        let skip = signatures.len().saturating_sub(self.settings.oldest_signatures);
        let min_lamports = (self.settings.min_amount_sol * LAMPORTS_PER_SOL) as u64;

        let mut found = FundingSource::unknown(wallet);
        for info in signatures.iter().skip(skip).rev() {
            if info.err.as_ref().map(|e| !e.is_null()).unwrap_or(false) {
                continue;
            }
            let tx = match self.source.fetch_transaction(&info.signature).await {
                Ok(Some(tx)) => tx,
                Ok(None) => continue,
                Err(e) => {
                    debug!(signature = %info.signature, error = %e, "Skipping transaction while tracing funding");
                    continue;
                }
            };
            if tx.is_failed() {
                continue;
            }
            if let Some((funder, amount_sol)) = funding_from_transaction(wallet, &tx, min_lamports) {
                found = FundingSource {
                    wallet: wallet.to_string(),
                    funder: Some(funder),
                    amount_sol,
                    signature: Some(info.signature.clone()),
                };
                break;
            }
        }

        debug!(wallet = %wallet, funder = ?found.funder, amount_sol = found.amount_sol, "Funding traced");
        cache.insert(found.clone());
        Ok(found)
    }
}

/// Funders shared by two or more wallets, largest groups first.
pub fn group_by_funder(sources: &[FundingSource]) -> Vec<(String, Vec<String>)> {
    let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for source in sources {
        if let Some(funder) = source.funder.as_deref() {
            groups.entry(funder).or_default().push(source.wallet.clone());
        }
    }

    let mut shared: Vec<(String, Vec<String>)> = groups
        .into_iter()
        .filter(|(_, wallets)| wallets.len() > 1)
        .map(|(funder, mut wallets)| {
            wallets.sort();
            (funder.to_string(), wallets)
        })
        .collect();
    shared.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
    shared
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transfer(keys: &[&str], pre: &[u64], post: &[u64]) -> RawTransaction {
        serde_json::from_value(json!({
            "blockTime": 1,
            "meta": {"err": null, "preBalances": pre, "postBalances": post},
            "transaction": {"message": {"accountKeys": keys}}
        }))
        .unwrap()
    }

    #[test]
    fn test_first_debited_account_is_funder() {
        let tx = transfer(
            &["FeePayer", "Funder", "W"],
            &[5_000_000_000, 3_000_000_000, 0],
            &[4_999_995_000, 2_500_000_000, 500_000_000],
        );
        let (funder, amount) = funding_from_transaction("W", &tx, 10_000_000).unwrap();
        assert_eq!(funder, "FeePayer");
        assert!((amount - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_small_or_outgoing_transfer_ignored() {
        let dust = transfer(&["Funder", "W"], &[1_000_000_000, 0], &[999_000_000, 1_000_000]);
        assert!(funding_from_transaction("W", &dust, 10_000_000).is_none());

        let outgoing = transfer(&["W", "Other"], &[1_000_000_000, 0], &[500_000_000, 500_000_000]);
        assert!(funding_from_transaction("W", &outgoing, 10_000_000).is_none());

        let unrelated = transfer(&["A", "B"], &[1, 0], &[0, 1]);
        assert!(funding_from_transaction("W", &unrelated, 0).is_none());
    }

    #[test]
    fn test_group_by_funder() {
        let sources = vec![
            FundingSource { wallet: "W2".into(), funder: Some("F1".into()), amount_sol: 1.0, signature: None },
            FundingSource { wallet: "W1".into(), funder: Some("F1".into()), amount_sol: 1.0, signature: None },
            FundingSource { wallet: "W3".into(), funder: Some("F2".into()), amount_sol: 1.0, signature: None },
            FundingSource::unknown("W4"),
        ];
        let groups = group_by_funder(&sources);
        assert_eq!(groups, vec![("F1".to_string(), vec!["W1".to_string(), "W2".to_string()])]);
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = FundingCache::new();
        assert!(cache.get("W").is_none());
        cache.insert(FundingSource::unknown("W"));
        assert_eq!(cache.get("W"), Some(FundingSource::unknown("W")));
        assert_eq!(cache.len(), 1);
    }
}
