/// Purchase extraction from pre/post token balance diffs.
///
/// A purchase is any increase of a wallet-owned token account balance inside
/// a successful transaction. Only the most recent acquisition of each mint is
/// kept, which is what the coordination heuristics compare.

use ferret_core::{DataError, PurchaseEvent};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::client::types::{TokenBalance, WalletTransaction};
use crate::config::ExtractionSettings;

/// Crude USD estimate from a token amount. Not a price oracle: large raw
/// amounts are assumed to be low-priced memecoins, small ones high-priced.
#[derive(Debug, Clone)]
pub struct UsdEstimator {
    pub large_amount_threshold: f64,
    pub large_multiplier: f64,
    pub small_multiplier: f64,
}

impl UsdEstimator {
    pub fn estimate(&self, amount_tokens: f64) -> f64 {
        if amount_tokens > self.large_amount_threshold {
            amount_tokens * self.large_multiplier
        } else {
            amount_tokens * self.small_multiplier
        }
    }
}

/// Counters for records dropped during extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub failed_transactions: usize,
    pub malformed_transactions: usize,
    pub malformed_balances: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.failed_transactions + self.malformed_transactions + self.malformed_balances
    }

    fn record(&mut self, err: &DataError) {
        match err {
            DataError::FailedTransaction => self.failed_transactions += 1,
            DataError::MissingMeta | DataError::MissingBlockTime => self.malformed_transactions += 1,
            DataError::MissingField(_) => self.malformed_transactions += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub purchases: Vec<PurchaseEvent>,
    pub skipped: SkipCounts,
}

#[derive(Debug, Clone)]
pub struct PurchaseExtractor {
    wrapped_native_mint: String,
    usd: UsdEstimator,
}

impl PurchaseExtractor {
    pub fn new(settings: &ExtractionSettings) -> Self {
        Self {
            wrapped_native_mint: settings.wrapped_native_mint.clone(),
            usd: UsdEstimator {
                large_amount_threshold: settings.usd_large_amount_threshold,
                large_multiplier: settings.usd_large_multiplier,
                small_multiplier: settings.usd_small_multiplier,
            },
        }
    }

    /// Newest-first purchase list, one event per mint, at most `max_purchases`.
    pub fn extract(&self, wallet: &str, transactions: &[WalletTransaction], max_purchases: usize) -> Extraction {
        let mut ordered: Vec<&WalletTransaction> = transactions.iter().collect();
        // Newest first so the first occurrence of a mint is its latest acquisition.
        ordered.sort_by(|a, b| {
            b.block_time()
                .unwrap_or(i64::MIN)
                .cmp(&a.block_time().unwrap_or(i64::MIN))
                .then_with(|| a.signature.cmp(&b.signature))
        });

        let mut skipped = SkipCounts::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut purchases = Vec::new();

        for wtx in ordered {
            if purchases.len() >= max_purchases {
                break;
            }
            match self.purchases_in(wallet, wtx, &seen, &mut skipped) {
                Ok(found) => {
                    for event in found {
                        if purchases.len() >= max_purchases {
                            break;
                        }
                        seen.insert(event.token_mint.clone());
                        purchases.push(event);
                    }
                }
                Err(err) => skipped.record(&err),
            }
        }

        if skipped.total() > 0 {
            debug!(
                wallet = %wallet,
                failed = skipped.failed_transactions,
                malformed_transactions = skipped.malformed_transactions,
                malformed_balances = skipped.malformed_balances,
                "Skipped records during purchase extraction"
            );
        }

        Extraction { purchases, skipped }
    }

    fn purchases_in(
        &self,
        wallet: &str,
        wtx: &WalletTransaction,
        seen: &HashSet<String>,
        skipped: &mut SkipCounts,
    ) -> Result<Vec<PurchaseEvent>, DataError> {
        if wtx.tx.is_failed() {
            return Err(DataError::FailedTransaction);
        }
        let meta = wtx.tx.meta.as_ref().ok_or(DataError::MissingMeta)?;
        let timestamp = wtx.block_time().ok_or(DataError::MissingBlockTime)?;
        let post_balances = meta
            .post_token_balances
            .as_ref()
            .ok_or(DataError::MissingField("postTokenBalances"))?;
        let pre_by_index: HashMap<u32, &TokenBalance> = meta
            .pre_token_balances
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|b| b.account_index.map(|i| (i, b)))
            .collect();

        let mut found: Vec<PurchaseEvent> = Vec::new();
        for post in post_balances {
            if post.owner.as_deref() != Some(wallet) {
                continue;
            }
            let mint = match post.mint.as_deref() {
                Some(m) if !m.is_empty() => m,
                _ => {
                    skipped.malformed_balances += 1;
                    continue;
                }
            };
            if mint == self.wrapped_native_mint
                || seen.contains(mint)
                || found.iter().any(|e| e.token_mint == mint)
            {
                continue;
            }
            let post_amount = match post.ui_amount() {
                Some(a) => a,
                None => {
                    skipped.malformed_balances += 1;
                    continue;
                }
            };
            let pre_amount = post
                .account_index
                .and_then(|i| pre_by_index.get(&i))
                .filter(|pre| pre.mint.as_deref() == Some(mint))
                .and_then(|pre| pre.ui_amount())
                .unwrap_or(0.0);

            if post_amount > pre_amount {
                let delta = post_amount - pre_amount;
                found.push(PurchaseEvent {
                    wallet: wallet.to_string(),
                    token_mint: mint.to_string(),
                    amount_tokens: delta,
                    amount_usd_estimate: self.usd.estimate(delta),
                    timestamp,
                    tx_signature: wtx.signature.clone(),
                });
            }
        }
        Ok(found)
    }
}
