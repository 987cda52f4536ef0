/// Baseline of how strongly unrelated holders overlap with the target.
///
/// Two things are gathered from the holders of the target's tokens: when each
/// holder bought the token (used by the unlikelihood sub-score and the timing
/// anomaly pass) and how much of the target's token set a sample of holders
/// share (used as the anomaly threshold for overlap).

use ferret_core::{FetchFailure, FetchStage, WalletCandidate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};

use crate::client::ChainDataSource;
use crate::config::BaselineSettings;
use crate::error::fetch_failure;
use crate::stalker::PurchaseCollector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerObservation {
    pub wallet: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineStatistics {
    /// token mint -> holders that bought it, with their purchase time
    pub token_buyers: HashMap<String, Vec<BuyerObservation>>,
    /// token mint -> top holders (target excluded), in rank order
    pub token_holders: HashMap<String, Vec<String>>,
    pub overlap_percentages: Vec<f64>,
    pub mean_overlap: f64,
    pub median_overlap: f64,
    pub percentile: f64,
    pub threshold: f64,
}

impl BaselineStatistics {
    pub fn from_parts(
        token_buyers: HashMap<String, Vec<BuyerObservation>>,
        token_holders: HashMap<String, Vec<String>>,
        overlap_percentages: Vec<f64>,
        percentile_rank: f64,
        fallback_threshold: f64,
    ) -> Self {
        let (mean_overlap, median_overlap, threshold) = if overlap_percentages.is_empty() {
            (0.0, 0.0, fallback_threshold)
        } else {
            (
                mean(&overlap_percentages),
                percentile(&overlap_percentages, 50.0),
                percentile(&overlap_percentages, percentile_rank),
            )
        };

        Self {
            token_buyers,
            token_holders,
            overlap_percentages,
            mean_overlap,
            median_overlap,
            percentile: percentile_rank,
            threshold,
        }
    }

    /// Strictly above the threshold.
    pub fn exceeds(&self, overlap_pct: f64) -> bool {
        overlap_pct > self.threshold
    }

    pub fn buyers_of(&self, token_mint: &str) -> &[BuyerObservation] {
        self.token_buyers.get(token_mint).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn holders_of(&self, token_mint: &str) -> &[String] {
        self.token_holders.get(token_mint).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sample_size(&self) -> usize {
        self.overlap_percentages.len()
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], rank: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = (rank.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Share of `target_tokens` the wallet also holds, in percent.
pub fn overlap_percentage(target_tokens: &HashSet<&str>, wallet: &WalletCandidate) -> f64 {
    if target_tokens.is_empty() {
        return 0.0;
    }
    let shared = wallet.token_set().intersection(target_tokens).count();
    shared as f64 / target_tokens.len() as f64 * 100.0
}

pub struct BaselineBuilder<'a, S: ChainDataSource> {
    collector: &'a PurchaseCollector<S>,
    settings: &'a BaselineSettings,
}

impl<'a, S: ChainDataSource> BaselineBuilder<'a, S> {
    pub fn new(collector: &'a PurchaseCollector<S>, settings: &'a BaselineSettings) -> Self {
        Self { collector, settings }
    }

    #[instrument(skip_all, fields(target = %target.address))]
    pub async fn build(&self, target: &WalletCandidate, failures: &mut Vec<FetchFailure>) -> BaselineStatistics {
        let settings = self.settings;
        let tokens: Vec<&str> = target
            .purchases
            .iter()
            .take(settings.max_tokens)
            .map(|p| p.token_mint.as_str())
            .collect();

        info!(tokens = tokens.len(), "Building timing baseline");

        let mut token_holders: HashMap<String, Vec<String>> = HashMap::new();
        let mut token_buyers: HashMap<String, Vec<BuyerObservation>> = HashMap::new();

        for mint in &tokens {
            let holders = match self.collector.source().fetch_top_holders(mint, settings.holders_per_token).await {
                Ok(holders) => holders,
                Err(e) => {
                    failures.push(fetch_failure(mint, FetchStage::HolderLookup, &e));
                    continue;
                }
            };
            let holders: Vec<String> = holders.into_iter().filter(|h| h != &target.address).collect();

            let mut observations = Vec::new();
            for holder in holders.iter().take(settings.timing_holders_per_token) {
                match self.collector.collect(holder, settings.holder_max_purchases).await {
                    Ok(history) => {
                        if let Some(purchase) = history.purchase_of(mint) {
                            observations.push(BuyerObservation {
                                wallet: holder.clone(),
                                timestamp: purchase.timestamp,
                            });
                        }
                    }
                    Err(e) => failures.push(fetch_failure(holder, FetchStage::BaselineSample, &e)),
                }
            }

            debug!(token_mint = %mint, holders = holders.len(), buyers = observations.len(), "Token timing distribution");
            token_buyers.insert(mint.to_string(), observations);
            token_holders.insert(mint.to_string(), holders);
        }

        let sample = self.sample_wallets(&tokens, &token_holders);
        let target_tokens = target.token_set();
        let mut overlaps = Vec::with_capacity(sample.len());
        for wallet in &sample {
            match self.collector.collect(wallet, settings.sample_max_purchases).await {
                Ok(history) => overlaps.push(overlap_percentage(&target_tokens, &history)),
                Err(e) => failures.push(fetch_failure(wallet, FetchStage::BaselineSample, &e)),
            }
        }

        let stats = BaselineStatistics::from_parts(
            token_buyers,
            token_holders,
            overlaps,
            settings.percentile,
            settings.fallback_threshold_pct,
        );

        info!(
            sampled = stats.sample_size(),
            mean = stats.mean_overlap,
            median = stats.median_overlap,
            threshold = stats.threshold,
            "Baseline overlap established"
        );
        stats
    }

    /// First holders of each token in token order, deduplicated.
    fn sample_wallets(&self, tokens: &[&str], token_holders: &HashMap<String, Vec<String>>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut sample = Vec::new();
        for mint in tokens {
            let holders = match token_holders.get(*mint) {
                Some(h) => h,
                None => continue,
            };
            for holder in holders.iter().take(self.settings.sample_holders_per_token) {
                if sample.len() >= self.settings.sample_size {
                    return sample;
                }
                if seen.insert(holder.as_str()) {
                    sample.push(holder.clone());
                }
            }
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferret_core::PurchaseEvent;

    fn wallet_with(tokens: &[&str]) -> WalletCandidate {
        let purchases = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| PurchaseEvent {
                wallet: "W".into(),
                token_mint: t.to_string(),
                amount_tokens: 1.0,
                amount_usd_estimate: 10.0,
                timestamp: 100 - i as i64,
                tx_signature: format!("s{}", i),
            })
            .collect();
        WalletCandidate::new("W", purchases)
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&values, 50.0), 30.0);
        assert!((percentile(&values, 95.0) - 48.0).abs() < 1e-9);
        assert_eq!(percentile(&values, 100.0), 50.0);
        assert_eq!(percentile(&[7.0], 95.0), 7.0);
        assert!((percentile(&[0.0, 10.0], 25.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_overlaps_give_zero_threshold() {
        let stats = BaselineStatistics::from_parts(HashMap::new(), HashMap::new(), vec![0.0; 50], 95.0, 10.0);
        assert_eq!(stats.threshold, 0.0);
        assert!(stats.exceeds(0.5));
        assert!(!stats.exceeds(0.0));
    }

    #[test]
    fn test_empty_sample_uses_fallback_threshold() {
        let stats = BaselineStatistics::from_parts(HashMap::new(), HashMap::new(), vec![], 95.0, 10.0);
        assert_eq!(stats.threshold, 10.0);
        assert_eq!(stats.mean_overlap, 0.0);
        assert!(!stats.exceeds(10.0));
    }

    #[test]
    fn test_overlap_percentage() {
        let target = wallet_with(&["A", "B", "C", "D"]);
        let tokens = target.token_set();
        assert_eq!(overlap_percentage(&tokens, &wallet_with(&["A", "C", "X"])), 50.0);
        assert_eq!(overlap_percentage(&tokens, &wallet_with(&["X"])), 0.0);
        assert_eq!(overlap_percentage(&HashSet::new(), &wallet_with(&["A"])), 0.0);
    }
}
