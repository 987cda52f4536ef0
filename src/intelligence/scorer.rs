/// Coordination scoring of a candidate wallet against the target.
///
/// Three 0-100 sub-scores are combined with configurable weights:
/// - overlap: how much of the target's token set the candidate also holds
/// - lead-time consistency: how regular the candidate's head start is
/// - unlikelihood: how rare that head start is among ordinary holders

use ferret_core::{Classification, CoordinationScore, SharedPurchase, WalletCandidate, SECONDS_PER_HOUR};
use std::cmp::Ordering;

use super::baseline::{overlap_percentage, BaselineStatistics};
use crate::config::ScoringSettings;

#[derive(Debug, Clone)]
pub struct CoordinationScorer {
    settings: ScoringSettings,
}

impl CoordinationScorer {
    pub fn new(settings: ScoringSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    /// Target tokens the candidate bought strictly earlier, inside the lead window.
    pub fn find_shared_purchases(&self, candidate: &WalletCandidate, target: &WalletCandidate) -> Vec<SharedPurchase> {
        let mut shared = Vec::new();
        for target_buy in &target.purchases {
            let candidate_buy = match candidate.purchase_of(&target_buy.token_mint) {
                Some(p) => p,
                None => continue,
            };
            if candidate_buy.timestamp >= target_buy.timestamp {
                continue;
            }
            let lead_time_hours = (target_buy.timestamp - candidate_buy.timestamp) as f64 / SECONDS_PER_HOUR;
            if lead_time_hours >= self.settings.min_lead_hours && lead_time_hours <= self.settings.max_lead_hours {
                shared.push(SharedPurchase {
                    token_mint: target_buy.token_mint.clone(),
                    candidate_timestamp: candidate_buy.timestamp,
                    target_timestamp: target_buy.timestamp,
                    lead_time_hours,
                    candidate_signature: candidate_buy.tx_signature.clone(),
                    target_signature: target_buy.tx_signature.clone(),
                    candidate_amount_usd: candidate_buy.amount_usd_estimate,
                    target_amount_usd: target_buy.amount_usd_estimate,
                });
            }
        }
        shared
    }

    pub fn overlap_score(&self, overlap_pct: f64) -> f64 {
        let multiplier = if overlap_pct >= self.settings.overlap_boost_threshold_pct {
            self.settings.overlap_boost_multiplier
        } else {
            self.settings.overlap_base_multiplier
        };
        (overlap_pct * multiplier).clamp(0.0, 100.0)
    }

    /// 100 up to the full-score deviation, 0 from the zero-score deviation,
    /// linear in between.
    pub fn lead_time_consistency(&self, lead_times: &[f64]) -> f64 {
        let full = self.settings.consistency_full_std_hours;
        let zero = self.settings.consistency_zero_std_hours;
        let sd = sample_std_dev(lead_times);

        if sd <= full {
            100.0
        } else if sd >= zero {
            0.0
        } else {
            100.0 * (zero - sd) / (zero - full)
        }
    }

    /// Averaged over shared tokens that have a baseline buyer distribution.
    /// Buyers are compared by distance from the target's buy, before or after.
    /// The candidate's own observation is not part of its comparison set.
    pub fn unlikelihood(&self, candidate: &str, shared: &[SharedPurchase], baseline: &BaselineStatistics) -> f64 {
        let window = self.settings.similar_timing_window_hours * SECONDS_PER_HOUR;
        let mut per_token = Vec::new();

        for purchase in shared {
            let buyers: Vec<_> = baseline
                .buyers_of(&purchase.token_mint)
                .iter()
                .filter(|b| b.wallet != candidate)
                .collect();
            if buyers.is_empty() {
                continue;
            }

            let candidate_offset = (purchase.target_timestamp - purchase.candidate_timestamp) as f64;
            let similar = buyers
                .iter()
                .filter(|b| {
                    let offset = (purchase.target_timestamp - b.timestamp).abs() as f64;
                    (offset - candidate_offset).abs() < window
                })
                .count();
            let similar_pct = similar as f64 / buyers.len() as f64 * 100.0;

            let score = if similar_pct < self.settings.unlikely_max_similar_pct {
                (100.0 - similar_pct * self.settings.unlikelihood_penalty).max(0.0)
            } else {
                0.0
            };
            per_token.push(score);
        }

        if per_token.is_empty() {
            0.0
        } else {
            per_token.iter().sum::<f64>() / per_token.len() as f64
        }
    }

    /// `None` when fewer than the minimum shared-and-earlier purchases exist.
    pub fn score(
        &self,
        candidate: &WalletCandidate,
        target: &WalletCandidate,
        baseline: &BaselineStatistics,
    ) -> Option<CoordinationScore> {
        let shared = self.find_shared_purchases(candidate, target);
        if shared.len() < self.settings.min_shared_purchases.max(1) {
            return None;
        }

        let target_tokens = target.token_set();
        let shared_pct = if target_tokens.is_empty() {
            0.0
        } else {
            shared.len() as f64 / target_tokens.len() as f64 * 100.0
        };

        let lead_times: Vec<f64> = shared.iter().map(|s| s.lead_time_hours).collect();
        let overlap_score = self.overlap_score(overlap_percentage(&target_tokens, candidate));
        let lead_time_consistency_score = self.lead_time_consistency(&lead_times);
        let unlikelihood_score = self.unlikelihood(&candidate.address, &shared, baseline);

        let final_score = self.settings.overlap_weight * overlap_score
            + self.settings.consistency_weight * lead_time_consistency_score
            + self.settings.unlikelihood_weight * unlikelihood_score;

        Some(CoordinationScore {
            wallet: candidate.address.clone(),
            overlap_score,
            lead_time_consistency_score,
            unlikelihood_score,
            final_score,
            overlap_percentage: shared_pct,
            exceeds_baseline: baseline.exceeds(shared_pct),
            avg_lead_time_hours: lead_times.iter().sum::<f64>() / lead_times.len() as f64,
            lead_time_std_dev: sample_std_dev(&lead_times),
            shared_purchases: shared,
        })
    }

    pub fn classify(&self, final_score: f64) -> Option<Classification> {
        if final_score >= self.settings.strong_threshold {
            Some(Classification::Strong)
        } else if final_score >= self.settings.possible_threshold {
            Some(Classification::Possible)
        } else {
            None
        }
    }
}

/// Highest final score first; ties broken by wallet address.
pub fn rank_order(a: &CoordinationScore, b: &CoordinationScore) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| a.wallet.cmp(&b.wallet))
}

pub fn rank(scores: &mut [CoordinationScore]) {
    scores.sort_by(rank_order);
}

/// Sample (n - 1) standard deviation; 0 for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::baseline::BuyerObservation;
    use ferret_core::PurchaseEvent;
    use std::collections::HashMap;

    fn buy(wallet: &str, mint: &str, ts: i64) -> PurchaseEvent {
        PurchaseEvent {
            wallet: wallet.into(),
            token_mint: mint.into(),
            amount_tokens: 100.0,
            amount_usd_estimate: 1000.0,
            timestamp: ts,
            tx_signature: format!("{}-{}", wallet, mint),
        }
    }

    fn scorer() -> CoordinationScorer {
        CoordinationScorer::new(ScoringSettings::default())
    }

    fn empty_baseline() -> BaselineStatistics {
        BaselineStatistics::from_parts(HashMap::new(), HashMap::new(), vec![], 95.0, 10.0)
    }

    #[test]
    fn test_two_tight_leads_score_above_possible() {
        let target = WalletCandidate::new("T", vec![buy("T", "B", 2000), buy("T", "A", 1000)]);
        let candidate = WalletCandidate::new("C", vec![buy("C", "B", 2000 - 7200), buy("C", "A", 1000 - 3600)]);

        let score = scorer().score(&candidate, &target, &empty_baseline()).unwrap();
        assert_eq!(score.shared_token_count(), 2);
        let mut leads: Vec<f64> = score.shared_purchases.iter().map(|s| s.lead_time_hours).collect();
        leads.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(leads, vec![1.0, 2.0]);
        assert!((score.lead_time_std_dev - 0.7071).abs() < 1e-3);
        assert_eq!(score.lead_time_consistency_score, 100.0);
        assert!(score.final_score > 40.0);
        assert!(scorer().classify(score.final_score).is_some());
    }

    #[test]
    fn test_single_shared_token_yields_none() {
        let target = WalletCandidate::new("T", vec![buy("T", "A", 100_000), buy("T", "B", 100_000)]);
        let candidate = WalletCandidate::new("C", vec![buy("C", "A", 100_000 - 7200)]);
        assert!(scorer().score(&candidate, &target, &empty_baseline()).is_none());
    }

    #[test]
    fn test_leads_outside_window_ignored() {
        let t = 1_000_000;
        let target = WalletCandidate::new("T", vec![buy("T", "A", t), buy("T", "B", t), buy("T", "C", t)]);
        let candidate = WalletCandidate::new(
            "C",
            vec![
                buy("C", "A", t - 1800),       // 30 minutes
                buy("C", "B", t - 200 * 3600), // beyond a week
                buy("C", "C", t + 3600),       // after the target
            ],
        );
        assert!(scorer().find_shared_purchases(&candidate, &target).is_empty());
    }

    #[test]
    fn test_consistency_monotonic_non_increasing() {
        let s = scorer();
        assert_eq!(s.lead_time_consistency(&[5.0, 5.0, 5.0]), 100.0);
        let mut previous = f64::MAX;
        for spread in 0..30 {
            let leads = [10.0, 10.0 + spread as f64];
            let value = s.lead_time_consistency(&leads);
            assert!(value <= previous);
            previous = value;
        }
        assert_eq!(s.lead_time_consistency(&[1.0, 40.0]), 0.0);
        // sd = 7.07 h sits between the 2 h and 12 h anchors
        let mid = s.lead_time_consistency(&[10.0, 20.0]);
        assert!(mid > 0.0 && mid < 100.0);
    }

    #[test]
    fn test_overlap_score_tiers() {
        let s = scorer();
        assert_eq!(s.overlap_score(10.0), 20.0);
        assert_eq!(s.overlap_score(15.0), 75.0);
        assert_eq!(s.overlap_score(40.0), 100.0);
    }

    #[test]
    fn test_unlikelihood_against_baseline() {
        let t = 1_000_000;
        let shared = vec![SharedPurchase {
            token_mint: "A".into(),
            candidate_timestamp: t - 10 * 3600,
            target_timestamp: t,
            lead_time_hours: 10.0,
            candidate_signature: "c".into(),
            target_signature: "t".into(),
            candidate_amount_usd: 1000.0,
            target_amount_usd: 1000.0,
        }];

        // Twenty buyers a day or more after the target, nobody near the candidate's offset.
        let mut buyers: HashMap<String, Vec<BuyerObservation>> = HashMap::new();
        buyers.insert(
            "A".into(),
            (0..20)
                .map(|i| BuyerObservation { wallet: format!("H{}", i), timestamp: t + 3600 * (24 + i) })
                .collect(),
        );
        let rare = BaselineStatistics::from_parts(buyers.clone(), HashMap::new(), vec![], 95.0, 10.0);
        assert_eq!(scorer().unlikelihood("C", &shared, &rare), 100.0);

        // One of twenty (5 %) bought at a similar offset.
        buyers.get_mut("A").unwrap()[0].timestamp = t - 9 * 3600;
        let one_similar = BaselineStatistics::from_parts(buyers.clone(), HashMap::new(), vec![], 95.0, 10.0);
        assert_eq!(scorer().unlikelihood("C", &shared, &one_similar), 75.0);

        // Half of the buyers share the offset: not unlikely at all.
        for b in buyers.get_mut("A").unwrap().iter_mut().take(10) {
            b.timestamp = t - 10 * 3600;
        }
        let common = BaselineStatistics::from_parts(buyers, HashMap::new(), vec![], 95.0, 10.0);
        assert_eq!(scorer().unlikelihood("C", &shared, &common), 0.0);

        assert_eq!(scorer().unlikelihood("C", &shared, &empty_baseline()), 0.0);
    }

    #[test]
    fn test_unlikelihood_counts_buyers_after_target_by_distance() {
        let t = 1_000_000;
        let shared = vec![SharedPurchase {
            token_mint: "A".into(),
            candidate_timestamp: t - 10 * 3600,
            target_timestamp: t,
            lead_time_hours: 10.0,
            candidate_signature: "c".into(),
            target_signature: "t".into(),
            candidate_amount_usd: 1000.0,
            target_amount_usd: 1000.0,
        }];

        // Three of twenty bought 9-11 h after the target: 15 % sit at the candidate's distance.
        let mut observations: Vec<BuyerObservation> = (0..17)
            .map(|i| BuyerObservation { wallet: format!("H{}", i), timestamp: t + 3600 * (30 + i) })
            .collect();
        for (i, hours) in [9, 10, 11].into_iter().enumerate() {
            observations.push(BuyerObservation { wallet: format!("L{}", i), timestamp: t + 3600 * hours });
        }
        let mut buyers: HashMap<String, Vec<BuyerObservation>> = HashMap::new();
        buyers.insert("A".into(), observations);
        let stats = BaselineStatistics::from_parts(buyers, HashMap::new(), vec![], 95.0, 10.0);

        assert_eq!(scorer().unlikelihood("C", &shared, &stats), 0.0);
    }

    #[test]
    fn test_overlap_uses_held_tokens_not_only_early_ones() {
        let t = 1_000_000;
        let target = WalletCandidate::new(
            "T",
            (0..20).map(|i| buy("T", &format!("M{}", i), t)).collect(),
        );
        // Holds ten of the target's tokens, but only two were bought inside the lead window.
        let mut held = vec![buy("C", "M0", t - 2 * 3600), buy("C", "M1", t - 3 * 3600)];
        held.extend((2..10).map(|i| buy("C", &format!("M{}", i), t + 5 * 3600)));
        let candidate = WalletCandidate::new("C", held);

        let score = scorer().score(&candidate, &target, &empty_baseline()).unwrap();
        assert_eq!(score.shared_token_count(), 2);
        assert_eq!(score.overlap_percentage, 10.0);
        // 50 % held overlap with the x5 tier.
        assert_eq!(score.overlap_score, 100.0);
    }

    #[test]
    fn test_classification_thresholds() {
        let s = scorer();
        assert_eq!(s.classify(70.0), Some(Classification::Strong));
        assert_eq!(s.classify(69.9), Some(Classification::Possible));
        assert_eq!(s.classify(40.0), Some(Classification::Possible));
        assert_eq!(s.classify(39.9), None);
    }

    #[test]
    fn test_rank_orders_descending() {
        let target = WalletCandidate::new("T", vec![buy("T", "A", 100_000), buy("T", "B", 100_000)]);
        let tight = WalletCandidate::new("C1", vec![buy("C1", "A", 100_000 - 3600), buy("C1", "B", 100_000 - 3600)]);
        let loose = WalletCandidate::new("C2", vec![buy("C2", "A", 100_000 - 3600), buy("C2", "B", 100_000 - 60 * 3600)]);
        let s = scorer();
        let mut scores = vec![
            s.score(&loose, &target, &empty_baseline()).unwrap(),
            s.score(&tight, &target, &empty_baseline()).unwrap(),
        ];
        rank(&mut scores);
        assert_eq!(scores[0].wallet, "C1");
    }
}
