use ferret_core::{CoordinationScore, VolumeProfile};
use std::collections::HashSet;
use tracing::info;

use crate::config::VolumeSettings;

/// Compares how flagged wallets size their shared purchases against the target.
#[derive(Debug, Clone)]
pub struct VolumeAnalyzer {
    settings: VolumeSettings,
}

impl VolumeAnalyzer {
    pub fn new(settings: VolumeSettings) -> Self {
        Self { settings }
    }

    pub fn analyze<'a>(&self, scores: impl IntoIterator<Item = &'a CoordinationScore>) -> Vec<VolumeProfile> {
        let profiles: Vec<VolumeProfile> = scores.into_iter().filter_map(|s| self.profile(s)).collect();
        let consistent = profiles.iter().filter(|p| p.consistent_sizing).count();
        info!(wallets = profiles.len(), consistent, "Volume pattern analysis complete");
        profiles
    }

    /// `None` when the score carries no shared purchases.
    pub fn profile(&self, score: &CoordinationScore) -> Option<VolumeProfile> {
        let volumes: Vec<f64> = score.shared_purchases.iter().map(|p| p.candidate_amount_usd).collect();
        if volumes.is_empty() {
            return None;
        }
        let target_volumes: Vec<f64> = score.shared_purchases.iter().map(|p| p.target_amount_usd).collect();

        let avg_volume_usd = average(&volumes);
        let avg_target = average(&target_volumes);
        let ratio_to_target = if avg_target > 0.0 { avg_volume_usd / avg_target } else { 0.0 };
        let size_similarity = if ratio_to_target > 0.0 {
            ratio_to_target.min(1.0 / ratio_to_target)
        } else {
            0.0
        };

        let buckets: HashSet<i64> = volumes
            .iter()
            .map(|v| (v / self.settings.size_bucket_usd).trunc() as i64)
            .collect();

        let max = volumes.iter().copied().fold(f64::MIN, f64::max);
        let min = volumes.iter().copied().fold(f64::MAX, f64::min);

        Some(VolumeProfile {
            wallet: score.wallet.clone(),
            avg_volume_usd,
            ratio_to_target,
            size_similarity,
            consistent_sizing: buckets.len() <= self.settings.max_size_buckets,
            volume_range_usd: if volumes.len() > 1 { max - min } else { 0.0 },
        })
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferret_core::SharedPurchase;

    fn score(wallet: &str, sizes: &[(f64, f64)]) -> CoordinationScore {
        CoordinationScore {
            wallet: wallet.into(),
            overlap_score: 0.0,
            lead_time_consistency_score: 0.0,
            unlikelihood_score: 0.0,
            final_score: 80.0,
            shared_purchases: sizes
                .iter()
                .enumerate()
                .map(|(i, (candidate, target))| SharedPurchase {
                    token_mint: format!("M{}", i),
                    candidate_timestamp: 0,
                    target_timestamp: 3600,
                    lead_time_hours: 1.0,
                    candidate_signature: format!("c{}", i),
                    target_signature: format!("t{}", i),
                    candidate_amount_usd: *candidate,
                    target_amount_usd: *target,
                })
                .collect(),
            overlap_percentage: 0.0,
            exceeds_baseline: false,
            avg_lead_time_hours: 1.0,
            lead_time_std_dev: 0.0,
        }
    }

    fn analyzer() -> VolumeAnalyzer {
        VolumeAnalyzer::new(VolumeSettings::default())
    }

    #[test]
    fn test_half_size_of_target() {
        let profile = analyzer().profile(&score("C", &[(500.0, 1000.0), (1500.0, 3000.0)])).unwrap();
        assert_eq!(profile.avg_volume_usd, 1000.0);
        assert_eq!(profile.ratio_to_target, 0.5);
        assert_eq!(profile.size_similarity, 0.5);
        assert_eq!(profile.volume_range_usd, 1000.0);
        assert!(profile.consistent_sizing);
    }

    #[test]
    fn test_larger_than_target_similarity_is_inverse() {
        let profile = analyzer().profile(&score("C", &[(4000.0, 1000.0), (4000.0, 1000.0)])).unwrap();
        assert_eq!(profile.ratio_to_target, 4.0);
        assert_eq!(profile.size_similarity, 0.25);
        assert_eq!(profile.volume_range_usd, 0.0);
    }

    #[test]
    fn test_scattered_sizes_are_inconsistent() {
        // Buckets 0, 2, 5 and 9.
        let sizes = [(200.0, 1.0), (2500.0, 1.0), (5100.0, 1.0), (9999.0, 1.0)];
        assert!(!analyzer().profile(&score("C", &sizes)).unwrap().consistent_sizing);
    }

    #[test]
    fn test_unknown_target_size_and_empty_scores() {
        let profile = analyzer().profile(&score("C", &[(100.0, 0.0), (100.0, 0.0)])).unwrap();
        assert_eq!(profile.ratio_to_target, 0.0);
        assert_eq!(profile.size_similarity, 0.0);

        assert!(analyzer().profile(&score("E", &[])).is_none());
        assert_eq!(analyzer().analyze([&score("C", &[(1.0, 1.0)]), &score("E", &[])]).len(), 1);
    }
}
