use ferret_core::{TimingAnomaly, WalletCandidate, SECONDS_PER_HOUR};
use tracing::{debug, info};

use super::baseline::BaselineStatistics;
use crate::config::TimingSettings;

/// Flags target tokens where other holders piled in shortly before the target.
///
/// Works from the buyer observations already gathered for the baseline.
#[derive(Debug, Clone)]
pub struct TimingAnomalyDetector {
    settings: TimingSettings,
}

impl TimingAnomalyDetector {
    pub fn new(settings: TimingSettings) -> Self {
        Self { settings }
    }

    pub fn detect(&self, target: &WalletCandidate, baseline: &BaselineStatistics) -> Vec<TimingAnomaly> {
        let mut anomalies: Vec<TimingAnomaly> = target
            .purchases
            .iter()
            .take(self.settings.max_tokens)
            .filter_map(|purchase| self.inspect(&purchase.token_mint, purchase.timestamp, baseline))
            .collect();

        anomalies.sort_by(|a, b| b.anomaly_score.cmp(&a.anomaly_score).then_with(|| a.token_mint.cmp(&b.token_mint)));
        info!(tokens = target.purchases.len().min(self.settings.max_tokens), anomalies = anomalies.len(), "Timing anomaly scan complete");
        anomalies
    }

    /// Anomaly for one token, or `None` when too few buyers fall in the window
    /// or neither pre-buy threshold is met.
    pub fn inspect(&self, token_mint: &str, target_ts: i64, baseline: &BaselineStatistics) -> Option<TimingAnomaly> {
        let before = (self.settings.window_before_hours * SECONDS_PER_HOUR) as i64;
        let after = (self.settings.window_after_hours * SECONDS_PER_HOUR) as i64;
        let six_hours = (6.0 * SECONDS_PER_HOUR) as i64;
        let day = (24.0 * SECONDS_PER_HOUR) as i64;

        let in_window: Vec<i64> = baseline
            .buyers_of(token_mint)
            .iter()
            .map(|b| b.timestamp)
            .filter(|ts| *ts >= target_ts - before && *ts <= target_ts + after)
            .collect();

        if in_window.len() < self.settings.min_wallets {
            return None;
        }

        let buys_6h_before = in_window.iter().filter(|ts| **ts < target_ts && target_ts - **ts <= six_hours).count();
        let buys_24h_before = in_window.iter().filter(|ts| **ts < target_ts && target_ts - **ts <= day).count();
        let buys_after = in_window.iter().filter(|ts| **ts > target_ts).count();

        if buys_6h_before < self.settings.min_buys_6h_before && buys_24h_before < self.settings.min_buys_24h_before {
            return None;
        }

        let anomaly = TimingAnomaly {
            token_mint: token_mint.to_string(),
            target_timestamp: target_ts,
            wallets_in_window: in_window.len(),
            buys_24h_before,
            buys_6h_before,
            buys_after,
            anomaly_score: buys_6h_before * 3 + buys_24h_before,
        };
        debug!(token_mint = %token_mint, score = anomaly.anomaly_score, "Timing anomaly");
        Some(anomaly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::baseline::BuyerObservation;
    use ferret_core::PurchaseEvent;
    use std::collections::HashMap;

    const H: i64 = 3600;
    const T: i64 = 1_000 * H;

    fn baseline(buys: &[(&str, Vec<i64>)]) -> BaselineStatistics {
        let buyers = buys
            .iter()
            .map(|(mint, times)| {
                let obs = times
                    .iter()
                    .enumerate()
                    .map(|(i, ts)| BuyerObservation { wallet: format!("H{}", i), timestamp: *ts })
                    .collect();
                (mint.to_string(), obs)
            })
            .collect::<HashMap<_, _>>();
        BaselineStatistics::from_parts(buyers, HashMap::new(), vec![], 95.0, 10.0)
    }

    fn detector() -> TimingAnomalyDetector {
        TimingAnomalyDetector::new(TimingSettings::default())
    }

    #[test]
    fn test_cluster_within_six_hours_flagged() {
        let stats = baseline(&[("A", vec![T - H, T - 2 * H, T - 5 * H, T + H])]);
        let anomaly = detector().inspect("A", T, &stats).unwrap();
        assert_eq!(anomaly.wallets_in_window, 4);
        assert_eq!(anomaly.buys_6h_before, 3);
        assert_eq!(anomaly.buys_24h_before, 3);
        assert_eq!(anomaly.buys_after, 1);
        assert_eq!(anomaly.anomaly_score, 12);
    }

    #[test]
    fn test_five_within_day_flagged() {
        let stats = baseline(&[("A", vec![T - 10 * H, T - 12 * H, T - 14 * H, T - 16 * H, T - 20 * H])]);
        let anomaly = detector().inspect("A", T, &stats).unwrap();
        assert_eq!(anomaly.buys_6h_before, 0);
        assert_eq!(anomaly.buys_24h_before, 5);
        assert_eq!(anomaly.anomaly_score, 5);
    }

    #[test]
    fn test_spread_out_or_sparse_buys_not_flagged() {
        let spread = baseline(&[("A", vec![T - 30 * H, T - 40 * H, T - 10 * H, T + 2 * H])]);
        assert!(detector().inspect("A", T, &spread).is_none());

        let sparse = baseline(&[("A", vec![T - H, T - 2 * H])]);
        assert!(detector().inspect("A", T, &sparse).is_none());

        // Outside the window entirely.
        let stale = baseline(&[("A", vec![T - 100 * H, T - 101 * H, T - 102 * H])]);
        assert!(detector().inspect("A", T, &stale).is_none());
    }

    #[test]
    fn test_detect_walks_target_tokens() {
        let stats = baseline(&[("A", vec![T - H, T - 2 * H, T - 3 * H]), ("B", vec![T - 30 * H])]);
        let target = WalletCandidate::new(
            "T",
            ["A", "B"]
                .iter()
                .map(|m| PurchaseEvent {
                    wallet: "T".into(),
                    token_mint: m.to_string(),
                    amount_tokens: 1.0,
                    amount_usd_estimate: 10.0,
                    timestamp: T,
                    tx_signature: format!("t-{}", m),
                })
                .collect(),
        );
        let anomalies = detector().detect(&target, &stats);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].token_mint, "A");
    }
}
