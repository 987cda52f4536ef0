/// Analysis configuration structures

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FerretError, Result};

pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const API_KEY_ENV: &str = "HELIUS_API_KEY";
pub const RPC_URL_ENV: &str = "FERRET_RPC_URL";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcSettings,
    pub extraction: ExtractionSettings,
    pub baseline: BaselineSettings,
    pub scoring: ScoringSettings,
    pub network: NetworkSettings,
    pub timing: TimingSettings,
    pub volume: VolumeSettings,
    pub second_degree: SecondDegreeSettings,
    pub funding: FundingSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcSettings {
    pub endpoint: String,
    /// Usually supplied through `HELIUS_API_KEY` rather than the file.
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub max_attempts: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Pause between consecutive requests, for rate-limit compliance only.
    pub request_delay_ms: u64,
    /// Token accounts at or below this UI amount are not treated as holders.
    pub min_holder_ui_amount: f64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://mainnet.helius-rpc.com".to_string(),
            api_key: None,
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 8000,
            request_delay_ms: 50,
            min_holder_ui_amount: 100.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub wrapped_native_mint: String,
    pub target_max_purchases: usize,
    pub candidate_max_purchases: usize,
    /// Signatures fetched per wallet = max purchases * this factor.
    pub signature_factor: usize,
    pub usd_large_amount_threshold: f64,
    pub usd_large_multiplier: f64,
    pub usd_small_multiplier: f64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            wrapped_native_mint: WRAPPED_SOL_MINT.to_string(),
            target_max_purchases: 100,
            candidate_max_purchases: 100,
            signature_factor: 2,
            usd_large_amount_threshold: 1000.0,
            usd_large_multiplier: 0.001,
            usd_small_multiplier: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BaselineSettings {
    pub max_tokens: usize,
    pub holders_per_token: usize,
    pub timing_holders_per_token: usize,
    pub holder_max_purchases: usize,
    pub sample_holders_per_token: usize,
    pub sample_size: usize,
    pub sample_max_purchases: usize,
    pub percentile: f64,
    /// Threshold used when no wallet could be sampled.
    pub fallback_threshold_pct: f64,
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            max_tokens: 20,
            holders_per_token: 30,
            timing_holders_per_token: 20,
            holder_max_purchases: 50,
            sample_holders_per_token: 10,
            sample_size: 50,
            sample_max_purchases: 100,
            percentile: 95.0,
            fallback_threshold_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub candidate_tokens: usize,
    pub candidate_holders_per_token: usize,
    pub min_shared_purchases: usize,
    pub min_lead_hours: f64,
    pub max_lead_hours: f64,
    pub overlap_base_multiplier: f64,
    pub overlap_boost_multiplier: f64,
    pub overlap_boost_threshold_pct: f64,
    pub consistency_full_std_hours: f64,
    pub consistency_zero_std_hours: f64,
    pub similar_timing_window_hours: f64,
    pub unlikely_max_similar_pct: f64,
    pub unlikelihood_penalty: f64,
    pub overlap_weight: f64,
    pub consistency_weight: f64,
    pub unlikelihood_weight: f64,
    pub strong_threshold: f64,
    pub possible_threshold: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            candidate_tokens: 20,
            candidate_holders_per_token: 20,
            min_shared_purchases: 2,
            min_lead_hours: 1.0,
            max_lead_hours: 168.0,
            overlap_base_multiplier: 2.0,
            overlap_boost_multiplier: 5.0,
            overlap_boost_threshold_pct: 15.0,
            consistency_full_std_hours: 2.0,
            consistency_zero_std_hours: 12.0,
            similar_timing_window_hours: 2.0,
            unlikely_max_similar_pct: 10.0,
            unlikelihood_penalty: 5.0,
            overlap_weight: 0.3,
            consistency_weight: 0.4,
            unlikelihood_weight: 0.3,
            strong_threshold: 70.0,
            possible_threshold: 40.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub min_score: f64,
    pub min_shared_tokens: usize,
    pub max_avg_delta_hours: f64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            min_score: 70.0,
            min_shared_tokens: 2,
            max_avg_delta_hours: 6.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingSettings {
    pub max_tokens: usize,
    pub window_before_hours: f64,
    pub window_after_hours: f64,
    pub min_wallets: usize,
    pub min_buys_6h_before: usize,
    pub min_buys_24h_before: usize,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            max_tokens: 10,
            window_before_hours: 48.0,
            window_after_hours: 6.0,
            min_wallets: 3,
            min_buys_6h_before: 3,
            min_buys_24h_before: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VolumeSettings {
    /// Purchases are bucketed by USD estimate in steps of this size.
    pub size_bucket_usd: f64,
    /// Sizing is consistent when purchases fall into at most this many buckets.
    pub max_size_buckets: usize,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            size_bucket_usd: 1000.0,
            max_size_buckets: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecondDegreeSettings {
    pub enabled: bool,
    /// Highest-ranked flagged wallets whose co-buyers are searched.
    pub max_primary_wallets: usize,
    pub primary_max_purchases: usize,
    pub purchases_per_primary: usize,
    pub holders_per_token: usize,
    pub holder_max_purchases: usize,
    pub match_window_hours: f64,
    pub min_matches: usize,
}

impl Default for SecondDegreeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_primary_wallets: 5,
            primary_max_purchases: 50,
            purchases_per_primary: 20,
            holders_per_token: 30,
            holder_max_purchases: 30,
            match_window_hours: 24.0,
            min_matches: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FundingSettings {
    pub enabled: bool,
    pub min_amount_sol: f64,
    pub signature_limit: usize,
    pub oldest_signatures: usize,
}

impl Default for FundingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_amount_sol: 0.01,
            signature_limit: 1000,
            oldest_signatures: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: String,
    pub checkpoint_file: String,
    pub checkpoint_every: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: "reports".to_string(),
            checkpoint_file: "ferret_progress.json".to_string(),
            checkpoint_every: 10,
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| FerretError::Config(e.to_string()))
    }

    /// File if given, otherwise defaults; environment variables override either.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.rpc.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(url) = std::env::var(RPC_URL_ENV) {
            if !url.trim().is_empty() {
                self.rpc.endpoint = url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.rpc.api_key.as_deref() {
            Some(key) if !key.is_empty() => {}
            _ => return Err(FerretError::MissingCredential(API_KEY_ENV.to_string())),
        }

        let s = &self.scoring;
        if s.min_lead_hours < 0.0 || s.min_lead_hours > s.max_lead_hours {
            return Err(FerretError::Config(format!(
                "lead window [{}, {}] hours is empty",
                s.min_lead_hours, s.max_lead_hours
            )));
        }
        if s.consistency_full_std_hours >= s.consistency_zero_std_hours {
            return Err(FerretError::Config(
                "consistency_full_std_hours must be below consistency_zero_std_hours".to_string(),
            ));
        }
        if s.possible_threshold > s.strong_threshold {
            return Err(FerretError::Config(
                "possible_threshold must not exceed strong_threshold".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.baseline.percentile) {
            return Err(FerretError::Config(format!(
                "baseline percentile {} outside 0-100",
                self.baseline.percentile
            )));
        }
        if self.volume.size_bucket_usd <= 0.0 {
            return Err(FerretError::Config("size_bucket_usd must be positive".to_string()));
        }
        if s.min_shared_purchases == 0 {
            return Err(FerretError::Config("min_shared_purchases must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Full JSON-RPC URL including the API key query parameter.
    pub fn rpc_url(&self) -> Result<String> {
        let key = self
            .rpc
            .api_key
            .as_deref()
            .ok_or_else(|| FerretError::MissingCredential(API_KEY_ENV.to_string()))?;
        let mut url = url::Url::parse(&self.rpc.endpoint)
            .map_err(|e| FerretError::Config(format!("invalid RPC endpoint: {}", e)))?;
        url.query_pairs_mut().append_pair("api-key", key);
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn with_key() -> Config {
        let mut config = Config::default();
        config.rpc.api_key = Some("test-key".to_string());
        config
    }

    #[test]
    fn test_defaults_match_documented_heuristics() {
        let config = Config::default();
        assert_eq!(config.scoring.overlap_weight, 0.3);
        assert_eq!(config.scoring.consistency_weight, 0.4);
        assert_eq!(config.scoring.unlikelihood_weight, 0.3);
        assert_eq!(config.scoring.strong_threshold, 70.0);
        assert_eq!(config.scoring.possible_threshold, 40.0);
        assert_eq!(config.scoring.max_lead_hours, 168.0);
        assert_eq!(config.baseline.percentile, 95.0);
        assert_eq!(config.extraction.wrapped_native_mint, WRAPPED_SOL_MINT);
        assert!(!config.second_degree.enabled);
        assert_eq!(config.second_degree.match_window_hours, 24.0);
        assert_eq!(config.second_degree.min_matches, 3);
        assert_eq!(config.volume.max_size_buckets, 3);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let config = Config::default();
        match config.validate() {
            Err(FerretError::MissingCredential(name)) => assert_eq!(name, API_KEY_ENV),
            other => panic!("expected missing credential, got {:?}", other),
        }
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = with_key();
        config.scoring.possible_threshold = 80.0;
        assert!(matches!(config.validate(), Err(FerretError::Config(_))));

        let mut config = with_key();
        config.scoring.min_lead_hours = 200.0;
        assert!(matches!(config.validate(), Err(FerretError::Config(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[scoring]\nstrong_threshold = 75.0\n\n[network]\nmax_avg_delta_hours = 4.0"
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.scoring.strong_threshold, 75.0);
        assert_eq!(config.scoring.possible_threshold, 40.0);
        assert_eq!(config.network.max_avg_delta_hours, 4.0);
        assert_eq!(config.network.min_shared_tokens, 2);
        assert_eq!(config.baseline.sample_size, 50);
    }

    #[test]
    fn test_rpc_url_carries_api_key() {
        let config = with_key();
        let url = config.rpc_url().unwrap();
        assert!(url.starts_with("https://mainnet.helius-rpc.com/"));
        assert!(url.ends_with("api-key=test-key"));
    }
}
