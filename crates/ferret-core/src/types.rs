use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// A single token acquisition observed in one transaction for one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseEvent {
    pub wallet: String,
    pub token_mint: String,
    pub amount_tokens: f64,
    /// Directional only: fixed multiplier on the token amount, not a price lookup.
    pub amount_usd_estimate: f64,
    /// Block time of the transaction, unix seconds.
    pub timestamp: i64,
    pub tx_signature: String,
}

impl PurchaseEvent {
    /// Short display label, the mint has no symbol without a metadata lookup.
    pub fn token_symbol(&self) -> String {
        token_label(&self.token_mint)
    }
}

pub fn token_label(mint: &str) -> String {
    let prefix: String = mint.chars().take(6).collect();
    format!("Token_{}", prefix)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletCandidate {
    pub address: String,
    pub purchases: Vec<PurchaseEvent>,
}

impl WalletCandidate {
    pub fn new(address: impl Into<String>, purchases: Vec<PurchaseEvent>) -> Self {
        Self {
            address: address.into(),
            purchases,
        }
    }

    pub fn token_set(&self) -> HashSet<&str> {
        self.purchases.iter().map(|p| p.token_mint.as_str()).collect()
    }

    pub fn purchase_of(&self, token_mint: &str) -> Option<&PurchaseEvent> {
        self.purchases.iter().find(|p| p.token_mint == token_mint)
    }

    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty()
    }
}

/// A token bought by the candidate strictly before the target, inside the lead window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedPurchase {
    pub token_mint: String,
    pub candidate_timestamp: i64,
    pub target_timestamp: i64,
    pub lead_time_hours: f64,
    pub candidate_signature: String,
    pub target_signature: String,
    #[serde(default)]
    pub candidate_amount_usd: f64,
    #[serde(default)]
    pub target_amount_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Strong,
    Possible,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Strong => "STRONG",
            Classification::Possible => "POSSIBLE",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationScore {
    pub wallet: String,
    pub overlap_score: f64,
    pub lead_time_consistency_score: f64,
    pub unlikelihood_score: f64,
    pub final_score: f64,
    pub shared_purchases: Vec<SharedPurchase>,
    /// Shared-and-earlier purchases as a percentage of the target's token set.
    /// The overlap sub-score uses held tokens regardless of timing instead.
    pub overlap_percentage: f64,
    pub exceeds_baseline: bool,
    pub avg_lead_time_hours: f64,
    pub lead_time_std_dev: f64,
}

impl CoordinationScore {
    pub fn shared_token_count(&self) -> usize {
        self.shared_purchases.len()
    }

    pub fn shared_purchase(&self, token_mint: &str) -> Option<&SharedPurchase> {
        self.shared_purchases.iter().find(|s| s.token_mint == token_mint)
    }
}

/// Undirected edge between two flagged wallets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEdge {
    pub wallet_a: String,
    pub wallet_b: String,
    pub shared_tokens: usize,
    pub avg_time_delta_hours: f64,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingAnomaly {
    pub token_mint: String,
    pub target_timestamp: i64,
    pub wallets_in_window: usize,
    pub buys_24h_before: usize,
    pub buys_6h_before: usize,
    pub buys_after: usize,
    pub anomaly_score: usize,
}

/// Position sizing of a flagged wallet on its shared purchases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfile {
    pub wallet: String,
    pub avg_volume_usd: f64,
    pub ratio_to_target: f64,
    /// min(ratio, 1/ratio): 1.0 when the wallet sizes exactly like the target.
    pub size_similarity: f64,
    pub consistent_sizing: bool,
    pub volume_range_usd: f64,
}

/// One purchase of a holder that landed close to a flagged wallet's purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondDegreeLink {
    pub primary_wallet: String,
    pub token_mint: String,
    pub time_diff_hours: f64,
}

/// A wallet that repeatedly trades alongside the flagged wallets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondDegreeWallet {
    pub wallet: String,
    pub links: Vec<SecondDegreeLink>,
}

impl SecondDegreeWallet {
    pub fn match_count(&self) -> usize {
        self.links.len()
    }

    pub fn primary_wallets(&self) -> Vec<&str> {
        let mut primaries: Vec<&str> = self.links.iter().map(|l| l.primary_wallet.as_str()).collect();
        primaries.sort_unstable();
        primaries.dedup();
        primaries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingSource {
    pub wallet: String,
    /// `None` when no qualifying inbound transfer was found.
    pub funder: Option<String>,
    pub amount_sol: f64,
    pub signature: Option<String>,
}

impl FundingSource {
    pub fn unknown(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            funder: None,
            amount_sol: 0.0,
            signature: None,
        }
    }
}

/// Stage of the pipeline at which a wallet had to be abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStage {
    TargetHistory,
    HolderLookup,
    BaselineSample,
    CandidateHistory,
    SecondDegree,
    FundingTrace,
}

impl std::fmt::Display for FetchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FetchStage::TargetHistory => "target_history",
            FetchStage::HolderLookup => "holder_lookup",
            FetchStage::BaselineSample => "baseline_sample",
            FetchStage::CandidateHistory => "candidate_history",
            FetchStage::SecondDegree => "second_degree",
            FetchStage::FundingTrace => "funding_trace",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub subject: String,
    pub stage: FetchStage,
    pub error: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase(mint: &str, ts: i64) -> PurchaseEvent {
        PurchaseEvent {
            wallet: "w".to_string(),
            token_mint: mint.to_string(),
            amount_tokens: 1.0,
            amount_usd_estimate: 10.0,
            timestamp: ts,
            tx_signature: format!("sig-{}", mint),
        }
    }

    #[test]
    fn test_token_label_uses_mint_prefix() {
        assert_eq!(token_label("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"), "Token_EPjFWd");
        assert_eq!(token_label("abc"), "Token_abc");
    }

    #[test]
    fn test_candidate_token_set_and_lookup() {
        let candidate = WalletCandidate::new("w", vec![purchase("A", 10), purchase("B", 5)]);
        let tokens = candidate.token_set();
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("A"));
        assert_eq!(candidate.purchase_of("B").map(|p| p.timestamp), Some(5));
        assert!(candidate.purchase_of("C").is_none());
    }
}
