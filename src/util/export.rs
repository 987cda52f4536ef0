/// CSV and JSON report files for a finished analysis.

use chrono::{DateTime, Utc};
use ferret_core::{token_label, Classification};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::{AnalysisReport, FlaggedWallet};
use crate::error::Result;

pub const SCORES_FILE: &str = "coordination_scores.csv";
pub const HIGH_CONFIDENCE_FILE: &str = "high_confidence_coordination.csv";
pub const EDGES_FILE: &str = "network_edges.csv";
pub const DETAILS_FILE: &str = "detailed_findings.csv";
pub const TIMING_FILE: &str = "timing_anomalies.csv";
pub const VOLUME_FILE: &str = "volume_patterns.csv";
pub const SECOND_DEGREE_FILE: &str = "second_degree_coordination.csv";
pub const FUNDING_FILE: &str = "funding_sources.csv";
pub const ERROR_LOG_FILE: &str = "error_log.csv";
pub const SUMMARY_FILE: &str = "analysis_summary.json";

/// How many wallets the JSON summary lists individually.
const SUMMARY_TOP_WALLETS: usize = 10;

pub fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[derive(Debug, Serialize)]
struct ScoreRow<'a> {
    wallet: &'a str,
    classification: &'static str,
    final_score: String,
    overlap_score: String,
    lead_time_consistency_score: String,
    unlikelihood_score: String,
    shared_tokens: usize,
    overlap_percentage: String,
    exceeds_baseline: bool,
    avg_lead_time_hours: String,
    lead_time_std_dev_hours: String,
}

impl<'a> From<&'a FlaggedWallet> for ScoreRow<'a> {
    fn from(f: &'a FlaggedWallet) -> Self {
        let s = &f.score;
        Self {
            wallet: &s.wallet,
            classification: f.classification.label(),
            final_score: format!("{:.1}", s.final_score),
            overlap_score: format!("{:.1}", s.overlap_score),
            lead_time_consistency_score: format!("{:.1}", s.lead_time_consistency_score),
            unlikelihood_score: format!("{:.1}", s.unlikelihood_score),
            shared_tokens: s.shared_token_count(),
            overlap_percentage: format!("{:.1}", s.overlap_percentage),
            exceeds_baseline: s.exceeds_baseline,
            avg_lead_time_hours: format!("{:.2}", s.avg_lead_time_hours),
            lead_time_std_dev_hours: format!("{:.2}", s.lead_time_std_dev),
        }
    }
}

#[derive(Debug, Serialize)]
struct DetailRow<'a> {
    wallet: &'a str,
    final_score: String,
    token_mint: &'a str,
    token: String,
    wallet_bought_at: String,
    target_bought_at: String,
    lead_time_hours: String,
    wallet_signature: &'a str,
    target_signature: &'a str,
}

#[derive(Debug, Serialize)]
struct EdgeRow<'a> {
    wallet_a: &'a str,
    wallet_b: &'a str,
    shared_tokens: usize,
    avg_time_delta_hours: String,
    tokens: String,
}

#[derive(Debug, Serialize)]
struct TimingRow<'a> {
    token_mint: &'a str,
    token: String,
    target_bought_at: String,
    wallets_in_window: usize,
    buys_6h_before: usize,
    buys_24h_before: usize,
    buys_after: usize,
    anomaly_score: usize,
}

#[derive(Debug, Serialize)]
struct VolumeRow<'a> {
    wallet: &'a str,
    avg_volume_usd: String,
    ratio_to_target: String,
    size_similarity: String,
    consistent_sizing: bool,
    volume_range_usd: String,
}

#[derive(Debug, Serialize)]
struct SecondDegreeRow<'a> {
    wallet: &'a str,
    total_matches: usize,
    primary_wallet: &'a str,
    token_mint: &'a str,
    token: String,
    time_diff_hours: String,
}

#[derive(Debug, Serialize)]
struct FundingRow<'a> {
    wallet: &'a str,
    funder: &'a str,
    amount_sol: String,
    signature: &'a str,
    wallets_sharing_funder: usize,
}

#[derive(Debug, Serialize)]
struct ErrorRow<'a> {
    subject: &'a str,
    stage: String,
    error: &'a str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct BaselineSummary {
    sample_size: usize,
    mean_overlap_pct: f64,
    median_overlap_pct: f64,
    percentile: f64,
    threshold_pct: f64,
    tokens_with_timing_data: usize,
}

#[derive(Debug, Serialize)]
struct WalletSummary<'a> {
    wallet: &'a str,
    classification: Classification,
    final_score: f64,
    shared_tokens: usize,
    avg_lead_time_hours: f64,
}

#[derive(Debug, Serialize)]
struct AnalysisSummary<'a> {
    target_wallet: &'a str,
    started_at: String,
    finished_at: String,
    target_purchases: usize,
    candidates_evaluated: usize,
    candidates_resumed: usize,
    baseline: BaselineSummary,
    strong_coordination: usize,
    possible_coordination: usize,
    network_edges: usize,
    clusters: &'a [Vec<String>],
    timing_anomalies: usize,
    consistent_sizing_wallets: usize,
    second_degree_wallets: usize,
    shared_funders: Vec<SharedFunder<'a>>,
    fetch_failures: usize,
    top_wallets: Vec<WalletSummary<'a>>,
}

#[derive(Debug, Serialize)]
struct SharedFunder<'a> {
    funder: &'a str,
    wallets: &'a [String],
}

pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes every applicable report and returns the paths written.
    pub fn write_all(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)?;
        let mut written = Vec::new();

        written.push(self.write_csv(SCORES_FILE, report.flagged.iter().map(ScoreRow::from))?);
        written.push(self.write_csv(HIGH_CONFIDENCE_FILE, report.strong().map(ScoreRow::from))?);
        written.push(self.write_csv(EDGES_FILE, report.edges.iter().map(|e| EdgeRow {
            wallet_a: &e.wallet_a,
            wallet_b: &e.wallet_b,
            shared_tokens: e.shared_tokens,
            avg_time_delta_hours: format!("{:.2}", e.avg_time_delta_hours),
            tokens: e.tokens.join(";"),
        }))?);
        written.push(self.write_csv(DETAILS_FILE, report.flagged.iter().flat_map(|f| {
            f.score.shared_purchases.iter().map(move |p| DetailRow {
                wallet: &f.score.wallet,
                final_score: format!("{:.1}", f.score.final_score),
                token_mint: &p.token_mint,
                token: token_label(&p.token_mint),
                wallet_bought_at: format_timestamp(p.candidate_timestamp),
                target_bought_at: format_timestamp(p.target_timestamp),
                lead_time_hours: format!("{:.2}", p.lead_time_hours),
                wallet_signature: &p.candidate_signature,
                target_signature: &p.target_signature,
            })
        }))?);
        written.push(self.write_csv(TIMING_FILE, report.timing_anomalies.iter().map(|a| TimingRow {
            token_mint: &a.token_mint,
            token: token_label(&a.token_mint),
            target_bought_at: format_timestamp(a.target_timestamp),
            wallets_in_window: a.wallets_in_window,
            buys_6h_before: a.buys_6h_before,
            buys_24h_before: a.buys_24h_before,
            buys_after: a.buys_after,
            anomaly_score: a.anomaly_score,
        }))?);

        written.push(self.write_csv(VOLUME_FILE, report.volume_profiles.iter().map(|v| VolumeRow {
            wallet: &v.wallet,
            avg_volume_usd: format!("{:.2}", v.avg_volume_usd),
            ratio_to_target: format!("{:.3}", v.ratio_to_target),
            size_similarity: format!("{:.3}", v.size_similarity),
            consistent_sizing: v.consistent_sizing,
            volume_range_usd: format!("{:.2}", v.volume_range_usd),
        }))?);

        if !report.second_degree.is_empty() {
            written.push(self.write_csv(SECOND_DEGREE_FILE, report.second_degree.iter().flat_map(|w| {
                w.links.iter().map(move |l| SecondDegreeRow {
                    wallet: &w.wallet,
                    total_matches: w.match_count(),
                    primary_wallet: &l.primary_wallet,
                    token_mint: &l.token_mint,
                    token: token_label(&l.token_mint),
                    time_diff_hours: format!("{:.2}", l.time_diff_hours),
                })
            }))?);
        }

        if !report.funding.is_empty() {
            written.push(self.write_csv(FUNDING_FILE, report.funding.iter().map(|s| {
                let sharing = s
                    .funder
                    .as_deref()
                    .and_then(|funder| report.shared_funders.iter().find(|(f, _)| f == funder))
                    .map(|(_, wallets)| wallets.len())
                    .unwrap_or(0);
                FundingRow {
                    wallet: &s.wallet,
                    funder: s.funder.as_deref().unwrap_or("unknown"),
                    amount_sol: format!("{:.4}", s.amount_sol),
                    signature: s.signature.as_deref().unwrap_or(""),
                    wallets_sharing_funder: sharing,
                }
            }))?);
        }

        if !report.failures.is_empty() {
            written.push(self.write_csv(ERROR_LOG_FILE, report.failures.iter().map(|f| ErrorRow {
                subject: &f.subject,
                stage: f.stage.to_string(),
                error: &f.error,
                timestamp: format_timestamp(f.timestamp),
            }))?);
        }

        written.push(self.write_summary(report)?);

        info!(dir = %self.dir.display(), files = written.len(), "Reports written");
        Ok(written)
    }

    fn write_csv<R: Serialize>(&self, name: &str, rows: impl Iterator<Item = R>) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let mut writer = csv::Writer::from_path(&path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(path)
    }

    fn write_summary(&self, report: &AnalysisReport) -> Result<PathBuf> {
        let summary = AnalysisSummary {
            target_wallet: &report.target_wallet,
            started_at: format_timestamp(report.started_at),
            finished_at: format_timestamp(report.finished_at),
            target_purchases: report.target_purchases.len(),
            candidates_evaluated: report.candidates_total,
            candidates_resumed: report.candidates_resumed,
            baseline: BaselineSummary {
                sample_size: report.baseline.sample_size(),
                mean_overlap_pct: report.baseline.mean_overlap,
                median_overlap_pct: report.baseline.median_overlap,
                percentile: report.baseline.percentile,
                threshold_pct: report.baseline.threshold,
                tokens_with_timing_data: report.baseline.token_buyers.values().filter(|b| !b.is_empty()).count(),
            },
            strong_coordination: report.count(Classification::Strong),
            possible_coordination: report.count(Classification::Possible),
            network_edges: report.edges.len(),
            clusters: &report.clusters,
            timing_anomalies: report.timing_anomalies.len(),
            consistent_sizing_wallets: report.volume_profiles.iter().filter(|v| v.consistent_sizing).count(),
            second_degree_wallets: report.second_degree.len(),
            shared_funders: report
                .shared_funders
                .iter()
                .map(|(funder, wallets)| SharedFunder { funder, wallets })
                .collect(),
            fetch_failures: report.failures.len(),
            top_wallets: report
                .flagged
                .iter()
                .take(SUMMARY_TOP_WALLETS)
                .map(|f| WalletSummary {
                    wallet: &f.score.wallet,
                    classification: f.classification,
                    final_score: f.score.final_score,
                    shared_tokens: f.score.shared_token_count(),
                    avg_lead_time_hours: f.score.avg_lead_time_hours,
                })
                .collect(),
        };

        let path = self.dir.join(SUMMARY_FILE);
        fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        Ok(path)
    }
}
