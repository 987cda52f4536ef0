use ferret_core::{
    Classification, CoordinationScore, CorrelationEdge, FetchFailure, FetchStage, FundingSource, PurchaseEvent,
    SecondDegreeWallet, TimingAnomaly, VolumeProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::checkpoint::{Checkpoint, CheckpointHandle};
use crate::client::ChainDataSource;
use crate::config::Config;
use crate::error::{fetch_failure, Result};
use crate::ingest::PurchaseExtractor;
use crate::intelligence::{
    group_by_funder, rank_order, BaselineBuilder, BaselineStatistics, CoordinationScorer, FundingCache, FundingTracer,
    NetworkCorrelator, SecondDegreeFinder, TimingAnomalyDetector, VolumeAnalyzer,
};
use crate::stalker::PurchaseCollector;

/// A candidate that scored at or above the possible-coordination threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedWallet {
    pub classification: Classification,
    pub score: CoordinationScore,
}

/// Everything a run produced, handed to the report writer.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub target_wallet: String,
    pub target_purchases: Vec<PurchaseEvent>,
    pub baseline: BaselineStatistics,
    pub candidates_total: usize,
    pub candidates_resumed: usize,
    /// Ranked, highest final score first.
    pub flagged: Vec<FlaggedWallet>,
    pub edges: Vec<CorrelationEdge>,
    pub clusters: Vec<Vec<String>>,
    pub timing_anomalies: Vec<TimingAnomaly>,
    pub volume_profiles: Vec<VolumeProfile>,
    /// Empty unless the second-degree scan is enabled.
    pub second_degree: Vec<SecondDegreeWallet>,
    pub funding: Vec<FundingSource>,
    pub shared_funders: Vec<(String, Vec<String>)>,
    pub failures: Vec<FetchFailure>,
    pub started_at: i64,
    pub finished_at: i64,
}

impl AnalysisReport {
    fn empty(target_wallet: &str, started_at: i64) -> Self {
        Self {
            target_wallet: target_wallet.to_string(),
            target_purchases: Vec::new(),
            baseline: BaselineStatistics::default(),
            candidates_total: 0,
            candidates_resumed: 0,
            flagged: Vec::new(),
            edges: Vec::new(),
            clusters: Vec::new(),
            timing_anomalies: Vec::new(),
            volume_profiles: Vec::new(),
            second_degree: Vec::new(),
            funding: Vec::new(),
            shared_funders: Vec::new(),
            failures: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.flagged.iter().filter(|f| f.classification == classification).count()
    }

    pub fn strong(&self) -> impl Iterator<Item = &FlaggedWallet> {
        self.flagged.iter().filter(|f| f.classification == Classification::Strong)
    }
}

/// fetch -> extract -> baseline -> score -> correlate -> timing -> volume
/// -> second degree -> funding
pub struct CoordinationPipeline<S: ChainDataSource> {
    config: Config,
    collector: PurchaseCollector<S>,
    scorer: CoordinationScorer,
    correlator: NetworkCorrelator,
    timing: TimingAnomalyDetector,
    volume: VolumeAnalyzer,
    funding: FundingTracer<S>,
    funding_cache: FundingCache,
    checkpoint: CheckpointHandle,
    checkpoint_path: PathBuf,
}

impl<S: ChainDataSource> CoordinationPipeline<S> {
    pub fn new(source: Arc<S>, config: Config) -> Self {
        let extractor = PurchaseExtractor::new(&config.extraction);
        let checkpoint_path = Path::new(&config.output.directory).join(&config.output.checkpoint_file);

        Self {
            collector: PurchaseCollector::new(source.clone(), extractor, config.extraction.signature_factor),
            scorer: CoordinationScorer::new(config.scoring.clone()),
            correlator: NetworkCorrelator::new(config.network.clone()),
            timing: TimingAnomalyDetector::new(config.timing.clone()),
            volume: VolumeAnalyzer::new(config.volume.clone()),
            funding: FundingTracer::new(source, config.funding.clone()),
            funding_cache: FundingCache::new(),
            checkpoint: Checkpoint::default().into_handle(),
            checkpoint_path,
            config,
        }
    }

    pub fn checkpoint_handle(&self) -> CheckpointHandle {
        self.checkpoint.clone()
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn funding_cache(&self) -> &FundingCache {
        &self.funding_cache
    }

    pub fn collector(&self) -> &PurchaseCollector<S> {
        &self.collector
    }

    /// Loads progress for `target_wallet` from the checkpoint file, if any.
    pub async fn resume(&self, target_wallet: &str) {
        let restored = Checkpoint::resume_or_new(&self.checkpoint_path, target_wallet);
        info!(processed = restored.processed.len(), flagged = restored.flagged.len(), "Resuming from checkpoint");
        *self.checkpoint.lock().await = restored;
    }

    #[instrument(skip(self), fields(target = %target_wallet))]
    pub async fn run(&self, target_wallet: &str) -> Result<AnalysisReport> {
        let started_at = chrono::Utc::now().timestamp();
        let mut failures: Vec<FetchFailure> = Vec::new();

        {
            let mut cp = self.checkpoint.lock().await;
            if cp.target_wallet != target_wallet {
                *cp = Checkpoint::new(target_wallet);
            }
        }

        let target = match self
            .collector
            .collect(target_wallet, self.config.extraction.target_max_purchases)
            .await
        {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "Target history unavailable");
                return Err(e);
            }
        };
        info!(purchases = target.purchases.len(), "Target purchase history collected");

        if target.is_empty() {
            warn!("Target has no purchases, nothing to analyze");
            let mut report = AnalysisReport::empty(target_wallet, started_at);
            report.finished_at = chrono::Utc::now().timestamp();
            return Ok(report);
        }

        let baseline = BaselineBuilder::new(&self.collector, &self.config.baseline)
            .build(&target, &mut failures)
            .await;

        let candidates = self.discover_candidates(&target.purchases, &baseline, target_wallet, &mut failures).await;
        info!(candidates = candidates.len(), "Candidate wallets discovered");

        let mut resumed = 0usize;
        let mut since_save = 0usize;
        for (i, wallet) in candidates.iter().enumerate() {
            if self.checkpoint.lock().await.is_processed(wallet) {
                resumed += 1;
                continue;
            }

            let flagged = match self
                .collector
                .collect(wallet, self.config.extraction.candidate_max_purchases)
                .await
            {
                Ok(history) => self.scorer.score(&history, &target, &baseline).and_then(|score| {
                    self.scorer
                        .classify(score.final_score)
                        .map(|classification| FlaggedWallet { classification, score })
                }),
                Err(e) => {
                    failures.push(fetch_failure(wallet, FetchStage::CandidateHistory, &e));
                    self.checkpoint.lock().await.record_failure(wallet);
                    continue;
                }
            };

            if let Some(f) = &flagged {
                info!(
                    wallet = %wallet,
                    score = f.score.final_score,
                    classification = %f.classification,
                    shared = f.score.shared_token_count(),
                    "Coordination detected"
                );
            } else {
                debug!(wallet = %wallet, progress = i + 1, total = candidates.len(), "Candidate not flagged");
            }

            let mut cp = self.checkpoint.lock().await;
            cp.record(wallet, flagged);
            since_save += 1;
            if self.config.output.checkpoint_every > 0 && since_save >= self.config.output.checkpoint_every {
                since_save = 0;
                if let Err(e) = cp.save(&self.checkpoint_path) {
                    warn!(error = %e, "Checkpoint write failed");
                }
            }
        }

        let mut flagged: Vec<FlaggedWallet> = {
            let mut cp = self.checkpoint.lock().await;
            if let Err(e) = cp.save(&self.checkpoint_path) {
                warn!(error = %e, "Checkpoint write failed");
            }
            cp.flagged.clone()
        };
        rank_flagged(&mut flagged);

        let scores: Vec<CoordinationScore> = flagged.iter().map(|f| f.score.clone()).collect();
        let graph = self.correlator.correlate(&scores);
        let timing_anomalies = self.timing.detect(&target, &baseline);
        let volume_profiles = self.volume.analyze(&scores);

        let second_degree = if self.config.second_degree.enabled {
            let primaries: Vec<String> = scores.iter().map(|s| s.wallet.clone()).collect();
            SecondDegreeFinder::new(&self.collector, &self.config.second_degree)
                .find(target_wallet, &primaries, &mut failures)
                .await
        } else {
            Vec::new()
        };

        let mut funding = Vec::new();
        if self.config.funding.enabled {
            for f in &flagged {
                match self.funding.trace(&f.score.wallet, &self.funding_cache).await {
                    Ok(source) => funding.push(source),
                    Err(e) => failures.push(fetch_failure(&f.score.wallet, FetchStage::FundingTrace, &e)),
                }
            }
        }
        let shared_funders = group_by_funder(&funding);

        let report = AnalysisReport {
            target_wallet: target_wallet.to_string(),
            target_purchases: target.purchases.clone(),
            candidates_total: candidates.len(),
            candidates_resumed: resumed,
            edges: graph.edges().into_iter().cloned().collect(),
            clusters: graph.clusters(),
            flagged,
            timing_anomalies,
            volume_profiles,
            second_degree,
            funding,
            shared_funders,
            failures,
            baseline,
            started_at,
            finished_at: chrono::Utc::now().timestamp(),
        };

        let (hits, misses) = self.collector.cache().stats();
        info!(
            flagged = report.flagged.len(),
            strong = report.count(Classification::Strong),
            edges = report.edges.len(),
            anomalies = report.timing_anomalies.len(),
            second_degree = report.second_degree.len(),
            failures = report.failures.len(),
            cache_hits = hits,
            cache_misses = misses,
            "Analysis complete"
        );
        Ok(report)
    }

    /// Top holders of the first target tokens, target excluded, first-seen order.
    async fn discover_candidates(
        &self,
        target_purchases: &[PurchaseEvent],
        baseline: &BaselineStatistics,
        target_wallet: &str,
        failures: &mut Vec<FetchFailure>,
    ) -> Vec<String> {
        let per_token = self.config.scoring.candidate_holders_per_token;
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for purchase in target_purchases.iter().take(self.config.scoring.candidate_tokens) {
            let mint = purchase.token_mint.as_str();
            let holders: Vec<String> = if baseline.token_holders.contains_key(mint) {
                baseline.holders_of(mint).iter().take(per_token).cloned().collect()
            } else {
                match self.collector.source().fetch_top_holders(mint, per_token).await {
                    Ok(holders) => holders,
                    Err(e) => {
                        failures.push(fetch_failure(mint, FetchStage::HolderLookup, &e));
                        continue;
                    }
                }
            };

            for holder in holders {
                if holder != target_wallet && seen.insert(holder.clone()) {
                    candidates.push(holder);
                }
            }
        }
        candidates
    }
}

pub fn rank_flagged(flagged: &mut [FlaggedWallet]) {
    flagged.sort_by(|a, b| rank_order(&a.score, &b.score));
}
