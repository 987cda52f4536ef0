/// Progress file for long candidate scans.
///
/// Written every few candidates and on Ctrl+C so an interrupted run can be
/// resumed without rescoring wallets it already processed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::pipeline::FlaggedWallet;
use crate::error::Result;

pub type CheckpointHandle = Arc<Mutex<Checkpoint>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub target_wallet: String,
    pub processed: BTreeSet<String>,
    pub flagged: Vec<FlaggedWallet>,
    /// Candidates whose history could not be fetched; retried on resume.
    #[serde(default)]
    pub failed: BTreeSet<String>,
    pub updated_at: i64,
}

impl Checkpoint {
    pub fn new(target_wallet: impl Into<String>) -> Self {
        Self {
            target_wallet: target_wallet.into(),
            ..Self::default()
        }
    }

    pub fn into_handle(self) -> CheckpointHandle {
        Arc::new(Mutex::new(self))
    }

    /// `Ok(None)` when no progress file exists.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            processed = checkpoint.processed.len(),
            flagged = checkpoint.flagged.len(),
            "Loaded checkpoint"
        );
        Ok(Some(checkpoint))
    }

    /// Previous progress for `target_wallet`, or a fresh checkpoint when the
    /// file is missing, unreadable, or belongs to another target.
    pub fn resume_or_new(path: &Path, target_wallet: &str) -> Self {
        match Self::load(path) {
            Ok(Some(cp)) if cp.target_wallet == target_wallet => cp,
            Ok(Some(cp)) => {
                warn!(found = %cp.target_wallet, wanted = %target_wallet, "Checkpoint is for another target, starting fresh");
                Self::new(target_wallet)
            }
            Ok(None) => Self::new(target_wallet),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable checkpoint, starting fresh");
                Self::new(target_wallet)
            }
        }
    }

    /// Writes through a temporary file so a crash never leaves a torn checkpoint.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.updated_at = chrono::Utc::now().timestamp();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), processed = self.processed.len(), "Checkpoint saved");
        Ok(())
    }

    pub fn is_processed(&self, wallet: &str) -> bool {
        self.processed.contains(wallet)
    }

    pub fn record(&mut self, wallet: &str, flagged: Option<FlaggedWallet>) {
        self.failed.remove(wallet);
        self.processed.insert(wallet.to_string());
        if let Some(f) = flagged {
            self.flagged.retain(|existing| existing.score.wallet != f.score.wallet);
            self.flagged.push(f);
        }
    }

    /// Notes a candidate that could not be scored without marking it processed.
    pub fn record_failure(&mut self, wallet: &str) {
        self.failed.insert(wallet.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferret_core::{Classification, CoordinationScore};
    use tempfile::tempdir;

    fn flagged(wallet: &str, score: f64) -> FlaggedWallet {
        FlaggedWallet {
            classification: Classification::Strong,
            score: CoordinationScore {
                wallet: wallet.into(),
                overlap_score: 100.0,
                lead_time_consistency_score: 100.0,
                unlikelihood_score: 0.0,
                final_score: score,
                shared_purchases: vec![],
                overlap_percentage: 50.0,
                exceeds_baseline: true,
                avg_lead_time_hours: 2.0,
                lead_time_std_dev: 0.5,
            },
        }
    }

    #[test]
    fn test_save_and_resume() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut cp = Checkpoint::new("Target");
        cp.record("A", Some(flagged("A", 75.0)));
        cp.record("B", None);
        cp.save(&path).unwrap();

        let resumed = Checkpoint::resume_or_new(&path, "Target");
        assert!(resumed.is_processed("A"));
        assert!(resumed.is_processed("B"));
        assert!(!resumed.is_processed("C"));
        assert_eq!(resumed.flagged.len(), 1);
        assert!(resumed.updated_at > 0);
    }

    #[test]
    fn test_other_target_or_missing_file_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        assert_eq!(Checkpoint::resume_or_new(&path, "T"), Checkpoint::new("T"));

        let mut cp = Checkpoint::new("Other");
        cp.record("A", None);
        cp.save(&path).unwrap();
        assert!(!Checkpoint::resume_or_new(&path, "T").is_processed("A"));
    }

    #[test]
    fn test_failed_candidate_is_retried_after_resume() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut cp = Checkpoint::new("T");
        cp.record_failure("Down");
        cp.record("A", None);
        cp.save(&path).unwrap();

        let mut resumed = Checkpoint::resume_or_new(&path, "T");
        assert!(!resumed.is_processed("Down"));
        assert!(resumed.failed.contains("Down"));

        resumed.record("Down", None);
        assert!(resumed.is_processed("Down"));
        assert!(resumed.failed.is_empty());
    }

    #[test]
    fn test_record_replaces_previous_score() {
        let mut cp = Checkpoint::new("T");
        cp.record("A", Some(flagged("A", 50.0)));
        cp.record("A", Some(flagged("A", 80.0)));
        assert_eq!(cp.flagged.len(), 1);
        assert_eq!(cp.flagged[0].score.final_score, 80.0);
    }
}
