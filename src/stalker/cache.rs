/// Per-run memo of extracted purchase histories.
///
/// The same wallet is often reached several times (target, baseline holder,
/// candidate); each history is fetched once and served from memory afterwards.

use dashmap::DashMap;
use ferret_core::WalletCandidate;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct CachedHistory {
    candidate: WalletCandidate,
    /// Cap the history was fetched with. A request for more must refetch.
    fetched_max: usize,
}

#[derive(Debug, Default)]
pub struct PurchaseCache {
    entries: DashMap<String, CachedHistory>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PurchaseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// History truncated to `max_purchases`, or `None` if it was never fetched
    /// with at least that cap.
    pub fn get(&self, wallet: &str, max_purchases: usize) -> Option<WalletCandidate> {
        let found = self.entries.get(wallet).and_then(|entry| {
            // A shorter history than the cap means the wallet simply has no more.
            if entry.fetched_max >= max_purchases || entry.candidate.purchases.len() < entry.fetched_max {
                let mut candidate = entry.candidate.clone();
                candidate.purchases.truncate(max_purchases);
                Some(candidate)
            } else {
                None
            }
        });

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, candidate: WalletCandidate, fetched_max: usize) {
        let keep = match self.entries.get(&candidate.address) {
            Some(existing) => existing.fetched_max > fetched_max,
            None => false,
        };
        if !keep {
            self.entries.insert(
                candidate.address.clone(),
                CachedHistory { candidate, fetched_max },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}
