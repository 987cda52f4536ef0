use ferret_core::WalletCandidate;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::PurchaseCache;
use crate::client::{ChainDataSource, WalletTransaction};
use crate::error::Result;
use crate::ingest::PurchaseExtractor;

/// Upper bound accepted by `getSignaturesForAddress`.
const MAX_SIGNATURES: usize = 1000;

/// Fetches and extracts wallet purchase histories through a shared cache.
pub struct PurchaseCollector<S: ChainDataSource> {
    source: Arc<S>,
    extractor: PurchaseExtractor,
    cache: PurchaseCache,
    signature_factor: usize,
}

impl<S: ChainDataSource> PurchaseCollector<S> {
    pub fn new(source: Arc<S>, extractor: PurchaseExtractor, signature_factor: usize) -> Self {
        Self {
            source,
            extractor,
            cache: PurchaseCache::new(),
            signature_factor: signature_factor.max(1),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn cache(&self) -> &PurchaseCache {
        &self.cache
    }

    /// Newest-first purchases of `wallet`, at most `max_purchases`.
    ///
    /// Only the signature listing is fatal. Individual transactions that fail
    /// to load are logged and skipped.
    pub async fn collect(&self, wallet: &str, max_purchases: usize) -> Result<WalletCandidate> {
        if let Some(cached) = self.cache.get(wallet, max_purchases) {
            return Ok(cached);
        }

        let limit = max_purchases
            .saturating_mul(self.signature_factor)
            .clamp(1, MAX_SIGNATURES);
        let signatures = self.source.fetch_signatures(wallet, limit).await?;

        let mut transactions = Vec::with_capacity(signatures.len());
        let mut unavailable = 0usize;
        for info in signatures {
            // Failed transactions cannot carry a purchase.
            if info.err.as_ref().map(|e| !e.is_null()).unwrap_or(false) {
                continue;
            }
            match self.source.fetch_transaction(&info.signature).await {
                Ok(Some(tx)) => transactions.push(WalletTransaction {
                    signature: info.signature,
                    listed_block_time: info.block_time,
                    tx,
                }),
                Ok(None) => unavailable += 1,
                Err(e) => {
                    unavailable += 1;
                    warn!(wallet = %wallet, signature = %info.signature, error = %e, "Skipping transaction");
                }
            }
        }

        let extraction = self.extractor.extract(wallet, &transactions, max_purchases);
        debug!(
            wallet = %wallet,
            transactions = transactions.len(),
            unavailable,
            purchases = extraction.purchases.len(),
            skipped = extraction.skipped.total(),
            "Collected purchase history"
        );

        let candidate = WalletCandidate::new(wallet, extraction.purchases);
        self.cache.insert(candidate.clone(), max_purchases);
        Ok(candidate)
    }
}
