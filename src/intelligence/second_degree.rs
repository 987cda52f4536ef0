/// Second-degree coordination: wallets that keep buying alongside the
/// flagged wallets rather than ahead of the target itself.

use ferret_core::{FetchFailure, FetchStage, SecondDegreeLink, SecondDegreeWallet, SECONDS_PER_HOUR};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

use crate::client::ChainDataSource;
use crate::config::SecondDegreeSettings;
use crate::error::fetch_failure;
use crate::stalker::PurchaseCollector;

pub struct SecondDegreeFinder<'a, S: ChainDataSource> {
    collector: &'a PurchaseCollector<S>,
    settings: &'a SecondDegreeSettings,
}

impl<'a, S: ChainDataSource> SecondDegreeFinder<'a, S> {
    pub fn new(collector: &'a PurchaseCollector<S>, settings: &'a SecondDegreeSettings) -> Self {
        Self { collector, settings }
    }

    /// `primaries` are the flagged wallets, highest ranked first. Holders of
    /// their tokens that bought the same token within the match window are
    /// linked to them; wallets with at least `min_matches` links are returned,
    /// most links first.
    #[instrument(skip_all, fields(primaries = primaries.len()))]
    pub async fn find(
        &self,
        target_wallet: &str,
        primaries: &[String],
        failures: &mut Vec<FetchFailure>,
    ) -> Vec<SecondDegreeWallet> {
        let window = (self.settings.match_window_hours * SECONDS_PER_HOUR) as i64;
        let known: HashSet<&str> = primaries
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(target_wallet))
            .collect();
        let mut unreachable: HashSet<String> = HashSet::new();
        let mut links: BTreeMap<String, Vec<SecondDegreeLink>> = BTreeMap::new();

        for primary in primaries.iter().take(self.settings.max_primary_wallets) {
            let history = match self.collector.collect(primary, self.settings.primary_max_purchases).await {
                Ok(history) => history,
                Err(e) => {
                    failures.push(fetch_failure(primary, FetchStage::SecondDegree, &e));
                    continue;
                }
            };

            for purchase in history.purchases.iter().take(self.settings.purchases_per_primary) {
                let holders = match self
                    .collector
                    .source()
                    .fetch_top_holders(&purchase.token_mint, self.settings.holders_per_token)
                    .await
                {
                    Ok(holders) => holders,
                    Err(e) => {
                        failures.push(fetch_failure(&purchase.token_mint, FetchStage::HolderLookup, &e));
                        continue;
                    }
                };

                for holder in holders {
                    if known.contains(holder.as_str()) || unreachable.contains(&holder) {
                        continue;
                    }
                    let holder_history = match self.collector.collect(&holder, self.settings.holder_max_purchases).await {
                        Ok(h) => h,
                        Err(e) => {
                            failures.push(fetch_failure(&holder, FetchStage::SecondDegree, &e));
                            unreachable.insert(holder);
                            continue;
                        }
                    };

                    if let Some(buy) = holder_history.purchase_of(&purchase.token_mint) {
                        let diff = (buy.timestamp - purchase.timestamp).abs();
                        if diff <= window {
                            links.entry(holder).or_default().push(SecondDegreeLink {
                                primary_wallet: primary.clone(),
                                token_mint: purchase.token_mint.clone(),
                                time_diff_hours: diff as f64 / SECONDS_PER_HOUR,
                            });
                        }
                    }
                }
            }
            debug!(primary = %primary, linked = links.len(), "Co-buyers scanned");
        }

        let mut wallets: Vec<SecondDegreeWallet> = links
            .into_iter()
            .filter(|(_, l)| l.len() >= self.settings.min_matches)
            .map(|(wallet, links)| SecondDegreeWallet { wallet, links })
            .collect();
        wallets.sort_by(|a, b| b.match_count().cmp(&a.match_count()).then_with(|| a.wallet.cmp(&b.wallet)));

        info!(wallets = wallets.len(), "Second-degree coordination scan complete");
        wallets
    }
}
