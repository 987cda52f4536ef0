/// Coordination analysis over collected purchase histories.
///
/// - `baseline`: holder timing distributions and overlap threshold
/// - `scorer`: per-candidate coordination score
/// - `network`: correlation graph across flagged wallets
/// - `timing`: pre-buy clustering around target purchases
/// - `volume`: position sizing of flagged wallets relative to the target
/// - `second_degree`: wallets that buy alongside the flagged wallets
/// - `funding`: first SOL funder of flagged wallets

pub mod baseline;
pub mod funding;
pub mod network;
pub mod scorer;
pub mod second_degree;
pub mod timing;
pub mod volume;

pub use baseline::{BaselineBuilder, BaselineStatistics, BuyerObservation};
pub use funding::{group_by_funder, FundingCache, FundingTracer};
pub use network::{CoordinationGraph, NetworkCorrelator};
pub use scorer::{rank, rank_order, sample_std_dev, CoordinationScorer};
pub use second_degree::SecondDegreeFinder;
pub use timing::TimingAnomalyDetector;
pub use volume::VolumeAnalyzer;
