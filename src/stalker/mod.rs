/// Wallet history collection: fetch signatures and transactions for a wallet,
/// extract its purchases, and memoize the result for the rest of the run.

pub mod cache;
pub mod collector;

pub use cache::PurchaseCache;
pub use collector::PurchaseCollector;
