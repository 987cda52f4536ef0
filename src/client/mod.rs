/// Blockchain data access: the capability the analysis consumes and its
/// Helius JSON-RPC implementation.

pub mod retry;
pub mod rpc;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
pub use retry::{with_retry, RetryPolicy};
pub use rpc::HeliusClient;
pub use types::{is_valid_address, RawTransaction, SignatureInfo, WalletTransaction};

/// Read-only view of chain data. Implementations own transport, retries and
/// rate limiting; callers see either data or a final error.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// Most recent signatures first.
    async fn fetch_signatures(&self, address: &str, limit: usize) -> Result<Vec<SignatureInfo>>;

    /// `None` when the node no longer has the transaction.
    async fn fetch_transaction(&self, signature: &str) -> Result<Option<RawTransaction>>;

    /// Owner addresses of the largest token accounts of a mint.
    async fn fetch_top_holders(&self, token_mint: &str, limit: usize) -> Result<Vec<String>>;
}
