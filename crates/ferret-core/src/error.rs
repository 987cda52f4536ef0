use thiserror::Error;

/// Reasons a transaction or balance entry is unusable for purchase extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("transaction has no meta section")]
    MissingMeta,

    #[error("transaction has no block time")]
    MissingBlockTime,

    #[error("required field missing: {0}")]
    MissingField(&'static str),

    #[error("transaction failed on chain")]
    FailedTransaction,
}
