// Configuration and errors
pub mod config;
pub mod error;

// Chain data access and purchase extraction
pub mod client;
pub mod ingest;
pub mod stalker;

// Coordination analysis
pub mod intelligence;

// Pipeline orchestration
pub mod core;

// Reports and console output
pub mod util;

// Re-export commonly used types for convenience
pub use crate::core::{AnalysisReport, CoordinationPipeline, FlaggedWallet};
pub use client::{ChainDataSource, HeliusClient};
pub use config::Config;
pub use error::{FerretError, Result};
pub use ferret_core::*;
