pub mod checkpoint;
pub mod pipeline;

pub use checkpoint::{Checkpoint, CheckpointHandle};
pub use pipeline::{AnalysisReport, CoordinationPipeline, FlaggedWallet};
