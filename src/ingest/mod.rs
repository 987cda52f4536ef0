pub mod extractor;

pub use extractor::{Extraction, PurchaseExtractor, SkipCounts, UsdEstimator};
