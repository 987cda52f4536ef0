pub mod error;
pub mod types;

pub use error::DataError;
pub use types::*;
