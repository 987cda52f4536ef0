pub mod display;
pub mod export;

pub use export::ReportWriter;
