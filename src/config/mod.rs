/// Analysis configuration: TOML file, environment, then CLI overrides

pub mod settings;

pub use settings::*;
