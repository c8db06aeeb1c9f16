//! Engine Configuration (C10): typed, defaulted settings for a harvesting
//! run, built through a typestate builder that can't omit a required field.

pub mod builder;
pub mod types;

pub use builder::{EngineConfigBuilder, NeedsEntryUrls, NeedsOutputDir, Ready};
pub use types::EngineConfig;
