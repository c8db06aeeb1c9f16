//! Error taxonomy for the harvesting engine.
//!
//! Processor- and tab-level failures are recovered locally (reflected only in
//! URL status and metric counters) and never surface through this type —
//! `EngineError` is reserved for failures the caller actually needs to see:
//! engine startup, and the two forms of per-URL navigation/timeout failure
//! that the scheduler logs before converting them into a status transition.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch browser: {0}")]
    Startup(#[from] anyhow::Error),

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("tab for {url} exceeded page_timeout")]
    TabTimeout { url: String },

    #[error("browser operation failed: {0}")]
    Browser(anyhow::Error),

    #[error("invalid engine configuration: {0}")]
    Config(String),
}
