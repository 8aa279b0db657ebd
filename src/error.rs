//! Error types shared by the launcher core.

use thiserror::Error;

/// Errors that escape the core.
///
/// Per-module and per-query failures never show up here: the orchestrator
/// absorbs them. What remains is setup I/O and structural violations that the
/// shell is expected to terminate on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("History error: {0}")]
    Json(#[from] serde_json::Error),

    /// The rendering surface was driven into an inconsistent state.
    #[error("Surface invariant violated: {0}")]
    Surface(String),
}

pub type Result<T> = std::result::Result<T, Error>;
