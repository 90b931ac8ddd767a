//! Error types used by the crate.

use thiserror::Error;

/// Parkview error type.
#[derive(Debug, Error)]
pub enum ParkviewError {
    /// Network request failed before a response was received.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Error decoding JSON data (dataset or style definition).
    #[error("failed to decode data: {0}")]
    Decoding(#[from] serde_json::Error),
    /// Dataset does not have the expected structure.
    #[error("invalid dataset: {0}")]
    Dataset(String),
    /// Style definition does not have the expected structure.
    #[error("invalid style definition: {0}")]
    InvalidStyle(String),
    /// Value cannot be parsed as URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Error reading data from the FS.
    #[error("failed to read file: {0}")]
    FsIo(#[from] std::io::Error),
}
