// Error types for blocks-for-github.
// Covers configuration, cache storage and client construction failures.

use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::DescriptorError;
use crate::github::TransportError;

#[derive(Error, Debug)]
pub enum BlocksError {
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("GitHub returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid resource: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    #[error("Failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No cache directory available on this platform")]
    NoCacheDir,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BlocksError>;
