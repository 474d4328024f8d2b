//! Pipeline errors
//!
//! Font and colour resolution problems never show up here: they are
//! recovered where they happen and reported as observer events instead.

use std::path::PathBuf;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cancelled after {completed} of {requested} variations")]
    Cancelled { completed: usize, requested: usize },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Short stage label used in failure records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Decode { .. } => "decode",
            Self::Encode { .. } | Self::Write { .. } => "write",
            Self::Cancelled { .. } => "cancelled",
            Self::Generation(_) => "generation",
            Self::Serialization(_) => "serialization",
        }
    }
}
