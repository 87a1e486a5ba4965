// content-index/src/error.rs

use std::{
    io,
    path::PathBuf
};
use thiserror::Error;


#[derive(Debug, Error)]
pub enum IndexError {
    /// One file could not be read for hashing. Never fatal for a rebuild.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A root or subdirectory could not be walked. Aborts the rebuild.
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to load index state from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("index state at {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to save index state to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode index state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to start hashing pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl IndexError {
    /// True for errors that only affect a single file.
    pub fn is_per_file(&self) -> bool {
        matches!(self, IndexError::Read { .. })
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
