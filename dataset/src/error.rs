use std::path::PathBuf;

use ernerf_features::FeatureError;
use thiserror::Error;

/// Errors returned while building a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset file doesn't exist: {0:?}")]
    InputNotFound(PathBuf),

    #[error("dataset format: {0}")]
    DatasetFormat(String),

    #[error("invalid json in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audio features: {0}")]
    Features(#[from] FeatureError),
}

impl DatasetError {
    pub(crate) fn read(path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::InputNotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}
