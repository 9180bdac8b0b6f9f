use std::path::PathBuf;

use ernerf_audio::AudioError;
use thiserror::Error;

/// Errors returned by feature extraction.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("input file/directory doesn't exist: {0:?}")]
    InputNotFound(PathBuf),

    #[error("acoustic model unavailable at {candidate:?}: {reason}")]
    ModelUnavailable { candidate: PathBuf, reason: String },

    #[error("acoustic model: {0}")]
    Model(String),

    #[error("audio too short: need at least {min_samples} samples, got {got_samples}")]
    AudioTooShort { min_samples: usize, got_samples: usize },

    #[error("feature array format: {0}")]
    Format(String),

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl FeatureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
