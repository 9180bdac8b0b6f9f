use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by checkpoint and parameter operations.
#[derive(Debug, Error)]
pub enum NerfError {
    #[error("checkpoint {path:?} not found")]
    CheckpointNotFound { path: PathBuf },

    #[error("failed to load checkpoint {path:?}: {reason}")]
    CheckpointLoad { path: PathBuf, reason: String },

    #[error("failed to save checkpoint {path:?}: {reason}")]
    CheckpointSave { path: PathBuf, reason: String },

    #[error("shape mismatch for {name}: model has {expected:?}, checkpoint has {found:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("tensor has {len} values, shape {shape:?} needs {expected}")]
    TensorSize {
        shape: Vec<usize>,
        len: usize,
        expected: usize,
    },

    #[error("unknown device {0:?} (expected auto, cpu, cuda or cuda:N)")]
    UnknownDevice(String),

    #[error("device {0} requested but no accelerator is available")]
    DeviceUnavailable(String),
}

impl NerfError {
    /// True for every failure to read a checkpoint file.
    pub fn is_checkpoint_load(&self) -> bool {
        matches!(
            self,
            Self::CheckpointNotFound { .. } | Self::CheckpointLoad { .. } | Self::ShapeMismatch { .. }
        )
    }
}
