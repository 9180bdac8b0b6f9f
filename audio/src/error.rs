use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the audio front-end.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio: cannot decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("audio: unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio: resample {from} Hz -> {to} Hz failed: {reason}")]
    Resample { from: u32, to: u32, reason: String },

    #[error("audio: write {path:?} failed: {reason}")]
    Write { path: PathBuf, reason: String },
}
