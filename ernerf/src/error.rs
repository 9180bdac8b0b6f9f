use std::path::PathBuf;
use std::process::ExitStatus;

use ernerf_dataset::DatasetError;
use ernerf_features::FeatureError;
use ernerf_nerf::NerfError;
use thiserror::Error;

/// Errors returned by the inference pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no audio given and demo mode is off")]
    AudioRequired,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Features(#[from] FeatureError),

    #[error(transparent)]
    Nerf(#[from] NerfError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Errors returned by renderers.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer command is empty")]
    NoCommand,

    #[error("failed to start renderer {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer exited with {status}")]
    Failed { status: ExitStatus },

    #[error("renderer finished without writing {0:?}")]
    MissingOutput(PathBuf),

    #[error("failed to stage render inputs in {path:?}: {reason}")]
    Stage { path: PathBuf, reason: String },

    #[error("render: {0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
