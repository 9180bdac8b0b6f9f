//! Subject datasets for audio-driven talking-head rendering.
//!
//! A subject directory contains `transforms_<layout>.json` (camera
//! intrinsics and one pose per video frame), `au.csv` (facial action units
//! from which eye openness is derived) and per-frame audio features.
//!
//! [`InferenceDatasetBuilder`] reuses the training layout at test time: the
//! recorded head poses are replayed back and forth while a new audio
//! feature file drives one output frame per feature frame.

mod audio;
mod builder;
mod dataset;
mod error;
mod eye;
mod loader;
mod transforms;

pub use audio::{att_window, feature_dim, AudioFeatures, ATT_WINDOW};
pub use builder::{DatasetHandle, InferenceDatasetBuilder, RenderInputs};
pub use dataset::{
    default_feature_file, mirror_index, DatasetOptions, Layout, NerfDataset, FULL_FRAME,
};
pub use error::DatasetError;
pub use eye::{eye_area, parse_blink_column, read_blink_column, smooth_eye, BLINK_COLUMN};
pub use loader::{Batch, DataLoader, BATCH_SIZE};
pub use transforms::{
    nerf_matrix_to_ngp, slice_range, smooth_camera_path, FrameEntry, Pose, TransformsFile,
};
