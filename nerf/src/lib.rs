//! Renderer parameters and checkpoints.
//!
//! The volumetric renderer is opaque to this workspace; what matters here is
//! its parameter set. [`ParameterStore`] holds named f32 tensors with a
//! trainability flag, [`Checkpoint`] reads and writes them as safetensors,
//! [`CheckpointChoice`] finds the primary checkpoint in a workspace and
//! [`CheckpointMerger`] grafts a head checkpoint onto a torso model.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use ernerf_nerf::{CheckpointChoice, CheckpointMerger, MergeOutcome, ParameterStore};
//!
//! let mut store = ParameterStore::new();
//! CheckpointChoice::Latest.load_into(Path::new("trial_obama_torso"), &mut store).unwrap();
//! if let MergeOutcome::Merged(report) =
//!     CheckpointMerger::new(true, "head.safetensors").merge(&mut store).unwrap()
//! {
//!     report.warn();
//! }
//! ```

mod checkpoint;
mod device;
mod error;
mod merge;
mod params;
mod select;
mod tensor;

pub use checkpoint::Checkpoint;
pub use device::{AcceleratorProbe, Device, DeviceRequest, SystemProbe};
pub use error::NerfError;
pub use merge::{merge_mapping, CheckpointMerger, FrozenParam, MergeOutcome, MergeReport};
pub use params::{LoadReport, Parameter, ParameterStore};
pub use select::{epoch_checkpoints, CheckpointChoice, CHECKPOINT_DIR, CHECKPOINT_EXT};
pub use tensor::{ParameterMapping, Tensor};
