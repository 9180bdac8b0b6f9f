//! The renderer seam and an adapter for out-of-process renderers.

use std::path::{Path, PathBuf};
use std::process::Command;

use ernerf_dataset::{DatasetHandle, Pose};
use ernerf_features::FeatureArray;
use ernerf_nerf::{Checkpoint, ParameterStore};
use serde::Serialize;

use crate::error::RenderError;
use crate::options::RendererOptions;

/// How a test run writes its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// A single video file.
    Inference,
    /// A video plus a directory with one image per frame.
    Frames,
}

/// A volumetric renderer conditioned on audio features.
pub trait Renderer: Send {
    fn parameters(&self) -> &ParameterStore;

    fn parameters_mut(&mut self) -> &mut ParameterStore;

    /// Renders every batch of `handle` into `save_dir/name`.
    ///
    /// In [`RenderMode::Frames`] the images go to `save_dir/<name stem>/`.
    fn test_run(
        &mut self,
        handle: &DatasetHandle,
        render: &RendererOptions,
        save_dir: &Path,
        name: &str,
        mode: RenderMode,
    ) -> Result<(), RenderError>;
}

/// Per-frame entry of a [`RenderManifest`].
#[derive(Debug, Clone, Serialize)]
pub struct ManifestFrame {
    pub index: usize,
    pub pose_index: usize,
    pub pose: Pose,
    pub aud_window: Vec<Option<usize>>,
    pub eye: Option<f32>,
}

/// Everything an external renderer process needs, written as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RenderManifest {
    pub checkpoint: PathBuf,
    /// `[frames, dim, window]` f32 NPY.
    pub aud_features: PathBuf,
    pub eye_areas: Option<PathBuf>,
    pub output: PathBuf,
    /// Set in [`RenderMode::Frames`].
    pub images: Option<PathBuf>,
    pub mode: RenderMode,
    pub render: RendererOptions,
    pub height: usize,
    pub width: usize,
    pub intrinsics: [f32; 4],
    pub full_frame: bool,
    pub num_rays: i64,
    pub device: String,
    pub frozen: Vec<String>,
    pub frames: Vec<ManifestFrame>,
}

/// Renders by running an external program.
///
/// Each run stages the current parameters, the audio features, the eye
/// areas and a `manifest.json` in a temporary directory inside the save
/// directory, then runs `command... <manifest>`. The program must write the
/// video at `manifest.output`, next to the manifest, and exit successfully.
/// Only then is the video moved to its final name; a failed run leaves
/// nothing behind.
pub struct ProcessRenderer {
    params: ParameterStore,
    command: Vec<String>,
}

impl ProcessRenderer {
    pub fn new(params: ParameterStore, command: Vec<String>) -> Result<Self, RenderError> {
        if command.first().is_none_or(|p| p.is_empty()) {
            return Err(RenderError::NoCommand);
        }
        Ok(Self { params, command })
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    fn stage(
        &self,
        handle: &DatasetHandle,
        render: &RendererOptions,
        dir: &Path,
        staged: &Staged,
        mode: RenderMode,
    ) -> Result<PathBuf, RenderError> {
        let stage_err = |reason: String| RenderError::Stage {
            path: dir.to_path_buf(),
            reason,
        };

        let checkpoint = dir.join("model.safetensors");
        Checkpoint::new(self.params.state_dict())
            .save(&checkpoint)
            .map_err(|e| stage_err(e.to_string()))?;

        let aud_features = dir.join("aud.npy");
        handle
            .inputs
            .aud_features
            .array()
            .write_npy(&aud_features)
            .map_err(|e| stage_err(e.to_string()))?;

        let eye_areas = match &handle.inputs.eye_areas {
            Some(areas) => {
                let path = dir.join("eye.npy");
                FeatureArray::new(vec![areas.len()], areas.clone())
                    .and_then(|a| a.write_npy(&path))
                    .map_err(|e| stage_err(e.to_string()))?;
                Some(path)
            }
            None => None,
        };

        let manifest = RenderManifest {
            checkpoint,
            aud_features,
            eye_areas,
            output: staged.video.clone(),
            images: staged.images.clone(),
            mode,
            render: render.clone(),
            height: handle.height,
            width: handle.width,
            intrinsics: handle.intrinsics,
            full_frame: handle.num_rays < 0,
            num_rays: handle.num_rays,
            device: handle.device.to_string(),
            frozen: self.params.frozen().into_iter().map(String::from).collect(),
            frames: handle
                .loader
                .iter()
                .map(|b| ManifestFrame {
                    index: b.index,
                    pose_index: b.pose_index,
                    pose: b.pose,
                    aud_window: b.aud_window,
                    eye: b.eye,
                })
                .collect(),
        };
        let path = dir.join("manifest.json");
        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| stage_err(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| stage_err(e.to_string()))?;
        Ok(path)
    }
}

impl Renderer for ProcessRenderer {
    fn parameters(&self) -> &ParameterStore {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    fn test_run(
        &mut self,
        handle: &DatasetHandle,
        render: &RendererOptions,
        save_dir: &Path,
        name: &str,
        mode: RenderMode,
    ) -> Result<(), RenderError> {
        let stage_err = |reason: String| RenderError::Stage {
            path: save_dir.to_path_buf(),
            reason,
        };
        std::fs::create_dir_all(save_dir).map_err(|e| stage_err(e.to_string()))?;
        let staging = tempfile::Builder::new()
            .prefix(".render-")
            .tempdir_in(save_dir)
            .map_err(|e| stage_err(e.to_string()))?;
        let staged = Staged::new(staging.path(), name, mode);
        let manifest = self.stage(handle, render, staging.path(), &staged, mode)?;

        let (program, args) = self.command.split_first().ok_or(RenderError::NoCommand)?;
        tracing::info!(
            program,
            frames = handle.loader.len(),
            output = %save_dir.join(name).display(),
            "running renderer"
        );
        let status = Command::new(program)
            .args(args)
            .arg(&manifest)
            .status()
            .map_err(|source| RenderError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(RenderError::Failed { status });
        }
        staged.publish(save_dir, name)
    }
}

/// Output locations inside the staging directory.
struct Staged {
    video: PathBuf,
    images: Option<PathBuf>,
}

impl Staged {
    fn new(dir: &Path, name: &str, mode: RenderMode) -> Self {
        Self {
            video: dir.join(name),
            images: (mode == RenderMode::Frames).then(|| dir.join(image_dir_name(name))),
        }
    }

    /// Moves the rendered outputs into `save_dir`.
    fn publish(&self, save_dir: &Path, name: &str) -> Result<(), RenderError> {
        if !self.video.is_file() {
            return Err(RenderError::MissingOutput(save_dir.join(name)));
        }
        if let Some(images) = &self.images {
            if !images.is_dir() {
                return Err(RenderError::MissingOutput(save_dir.join(image_dir_name(name))));
            }
            move_into(images, &save_dir.join(image_dir_name(name)))?;
        }
        move_into(&self.video, &save_dir.join(name))
    }
}

fn image_dir_name(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

fn move_into(from: &Path, to: &Path) -> Result<(), RenderError> {
    std::fs::rename(from, to).map_err(|e| RenderError::Stage {
        path: to.to_path_buf(),
        reason: e.to_string(),
    })
}
