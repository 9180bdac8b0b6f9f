//! Inference options.
//!
//! One flat record covering the subject model, the renderer geometry and
//! the I/O locations. Training-only fields are kept so that option files
//! written for training load unchanged. Options are immutable once a
//! driver is built; per-call values are passed as arguments.

use std::path::PathBuf;

use ernerf_dataset::{feature_dim, DatasetOptions};
use ernerf_features::{expand_home, ExtractorConfig, DEFAULT_CACHE_DIR, DEFAULT_MODEL_PATH};
use ernerf_nerf::{CheckpointChoice, DeviceRequest};
use serde::{Deserialize, Serialize};

use crate::renderer::RenderMode;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Training workspace holding `checkpoints/`.
    pub workspace: String,
    /// Feature file used by demo runs.
    pub aud: String,
    /// Subject data directory.
    pub path: String,

    #[serde(rename = "H")]
    pub height: u32,
    #[serde(rename = "W")]
    pub width: u32,
    #[serde(rename = "O")]
    pub orthographic: bool,

    pub amb_aud_loss: i32,
    pub amb_dim: u32,
    pub amb_eye_loss: i32,
    pub asr: bool,
    pub asr_model: String,
    pub asr_play: bool,
    pub asr_save_feats: bool,
    pub asr_wav: String,
    pub att: u8,
    pub bg_img: String,
    pub bound: f32,
    /// `scratch`, `latest`, `best` or a checkpoint path.
    pub ckpt: String,
    pub color_space: String,
    pub cuda_ray: bool,
    pub data_range: [i64; 2],
    pub density_thresh: f32,
    pub density_thresh_torso: f32,
    pub dt_gamma: f32,
    pub emb: bool,
    pub exp_eye: bool,
    pub fbg: bool,
    pub finetune_lips: bool,
    pub fix_eye: f32,
    pub fovy: f32,
    pub fp16: bool,
    pub fps: u32,
    pub gui: bool,
    /// Head checkpoint merged into a torso model.
    pub head_ckpt: String,
    pub ind_dim: u32,
    pub ind_dim_torso: u32,
    pub ind_num: u32,
    pub init_lips: bool,
    pub iters: u64,
    pub l: i32,
    pub lambda_amb: f32,
    pub lr: f32,
    pub lr_net: f32,
    pub m: i32,
    pub max_ray_batch: u32,
    pub max_spp: u32,
    pub max_steps: u32,
    pub min_near: f32,
    pub num_rays: i64,
    pub num_steps: u32,
    pub offset: [f32; 3],
    pub part: bool,
    pub part2: bool,
    pub patch_size: u32,
    pub preload: u32,
    pub r: i32,
    pub radius: f32,
    pub scale: f32,
    pub seed: u64,
    pub smooth_eye: bool,
    pub smooth_lips: bool,
    pub smooth_path: bool,
    pub smooth_path_window: usize,
    pub test: bool,
    pub test_train: bool,
    pub torso: bool,
    pub torso_shrink: f32,
    pub train_camera: bool,
    pub unc_loss: i32,
    pub update_extra_interval: u32,
    pub upsample_steps: u32,
    pub warmup_step: u64,
    /// Also write one image per frame next to the video.
    pub write_image: bool,

    /// `auto`, `cpu`, `cuda` or `cuda:N`.
    pub device: String,
    /// Allow inference without audio, rendering `aud` instead.
    pub demo_mode: bool,
    /// Output directory for videos.
    pub save_path: String,
    /// Output directory for extracted feature files.
    pub feature_dir: String,
    pub acoustic_model: String,
    pub acoustic_model_url: Option<String>,
    pub acoustic_model_sha256: Option<String>,
    pub model_cache_dir: String,
    /// External renderer program and leading arguments.
    pub renderer_command: Vec<String>,
}

/// Network geometry and ray-marching settings handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RendererOptions {
    pub fps: u32,
    #[serde(rename = "O")]
    pub orthographic: bool,
    pub bound: f32,
    pub scale: f32,
    pub offset: [f32; 3],
    pub min_near: f32,
    pub density_thresh: f32,
    pub density_thresh_torso: f32,
    pub dt_gamma: f32,
    pub max_steps: u32,
    pub num_steps: u32,
    pub upsample_steps: u32,
    pub max_ray_batch: u32,
    pub torso: bool,
    pub torso_shrink: f32,
    pub exp_eye: bool,
    pub fp16: bool,
    pub cuda_ray: bool,
    pub bg_img: Option<PathBuf>,
    pub fbg: bool,
    pub color_space: String,
    pub asr_model: String,
    pub att: u8,
    pub emb: bool,
    pub amb_dim: u32,
    pub ind_dim: u32,
    pub ind_dim_torso: u32,
    pub ind_num: u32,
    pub part: bool,
    pub part2: bool,
    pub smooth_lips: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            workspace: "trial_obama_torso/".into(),
            aud: String::new(),
            path: "data/obama/".into(),
            height: 450,
            width: 450,
            orthographic: true,
            amb_aud_loss: 1,
            amb_dim: 2,
            amb_eye_loss: 1,
            asr: false,
            asr_model: "deepspeech".into(),
            asr_play: false,
            asr_save_feats: false,
            asr_wav: String::new(),
            att: 2,
            bg_img: String::new(),
            bound: 1.0,
            ckpt: "latest".into(),
            color_space: "srgb".into(),
            cuda_ray: true,
            data_range: [0, -1],
            density_thresh: 10.0,
            density_thresh_torso: 0.01,
            dt_gamma: 0.003_906_25,
            emb: false,
            exp_eye: true,
            fbg: false,
            finetune_lips: false,
            fix_eye: -1.0,
            fovy: 21.24,
            fp16: true,
            fps: 50,
            gui: false,
            head_ckpt: String::new(),
            ind_dim: 4,
            ind_dim_torso: 8,
            ind_num: 10000,
            init_lips: false,
            iters: 200_000,
            l: 10,
            lambda_amb: 0.0001,
            lr: 0.01,
            lr_net: 0.001,
            m: 50,
            max_ray_batch: 4096,
            max_spp: 1,
            max_steps: 16,
            min_near: 0.05,
            num_rays: 65536,
            num_steps: 16,
            offset: [0.0; 3],
            part: false,
            part2: false,
            patch_size: 1,
            preload: 0,
            r: 10,
            radius: 3.35,
            scale: 4.0,
            seed: 0,
            smooth_eye: false,
            smooth_lips: false,
            smooth_path: false,
            smooth_path_window: 7,
            test: true,
            test_train: true,
            torso: true,
            torso_shrink: 0.8,
            train_camera: false,
            unc_loss: 1,
            update_extra_interval: 16,
            upsample_steps: 0,
            warmup_step: 10000,
            write_image: false,
            device: "auto".into(),
            demo_mode: false,
            save_path: "output".into(),
            feature_dir: "output".into(),
            acoustic_model: DEFAULT_MODEL_PATH.into(),
            acoustic_model_url: None,
            acoustic_model_sha256: None,
            model_cache_dir: DEFAULT_CACHE_DIR.into(),
            renderer_command: Vec::new(),
        }
    }
}

impl Options {
    /// Checks the options for internal consistency.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Config(msg));
        if self.height == 0 || self.width == 0 {
            return invalid(format!("resolution must be positive, got {}x{}", self.width, self.height));
        }
        if self.fps == 0 {
            return invalid("fps must be positive".into());
        }
        let [start, end] = self.data_range;
        if start >= 0 && end >= 0 && end <= start {
            return invalid(format!("empty data_range {:?}", self.data_range));
        }
        if feature_dim(&self.asr_model).is_none() {
            return invalid(format!("unknown asr_model {:?}", self.asr_model));
        }
        if self.att > 2 {
            return invalid(format!("att must be 0, 1 or 2, got {}", self.att));
        }
        if self.demo_mode && self.aud.is_empty() {
            return invalid("demo_mode needs a feature file in aud".into());
        }
        if self.smooth_path && self.smooth_path_window == 0 {
            return invalid("smooth_path_window must be positive".into());
        }
        self.device_request()?;
        Ok(())
    }

    pub fn device_request(&self) -> Result<DeviceRequest> {
        Ok(self.device.parse()?)
    }

    pub fn checkpoint_choice(&self) -> CheckpointChoice {
        match self.ckpt.parse() {
            Ok(choice) => choice,
            Err(never) => match never {},
        }
    }

    pub fn dataset_options(&self) -> DatasetOptions {
        DatasetOptions {
            path: expand_home(&self.path),
            data_range: self.data_range,
            scale: self.scale,
            offset: self.offset,
            asr_model: self.asr_model.clone(),
            att: self.att,
            exp_eye: self.exp_eye,
            fix_eye: self.fix_eye,
            smooth_eye: self.smooth_eye,
            smooth_path: self.smooth_path,
            smooth_path_window: self.smooth_path_window,
            num_rays: self.num_rays,
        }
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            model_path: self.acoustic_model.clone(),
            model_url: self.acoustic_model_url.clone(),
            model_sha256: self.acoustic_model_sha256.clone(),
            cache_dir: expand_home(&self.model_cache_dir),
            output_dir: expand_home(&self.feature_dir),
            fps: f64::from(self.fps),
        }
    }

    /// The part of the options an external renderer needs to rebuild the network.
    pub fn renderer_options(&self) -> RendererOptions {
        RendererOptions {
            fps: self.fps,
            orthographic: self.orthographic,
            bound: self.bound,
            scale: self.scale,
            offset: self.offset,
            min_near: self.min_near,
            density_thresh: self.density_thresh,
            density_thresh_torso: self.density_thresh_torso,
            dt_gamma: self.dt_gamma,
            max_steps: self.max_steps,
            num_steps: self.num_steps,
            upsample_steps: self.upsample_steps,
            max_ray_batch: self.max_ray_batch,
            torso: self.torso,
            torso_shrink: self.torso_shrink,
            exp_eye: self.exp_eye,
            fp16: self.fp16,
            cuda_ray: self.cuda_ray,
            bg_img: (!self.bg_img.is_empty()).then(|| expand_home(&self.bg_img)),
            fbg: self.fbg,
            color_space: self.color_space.clone(),
            asr_model: self.asr_model.clone(),
            att: self.att,
            emb: self.emb,
            amb_dim: self.amb_dim,
            ind_dim: self.ind_dim,
            ind_dim_torso: self.ind_dim_torso,
            ind_num: self.ind_num,
            part: self.part,
            part2: self.part2,
            smooth_lips: self.smooth_lips,
        }
    }

    pub fn render_mode(&self) -> RenderMode {
        if self.write_image {
            RenderMode::Frames
        } else {
            RenderMode::Inference
        }
    }

    pub fn workspace_dir(&self) -> PathBuf {
        expand_home(&self.workspace)
    }

    pub fn save_dir(&self) -> PathBuf {
        expand_home(&self.save_path)
    }

    pub fn demo_features(&self) -> PathBuf {
        expand_home(&self.aud)
    }
}
