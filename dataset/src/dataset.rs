use std::path::{Path, PathBuf};

use ernerf_nerf::Device;
use serde::{Deserialize, Serialize};

use crate::audio::AudioFeatures;
use crate::error::DatasetError;
use crate::eye;
use crate::loader::DataLoader;
use crate::transforms::{nerf_matrix_to_ngp, slice_range, smooth_camera_path, Pose, TransformsFile};

/// `num_rays` value requesting every pixel of the frame.
pub const FULL_FRAME: i64 = -1;

/// Which `transforms_<layout>.json` to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Train,
    Val,
    Test,
}

impl Layout {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Train => "transforms_train.json",
            Self::Val => "transforms_val.json",
            Self::Test => "transforms_test.json",
        }
    }
}

/// Dataset-related settings.
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    /// Subject data directory holding transforms and `au.csv`.
    pub path: PathBuf,
    /// Python-style `[start, end)` slice over the frames.
    pub data_range: [i64; 2],
    pub scale: f32,
    pub offset: [f32; 3],
    pub asr_model: String,
    /// Audio attention mode, see [`crate::att_window`].
    pub att: u8,
    pub exp_eye: bool,
    /// Constant eye area when non-negative.
    pub fix_eye: f32,
    pub smooth_eye: bool,
    pub smooth_path: bool,
    pub smooth_path_window: usize,
    pub num_rays: i64,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/obama"),
            data_range: [0, -1],
            scale: 4.0,
            offset: [0.0; 3],
            asr_model: "deepspeech".into(),
            att: 2,
            exp_eye: true,
            fix_eye: -1.0,
            smooth_eye: false,
            smooth_path: false,
            smooth_path_window: 7,
            num_rays: 65536,
        }
    }
}

/// Default per-frame feature file of a subject, by speech model.
pub fn default_feature_file(asr_model: &str) -> &'static str {
    if asr_model.contains("esperanto") {
        "aud_eo.npy"
    } else if asr_model.contains("hubert") {
        "aud_hu.npy"
    } else {
        "aud.npy"
    }
}

/// Poses, audio features and eye areas of one subject.
#[derive(Debug, Clone)]
pub struct NerfDataset {
    pub layout: Layout,
    pub device: Device,
    /// False for test-time rendering: sequential batches, full frames.
    pub training: bool,
    /// Rays per batch; [`FULL_FRAME`] renders whole images.
    pub num_rays: i64,
    pub att: u8,
    pub poses: Vec<Pose>,
    pub auds: AudioFeatures,
    pub eye_areas: Option<Vec<f32>>,
    /// `[fx, fy, cx, cy]`.
    pub intrinsics: [f32; 4],
    pub height: usize,
    pub width: usize,
}

impl NerfDataset {
    /// Loads a dataset. `aud_path` overrides the subject's own audio features.
    pub fn new(
        opts: &DatasetOptions,
        aud_path: Option<&Path>,
        layout: Layout,
        device: Device,
    ) -> Result<Self, DatasetError> {
        let transforms = TransformsFile::load(&opts.path.join(layout.file_name()))?;
        let range = slice_range(transforms.frames.len(), opts.data_range);
        let frames = &transforms.frames[range.clone()];
        if frames.is_empty() {
            return Err(DatasetError::DatasetFormat(format!(
                "no frames in data range {:?} ({} frames total)",
                opts.data_range,
                transforms.frames.len()
            )));
        }

        let mut poses: Vec<Pose> = frames
            .iter()
            .map(|f| nerf_matrix_to_ngp(&f.transform_matrix, opts.scale, opts.offset))
            .collect();
        if opts.smooth_path {
            poses = smooth_camera_path(&poses, opts.smooth_path_window);
        }

        let auds = match aud_path {
            Some(path) => AudioFeatures::load(path, &opts.asr_model)?,
            None => {
                let path = opts.path.join(default_feature_file(&opts.asr_model));
                let all = AudioFeatures::load(&path, &opts.asr_model)?;
                let ids: Vec<usize> = frames
                    .iter()
                    .enumerate()
                    .map(|(i, f)| f.aud_id.unwrap_or(range.start + i))
                    .collect();
                select_frames(&all, &ids)?
            }
        };

        let eye_areas = if opts.exp_eye {
            Some(eye_areas(opts, frames.iter().map(|f| f.img_id))?)
        } else {
            None
        };

        let (height, width) = transforms.image_size();
        tracing::info!(
            layout = ?layout,
            frames = poses.len(),
            aud_frames = auds.frames(),
            height,
            width,
            "loaded dataset"
        );
        Ok(Self {
            layout,
            device,
            training: layout == Layout::Train,
            num_rays: opts.num_rays,
            att: opts.att,
            poses,
            auds,
            eye_areas,
            intrinsics: transforms.intrinsics(),
            height,
            width,
        })
    }

    /// Number of batches: one per pose while training, one per audio frame otherwise.
    pub fn len(&self) -> usize {
        if self.training {
            self.poses.len()
        } else {
            self.auds.frames()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pose index for batch `index`, replaying the pose sequence forwards
    /// then backwards when the audio outlasts it.
    pub fn mirror_index(&self, index: usize) -> usize {
        mirror_index(index, self.poses.len())
    }

    pub fn dataloader(&self) -> DataLoader {
        DataLoader::new(self)
    }
}

/// Ping-pong index into a sequence of `size` elements.
pub fn mirror_index(index: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    let turn = index / size;
    let res = index % size;
    if turn % 2 == 0 { res } else { size - res - 1 }
}

fn select_frames(all: &AudioFeatures, ids: &[usize]) -> Result<AudioFeatures, DatasetError> {
    let last = all.frames() - 1;
    let shape = all.shape();
    let mut data = Vec::with_capacity(ids.len() * shape[1] * shape[2]);
    for &id in ids {
        if let Some(frame) = all.array().frame(id.min(last)) {
            data.extend_from_slice(frame);
        }
    }
    let array = ernerf_features::FeatureArray::new(vec![ids.len(), shape[1], shape[2]], data)?;
    // Already in [N, D, W] layout.
    Ok(AudioFeatures::from_layout(array))
}

fn eye_areas(
    opts: &DatasetOptions,
    img_ids: impl Iterator<Item = usize>,
) -> Result<Vec<f32>, DatasetError> {
    let img_ids: Vec<usize> = img_ids.collect();
    if opts.fix_eye >= 0.0 {
        return Ok(vec![opts.fix_eye; img_ids.len()]);
    }

    let blink = eye::read_blink_column(&opts.path.join("au.csv"))?;
    let areas = img_ids
        .iter()
        .map(|&id| {
            blink.get(id).map(|&b| eye::eye_area(b)).ok_or_else(|| {
                DatasetError::DatasetFormat(format!(
                    "au.csv has {} rows, image {id} requested",
                    blink.len()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(if opts.smooth_eye { eye::smooth_eye(&areas) } else { areas })
}
