use crate::audio::att_window;
use crate::dataset::{mirror_index, NerfDataset};
use crate::transforms::Pose;

/// Frames per batch.
pub const BATCH_SIZE: usize = 1;

/// One rendered frame's inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Position in the output video; also the audio frame index.
    pub index: usize,
    /// Pose (and eye area) index after mirroring.
    pub pose_index: usize,
    pub pose: Pose,
    /// Audio feature frames for this video frame, `None` for zero padding.
    pub aud_window: Vec<Option<usize>>,
    pub eye: Option<f32>,
    pub num_rays: i64,
}

/// Sequential batches over a dataset.
///
/// Batches are produced in index order; shuffling is never applied.
#[derive(Debug, Clone)]
pub struct DataLoader {
    poses: Vec<Pose>,
    eye_areas: Option<Vec<f32>>,
    aud_frames: usize,
    att: u8,
    num_rays: i64,
    len: usize,
}

impl DataLoader {
    pub(crate) fn new(dataset: &NerfDataset) -> Self {
        Self {
            poses: dataset.poses.clone(),
            eye_areas: dataset.eye_areas.clone(),
            aud_frames: dataset.auds.frames(),
            att: dataset.att,
            num_rays: dataset.num_rays,
            len: dataset.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn batch_size(&self) -> usize {
        BATCH_SIZE
    }

    /// Builds batch `index`, or `None` past the end.
    pub fn batch(&self, index: usize) -> Option<Batch> {
        if index >= self.len {
            return None;
        }
        let pose_index = mirror_index(index, self.poses.len());
        Some(Batch {
            index,
            pose_index,
            pose: self.poses[pose_index],
            aud_window: att_window(self.att, index, self.aud_frames),
            eye: self
                .eye_areas
                .as_ref()
                .and_then(|e| e.get(pose_index).copied()),
            num_rays: self.num_rays,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Batch> + '_ {
        (0..self.len).filter_map(|i| self.batch(i))
    }
}
