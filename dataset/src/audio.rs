//! Audio feature tensors and per-frame attention windows.

use std::path::Path;

use ernerf_features::FeatureArray;

use crate::error::DatasetError;

/// Audio frames gathered per video frame when attention smoothing is on.
pub const ATT_WINDOW: usize = 8;

/// Feature width produced by the named speech model.
///
/// Names are matched by substring, so hub identifiers such as
/// `facebook/hubert-large-ls960-ft` resolve too.
pub fn feature_dim(asr_model: &str) -> Option<usize> {
    if asr_model.contains("esperanto") {
        Some(44)
    } else if asr_model.contains("deepspeech") {
        Some(29)
    } else if asr_model.contains("hubert") {
        Some(1024)
    } else if asr_model.contains("wav2vec") {
        Some(32)
    } else {
        None
    }
}

/// Audio features laid out as `[frames, dim, window]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFeatures {
    array: FeatureArray,
}

impl AudioFeatures {
    /// Loads a feature file and checks it against the expected width.
    ///
    /// `[N, window, D]` arrays are transposed to `[N, D, window]`; `[N, D]`
    /// arrays become `[N, D, 1]`.
    pub fn load(path: &Path, asr_model: &str) -> Result<Self, DatasetError> {
        let array = FeatureArray::read_npy(path)?;
        let features = Self::from_array(array, asr_model)?;
        tracing::info!(
            path = %path.display(),
            shape = ?features.shape(),
            "loaded audio features"
        );
        Ok(features)
    }

    pub fn from_array(array: FeatureArray, asr_model: &str) -> Result<Self, DatasetError> {
        let dim = feature_dim(asr_model).ok_or_else(|| {
            DatasetError::DatasetFormat(format!("unknown asr model {asr_model:?}"))
        })?;
        let shape = array.shape().to_vec();
        let array = match shape.as_slice() {
            [_, _, d] if *d == dim => array.swap_last_axes()?,
            [n, d] if *d == dim => array.reshape(vec![*n, *d, 1])?,
            _ => {
                return Err(DatasetError::DatasetFormat(format!(
                    "audio features shape {shape:?} not supported for {asr_model} (dim {dim})"
                )));
            }
        };
        if array.frames() == 0 {
            return Err(DatasetError::DatasetFormat("audio features are empty".into()));
        }
        Ok(Self { array })
    }

    pub(crate) fn from_layout(array: FeatureArray) -> Self {
        Self { array }
    }

    pub fn frames(&self) -> usize {
        self.array.frames()
    }

    /// `[frames, dim, window]`.
    pub fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    pub fn array(&self) -> &FeatureArray {
        &self.array
    }

    /// Gathers the frames of `window`; `None` entries are zero frames.
    pub fn gather(&self, window: &[Option<usize>]) -> Vec<f32> {
        let frame_len = self.shape()[1] * self.shape()[2];
        let mut out = Vec::with_capacity(window.len() * frame_len);
        for idx in window {
            match idx.and_then(|i| self.array.frame(i)) {
                Some(frame) => out.extend_from_slice(frame),
                None => out.extend(std::iter::repeat_n(0.0, frame_len)),
            }
        }
        out
    }
}

/// Audio frame indices fed to the renderer for video frame `index`.
///
/// - `0`: the frame itself
/// - `1`: the [`ATT_WINDOW`] frames before it
/// - `2`: [`ATT_WINDOW`] frames centred on it
///
/// Out-of-range positions are `None` (zero padding).
pub fn att_window(att: u8, index: usize, frames: usize) -> Vec<Option<usize>> {
    let (start, len) = match att {
        0 => (index as i64, 1),
        1 => (index as i64 - ATT_WINDOW as i64, ATT_WINDOW),
        _ => (index as i64 - (ATT_WINDOW / 2) as i64, ATT_WINDOW),
    };
    (start..start + len as i64)
        .map(|i| usize::try_from(i).ok().filter(|&i| i < frames))
        .collect()
}
