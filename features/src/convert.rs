//! Audio file -> windowed feature array conversion.
//!
//! # Pipeline
//!
//! 1. Decode WAV, keep the first channel, resample to 16kHz
//! 2. Log mel filterbank at 50 frames/s, then CMVN
//! 3. Acoustic model: one logit row per filterbank frame
//! 4. Linear interpolation onto the video frame clock (`fps`)
//! 5. Zero-padded sliding windows of [`WINDOW_FRAMES`] rows per video frame

use std::path::Path;

use ernerf_audio::fbank::{self, Extractor};
use ernerf_audio::{read_wav, resample, Format};

use crate::array::FeatureArray;
use crate::error::FeatureError;
use crate::model::AcousticModel;

/// Acoustic frames per video frame window.
pub const WINDOW_FRAMES: usize = 16;

/// Returns the number of video frames covering `duration_secs` at `fps`.
pub fn frame_count(duration_secs: f64, fps: f64) -> usize {
    (duration_secs * fps).round().max(0.0) as usize
}

/// Resamples a feature sequence from `input_rate` to `output_rate` frames/s.
///
/// Each output row `i` sits at time `i / output_rate` and is linearly
/// interpolated between its neighbouring input rows; times outside the
/// input span take the nearest edge row.
pub fn interpolate(
    features: &[Vec<f32>],
    input_rate: f64,
    output_rate: f64,
    output_len: usize,
) -> Vec<Vec<f32>> {
    let Some(last) = features.last() else {
        return Vec::new();
    };
    let dims = last.len();
    let max_pos = (features.len() - 1) as f64;

    (0..output_len)
        .map(|i| {
            let pos = (i as f64 * input_rate / output_rate).clamp(0.0, max_pos);
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(features.len() - 1);
            let frac = (pos - lo as f64) as f32;
            (0..dims)
                .map(|d| features[lo][d] * (1.0 - frac) + features[hi][d] * frac)
                .collect()
        })
        .collect()
}

/// Stacks `[N, D]` rows into `[N, window, D]` windows centred on each row.
///
/// Window `i` covers rows `i - window/2 .. i + window/2`; rows outside the
/// sequence are zeros.
pub fn stack_windows(rows: &[Vec<f32>], window: usize) -> Result<FeatureArray, FeatureError> {
    let n = rows.len();
    let dims = rows.first().map_or(0, Vec::len);
    let half = window / 2;

    let mut data = Vec::with_capacity(n * window * dims);
    for i in 0..n {
        for w in 0..window {
            match (i + w).checked_sub(half).filter(|&r| r < n) {
                Some(r) => data.extend_from_slice(&rows[r]),
                None => data.extend(std::iter::repeat_n(0.0, dims)),
            }
        }
    }
    FeatureArray::new(vec![n, window, dims], data)
}

/// Converts audio files into feature arrays with a fixed acoustic model.
pub struct Converter<M> {
    model: M,
    fbank: Extractor,
    fps: f64,
}

impl<M: AcousticModel> Converter<M> {
    /// Creates a converter producing `fps` feature frames per second.
    pub fn new(model: M, fps: f64) -> Result<Self, FeatureError> {
        if fps.is_nan() || fps <= 0.0 {
            return Err(FeatureError::Model(format!("fps must be positive, got {fps}")));
        }
        let cfg = fbank::Config {
            num_mels: model.input_dim(),
            ..fbank::Config::acoustic()
        };
        Ok(Self {
            model,
            fbank: Extractor::new(cfg),
            fps,
        })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Converts the audio file at `path`.
    pub fn convert_file(&self, path: &Path) -> Result<FeatureArray, FeatureError> {
        let pcm = read_wav(path)?;
        let samples = resample(
            &pcm.samples,
            pcm.format.sample_rate,
            Format::MONO_16K.sample_rate,
        )?;
        self.convert_samples(&samples)
    }

    /// Converts 16kHz mono samples in [-1, 1].
    pub fn convert_samples(&self, samples: &[f32]) -> Result<FeatureArray, FeatureError> {
        let cfg = self.fbank.config();
        let mut spectral = self.fbank.extract(samples);
        if spectral.is_empty() {
            return Err(FeatureError::AudioTooShort {
                min_samples: cfg.window_size,
                got_samples: samples.len(),
            });
        }
        fbank::cmvn(&mut spectral);

        let logits = self.model.infer(&spectral)?;
        let duration = Format::MONO_16K.duration(samples.len()).as_secs_f64();
        let frames = frame_count(duration, self.fps);
        if frames == 0 {
            let rate = f64::from(Format::MONO_16K.sample_rate);
            return Err(FeatureError::AudioTooShort {
                min_samples: (0.5 * rate / self.fps).ceil() as usize,
                got_samples: samples.len(),
            });
        }
        let per_video_frame = interpolate(&logits, cfg.frame_rate(), self.fps, frames);

        tracing::debug!(
            samples = samples.len(),
            acoustic_frames = logits.len(),
            video_frames = frames,
            "converted audio to features"
        );
        stack_windows(&per_video_frame, WINDOW_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinearAcousticModel, DEEPSPEECH_DIM};

    fn test_model() -> LinearAcousticModel {
        let input = 26;
        let weight = (0..DEEPSPEECH_DIM * input)
            .map(|i| ((i % 7) as f32 - 3.0) * 0.1)
            .collect();
        LinearAcousticModel::new(weight, vec![0.0; DEEPSPEECH_DIM], input).unwrap()
    }

    fn chirp(seconds: f64) -> Vec<f32> {
        let n = (seconds * 16000.0) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / 16000.0;
                (0.4 * (2.0 * std::f64::consts::PI * (200.0 + 400.0 * t) * t).sin()) as f32
            })
            .collect()
    }

    #[test]
    fn frame_count_rounds() {
        assert_eq!(frame_count(2.0, 50.0), 100);
        assert_eq!(frame_count(1.99, 25.0), 50);
        assert_eq!(frame_count(0.0, 25.0), 0);
    }

    #[test]
    fn interpolate_matches_linear_ramp() {
        let input: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32]).collect();
        let out = interpolate(&input, 50.0, 100.0, 10);
        let values: Vec<f32> = out.iter().map(|r| r[0]).collect();
        assert_eq!(values, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.0]);
    }

    #[test]
    fn interpolate_downsamples() {
        let input: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32, -(i as f32)]).collect();
        let out = interpolate(&input, 50.0, 25.0, 5);
        assert_eq!(out[2], vec![4.0, -4.0]);
    }

    #[test]
    fn windows_are_centred_and_zero_padded() {
        let rows: Vec<Vec<f32>> = (1..=3).map(|i| vec![i as f32]).collect();
        let arr = stack_windows(&rows, 4).unwrap();
        assert_eq!(arr.shape(), &[3, 4, 1]);
        assert_eq!(arr.frame(0).unwrap(), &[0.0, 0.0, 1.0, 2.0]);
        assert_eq!(arr.frame(1).unwrap(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(arr.frame(2).unwrap(), &[1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn two_seconds_at_50fps() {
        let converter = Converter::new(test_model(), 50.0).unwrap();
        let arr = converter.convert_samples(&chirp(2.0)).unwrap();
        assert_eq!(arr.shape(), &[100, WINDOW_FRAMES, DEEPSPEECH_DIM]);
        assert!(arr.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn frame_count_follows_fps() {
        let converter = Converter::new(test_model(), 25.0).unwrap();
        let arr = converter.convert_samples(&chirp(1.5)).unwrap();
        assert_eq!(arr.frames(), 38);
    }

    #[test]
    fn too_short_audio_fails() {
        let converter = Converter::new(test_model(), 50.0).unwrap();
        assert!(matches!(
            converter.convert_samples(&[0.1; 100]),
            Err(FeatureError::AudioTooShort { .. })
        ));
    }

    #[test]
    fn audio_shorter_than_half_a_video_frame_fails() {
        let converter = Converter::new(test_model(), 1.0).unwrap();
        let err = converter.convert_samples(&chirp(1.0)[..512]).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::AudioTooShort {
                min_samples: 8000,
                got_samples: 512
            }
        ));
    }

    #[test]
    fn non_positive_fps_rejected() {
        assert!(Converter::new(test_model(), 0.0).is_err());
    }
}
