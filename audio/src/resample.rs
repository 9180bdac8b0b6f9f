//! Rubato-based sample rate conversion for whole mono buffers.
//!
//! Acoustic models expect a fixed input rate, so decoded audio is converted
//! in one pass before feature extraction.

use rubato::{FftFixedInOut, Resampler};

use crate::error::AudioError;

/// Number of input frames per rubato processing block.
const CHUNK_SIZE: usize = 1024;

/// Resamples mono `samples` from `from` Hz to `to` Hz.
///
/// The output length is `round(len * to / from)`; the resampler delay is
/// trimmed so output sample 0 lines up with input sample 0.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, AudioError> {
    let rubato_err = |reason: String| AudioError::Resample { from, to, reason };

    if from == 0 || to == 0 {
        return Err(rubato_err("zero sample rate".into()));
    }
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedInOut::<f32>::new(from as usize, to as usize, CHUNK_SIZE, 1)
        .map_err(|e| rubato_err(e.to_string()))?;

    let expected = (samples.len() as f64 * to as f64 / from as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut out: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut pos = 0;
    loop {
        let need = resampler.input_frames_next();
        if pos + need > samples.len() {
            break;
        }
        let block = [&samples[pos..pos + need]];
        let produced = resampler
            .process(&block[..], None)
            .map_err(|e| rubato_err(e.to_string()))?;
        out.extend_from_slice(&produced[0]);
        pos += need;
    }

    // Tail shorter than one block, then flush until the delay is covered.
    if pos < samples.len() {
        let tail = [&samples[pos..]];
        let produced = resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(|e| rubato_err(e.to_string()))?;
        out.extend_from_slice(&produced[0]);
    }
    while out.len() < expected + delay {
        let produced = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| rubato_err(e.to_string()))?;
        if produced[0].is_empty() {
            break;
        }
        out.extend_from_slice(&produced[0]);
    }

    let end = (delay + expected).min(out.len());
    let mut resampled = out[delay.min(end)..end].to_vec();
    resampled.resize(expected, 0.0);
    Ok(resampled)
}
