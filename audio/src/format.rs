//! Audio stream format.

use std::time::Duration;

/// Describes a PCM stream: sample rate and channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Sample rate in Hz (e.g., 16000, 44100).
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl Format {
    /// Creates a mono format with the given sample rate.
    pub const fn mono(sample_rate: u32) -> Self {
        Self { sample_rate, channels: 1 }
    }

    /// Returns true for single-channel audio.
    pub fn is_mono(&self) -> bool {
        self.channels == 1
    }

    /// Returns the playback duration of `frames` sample frames.
    pub fn duration(&self, frames: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Returns the number of sample frames in `duration`, rounded down.
    pub fn frames_in_duration(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64) as usize
    }
}

impl Format {
    /// 16kHz mono, the rate acoustic models are trained on.
    pub const MONO_16K: Format = Format::mono(16000);
}
