//! Analysis windows and the mel filterbank matrix.

use std::f64::consts::PI;

/// Analysis window applied to each frame before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hamming,
    /// Hann window raised to 0.85, as used by Kaldi.
    Povey,
}

impl Window {
    /// Returns the `n` window coefficients.
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        if n <= 1 {
            return vec![1.0; n];
        }
        let denom = (n - 1) as f64;
        (0..n)
            .map(|i| {
                let phase = 2.0 * PI * i as f64 / denom;
                match self {
                    Window::Hamming => 0.54 - 0.46 * phase.cos(),
                    Window::Povey => (0.5 - 0.5 * phase.cos()).max(0.0).powf(0.85),
                }
            })
            .collect()
    }
}

pub(crate) fn hz_to_mel(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

pub(crate) fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

/// Builds triangular filters evenly spaced on the mel scale.
///
/// Returns `[num_mels][fft_size / 2 + 1]`. Weights are computed on the
/// continuous mel axis, so narrow low-frequency filters are never empty.
pub fn filter_bank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: usize,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f64>> {
    let bins = fft_size / 2 + 1;
    let low = hz_to_mel(low_freq);
    let high = hz_to_mel(high_freq);
    let delta = (high - low) / (num_mels + 1) as f64;
    let bin_hz = sample_rate as f64 / fft_size as f64;

    (0..num_mels)
        .map(|m| {
            let left = low + m as f64 * delta;
            let center = left + delta;
            let right = center + delta;
            (0..bins)
                .map(|k| {
                    let mel = hz_to_mel(k as f64 * bin_hz);
                    if mel <= left || mel >= right {
                        0.0
                    } else if mel <= center {
                        (mel - left) / (center - left)
                    } else {
                        (right - mel) / (right - center)
                    }
                })
                .collect()
        })
        .collect()
}
