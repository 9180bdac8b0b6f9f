//! Log mel filterbank feature extraction from PCM audio.
//!
//! Output is a `[T, num_mels]` f32 matrix, one row per analysis frame.
//!
//! Two presets are provided:
//!
//! - [`Config::default`]: 25ms window, 10ms hop, 80 mels (100 frames/s)
//! - [`Config::acoustic`]: 32ms window, 20ms hop, 26 mels (50 frames/s),
//!   the front-end of the speech acoustic model

mod fft;
mod mel;

pub use mel::{filter_bank, Window};

/// Configuration for mel filterbank extraction.
#[derive(Debug, Clone)]
pub struct Config {
    pub sample_rate: usize,
    pub window_size: usize,
    pub hop_size: usize,
    /// Must be a power of two and at least `window_size`.
    pub fft_size: usize,
    pub num_mels: usize,
    pub low_freq: f64,
    pub high_freq: f64,
    pub pre_emphasis: f64,
    pub window: Window,
    /// Floor applied before the log.
    pub energy_floor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            window_size: 400,
            hop_size: 160,
            fft_size: 512,
            num_mels: 80,
            low_freq: 20.0,
            high_freq: 7600.0,
            pre_emphasis: 0.97,
            window: Window::Povey,
            energy_floor: 1e-10,
        }
    }
}

impl Config {
    /// Front-end of the acoustic model: 50 frames per second at 16kHz.
    pub fn acoustic() -> Self {
        Self {
            sample_rate: 16000,
            window_size: 512,
            hop_size: 320,
            fft_size: 512,
            num_mels: 26,
            low_freq: 20.0,
            high_freq: 8000.0,
            pre_emphasis: 0.97,
            window: Window::Hamming,
            energy_floor: 1e-10,
        }
    }

    /// Returns the number of feature frames per second.
    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop_size as f64
    }

    /// Returns the number of frames produced for `num_samples` samples.
    pub fn num_frames(&self, num_samples: usize) -> usize {
        if num_samples < self.window_size || self.hop_size == 0 {
            return 0;
        }
        (num_samples - self.window_size) / self.hop_size + 1
    }
}

/// Mel filterbank feature extractor.
pub struct Extractor {
    cfg: Config,
    window: Vec<f64>,
    mel_bank: Vec<Vec<f64>>,
    plan: fft::Plan,
}

impl Extractor {
    /// Creates a new extractor with the given config.
    ///
    /// Panics if `fft_size` is not a power of two or is smaller than the window.
    pub fn new(cfg: Config) -> Self {
        assert!(
            cfg.fft_size >= cfg.window_size,
            "fft_size {} smaller than window_size {}",
            cfg.fft_size,
            cfg.window_size
        );
        let window = cfg.window.coefficients(cfg.window_size);
        let mel_bank = filter_bank(
            cfg.num_mels,
            cfg.fft_size,
            cfg.sample_rate,
            cfg.low_freq,
            cfg.high_freq,
        );
        let plan = fft::Plan::new(cfg.fft_size);
        Self { cfg, window, mel_bank, plan }
    }

    /// Returns the extractor configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Extracts log mel energies from normalized samples (range [-1, 1]).
    ///
    /// Returns an empty matrix when the input is shorter than one window.
    pub fn extract(&self, pcm: &[f32]) -> Vec<Vec<f32>> {
        let cfg = &self.cfg;
        let num_frames = cfg.num_frames(pcm.len());
        let nfft = self.plan.len();

        let mut features = Vec::with_capacity(num_frames);
        let mut real = vec![0.0f64; nfft];
        let mut imag = vec![0.0f64; nfft];
        let mut power = vec![0.0f64; nfft / 2 + 1];

        for t in 0..num_frames {
            let start = t * cfg.hop_size;
            let frame = &pcm[start..start + cfg.window_size];

            let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len() as f64;
            let mut prev = frame[0] as f64 - mean;
            for (i, &s) in frame.iter().enumerate() {
                let cur = s as f64 - mean;
                let emphasized = cur - cfg.pre_emphasis * prev;
                real[i] = emphasized * self.window[i];
                prev = cur;
            }
            real[cfg.window_size..].fill(0.0);
            imag.fill(0.0);

            self.plan.forward(&mut real, &mut imag);
            self.plan.power_spectrum(&real, &imag, &mut power);

            let mel: Vec<f32> = self
                .mel_bank
                .iter()
                .map(|filter| {
                    let energy: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                    energy.max(cfg.energy_floor).ln() as f32
                })
                .collect();
            features.push(mel);
        }

        features
    }
}

/// Applies Cepstral Mean and Variance Normalization in-place.
///
/// Each mel dimension ends up with zero mean and unit variance across frames.
pub fn cmvn(features: &mut [Vec<f32>]) {
    let Some(first) = features.first() else {
        return;
    };
    let num_mels = first.len();
    let t = features.len() as f64;

    for m in 0..num_mels {
        let mean = features.iter().map(|f| f[m] as f64).sum::<f64>() / t;
        let var = features
            .iter()
            .map(|f| {
                let d = f[m] as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / t;
        let std = var.sqrt().max(1e-10);

        for f in features.iter_mut() {
            f[m] = ((f[m] as f64 - mean) / std) as f32;
        }
    }
}
