//! Audio front-end for acoustic feature extraction.
//!
//! This crate turns an audio file into frame-level spectral features:
//!
//! - `wav`: RIFF/WAV decoding to normalized mono samples, and a 16-bit writer
//! - `resample`: sample rate conversion (rubato)
//! - `fbank`: log mel filterbank extraction and CMVN
//!
//! # Example
//!
//! ```no_run
//! use ernerf_audio::{fbank, read_wav, resample, Format};
//!
//! let pcm = read_wav("speech.wav").unwrap();
//! let samples = resample(&pcm.samples, pcm.format.sample_rate, 16000).unwrap();
//!
//! let extractor = fbank::Extractor::new(fbank::Config::acoustic());
//! let mut features = extractor.extract(&samples);
//! fbank::cmvn(&mut features);
//! assert_eq!(Format::MONO_16K.sample_rate, 16000);
//! ```

mod error;
pub mod fbank;
pub mod format;
pub mod resample;
pub mod wav;

pub use error::AudioError;
pub use format::Format;
pub use resample::resample;
pub use wav::{encode_wav, read_wav, write_wav, Pcm};
