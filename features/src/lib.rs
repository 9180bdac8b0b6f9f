//! Acoustic feature extraction for audio-driven rendering.
//!
//! Converts a speech audio file into a windowed per-frame feature array
//! (`[frames, 16, dims]`, f32) persisted as an NPY file. One array row
//! corresponds to one video frame at the configured `fps`.
//!
//! # Example
//!
//! ```no_run
//! use ernerf_features::{AudioExtractor, ExtractorConfig, FeatureArray};
//!
//! let extractor = AudioExtractor::new(ExtractorConfig::default()).unwrap();
//! let path = extractor.extract("speech.wav").unwrap();
//! let features = FeatureArray::read_npy(&path).unwrap();
//! println!("{} frames", features.frames());
//! ```

mod array;
mod convert;
mod error;
mod extractor;
mod model;
mod store;

pub use array::FeatureArray;
pub use convert::{frame_count, interpolate, stack_windows, Converter, WINDOW_FRAMES};
pub use error::FeatureError;
pub use extractor::{
    AudioExtractor, ExtractorConfig, FeatureExtractor, DEFAULT_CACHE_DIR, DEFAULT_MODEL_PATH,
    FEATURE_EXT,
};
pub use model::{AcousticModel, LinearAcousticModel, DEEPSPEECH_DIM};
pub use store::{expand_home, HttpFetcher, ModelFetcher, ModelStore, ACOUSTIC_MODEL_FILE};
