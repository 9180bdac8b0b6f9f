//! Audio-driven talking-head inference.
//!
//! [`ErNerf`] sequences one `audio -> video` call:
//!
//! 1. extract acoustic features from the audio file (`ernerf-features`)
//! 2. build a test-time dataset over the subject's training poses (`ernerf-dataset`)
//! 3. render every frame with a [`Renderer`] whose parameters were loaded,
//!    and optionally merged with a frozen head checkpoint, at construction
//!    (`ernerf-nerf`)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use ernerf::{ErNerf, Options, ProcessRenderer};
//! use ernerf_nerf::ParameterStore;
//!
//! let options = Options {
//!     renderer_command: vec!["ernerf-render".into()],
//!     ..Options::default()
//! };
//! let renderer =
//!     ProcessRenderer::new(ParameterStore::new(), options.renderer_command.clone()).unwrap();
//! let driver = ErNerf::new(options, renderer).unwrap();
//! let result = driver.inference(Some(Path::new("speech.wav"))).unwrap();
//! println!("{} in {:?}", result.video.display(), result.elapsed);
//! ```

mod driver;
mod error;
mod options;
mod renderer;

pub use driver::{ErNerf, InferenceResult, VIDEO_EXT};
pub use error::{Error, RenderError, Result};
pub use options::{Options, RendererOptions};
pub use renderer::{ManifestFrame, ProcessRenderer, RenderManifest, RenderMode, Renderer};
