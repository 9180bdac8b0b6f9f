//! [`AudioExtractor`]: the feature extraction stage of the inference pipeline.

use std::io;
use std::path::{Path, PathBuf};

use crate::array::FeatureArray;
use crate::convert::Converter;
use crate::error::FeatureError;
use crate::model::{AcousticModel, LinearAcousticModel};
use crate::store::{expand_home, ModelFetcher, ModelStore};

/// Default location of the pretrained acoustic model.
pub const DEFAULT_MODEL_PATH: &str = "~/.tensorflow/models/deepspeech-0_1_0-b90017e8.safetensors";

/// Download cache for acoustic models.
pub const DEFAULT_CACHE_DIR: &str = "~/.ernerf/cache/models";

/// Extension of feature array files.
pub const FEATURE_EXT: &str = "npy";

/// Configuration for [`AudioExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Preferred model path; `~` is expanded.
    pub model_path: String,
    /// Download URL used when the model is not on disk.
    pub model_url: Option<String>,
    /// Expected SHA-256 of the downloaded model.
    pub model_sha256: Option<String>,
    /// Cache directory for downloaded models.
    pub cache_dir: PathBuf,
    /// Directory for timestamp-named outputs of [`AudioExtractor::extract`].
    pub output_dir: PathBuf,
    /// Video frame rate the features are aligned to.
    pub fps: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            model_url: None,
            model_sha256: None,
            cache_dir: expand_home(DEFAULT_CACHE_DIR),
            output_dir: PathBuf::from("output"),
            fps: 50.0,
        }
    }
}

/// Converts speech audio files into feature array files.
///
/// # Output naming
///
/// [`extract`](Self::extract) names each output after the current unix time
/// in milliseconds, so repeated calls on the same input never overwrite an
/// earlier result. [`extract_to`](Self::extract_to) writes exactly where it
/// is told. Outputs are written atomically; a failed call leaves no file.
pub struct AudioExtractor<M = LinearAcousticModel> {
    model_path: PathBuf,
    output_dir: PathBuf,
    converter: Converter<M>,
}

impl AudioExtractor<LinearAcousticModel> {
    /// Resolves and loads the acoustic model, downloading it if necessary.
    pub fn new(cfg: ExtractorConfig) -> Result<Self, FeatureError> {
        let store = ModelStore::new(&cfg.cache_dir)
            .url(cfg.model_url.clone())
            .sha256(cfg.model_sha256.clone());
        Self::with_store(cfg, &store)
    }

    /// Like [`new`](Self::new) with an explicit model store.
    pub fn with_store<F: ModelFetcher>(
        cfg: ExtractorConfig,
        store: &ModelStore<F>,
    ) -> Result<Self, FeatureError> {
        let model_path = store.resolve_model_path(&cfg.model_path)?;
        let model = LinearAcousticModel::load(&model_path).map_err(|e| {
            FeatureError::ModelUnavailable {
                candidate: model_path.clone(),
                reason: e.to_string(),
            }
        })?;
        tracing::info!(path = %model_path.display(), "acoustic model ready");
        Ok(Self {
            model_path,
            output_dir: cfg.output_dir,
            converter: Converter::new(model, cfg.fps)?,
        })
    }
}

impl<M: AcousticModel> AudioExtractor<M> {
    /// Creates an extractor around an already loaded model.
    pub fn with_model(
        model: M,
        model_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        fps: f64,
    ) -> Result<Self, FeatureError> {
        Ok(Self {
            model_path: model_path.into(),
            output_dir: output_dir.into(),
            converter: Converter::new(model, fps)?,
        })
    }

    /// Returns the resolved acoustic model path.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn fps(&self) -> f64 {
        self.converter.fps()
    }

    /// Extracts features into a fresh timestamp-named file under the output dir.
    pub fn extract(&self, filename: impl AsRef<Path>) -> Result<PathBuf, FeatureError> {
        let input = checked_input(filename.as_ref())?;
        let features = self.convert(&input)?;
        let output = persist_unique(&features, &self.output_dir, unix_millis())?;
        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            frames = features.frames(),
            "extracted audio features"
        );
        Ok(output)
    }

    /// Extracts features into `output`, replacing any existing file.
    pub fn extract_to(
        &self,
        filename: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<PathBuf, FeatureError> {
        let input = checked_input(filename.as_ref())?;
        let output = expand_home(&output.as_ref().to_string_lossy());
        let features = self.convert(&input)?;
        features.write_npy(&output)?;
        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            frames = features.frames(),
            "extracted audio features"
        );
        Ok(output)
    }

    /// Batch extraction. A `None` output becomes `<input stem>.npy` beside the input.
    ///
    /// All inputs are checked before any conversion starts.
    pub fn extract_features(
        &self,
        inputs: &[PathBuf],
        outputs: &[Option<PathBuf>],
    ) -> Result<Vec<PathBuf>, FeatureError> {
        if inputs.len() != outputs.len() {
            return Err(FeatureError::Format(format!(
                "{} inputs but {} outputs",
                inputs.len(),
                outputs.len()
            )));
        }
        let inputs = inputs
            .iter()
            .map(|p| checked_input(p))
            .collect::<Result<Vec<_>, _>>()?;

        inputs
            .iter()
            .zip(outputs)
            .map(|(input, output)| {
                let output = output
                    .clone()
                    .unwrap_or_else(|| input.with_extension(FEATURE_EXT));
                self.extract_to(input, output)
            })
            .collect()
    }

    /// Converts one audio file without writing anything.
    pub fn convert(&self, input: &Path) -> Result<FeatureArray, FeatureError> {
        self.converter.convert_file(input)
    }
}

/// Audio file to feature file conversion, as seen by the inference driver.
pub trait FeatureExtractor: Send + Sync {
    /// Extracts features from `audio` into a fresh file and returns its path.
    fn extract(&self, audio: &Path) -> Result<PathBuf, FeatureError>;
}

impl<M: AcousticModel> FeatureExtractor for AudioExtractor<M> {
    fn extract(&self, audio: &Path) -> Result<PathBuf, FeatureError> {
        AudioExtractor::extract(self, audio)
    }
}

fn checked_input(filename: &Path) -> Result<PathBuf, FeatureError> {
    let input = expand_home(&filename.to_string_lossy());
    if !input.exists() {
        return Err(FeatureError::InputNotFound(input));
    }
    Ok(input)
}

fn unix_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Persists `features` as `<dir>/<stamp>.npy`, bumping `stamp` until the
/// name is unused. The rename refuses to clobber, so concurrent callers
/// cannot claim the same name.
fn persist_unique(features: &FeatureArray, dir: &Path, stamp: i64) -> Result<PathBuf, FeatureError> {
    let mut tmp = features.write_temp(Some(dir))?;
    let mut stamp = stamp;
    loop {
        let candidate = dir.join(format!("{stamp}.{FEATURE_EXT}"));
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                stamp += 1;
            }
            Err(e) => return Err(FeatureError::io(candidate, e.error)),
        }
    }
}
