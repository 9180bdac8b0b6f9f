//! Acoustic model resolution: local path, cache, then network fetch.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::FeatureError;

/// File name of the canonical pretrained acoustic model in the cache.
pub const ACOUSTIC_MODEL_FILE: &str = "deepspeech-0_1_0-b90017e8.safetensors";

/// Downloads a model file from a URL.
pub trait ModelFetcher {
    /// Streams the resource at `url` into `dest`, returning the byte count.
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<u64, FeatureError>;
}

/// [`ModelFetcher`] over HTTP(S) using a blocking ureq agent.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl ModelFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<u64, FeatureError> {
        let mut response = ureq::get(url).call().map_err(|e| FeatureError::ModelUnavailable {
            candidate: PathBuf::from(url),
            reason: e.to_string(),
        })?;
        let mut reader = response.body_mut().as_reader();
        io::copy(&mut reader, dest).map_err(|e| FeatureError::ModelUnavailable {
            candidate: PathBuf::from(url),
            reason: format!("download interrupted: {e}"),
        })
    }
}

/// Resolves acoustic model files.
///
/// Lookup order: the candidate path as given (with `~` expanded), the
/// cached copy under `cache_dir`, then a download from `url` into the cache.
pub struct ModelStore<F = HttpFetcher> {
    cache_dir: PathBuf,
    url: Option<String>,
    sha256: Option<String>,
    fetcher: F,
}

impl ModelStore<HttpFetcher> {
    /// Creates a store that downloads over HTTP.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self::with_fetcher(cache_dir, HttpFetcher)
    }
}

impl<F: ModelFetcher> ModelStore<F> {
    /// Creates a store with a custom fetcher.
    pub fn with_fetcher(cache_dir: impl Into<PathBuf>, fetcher: F) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            url: None,
            sha256: None,
            fetcher,
        }
    }

    /// Sets the download URL used when no local copy exists.
    pub fn url(mut self, url: Option<String>) -> Self {
        self.url = url.filter(|u| !u.is_empty());
        self
    }

    /// Sets the expected hex SHA-256 of downloaded files.
    pub fn sha256(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256.filter(|s| !s.is_empty()).map(|s| s.to_lowercase());
        self
    }

    /// Returns the cache location of the canonical model.
    pub fn cached_path(&self) -> PathBuf {
        self.cache_dir.join(ACOUSTIC_MODEL_FILE)
    }

    /// Resolves `candidate` to an existing model file.
    pub fn resolve_model_path(&self, candidate: &str) -> Result<PathBuf, FeatureError> {
        let expanded = expand_home(candidate);
        if !candidate.is_empty() && expanded.exists() {
            return Ok(expanded);
        }

        let cached = self.cached_path();
        if cached.exists() {
            tracing::debug!(path = %cached.display(), "using cached acoustic model");
            return Ok(cached);
        }

        let Some(url) = self.url.as_deref() else {
            return Err(FeatureError::ModelUnavailable {
                candidate: expanded,
                reason: "not found locally and no download url configured".into(),
            });
        };

        tracing::info!(url, dest = %cached.display(), "downloading acoustic model");
        self.download(url, &cached).map_err(|e| match e {
            FeatureError::ModelUnavailable { .. } => e,
            other => FeatureError::ModelUnavailable {
                candidate: expanded.clone(),
                reason: other.to_string(),
            },
        })?;
        Ok(cached)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), FeatureError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| FeatureError::io(&self.cache_dir, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&self.cache_dir)
            .map_err(|e| FeatureError::io(&self.cache_dir, e))?;

        let bytes = self.fetcher.fetch(url, tmp.as_file_mut())?;
        tmp.as_file_mut().flush().map_err(|e| FeatureError::io(tmp.path(), e))?;
        if bytes == 0 {
            return Err(FeatureError::ModelUnavailable {
                candidate: PathBuf::from(url),
                reason: "empty download".into(),
            });
        }

        if let Some(expected) = &self.sha256 {
            let actual = sha256_file(tmp.path())?;
            if &actual != expected {
                return Err(FeatureError::ModelUnavailable {
                    candidate: PathBuf::from(url),
                    reason: format!("sha256 mismatch: expected {expected}, got {actual}"),
                });
            }
        }

        tmp.persist(dest).map_err(|e| FeatureError::io(dest, e.error))?;
        tracing::info!(bytes, path = %dest.display(), "acoustic model cached");
        Ok(())
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path, dirs::home_dir()) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

fn sha256_file(path: &Path) -> Result<String, FeatureError> {
    let mut file = std::fs::File::open(path).map_err(|e| FeatureError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| FeatureError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
