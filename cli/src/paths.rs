//! On-disk layout of an ernerf installation.
//!
//! ```text
//! ~/.ernerf/
//!   cache/models/        shared acoustic model cache
//!   <app>/config.yaml    options file
//!   <app>/output/        videos and feature files
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Root directory name under the home directory.
pub const DEFAULT_BASE_DIR: &str = ".ernerf";

/// Options file name inside the app directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Directory layout for one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    app_name: String,
    base: PathBuf,
}

impl Paths {
    /// Layout rooted at `~/.ernerf`.
    pub fn new(app_name: impl Into<String>) -> io::Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "home directory unknown"))?;
        Ok(Self::with_base(home.join(DEFAULT_BASE_DIR), app_name))
    }

    /// Layout rooted at an arbitrary directory.
    pub fn with_base(base: impl Into<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            base: base.into(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn app_dir(&self) -> PathBuf {
        self.base.join(&self.app_name)
    }

    pub fn config_file(&self) -> PathBuf {
        self.app_dir().join(DEFAULT_CONFIG_FILE)
    }

    /// Shared by every app, so a model is downloaded once per user.
    pub fn model_cache_dir(&self) -> PathBuf {
        self.base.join("cache").join("models")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.app_dir().join("output")
    }

    /// Creates the app and output directories.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.output_dir())
    }
}
