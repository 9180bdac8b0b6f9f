//! Options file management for CLI tools.
//!
//! Options are stored in ~/.ernerf/{app_name}/config.yaml. A `.json`
//! file is read as JSON; any other extension is read as YAML.

use std::path::{Path, PathBuf};

use ernerf::Options;

use crate::paths::Paths;

/// Inference options together with the file they came from.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name.
    pub app_name: String,

    pub options: Options,

    config_path: PathBuf,
}

impl Config {
    /// Gets the default config file path.
    pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
        Paths::new(app_name).ok().map(|paths| paths.config_file())
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Saves the options back to their file.
    pub fn save(&self) -> anyhow::Result<()> {
        write_options(&self.config_path, &self.options)
    }
}

/// Loads the options for the specified app.
///
/// A missing file is created with default options.
pub fn load_config(app_name: &str, custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = resolve_path(app_name, custom_path)?;

    let options = if config_path.exists() {
        let data = std::fs::read(&config_path)?;
        parse_options(&data, &config_path)?
    } else {
        let options = Options::default();
        write_options(&config_path, &options)?;
        options
    };

    Ok(Config {
        app_name: app_name.to_string(),
        options,
        config_path,
    })
}

/// Saves options to the specified path.
pub fn save_config(app_name: &str, options: &Options, custom_path: Option<&str>) -> anyhow::Result<()> {
    let config_path = resolve_path(app_name, custom_path)?;
    write_options(&config_path, options)
}

/// Parses options by file extension.
pub fn parse_options(data: &[u8], path: &Path) -> anyhow::Result<Options> {
    let options = if is_json(path) {
        serde_json::from_slice(data)?
    } else {
        serde_yaml::from_slice(data)?
    };
    Ok(options)
}

fn resolve_path(app_name: &str, custom_path: Option<&str>) -> anyhow::Result<PathBuf> {
    match custom_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Config::default_config_path(app_name)
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path")),
    }
}

fn write_options(path: &Path, options: &Options) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = if is_json(path) {
        serde_json::to_string_pretty(options)?
    } else {
        serde_yaml::to_string(options)?
    };
    std::fs::write(path, content)?;
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
