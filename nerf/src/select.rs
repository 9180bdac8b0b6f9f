//! Primary checkpoint discovery in a training workspace.
//!
//! Layout: `<workspace>/checkpoints/ngp_ep0001.safetensors`, ... for
//! per-epoch snapshots, and `<workspace>/checkpoints/ngp.safetensors` for the
//! best one.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::checkpoint::Checkpoint;
use crate::error::NerfError;
use crate::params::{LoadReport, ParameterStore};

pub const CHECKPOINT_DIR: &str = "checkpoints";
pub const CHECKPOINT_EXT: &str = "safetensors";
const EPOCH_PREFIX: &str = "ngp_ep";
const BEST_NAME: &str = "ngp";

/// Which primary checkpoint to start from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointChoice {
    /// Keep the model as initialized.
    Scratch,
    /// Newest epoch snapshot.
    Latest,
    /// Best snapshot, else the newest epoch snapshot.
    Best,
    Path(PathBuf),
}

impl FromStr for CheckpointChoice {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "scratch" => Self::Scratch,
            "latest" => Self::Latest,
            "best" => Self::Best,
            path => Self::Path(PathBuf::from(path)),
        })
    }
}

/// Lists epoch snapshots in `<workspace>/checkpoints`, oldest first.
pub fn epoch_checkpoints(workspace: &Path) -> Vec<PathBuf> {
    let dir = workspace.join(CHECKPOINT_DIR);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == CHECKPOINT_EXT)
                && p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.starts_with(EPOCH_PREFIX))
        })
        .collect();
    found.sort();
    found
}

impl CheckpointChoice {
    /// Resolves the choice to a file, or `None` when the model stays as initialized.
    pub fn resolve(&self, workspace: &Path) -> Result<Option<PathBuf>, NerfError> {
        match self {
            Self::Scratch => Ok(None),
            Self::Latest => Ok(latest(workspace)),
            Self::Best => {
                let best = workspace
                    .join(CHECKPOINT_DIR)
                    .join(format!("{BEST_NAME}.{CHECKPOINT_EXT}"));
                if best.exists() {
                    Ok(Some(best))
                } else {
                    tracing::warn!(path = %best.display(), "best checkpoint missing, using latest");
                    Ok(latest(workspace))
                }
            }
            Self::Path(path) if path.exists() => Ok(Some(path.clone())),
            Self::Path(path) => Err(NerfError::CheckpointNotFound { path: path.clone() }),
        }
    }

    /// Loads the chosen checkpoint into `store` non-strictly.
    ///
    /// Returns `None` if nothing was loaded. Freezes nothing.
    pub fn load_into(
        &self,
        workspace: &Path,
        store: &mut ParameterStore,
    ) -> Result<Option<LoadReport>, NerfError> {
        let Some(path) = self.resolve(workspace)? else {
            if *self != Self::Scratch {
                tracing::warn!(
                    workspace = %workspace.display(),
                    "no checkpoint found, model left as initialized"
                );
            }
            return Ok(None);
        };

        let ckpt = Checkpoint::load(&path)?;
        let report = store.load_state(&ckpt.tensors)?;
        tracing::info!(
            path = %path.display(),
            epoch = ?ckpt.epoch(),
            loaded = report.loaded.len(),
            "loaded checkpoint"
        );
        report.warn(&path.display().to_string());
        Ok(Some(report))
    }
}

fn latest(workspace: &Path) -> Option<PathBuf> {
    epoch_checkpoints(workspace).pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{ParameterMapping, Tensor};

    fn write_epoch(workspace: &Path, epoch: u32, value: f32) -> PathBuf {
        let mut tensors = ParameterMapping::new();
        tensors.insert("w".into(), Tensor::full(vec![2], value));
        let path = workspace
            .join(CHECKPOINT_DIR)
            .join(format!("{EPOCH_PREFIX}{epoch:04}.{CHECKPOINT_EXT}"));
        Checkpoint::new(tensors).save(&path).unwrap();
        path
    }

    #[test]
    fn parses_choices() {
        assert_eq!("scratch".parse::<CheckpointChoice>().unwrap(), CheckpointChoice::Scratch);
        assert_eq!("latest".parse::<CheckpointChoice>().unwrap(), CheckpointChoice::Latest);
        assert_eq!(
            "a/b.safetensors".parse::<CheckpointChoice>().unwrap(),
            CheckpointChoice::Path(PathBuf::from("a/b.safetensors"))
        );
    }

    #[test]
    fn latest_is_highest_epoch() {
        let dir = tempfile::tempdir().unwrap();
        write_epoch(dir.path(), 2, 2.0);
        let newest = write_epoch(dir.path(), 10, 10.0);
        std::fs::write(dir.path().join(CHECKPOINT_DIR).join("notes.txt"), b"x").unwrap();

        assert_eq!(CheckpointChoice::Latest.resolve(dir.path()).unwrap(), Some(newest));

        let mut store = ParameterStore::new();
        store.insert("w", Tensor::zeros(vec![2]));
        store.insert("extra", Tensor::zeros(vec![1]));
        let report = CheckpointChoice::Latest
            .load_into(dir.path(), &mut store)
            .unwrap()
            .unwrap();
        assert_eq!(report.missing_keys, vec!["extra"]);
        assert_eq!(store.get("w").unwrap().tensor.data(), &[10.0, 10.0]);
        assert!(store.frozen().is_empty());
    }

    #[test]
    fn latest_without_checkpoints_keeps_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ParameterStore::new();
        store.insert("w", Tensor::zeros(vec![2]));
        assert!(CheckpointChoice::Latest.load_into(dir.path(), &mut store).unwrap().is_none());
        assert_eq!(store.get("w").unwrap().tensor.data(), &[0.0, 0.0]);
    }

    #[test]
    fn best_falls_back_to_latest() {
        let dir = tempfile::tempdir().unwrap();
        let newest = write_epoch(dir.path(), 3, 3.0);
        assert_eq!(CheckpointChoice::Best.resolve(dir.path()).unwrap(), Some(newest));
    }

    #[test]
    fn explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let choice = CheckpointChoice::Path(dir.path().join("nope.safetensors"));
        assert!(matches!(
            choice.resolve(dir.path()),
            Err(NerfError::CheckpointNotFound { .. })
        ));
    }

    #[test]
    fn scratch_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_epoch(dir.path(), 1, 1.0);
        assert_eq!(CheckpointChoice::Scratch.resolve(dir.path()).unwrap(), None);
    }
}
