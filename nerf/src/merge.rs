//! Head checkpoint merge for torso models.
//!
//! A torso model is trained on top of a finished head model. The head
//! checkpoint is loaded into the torso model's parameters and every
//! parameter name it provides is frozen.

use std::path::{Path, PathBuf};

use crate::checkpoint::Checkpoint;
use crate::error::NerfError;
use crate::params::ParameterStore;
use crate::tensor::ParameterMapping;

/// A parameter frozen by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenParam {
    pub name: String,
    pub shape: Vec<usize>,
}

/// Result of a completed merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub missing_keys: Vec<String>,
    pub unexpected_keys: Vec<String>,
    pub frozen: Vec<FrozenParam>,
}

impl MergeReport {
    /// Emits the key mismatches as warnings.
    pub fn warn(&self) {
        if !self.missing_keys.is_empty() {
            tracing::warn!(keys = ?self.missing_keys, "head checkpoint: missing keys");
        }
        if !self.unexpected_keys.is_empty() {
            tracing::warn!(keys = ?self.unexpected_keys, "head checkpoint: unexpected keys");
        }
    }

    pub fn frozen_names(&self) -> impl Iterator<Item = &str> {
        self.frozen.iter().map(|p| p.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Not a torso model, or no head checkpoint configured.
    Skipped,
    Merged(MergeReport),
}

/// Loads a head checkpoint into a torso model and freezes the shared parameters.
#[derive(Debug, Clone)]
pub struct CheckpointMerger {
    torso: bool,
    head_ckpt: PathBuf,
}

impl CheckpointMerger {
    pub fn new(torso: bool, head_ckpt: impl Into<PathBuf>) -> Self {
        Self {
            torso,
            head_ckpt: head_ckpt.into(),
        }
    }

    pub fn head_ckpt(&self) -> &Path {
        &self.head_ckpt
    }

    /// True when [`merge`](Self::merge) would do anything.
    pub fn enabled(&self) -> bool {
        self.torso && !self.head_ckpt.as_os_str().is_empty()
    }

    /// Runs the merge against `store`.
    pub fn merge(&self, store: &mut ParameterStore) -> Result<MergeOutcome, NerfError> {
        if !self.enabled() {
            return Ok(MergeOutcome::Skipped);
        }
        let head = Checkpoint::load(&self.head_ckpt)?;
        tracing::info!(
            path = %self.head_ckpt.display(),
            tensors = head.tensors.len(),
            "merging head checkpoint"
        );
        merge_mapping(store, &head.tensors).map(MergeOutcome::Merged)
    }
}

/// Loads `mapping` non-strictly into `store`, then freezes every name both share.
pub fn merge_mapping(
    store: &mut ParameterStore,
    mapping: &ParameterMapping,
) -> Result<MergeReport, NerfError> {
    let loaded = store.load_state(mapping)?;

    let mut frozen = Vec::with_capacity(loaded.loaded.len());
    for name in loaded.loaded {
        store.freeze(&name);
        let shape = store
            .get(&name)
            .map(|p| p.tensor.shape().to_vec())
            .unwrap_or_default();
        tracing::info!(name = %name, shape = ?shape, "freeze");
        frozen.push(FrozenParam { name, shape });
    }

    Ok(MergeReport {
        missing_keys: loaded.missing_keys,
        unexpected_keys: loaded.unexpected_keys,
        frozen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    fn torso_model() -> ParameterStore {
        let mut s = ParameterStore::new();
        s.insert("encoder.embeddings", Tensor::zeros(vec![4, 2]));
        s.insert("sigma_net.0.weight", Tensor::zeros(vec![2, 2]));
        s.insert("torso_net.0.weight", Tensor::zeros(vec![3, 2]));
        s
    }

    fn head_checkpoint(dir: &Path) -> PathBuf {
        let mut tensors = ParameterMapping::new();
        tensors.insert("encoder.embeddings".into(), Tensor::full(vec![4, 2], 1.0));
        tensors.insert("sigma_net.0.weight".into(), Tensor::full(vec![2, 2], 2.0));
        tensors.insert("anchor_points".into(), Tensor::full(vec![5], 3.0));
        let path = dir.join("head.safetensors");
        Checkpoint::new(tensors).save(&path).unwrap();
        path
    }

    #[test]
    fn freezes_exactly_the_intersection() {
        let dir = tempfile::tempdir().unwrap();
        let path = head_checkpoint(dir.path());
        let mut store = torso_model();

        let outcome = CheckpointMerger::new(true, &path).merge(&mut store).unwrap();
        let report = match outcome {
            MergeOutcome::Merged(report) => report,
            other => panic!("expected merge, got {other:?}"),
        };

        assert_eq!(
            report.frozen_names().collect::<Vec<_>>(),
            vec!["encoder.embeddings", "sigma_net.0.weight"]
        );
        assert_eq!(report.frozen[0].shape, vec![4, 2]);
        assert_eq!(report.unexpected_keys, vec!["anchor_points"]);
        assert_eq!(report.missing_keys, vec!["torso_net.0.weight"]);

        assert_eq!(store.frozen(), vec!["encoder.embeddings", "sigma_net.0.weight"]);
        assert!(store.get("torso_net.0.weight").unwrap().requires_grad);
        assert_eq!(store.get("sigma_net.0.weight").unwrap().tensor.data(), &[2.0; 4]);
        assert!(!store.contains("anchor_points"));
    }

    #[test]
    fn skipped_without_torso_or_path() {
        let mut store = torso_model();
        assert_eq!(
            CheckpointMerger::new(false, "head.safetensors").merge(&mut store).unwrap(),
            MergeOutcome::Skipped
        );
        assert_eq!(
            CheckpointMerger::new(true, "").merge(&mut store).unwrap(),
            MergeOutcome::Skipped
        );
        assert!(store.frozen().is_empty());
    }

    #[test]
    fn missing_head_checkpoint_fails() {
        let mut store = torso_model();
        let err = CheckpointMerger::new(true, "/nonexistent/head.safetensors")
            .merge(&mut store)
            .unwrap_err();
        assert!(err.is_checkpoint_load());
        assert!(store.frozen().is_empty());
    }

    #[test]
    fn shape_mismatch_freezes_nothing() {
        let mut store = torso_model();
        let mut mapping = ParameterMapping::new();
        mapping.insert("encoder.embeddings".into(), Tensor::full(vec![4, 2], 1.0));
        mapping.insert("sigma_net.0.weight".into(), Tensor::full(vec![3], 1.0));

        assert!(matches!(
            merge_mapping(&mut store, &mapping),
            Err(NerfError::ShapeMismatch { .. })
        ));
        assert!(store.frozen().is_empty());
        assert_eq!(store.get("encoder.embeddings").unwrap().tensor.data(), &[0.0; 8]);
    }
}
