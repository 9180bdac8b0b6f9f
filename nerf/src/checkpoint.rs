//! Checkpoint files: a safetensors parameter mapping plus string metadata.
//!
//! Only f32 tensors are accepted. Metadata carries training bookkeeping such
//! as `epoch` and `global_step`; readers must tolerate its absence.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};

use crate::error::NerfError;
use crate::tensor::{ParameterMapping, Tensor};

/// A loaded checkpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    pub tensors: ParameterMapping,
    pub metadata: BTreeMap<String, String>,
}

impl Checkpoint {
    pub fn new(tensors: ParameterMapping) -> Self {
        Self {
            tensors,
            metadata: BTreeMap::new(),
        }
    }

    /// Training epoch recorded in the metadata, if any.
    pub fn epoch(&self) -> Option<u64> {
        self.metadata.get("epoch")?.parse().ok()
    }

    /// Reads a checkpoint file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NerfError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NerfError::CheckpointNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                NerfError::CheckpointLoad {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })?;
        let ckpt = Self::from_bytes(&bytes).map_err(|reason| NerfError::CheckpointLoad {
            path: path.to_path_buf(),
            reason,
        })?;
        tracing::debug!(
            path = %path.display(),
            tensors = ckpt.tensors.len(),
            "read checkpoint"
        );
        Ok(ckpt)
    }

    /// Parses safetensors bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let (_, header) = SafeTensors::read_metadata(bytes).map_err(|e| e.to_string())?;
        let metadata = header
            .metadata()
            .as_ref()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let tensors = SafeTensors::deserialize(bytes).map_err(|e| e.to_string())?;
        let mut mapping = ParameterMapping::new();
        for (name, view) in tensors.tensors() {
            if view.dtype() != Dtype::F32 {
                return Err(format!("tensor {name:?} has dtype {:?}, expected F32", view.dtype()));
            }
            let tensor =
                Tensor::from_le_bytes(view.shape().to_vec(), view.data()).map_err(|e| e.to_string())?;
            mapping.insert(name, tensor);
        }
        Ok(Self {
            tensors: mapping,
            metadata,
        })
    }

    /// Serializes to safetensors bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let buffers: Vec<(&String, &Tensor, Vec<u8>)> = self
            .tensors
            .iter()
            .map(|(name, t)| (name, t, t.to_le_bytes()))
            .collect();
        let views = buffers
            .iter()
            .map(|(name, t, bytes)| {
                TensorView::new(Dtype::F32, t.shape().to_vec(), bytes)
                    .map(|view| ((*name).clone(), view))
                    .map_err(|e| e.to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let metadata: Option<HashMap<String, String>> = if self.metadata.is_empty() {
            None
        } else {
            Some(self.metadata.clone().into_iter().collect())
        };
        safetensors::serialize(views, &metadata).map_err(|e| e.to_string())
    }

    /// Writes the checkpoint atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), NerfError> {
        let path = path.as_ref();
        let save_err = |reason: String| NerfError::CheckpointSave {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = self.to_bytes().map_err(save_err)?;

        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| save_err(e.to_string()))?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".ckpt-")
            .tempfile_in(dir)
            .map_err(|e| save_err(e.to_string()))?;
        tmp.write_all(&bytes).map_err(|e| save_err(e.to_string()))?;
        tmp.persist(path).map_err(|e| save_err(e.error.to_string()))?;
        Ok(())
    }
}
