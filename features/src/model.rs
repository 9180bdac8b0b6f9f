//! Acoustic models: per-frame spectral features -> per-frame logits.

use std::collections::HashMap;
use std::path::Path;

use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};

use crate::error::FeatureError;

/// Character-level logit dimension of the deepspeech acoustic head.
pub const DEEPSPEECH_DIM: usize = 29;

/// Maps a sequence of spectral frames to a sequence of logit frames.
///
/// Implementations must be safe for concurrent use.
pub trait AcousticModel: Send + Sync {
    /// Width of each input frame (number of mel bins).
    fn input_dim(&self) -> usize;

    /// Width of each output frame.
    fn output_dim(&self) -> usize;

    /// Runs the model frame by frame; output has one row per input row.
    fn infer(&self, frames: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, FeatureError>;
}

/// A single affine layer `y = W x + b` stored in a safetensors file.
///
/// The file holds `weight` with shape `[output_dim, input_dim]` and `bias`
/// with shape `[output_dim]`, both f32.
#[derive(Debug, Clone)]
pub struct LinearAcousticModel {
    weight: Vec<f32>,
    bias: Vec<f32>,
    input_dim: usize,
    output_dim: usize,
}

impl LinearAcousticModel {
    /// Creates a model from row-major weights.
    pub fn new(weight: Vec<f32>, bias: Vec<f32>, input_dim: usize) -> Result<Self, FeatureError> {
        let output_dim = bias.len();
        if input_dim == 0 || output_dim == 0 || weight.len() != input_dim * output_dim {
            return Err(FeatureError::Model(format!(
                "weight has {} values, expected {output_dim} x {input_dim}",
                weight.len()
            )));
        }
        Ok(Self {
            weight,
            bias,
            input_dim,
            output_dim,
        })
    }

    /// Loads the model from a safetensors file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| FeatureError::io(path, e))?;
        let model = Self::from_bytes(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            input_dim = model.input_dim,
            output_dim = model.output_dim,
            "loaded acoustic model"
        );
        Ok(model)
    }

    /// Parses safetensors bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FeatureError> {
        let tensors = SafeTensors::deserialize(bytes)
            .map_err(|e| FeatureError::Model(format!("invalid safetensors: {e}")))?;

        let (weight_shape, weight) = read_f32(&tensors, "weight")?;
        let (bias_shape, bias) = read_f32(&tensors, "bias")?;
        match (weight_shape.as_slice(), bias_shape.as_slice()) {
            ([out, input], [b]) if out == b => Self::new(weight, bias, *input),
            _ => Err(FeatureError::Model(format!(
                "incompatible shapes: weight {weight_shape:?}, bias {bias_shape:?}"
            ))),
        }
    }

    /// Serializes the model as safetensors bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FeatureError> {
        let weight: Vec<u8> = self.weight.iter().flat_map(|v| v.to_le_bytes()).collect();
        let bias: Vec<u8> = self.bias.iter().flat_map(|v| v.to_le_bytes()).collect();
        let to_err = |e: safetensors::SafeTensorError| FeatureError::Model(e.to_string());

        let views = vec![
            (
                "weight".to_string(),
                TensorView::new(Dtype::F32, vec![self.output_dim, self.input_dim], &weight)
                    .map_err(to_err)?,
            ),
            (
                "bias".to_string(),
                TensorView::new(Dtype::F32, vec![self.output_dim], &bias).map_err(to_err)?,
            ),
        ];
        let mut metadata = HashMap::new();
        metadata.insert("kind".to_string(), "linear-acoustic".to_string());
        safetensors::serialize(views, &Some(metadata)).map_err(to_err)
    }
}

impl AcousticModel for LinearAcousticModel {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn infer(&self, frames: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, FeatureError> {
        frames
            .iter()
            .map(|x| {
                if x.len() != self.input_dim {
                    return Err(FeatureError::Model(format!(
                        "frame has {} values, model expects {}",
                        x.len(),
                        self.input_dim
                    )));
                }
                Ok(self
                    .weight
                    .chunks_exact(self.input_dim)
                    .zip(&self.bias)
                    .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>() + b)
                    .collect())
            })
            .collect()
    }
}

fn read_f32(tensors: &SafeTensors<'_>, name: &str) -> Result<(Vec<usize>, Vec<f32>), FeatureError> {
    let view = tensors
        .tensor(name)
        .map_err(|_| FeatureError::Model(format!("tensor {name:?} missing")))?;
    if view.dtype() != Dtype::F32 {
        return Err(FeatureError::Model(format!(
            "tensor {name:?} has dtype {:?}, expected F32",
            view.dtype()
        )));
    }
    let data = view
        .data()
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((view.shape().to_vec(), data))
}
