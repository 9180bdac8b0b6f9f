use std::collections::BTreeMap;

use crate::error::NerfError;

/// Parameter name to tensor, ordered by name.
pub type ParameterMapping = BTreeMap<String, Tensor>;

/// A dense row-major f32 tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, NerfError> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(NerfError::TensorSize {
                shape,
                len: data.len(),
                expected,
            });
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let n = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; n],
        }
    }

    pub fn full(shape: Vec<usize>, value: f32) -> Self {
        let n = shape.iter().product();
        Self {
            shape,
            data: vec![value; n],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Little-endian bytes of the data, as stored in checkpoint files.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    pub(crate) fn from_le_bytes(shape: Vec<usize>, bytes: &[u8]) -> Result<Self, NerfError> {
        let data = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::new(shape, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_checked() {
        assert!(Tensor::new(vec![2, 3], vec![0.0; 6]).is_ok());
        assert!(matches!(
            Tensor::new(vec![2, 3], vec![0.0; 5]),
            Err(NerfError::TensorSize { expected: 6, .. })
        ));
    }

    #[test]
    fn scalar_has_one_element() {
        let t = Tensor::full(vec![], 2.5);
        assert_eq!(t.numel(), 1);
        assert_eq!(t.data(), &[2.5]);
    }

    #[test]
    fn le_bytes_load_back() {
        let t = Tensor::new(vec![3], vec![1.0, -2.0, 0.5]).unwrap();
        let back = Tensor::from_le_bytes(vec![3], &t.to_le_bytes()).unwrap();
        assert_eq!(back, t);
    }
}
