use std::collections::BTreeMap;

use crate::error::NerfError;
use crate::tensor::{ParameterMapping, Tensor};

/// A named renderer parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub tensor: Tensor,
    /// False once the parameter is frozen.
    pub requires_grad: bool,
}

impl Parameter {
    pub fn new(tensor: Tensor) -> Self {
        Self {
            tensor,
            requires_grad: true,
        }
    }
}

/// Key differences found by a non-strict load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Present in the store but absent from the loaded mapping.
    pub missing_keys: Vec<String>,
    /// Present in the loaded mapping but absent from the store.
    pub unexpected_keys: Vec<String>,
    /// Overwritten from the loaded mapping.
    pub loaded: Vec<String>,
}

impl LoadReport {
    /// Emits the key mismatches as warnings.
    pub fn warn(&self, source: &str) {
        if !self.missing_keys.is_empty() {
            tracing::warn!(source, keys = ?self.missing_keys, "missing keys");
        }
        if !self.unexpected_keys.is_empty() {
            tracing::warn!(source, keys = ?self.unexpected_keys, "unexpected keys");
        }
    }
}

/// The renderer's parameter set.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: BTreeMap<String, Parameter>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with every parameter trainable.
    pub fn from_mapping(mapping: ParameterMapping) -> Self {
        Self {
            params: mapping
                .into_iter()
                .map(|(name, tensor)| (name, Parameter::new(tensor)))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.params.insert(name.into(), Parameter::new(tensor));
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of frozen parameters.
    pub fn frozen(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, p)| !p.requires_grad)
            .map(|(name, _)| name)
            .collect()
    }

    /// Marks `name` as not trainable. Returns false if no such parameter exists.
    pub fn freeze(&mut self, name: &str) -> bool {
        match self.params.get_mut(name) {
            Some(p) => {
                p.requires_grad = false;
                true
            }
            None => false,
        }
    }

    /// Copies all tensors out as a mapping.
    pub fn state_dict(&self) -> ParameterMapping {
        self.params
            .iter()
            .map(|(name, p)| (name.clone(), p.tensor.clone()))
            .collect()
    }

    /// Loads `mapping` non-strictly.
    ///
    /// Shared names are overwritten; extra or absent names are reported.
    /// Shapes of all shared names are checked before anything is written,
    /// so on error the store is unchanged. Trainability is left as is.
    pub fn load_state(&mut self, mapping: &ParameterMapping) -> Result<LoadReport, NerfError> {
        for (name, tensor) in mapping {
            if let Some(p) = self.params.get(name) {
                if p.tensor.shape() != tensor.shape() {
                    return Err(NerfError::ShapeMismatch {
                        name: name.clone(),
                        expected: p.tensor.shape().to_vec(),
                        found: tensor.shape().to_vec(),
                    });
                }
            }
        }

        let mut report = LoadReport::default();
        for (name, tensor) in mapping {
            match self.params.get_mut(name) {
                Some(p) => {
                    p.tensor = tensor.clone();
                    report.loaded.push(name.clone());
                }
                None => report.unexpected_keys.push(name.clone()),
            }
        }
        report.missing_keys = self
            .params
            .keys()
            .filter(|name| !mapping.contains_key(*name))
            .cloned()
            .collect();
        Ok(report)
    }
}
