//! Tensor descriptors and request/response binding
//!
//! The core never touches tensor math; it routes named buffers between the
//! serving shell and model instances. Payloads are reference-counted
//! [`Bytes`] so fan-out across pipeline edges is cheap.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Element type of a tensor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    F32,
    F64,
    I32,
    I64,
    U8,
    I8,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::F32 | DataType::I32 => 4,
            DataType::F64 | DataType::I64 => 8,
            DataType::U8 | DataType::I8 => 1,
        }
    }
}

/// Shape and dtype descriptor for one named tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub shape: Vec<i64>,
    pub dtype: DataType,
}

impl TensorSpec {
    pub fn new(shape: Vec<i64>, dtype: DataType) -> Self {
        Self { shape, dtype }
    }

    /// Total number of elements described by the shape.
    pub fn element_count(&self) -> i64 {
        self.shape.iter().product()
    }

    /// Expected byte length of a buffer matching this spec.
    pub fn byte_len(&self) -> usize {
        self.element_count().max(0) as usize * self.dtype.size_bytes()
    }
}

/// Input or output schema of a model: tensor name to descriptor.
pub type TensorSchema = HashMap<String, TensorSpec>;

/// A bound tensor: descriptor plus payload.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub spec: TensorSpec,
    pub data: Bytes,
}

impl Tensor {
    pub fn new(spec: TensorSpec, data: Bytes) -> Self {
        Self { spec, data }
    }

    /// A tensor of the given spec filled with zero bytes.
    pub fn zeroed(spec: TensorSpec) -> Self {
        let data = Bytes::from(vec![0u8; spec.byte_len()]);
        Self { spec, data }
    }
}

/// Named tensors bound to a request or produced by a node.
pub type TensorMap = HashMap<String, Tensor>;

/// Inbound prediction request: named input tensors.
#[derive(Debug, Clone, Default)]
pub struct PredictRequest {
    pub inputs: TensorMap,
}

impl PredictRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.inputs.insert(name.into(), tensor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.inputs.get(name)
    }
}

/// Outbound prediction response: named output tensors.
#[derive(Debug, Clone, Default)]
pub struct PredictResponse {
    pub outputs: TensorMap,
}

impl PredictResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.outputs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }
}
