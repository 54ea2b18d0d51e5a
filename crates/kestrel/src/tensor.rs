//! Dense host tensor storage backing workspace variables.

use crate::error::{Error, Result};
use crate::place::Precision;

/// Simple dense tensor: dims, precision tag, and a flat byte payload.
///
/// Host kernels read and write `f32` views; device kernels treat the payload
/// as opaque staging bytes for transfers.
#[derive(Debug, Clone, Default)]
pub struct Tensor {
    dims: Vec<usize>,
    precision: Option<Precision>,
    data: Vec<u8>,
    persistable: bool,
}

impl Tensor {
    pub fn new() -> Self {
        Tensor::default()
    }

    /// Constructs an `f32` tensor, validating the payload length against dims.
    pub fn from_f32(dims: Vec<usize>, values: &[f32]) -> Result<Self> {
        let mut tensor = Tensor::new();
        tensor.copy_from_f32(dims, values)?;
        Ok(tensor)
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn precision(&self) -> Option<Precision> {
        self.precision
    }

    pub fn set_precision(&mut self, precision: Precision) {
        self.precision = Some(precision);
    }

    pub fn persistable(&self) -> bool {
        self.persistable
    }

    pub fn set_persistable(&mut self, persistable: bool) {
        self.persistable = persistable;
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Resizes the tensor. The payload is preserved when the element count is
    /// unchanged (in-place operands) and zero-filled otherwise.
    pub fn resize(&mut self, dims: Vec<usize>) {
        let elements: usize = dims.iter().product();
        self.dims = dims;
        if self.data.len() != elements * 4 {
            self.data.clear();
            self.data.resize(elements * 4, 0);
        }
    }

    /// Returns the payload decoded as `f32` values.
    pub fn f32_data(&self) -> Result<Vec<f32>> {
        if self.data.len() % 4 != 0 {
            return Err(Error::workspace(format!(
                "tensor payload of {} bytes is not f32-aligned",
                self.data.len()
            )));
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Replaces dims and payload with the given `f32` values.
    pub fn copy_from_f32(&mut self, dims: Vec<usize>, values: &[f32]) -> Result<()> {
        let elements: usize = dims.iter().product();
        if elements != values.len() {
            return Err(Error::workspace(format!(
                "tensor payload length ({}) does not match dims {:?}",
                values.len(),
                dims
            )));
        }
        self.dims = dims;
        self.precision = Some(Precision::Float);
        self.data.clear();
        self.data.reserve(values.len() * 4);
        for value in values {
            self.data.extend_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    /// Copies dims, precision, and payload from `other`.
    ///
    /// Persistability is a property of the destination variable and is left
    /// untouched.
    pub fn copy_data_from(&mut self, other: &Tensor) {
        self.dims = other.dims.clone();
        self.precision = other.precision;
        self.data = other.data.clone();
    }

    /// Truthiness of the first scalar, used for control-flow conditions.
    /// An empty tensor reads as `false`.
    pub fn first_scalar_is_true(&self) -> bool {
        self.f32_data()
            .ok()
            .and_then(|values| values.first().copied())
            .map(|value| value != 0.0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_round_trip_preserves_values() {
        let tensor = Tensor::from_f32(vec![2, 2], &[1.0, -2.5, 0.0, 4.125]).unwrap();
        assert_eq!(tensor.dims(), &[2, 2]);
        assert_eq!(tensor.f32_data().unwrap(), vec![1.0, -2.5, 0.0, 4.125]);
    }

    #[test]
    fn length_mismatch_is_a_workspace_error() {
        let err = Tensor::from_f32(vec![3], &[1.0]).unwrap_err();
        assert!(matches!(err, Error::Workspace(_)));
    }

    #[test]
    fn empty_tensor_condition_reads_false() {
        assert!(!Tensor::new().first_scalar_is_true());
        let truthy = Tensor::from_f32(vec![1], &[2.0]).unwrap();
        assert!(truthy.first_scalar_is_true());
    }
}
