// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Declared shape/dtype templates for arrays produced at runtime.

use crate::{Array, DType, Shape, TensorError};

/// A shape template and element type that produced arrays must satisfy.
///
/// Template dimensions may be unknown (`-1`); those accept any size.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TensorSpec {
    pub shape: Shape,
    pub dtype: DType,
}

impl TensorSpec {
    /// Creates a spec from signed dims (`-1` = unknown).
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{DType, TensorSpec};
    /// let spec = TensorSpec::new(&[-1, 5], DType::Int32).unwrap();
    /// assert_eq!(spec.shape.to_signed(), vec![-1, 5]);
    /// ```
    pub fn new(dims: &[i64], dtype: DType) -> Result<Self, TensorError> {
        Ok(Self {
            shape: Shape::from_signed(dims)?,
            dtype,
        })
    }

    /// Checks that `array` has the declared dtype, rank and fixed dims.
    pub fn check(&self, name: &str, array: &Array) -> Result<(), TensorError> {
        if array.dtype() != self.dtype {
            return Err(TensorError::DTypeMismatch {
                op: "generator output",
                expected: self.dtype,
                actual: array.dtype(),
            });
        }
        if !self.shape.admits(array.dims()) {
            return Err(TensorError::shape(format!(
                "'{name}' has shape {:?}, declared {}",
                array.dims(),
                self.shape
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_accepts_unknown_dims() {
        let spec = TensorSpec::new(&[-1, 5], DType::Int32).unwrap();
        assert!(spec.check("arr", &Array::zeros(&[3, 5], DType::Int32)).is_ok());
        assert!(spec.check("arr", &Array::zeros(&[0, 5], DType::Int32)).is_ok());
    }

    #[test]
    fn test_check_rejects_fixed_dim_mismatch() {
        let spec = TensorSpec::new(&[-1, 5], DType::Int32).unwrap();
        let err = spec.check("arr", &Array::zeros(&[3, 4], DType::Int32));
        assert!(matches!(err, Err(TensorError::Shape { .. })));
    }

    #[test]
    fn test_check_rejects_dtype() {
        let spec = TensorSpec::new(&[-1], DType::Int32).unwrap();
        let err = spec.check("rra", &Array::zeros(&[3], DType::Float32));
        assert!(matches!(err, Err(TensorError::DTypeMismatch { .. })));
    }
}
