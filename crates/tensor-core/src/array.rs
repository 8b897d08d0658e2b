// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dense, materialised array data.

use crate::{DType, Element, TensorError};
use std::ops::Range;

/// An owned, n-dimensional array stored in contiguous memory.
///
/// `Array` is what [`crate::Tensor::compute`] produces and what eager
/// tensors wrap. Every dimension is concrete.
///
/// # Memory Layout
/// Data is stored in row-major (C) order as a flat little-endian byte
/// buffer. Typed access goes through [`to_vec`](Array::to_vec) and
/// [`item`](Array::item).
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    dims: Vec<usize>,
    dtype: DType,
    data: Vec<u8>,
}

impl Array {
    /// Creates an array from typed values.
    ///
    /// Returns [`TensorError::Shape`] if `values.len()` does not match the
    /// element count implied by `dims`.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Array;
    /// let a = Array::from_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap();
    /// assert_eq!(a.dims(), &[2, 2]);
    /// assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
    /// ```
    pub fn from_vec<T: Element>(dims: &[usize], values: Vec<T>) -> Result<Self, TensorError> {
        let expected: usize = dims.iter().product();
        if values.len() != expected {
            return Err(TensorError::shape(format!(
                "{} values cannot fill shape {dims:?} ({expected} elements)",
                values.len()
            )));
        }
        Ok(Self {
            dims: dims.to_vec(),
            dtype: T::DTYPE,
            data: encode(&values),
        })
    }

    /// Creates a 1-D array.
    pub fn vector<T: Element>(values: Vec<T>) -> Self {
        Self {
            dims: vec![values.len()],
            dtype: T::DTYPE,
            data: encode(&values),
        }
    }

    /// Creates a rank-0 array holding a single value.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            dims: vec![],
            dtype: T::DTYPE,
            data: encode(&[value]),
        }
    }

    /// Creates a 2-D array from nested rows.
    ///
    /// Returns [`TensorError::Shape`] if the rows are not all the same length.
    pub fn from_rows<T: Element>(rows: Vec<Vec<T>>) -> Result<Self, TensorError> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(TensorError::shape(format!(
                "data is not rectangular: row {i} has {} elements, row 0 has {width}",
                row.len()
            )));
        }
        let dims = [rows.len(), width];
        let values: Vec<T> = rows.into_iter().flatten().collect();
        Self::from_vec(&dims, values)
    }

    /// Creates an array filled with zero bytes.
    pub fn zeros(dims: &[usize], dtype: DType) -> Self {
        let size = dims.iter().product::<usize>() * dtype.size_bytes();
        Self {
            dims: dims.to_vec(),
            dtype,
            data: vec![0u8; size],
        }
    }

    /// Creates an array from raw little-endian bytes.
    ///
    /// Returns an error if the buffer size does not match `dims` and `dtype`.
    pub fn from_bytes(dims: &[usize], dtype: DType, data: Vec<u8>) -> Result<Self, TensorError> {
        let expected = dims.iter().product::<usize>() * dtype.size_bytes();
        if data.len() != expected {
            return Err(TensorError::shape(format!(
                "buffer of {} bytes does not match {dims:?} {dtype} ({expected} bytes)",
                data.len()
            )));
        }
        Ok(Self {
            dims: dims.to_vec(),
            dtype,
            data,
        })
    }

    /// Returns the concrete dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the element type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements (1 for a scalar).
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the size of the leading dimension, or `None` for a scalar.
    pub fn leading_dim(&self) -> Option<usize> {
        self.dims.first().copied()
    }

    /// Returns the raw byte slice backing this array.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the array and returns its byte buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Returns the memory footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Bytes occupied by one row (one step along axis 0).
    pub fn row_bytes(&self) -> usize {
        self.dims.iter().skip(1).product::<usize>() * self.dtype.size_bytes()
    }

    /// Decodes the elements as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, TensorError> {
        self.expect_dtype::<T>("to_vec")?;
        Ok(self
            .data
            .chunks_exact(self.dtype.size_bytes())
            .map(T::read_le)
            .collect())
    }

    /// Returns the single element of a one-element array.
    pub fn item<T: Element>(&self) -> Result<T, TensorError> {
        self.expect_dtype::<T>("item")?;
        if self.num_elements() != 1 {
            return Err(TensorError::shape(format!(
                "item() needs exactly one element, array has shape {:?}",
                self.dims
            )));
        }
        Ok(T::read_le(&self.data))
    }

    /// Copies a contiguous range of rows into a new array.
    pub fn rows(&self, rows: Range<usize>) -> Result<Array, TensorError> {
        let n = self
            .leading_dim()
            .ok_or(TensorError::NotIndexable { op: "rows" })?;
        if rows.start > rows.end || rows.end > n {
            return Err(TensorError::IndexOutOfBounds {
                axis: 0,
                index: rows.end as isize,
                size: n,
            });
        }
        let rb = self.row_bytes();
        let mut dims = self.dims.clone();
        dims[0] = rows.len();
        Ok(Array {
            dims,
            dtype: self.dtype,
            data: self.data[rows.start * rb..rows.end * rb].to_vec(),
        })
    }

    /// Splits the array along axis 0 into one array per row.
    pub fn split_rows(&self) -> Result<Vec<Array>, TensorError> {
        let n = self
            .leading_dim()
            .ok_or(TensorError::NotIndexable { op: "split_rows" })?;
        let rb = self.row_bytes();
        let dims = self.dims[1..].to_vec();
        Ok((0..n)
            .map(|i| Array {
                dims: dims.clone(),
                dtype: self.dtype,
                data: self.data[i * rb..(i + 1) * rb].to_vec(),
            })
            .collect())
    }

    /// Concatenates arrays along axis 0.
    ///
    /// All parts must share dtype, rank and trailing dimensions.
    pub fn concat_rows(parts: &[Array]) -> Result<Array, TensorError> {
        let first = parts
            .first()
            .ok_or_else(|| TensorError::shape("cannot concatenate zero arrays"))?;
        if first.ndim() == 0 {
            return Err(TensorError::NotIndexable { op: "concat_rows" });
        }
        let mut rows = 0;
        let mut data = Vec::with_capacity(parts.iter().map(Array::size_bytes).sum());
        for part in parts {
            if part.dtype != first.dtype {
                return Err(TensorError::DTypeMismatch {
                    op: "concat_rows",
                    expected: first.dtype,
                    actual: part.dtype,
                });
            }
            if part.ndim() != first.ndim() || part.dims[1..] != first.dims[1..] {
                return Err(TensorError::shape(format!(
                    "cannot concatenate {:?} onto rows of {:?}",
                    part.dims,
                    &first.dims[1..]
                )));
            }
            rows += part.dims[0];
            data.extend_from_slice(&part.data);
        }
        let mut dims = first.dims.clone();
        dims[0] = rows;
        Ok(Array {
            dims,
            dtype: first.dtype,
            data,
        })
    }

    /// Stacks equally shaped arrays along a new leading axis.
    pub fn stack(parts: &[Array]) -> Result<Array, TensorError> {
        let first = parts
            .first()
            .ok_or_else(|| TensorError::shape("cannot stack zero arrays"))?;
        let mut data = Vec::with_capacity(first.size_bytes() * parts.len());
        for part in parts {
            if part.dtype != first.dtype {
                return Err(TensorError::DTypeMismatch {
                    op: "stack",
                    expected: first.dtype,
                    actual: part.dtype,
                });
            }
            if part.dims != first.dims {
                return Err(TensorError::shape(format!(
                    "cannot stack {:?} with {:?}",
                    part.dims, first.dims
                )));
            }
            data.extend_from_slice(&part.data);
        }
        let mut dims = Vec::with_capacity(first.ndim() + 1);
        dims.push(parts.len());
        dims.extend_from_slice(&first.dims);
        Ok(Array {
            dims,
            dtype: first.dtype,
            data,
        })
    }

    fn expect_dtype<T: Element>(&self, op: &'static str) -> Result<(), TensorError> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::DTypeMismatch {
                op,
                expected: self.dtype,
                actual: T::DTYPE,
            });
        }
        Ok(())
    }
}

fn encode<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::DTYPE.size_bytes());
    for &v in values {
        v.write_le(&mut out);
    }
    out
}
