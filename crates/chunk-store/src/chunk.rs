// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Chunk file encoding.
//!
//! A chunk is a SafeTensors file holding a contiguous row range of one
//! field:
//!
//! - dense:  `"data"`   `[rows, ...]` in the field's dtype
//! - ragged: `"values"` `[bytes]` u8, every row's elements back to back
//!           `"shapes"` `[rows, row_rank]` i64, the shape of each row
//!
//! The header metadata records the layout and the element dtype, so a
//! ragged chunk can be decoded without the manifest.

use crate::StorageError;
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use std::collections::HashMap;
use tensor_core::{Array, Block, DType, Layout};

const DATA: &str = "data";
const VALUES: &str = "values";
const SHAPES: &str = "shapes";
const META_LAYOUT: &str = "layout";
const META_DTYPE: &str = "dtype";

/// Encodes a dense row block.
pub fn encode_dense(array: &Array) -> Result<Vec<u8>, StorageError> {
    let view = TensorView::new(
        to_safetensors(array.dtype()),
        array.dims().to_vec(),
        array.as_bytes(),
    )
    .map_err(|e| StorageError::chunk(DATA, e))?;
    serialize(vec![(DATA, view)], Layout::Dense, array.dtype())
}

/// Encodes ragged rows of element type `dtype`.
pub fn encode_ragged(dtype: DType, rows: &[Array]) -> Result<Vec<u8>, StorageError> {
    let rank = rows.first().map_or(0, Array::ndim);
    let mut values = Vec::with_capacity(rows.iter().map(Array::size_bytes).sum());
    let mut shapes = Vec::with_capacity(rows.len() * rank * 8);
    for row in rows {
        if row.dtype() != dtype || row.ndim() != rank {
            return Err(StorageError::chunk(
                VALUES,
                format!(
                    "ragged row {:?} {} does not match rank {rank} {dtype}",
                    row.dims(),
                    row.dtype()
                ),
            ));
        }
        values.extend_from_slice(row.as_bytes());
        for &d in row.dims() {
            shapes.extend_from_slice(&(d as i64).to_le_bytes());
        }
    }

    let values_view = TensorView::new(Dtype::U8, vec![values.len()], &values)
        .map_err(|e| StorageError::chunk(VALUES, e))?;
    let shapes_view = TensorView::new(Dtype::I64, vec![rows.len(), rank], &shapes)
        .map_err(|e| StorageError::chunk(SHAPES, e))?;
    serialize(
        vec![(VALUES, values_view), (SHAPES, shapes_view)],
        Layout::Ragged,
        dtype,
    )
}

/// Decodes a chunk, checking it against the expected dtype and layout.
pub fn decode(
    bytes: &[u8],
    object: &str,
    dtype: DType,
    layout: Layout,
) -> Result<Block, StorageError> {
    let tensors = SafeTensors::deserialize(bytes)
        .map_err(|e| StorageError::chunk(object, format!("SafeTensors parse error: {e}")))?;

    match layout {
        Layout::Dense => {
            let view = tensors
                .tensor(DATA)
                .map_err(|e| StorageError::chunk(object, e))?;
            let actual = from_safetensors(view.dtype()).ok_or_else(|| {
                StorageError::chunk(object, format!("unsupported dtype {:?}", view.dtype()))
            })?;
            if actual != dtype {
                return Err(StorageError::chunk(
                    object,
                    format!("holds {actual}, expected {dtype}"),
                ));
            }
            let array = Array::from_bytes(view.shape(), dtype, view.data().to_vec())?;
            Ok(Block::Dense(array))
        }
        Layout::Ragged => {
            let (_, metadata) = SafeTensors::read_metadata(bytes)
                .map_err(|e| StorageError::chunk(object, e))?;
            let recorded = metadata
                .metadata()
                .as_ref()
                .and_then(|m| m.get(META_DTYPE))
                .and_then(|s| DType::parse(s));
            if recorded != Some(dtype) {
                return Err(StorageError::chunk(
                    object,
                    format!("records dtype {recorded:?}, expected {dtype}"),
                ));
            }

            let values = tensors
                .tensor(VALUES)
                .map_err(|e| StorageError::chunk(object, e))?;
            let shapes = tensors
                .tensor(SHAPES)
                .map_err(|e| StorageError::chunk(object, e))?;
            let &[rows, rank] = shapes.shape() else {
                return Err(StorageError::chunk(object, "'shapes' must be 2-D"));
            };
            if shapes.dtype() != Dtype::I64 || values.dtype() != Dtype::U8 {
                return Err(StorageError::chunk(object, "unexpected ragged tensor dtypes"));
            }

            let dims: Vec<usize> = shapes
                .data()
                .chunks_exact(8)
                .map(|b| {
                    let mut le = [0u8; 8];
                    le.copy_from_slice(b);
                    i64::from_le_bytes(le).max(0) as usize
                })
                .collect();
            if dims.len() != rows * rank {
                return Err(StorageError::chunk(object, "'shapes' is truncated"));
            }
            let data = values.data();
            let mut offset = 0;
            let mut out = Vec::with_capacity(rows);
            for i in 0..rows {
                let row_dims = &dims[i * rank..(i + 1) * rank];
                let end = offset + row_dims.iter().product::<usize>() * dtype.size_bytes();
                if end > data.len() {
                    return Err(StorageError::chunk(object, "ragged values are truncated"));
                }
                out.push(Array::from_bytes(row_dims, dtype, data[offset..end].to_vec())?);
                offset = end;
            }
            if offset != data.len() {
                return Err(StorageError::chunk(
                    object,
                    format!("ragged values hold {} bytes, rows need {offset}", data.len()),
                ));
            }
            Ok(Block::Ragged(out))
        }
    }
}

fn serialize(
    tensors: Vec<(&str, TensorView<'_>)>,
    layout: Layout,
    dtype: DType,
) -> Result<Vec<u8>, StorageError> {
    let metadata = HashMap::from([
        (META_LAYOUT.to_string(), layout.as_str().to_string()),
        (META_DTYPE.to_string(), dtype.as_str().to_string()),
    ]);
    safetensors::tensor::serialize(tensors, &Some(metadata))
        .map_err(|e| StorageError::chunk(layout.as_str(), e))
}

/// Converts our [`DType`] to a SafeTensors `Dtype`.
fn to_safetensors(dtype: DType) -> Dtype {
    match dtype {
        DType::Bool => Dtype::BOOL,
        DType::UInt8 => Dtype::U8,
        DType::Int8 => Dtype::I8,
        DType::UInt16 => Dtype::U16,
        DType::Int16 => Dtype::I16,
        DType::UInt32 => Dtype::U32,
        DType::Int32 => Dtype::I32,
        DType::UInt64 => Dtype::U64,
        DType::Int64 => Dtype::I64,
        DType::Float32 => Dtype::F32,
        DType::Float64 => Dtype::F64,
    }
}

/// Converts a SafeTensors `Dtype` to our [`DType`].
fn from_safetensors(dtype: Dtype) -> Option<DType> {
    Some(match dtype {
        Dtype::BOOL => DType::Bool,
        Dtype::U8 => DType::UInt8,
        Dtype::I8 => DType::Int8,
        Dtype::U16 => DType::UInt16,
        Dtype::I16 => DType::Int16,
        Dtype::U32 => DType::UInt32,
        Dtype::I32 => DType::Int32,
        Dtype::U64 => DType::UInt64,
        Dtype::I64 => DType::Int64,
        Dtype::F32 => DType::Float32,
        Dtype::F64 => DType::Float64,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_chunk() {
        let a = Array::from_vec(&[2, 3], vec![1.5f32, 2.0, 3.0, 4.0, 5.0, 6.5]).unwrap();
        let bytes = encode_dense(&a).unwrap();
        let block = decode(&bytes, "c", DType::Float32, Layout::Dense).unwrap();
        assert_eq!(block, Block::Dense(a));
    }

    #[test]
    fn test_dense_zero_length_rows() {
        let a = Array::zeros(&[3, 0], DType::Int64);
        let bytes = encode_dense(&a).unwrap();
        let block = decode(&bytes, "c", DType::Int64, Layout::Dense).unwrap();
        assert_eq!(block, Block::Dense(a));
    }

    #[test]
    fn test_ragged_chunk() {
        let rows = vec![
            Array::vector(vec![5i32, 6, 7, 8]),
            Array::vector(Vec::<i32>::new()),
            Array::vector(vec![7i32, 8, 9]),
        ];
        let bytes = encode_ragged(DType::Int32, &rows).unwrap();
        let block = decode(&bytes, "c", DType::Int32, Layout::Ragged).unwrap();
        assert_eq!(block, Block::Ragged(rows));
    }

    #[test]
    fn test_ragged_scalar_rows() {
        let rows = vec![Array::scalar(1u8), Array::scalar(2u8)];
        let bytes = encode_ragged(DType::UInt8, &rows).unwrap();
        let block = decode(&bytes, "c", DType::UInt8, Layout::Ragged).unwrap();
        assert_eq!(block, Block::Ragged(rows));
    }

    #[test]
    fn test_dtype_mismatch_is_rejected() {
        let a = Array::vector(vec![1i32, 2]);
        let bytes = encode_dense(&a).unwrap();
        assert!(matches!(
            decode(&bytes, "c", DType::Float32, Layout::Dense),
            Err(StorageError::SafeTensors { .. })
        ));
        assert!(decode(b"garbage", "c", DType::Int32, Layout::Dense).is_err());
    }
}
