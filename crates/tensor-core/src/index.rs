// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Index expressions and their composition.
//!
//! A view stores, per axis of its base, the chain of [`AxisIndex`] operations
//! applied to that axis. Chains are resolved against concrete axis lengths
//! only when needed, folding into a single [`AxisSel`] per axis:
//!
//! ```text
//! t[2:8][1:3]   ──►  chain [2:8, 1:3]  ──►  Span { start: 3, len: 2, step: 1 }
//! t[::2][1]     ──►  chain [::2, 1]    ──►  Pick(2)
//! ```
//!
//! Because every chain folds to one selection, a slice of a slice reads
//! exactly the same elements as the equivalent single slice.

use crate::{Array, TensorError};
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

/// A half-open range along one axis, Python style.
///
/// `start` and `stop` may be negative (counted from the end) and are
/// clamped to the axis length. `step` must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpec {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: usize,
}

impl SliceSpec {
    /// A slice over `start..stop` with step 1.
    pub fn new(start: Option<isize>, stop: Option<isize>) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    /// The full range (`..`).
    pub fn full() -> Self {
        Self::new(None, None)
    }

    /// Returns a copy with the given step.
    pub fn step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Resolves against an axis of length `n`, returning `(start, len)`.
    pub fn resolve(&self, n: usize) -> Result<(usize, usize), TensorError> {
        if self.step == 0 {
            return Err(TensorError::InvalidSlice {
                detail: "slice step cannot be zero".into(),
            });
        }
        let clamp = |v: isize| -> usize {
            if v < 0 {
                (n as isize + v).max(0) as usize
            } else {
                (v as usize).min(n)
            }
        };
        let start = self.start.map_or(0, clamp);
        let stop = self.stop.map_or(n, clamp);
        let len = if stop > start {
            (stop - start).div_ceil(self.step)
        } else {
            0
        };
        Ok((start, len))
    }

    /// Returns `true` if this slice selects a whole axis of any length.
    pub fn is_full(&self) -> bool {
        self.step == 1 && matches!(self.start, None | Some(0)) && self.stop.is_none()
    }
}

/// One index expression along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisIndex {
    /// A single position; the axis is removed from the result.
    At(isize),
    /// A range of positions; the axis is kept.
    Range(SliceSpec),
}

macro_rules! impl_range_from {
    ($($ty:ty),*) => {
        $(
            impl From<Range<$ty>> for SliceSpec {
                fn from(r: Range<$ty>) -> Self {
                    SliceSpec::new(Some(r.start as isize), Some(r.end as isize))
                }
            }

            impl From<RangeFrom<$ty>> for SliceSpec {
                fn from(r: RangeFrom<$ty>) -> Self {
                    SliceSpec::new(Some(r.start as isize), None)
                }
            }

            impl From<RangeTo<$ty>> for SliceSpec {
                fn from(r: RangeTo<$ty>) -> Self {
                    SliceSpec::new(None, Some(r.end as isize))
                }
            }

            impl From<$ty> for AxisIndex {
                fn from(i: $ty) -> Self {
                    AxisIndex::At(i as isize)
                }
            }

            impl From<Range<$ty>> for AxisIndex {
                fn from(r: Range<$ty>) -> Self {
                    AxisIndex::Range(r.into())
                }
            }

            impl From<RangeFrom<$ty>> for AxisIndex {
                fn from(r: RangeFrom<$ty>) -> Self {
                    AxisIndex::Range(r.into())
                }
            }

            impl From<RangeTo<$ty>> for AxisIndex {
                fn from(r: RangeTo<$ty>) -> Self {
                    AxisIndex::Range(r.into())
                }
            }
        )*
    };
}

impl_range_from!(i32, i64, isize, usize);

impl From<RangeFull> for SliceSpec {
    fn from(_: RangeFull) -> Self {
        SliceSpec::full()
    }
}

impl From<RangeFull> for AxisIndex {
    fn from(_: RangeFull) -> Self {
        AxisIndex::Range(SliceSpec::full())
    }
}

impl From<SliceSpec> for AxisIndex {
    fn from(s: SliceSpec) -> Self {
        AxisIndex::Range(s)
    }
}

/// Builds an array of [`AxisIndex`] values from integers and ranges.
///
/// # Examples
/// ```
/// use tensor_core::{s, Array, Tensor};
/// let t = Tensor::from_array(Array::from_vec(&[3, 3], (1..=9).collect::<Vec<i32>>()).unwrap());
/// let v = t.slice(s![1..3, 1..3]).unwrap();
/// assert_eq!(v.compute().unwrap().to_vec::<i32>().unwrap(), vec![5, 6, 8, 9]);
/// ```
#[macro_export]
macro_rules! s {
    ($($idx:expr),* $(,)?) => {
        [$($crate::AxisIndex::from($idx)),*]
    };
}

/// The resolved selection along one base axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSel {
    /// A single position; the axis does not appear in the output.
    Pick(usize),
    /// `len` positions starting at `start`, `step` apart.
    Span { start: usize, len: usize, step: usize },
}

impl AxisSel {
    /// Selects an entire axis of length `n`.
    pub fn full(n: usize) -> Self {
        AxisSel::Span {
            start: 0,
            len: n,
            step: 1,
        }
    }

    /// The contiguous range of base positions this selection touches.
    pub fn covering_range(&self) -> Range<usize> {
        match *self {
            AxisSel::Pick(i) => i..i + 1,
            AxisSel::Span { len: 0, start, .. } => start..start,
            AxisSel::Span { start, len, step } => start..start + (len - 1) * step + 1,
        }
    }

    /// Re-expresses the selection relative to a base offset.
    pub fn shifted_down(&self, offset: usize) -> Self {
        match *self {
            AxisSel::Pick(i) => AxisSel::Pick(i - offset),
            AxisSel::Span { start, len, step } => AxisSel::Span {
                start: start.saturating_sub(offset),
                len,
                step,
            },
        }
    }

    /// Output length, or `None` if the axis is dropped.
    pub fn kept_len(&self) -> Option<usize> {
        match *self {
            AxisSel::Pick(_) => None,
            AxisSel::Span { len, .. } => Some(len),
        }
    }
}

/// Folds a chain of index operations into one selection over an axis of
/// length `n`.
pub fn resolve_chain(chain: &[AxisIndex], axis: usize, n: usize) -> Result<AxisSel, TensorError> {
    let mut sel = AxisSel::full(n);
    for ix in chain {
        let AxisSel::Span { start, len, step } = sel else {
            return Err(TensorError::InvalidSlice {
                detail: format!("axis {axis} was already indexed by a single position"),
            });
        };
        sel = match *ix {
            AxisIndex::At(i) => {
                let j = if i < 0 { len as isize + i } else { i };
                if j < 0 || j as usize >= len {
                    return Err(TensorError::IndexOutOfBounds {
                        axis,
                        index: i,
                        size: len,
                    });
                }
                AxisSel::Pick(start + j as usize * step)
            }
            AxisIndex::Range(spec) => {
                let (s, l) = spec.resolve(len)?;
                AxisSel::Span {
                    start: start + s * step,
                    len: l,
                    step: step * spec.step,
                }
            }
        };
    }
    Ok(sel)
}

/// The composed index chains of a view, one chain per base axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSpec {
    chains: Vec<Vec<AxisIndex>>,
}

impl ViewSpec {
    /// The identity view over a base of the given rank.
    pub fn identity(rank: usize) -> Self {
        Self {
            chains: vec![Vec::new(); rank],
        }
    }

    /// The per-axis chains.
    pub fn chains(&self) -> &[Vec<AxisIndex>] {
        &self.chains
    }

    /// Base axes still present in the output, in order.
    pub fn kept_axes(&self) -> Vec<usize> {
        (0..self.chains.len())
            .filter(|&a| !self.chains[a].iter().any(|ix| matches!(ix, AxisIndex::At(_))))
            .collect()
    }

    /// Applies one indexing step. The k-th index addresses the k-th axis
    /// still present in the output.
    pub fn push(&mut self, step: &[AxisIndex]) -> Result<(), TensorError> {
        let kept = self.kept_axes();
        if step.len() > kept.len() {
            return Err(TensorError::TooManyIndices {
                given: step.len(),
                rank: kept.len(),
            });
        }
        for (ix, &axis) in step.iter().zip(&kept) {
            self.chains[axis].push(*ix);
        }
        Ok(())
    }

    /// Indexes the first axis still present in the output. No-op if every
    /// axis has already been indexed away.
    pub fn push_leading(&mut self, ix: AxisIndex) {
        if let Some(axis) = self.kept_axes().first().copied() {
            self.chains[axis].push(ix);
        }
    }

    /// Resolves every chain against concrete base dimensions.
    pub fn resolve(&self, dims: &[usize]) -> Result<Vec<AxisSel>, TensorError> {
        if dims.len() != self.chains.len() {
            return Err(TensorError::shape(format!(
                "view of rank {} applied to data of shape {dims:?}",
                self.chains.len()
            )));
        }
        self.chains
            .iter()
            .zip(dims)
            .enumerate()
            .map(|(axis, (chain, &n))| resolve_chain(chain, axis, n))
            .collect()
    }

    /// A view restricted to base axes `from..`, used for per-row selections
    /// of ragged data.
    pub fn tail(&self, from: usize) -> ViewSpec {
        ViewSpec {
            chains: self.chains[from..].to_vec(),
        }
    }
}

/// Copies the selected elements of `array` into a new array.
pub fn gather(array: &Array, sels: &[AxisSel]) -> Result<Array, TensorError> {
    if sels.len() != array.ndim() {
        return Err(TensorError::shape(format!(
            "selection of rank {} applied to array of shape {:?}",
            sels.len(),
            array.dims()
        )));
    }
    let out_dims: Vec<usize> = sels.iter().filter_map(AxisSel::kept_len).collect();
    if sels
        .iter()
        .zip(array.dims())
        .all(|(s, &n)| *s == AxisSel::full(n))
    {
        return Ok(array.clone());
    }

    let esize = array.dtype().size_bytes();
    let strides = crate::shape::strides(array.dims());
    let out_elems: usize = out_dims.iter().product();
    let mut out = Vec::with_capacity(out_elems * esize);
    gather_into(array.as_bytes(), esize, &strides, sels, 0, 0, &mut out);
    Array::from_bytes(&out_dims, array.dtype(), out)
}

fn gather_into(
    data: &[u8],
    esize: usize,
    strides: &[usize],
    sels: &[AxisSel],
    axis: usize,
    offset: usize,
    out: &mut Vec<u8>,
) {
    if axis == sels.len() {
        out.extend_from_slice(&data[offset * esize..(offset + 1) * esize]);
        return;
    }
    match sels[axis] {
        AxisSel::Pick(i) => {
            gather_into(data, esize, strides, sels, axis + 1, offset + i * strides[axis], out);
        }
        AxisSel::Span { start, len, step } => {
            if axis + 1 == sels.len() && step == 1 {
                let from = (offset + start) * esize;
                out.extend_from_slice(&data[from..from + len * esize]);
                return;
            }
            for j in 0..len {
                let at = offset + (start + j * step) * strides[axis];
                gather_into(data, esize, strides, sels, axis + 1, at, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Array {
        Array::from_vec(&[3, 3], (1..=9).collect::<Vec<i32>>()).unwrap()
    }

    #[test]
    fn test_slice_resolve_python_semantics() {
        assert_eq!(SliceSpec::new(Some(2), Some(4)).resolve(5).unwrap(), (2, 2));
        assert_eq!(SliceSpec::new(None, Some(10)).resolve(5).unwrap(), (0, 5));
        assert_eq!(SliceSpec::new(Some(-2), None).resolve(5).unwrap(), (3, 2));
        assert_eq!(SliceSpec::new(Some(4), Some(1)).resolve(5).unwrap(), (4, 0));
        assert_eq!(SliceSpec::full().step(2).resolve(5).unwrap(), (0, 3));
        assert!(SliceSpec::full().step(0).resolve(5).is_err());
    }

    #[test]
    fn test_chain_composes() {
        let chain = [AxisIndex::from(2..8), AxisIndex::from(1..3)];
        assert_eq!(
            resolve_chain(&chain, 0, 10).unwrap(),
            AxisSel::Span { start: 3, len: 2, step: 1 }
        );

        let chain = [AxisIndex::Range(SliceSpec::full().step(2)), AxisIndex::At(1)];
        assert_eq!(resolve_chain(&chain, 0, 10).unwrap(), AxisSel::Pick(2));

        let chain = [AxisIndex::At(-1)];
        assert_eq!(resolve_chain(&chain, 0, 5).unwrap(), AxisSel::Pick(4));
    }

    #[test]
    fn test_chain_out_of_bounds() {
        let chain = [AxisIndex::from(0..2), AxisIndex::At(2)];
        assert!(matches!(
            resolve_chain(&chain, 0, 5),
            Err(TensorError::IndexOutOfBounds { size: 2, .. })
        ));
    }

    #[test]
    fn test_view_spec_addresses_kept_axes() {
        let mut spec = ViewSpec::identity(3);
        spec.push(&[AxisIndex::At(1)]).unwrap();
        assert_eq!(spec.kept_axes(), vec![1, 2]);
        spec.push(&[AxisIndex::from(..2), AxisIndex::At(0)]).unwrap();
        assert_eq!(spec.kept_axes(), vec![1]);
        assert!(spec.push(&s![0, 0]).is_err());
    }

    #[test]
    fn test_gather_block() {
        let sels = [
            AxisSel::Span { start: 1, len: 2, step: 1 },
            AxisSel::Span { start: 1, len: 2, step: 1 },
        ];
        let out = gather(&grid(), &sels).unwrap();
        assert_eq!(out.dims(), &[2, 2]);
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![5, 6, 8, 9]);
    }

    #[test]
    fn test_gather_pick_and_step() {
        let sels = [AxisSel::Span { start: 0, len: 2, step: 2 }, AxisSel::Pick(2)];
        let out = gather(&grid(), &sels).unwrap();
        assert_eq!(out.dims(), &[2]);
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![3, 9]);
    }

    #[test]
    fn test_covering_range() {
        assert_eq!(AxisSel::Pick(3).covering_range(), 3..4);
        assert_eq!(AxisSel::Span { start: 1, len: 3, step: 2 }.covering_range(), 1..6);
        assert_eq!(AxisSel::Span { start: 4, len: 0, step: 1 }.covering_range(), 4..4);
    }

    #[test]
    fn test_macro_mixed_forms() {
        let idx = s![1, 2.., ..3, .., -1];
        assert_eq!(idx[0], AxisIndex::At(1));
        assert_eq!(idx[1], AxisIndex::Range(SliceSpec::new(Some(2), None)));
        assert_eq!(idx[2], AxisIndex::Range(SliceSpec::new(None, Some(3))));
        assert_eq!(idx[3], AxisIndex::Range(SliceSpec::full()));
        assert_eq!(idx[4], AxisIndex::At(-1));
    }
}
