// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors and dimension utilities.
//!
//! A [`Shape`] may contain [`Dim::Unknown`] entries for dimensions whose
//! size is only known once the data has been materialised (for example the
//! row count of a generated tensor). Unknown dimensions are written as `-1`
//! wherever shapes are serialised.

use crate::TensorError;
use std::fmt;

/// A single dimension of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Dim {
    /// A concrete size.
    Fixed(usize),
    /// A size resolved only after materialisation (`-1`).
    Unknown,
}

impl Dim {
    /// Returns the concrete size, if known.
    pub fn fixed(self) -> Option<usize> {
        match self {
            Dim::Fixed(n) => Some(n),
            Dim::Unknown => None,
        }
    }

    /// Returns `true` for [`Dim::Unknown`].
    pub fn is_unknown(self) -> bool {
        matches!(self, Dim::Unknown)
    }
}

impl From<Dim> for i64 {
    fn from(dim: Dim) -> Self {
        match dim {
            Dim::Fixed(n) => n as i64,
            Dim::Unknown => -1,
        }
    }
}

impl TryFrom<i64> for Dim {
    type Error = TensorError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Dim::Unknown),
            n if n >= 0 => Ok(Dim::Fixed(n as usize)),
            n => Err(TensorError::Shape {
                detail: format!("invalid dimension {n}: expected a size or -1"),
            }),
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{n}"),
            Dim::Unknown => write!(f, "-1"),
        }
    }
}

/// Describes the dimensionality of a [`crate::Tensor`].
///
/// Shapes are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<Dim>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    pub fn new(dims: Vec<Dim>) -> Self {
        Self { dims }
    }

    /// Creates a fully resolved shape.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::fixed(&[2, 3, 4]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), Some(24));
    /// ```
    pub fn fixed(dims: &[usize]) -> Self {
        Self {
            dims: dims.iter().map(|&d| Dim::Fixed(d)).collect(),
        }
    }

    /// Creates a shape from signed sizes where `-1` marks an unknown dimension.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::from_signed(&[-1, 5]).unwrap();
    /// assert!(!s.is_resolved());
    /// assert_eq!(s.to_string(), "[-1, 5]");
    /// ```
    pub fn from_signed(dims: &[i64]) -> Result<Self, TensorError> {
        let dims = dims
            .iter()
            .map(|&d| Dim::try_from(d))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { dims })
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// Returns a specific dimension, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<Dim> {
        self.dims.get(index).copied()
    }

    /// Returns `true` when no dimension is unknown.
    pub fn is_resolved(&self) -> bool {
        self.dims.iter().all(|d| !d.is_unknown())
    }

    /// Returns the concrete sizes if every dimension is known.
    pub fn resolved(&self) -> Option<Vec<usize>> {
        self.dims.iter().map(|d| d.fixed()).collect()
    }

    /// Returns the total number of elements, if every dimension is known.
    ///
    /// For a scalar shape (rank 0), returns 1.
    pub fn num_elements(&self) -> Option<usize> {
        self.resolved().map(|dims| dims.iter().product())
    }

    /// Returns the dimensions as signed sizes, `-1` for unknown.
    pub fn to_signed(&self) -> Vec<i64> {
        self.dims.iter().map(|&d| i64::from(d)).collect()
    }

    /// Returns a shape with the leading dimension replaced.
    pub fn with_leading(&self, dim: Dim) -> Shape {
        let mut dims = self.dims.clone();
        if let Some(first) = dims.first_mut() {
            *first = dim;
        }
        Shape { dims }
    }

    /// Returns `true` if `dims` is an instance of this shape: equal rank and
    /// every fixed dimension matches.
    pub fn admits(&self, dims: &[usize]) -> bool {
        self.dims.len() == dims.len()
            && self
                .dims
                .iter()
                .zip(dims)
                .all(|(d, &n)| d.fixed().map_or(true, |f| f == n))
    }
}

/// Computes row-major (C-order) element strides for concrete dimensions.
///
/// The stride for dimension `i` is the number of elements to skip in the
/// flat buffer to advance one step along that dimension.
pub fn strides(dims: &[usize]) -> Vec<usize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![0usize; rank];
    strides[rank - 1] = 1;
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

/// Convenience: `Shape::from(vec![2, 3])`.
impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::fixed(&dims)
    }
}

/// Convenience: `Shape::from(&[2, 3][..])`.
impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::fixed(dims)
    }
}
