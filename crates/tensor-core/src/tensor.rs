// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The lazy tensor type.
//!
//! A [`Tensor`] is a cheap, immutable handle (`Arc`) to one of:
//!
//! ```text
//! Root ── Array      eager, wraps materialised data
//!      ── Ragged     one array per row, row shapes may differ
//!      ── Concat     axis-0 concatenation of other tensors
//!      ── Deferred   rows produced on demand by a RowSource
//! View ── (base root, composed ViewSpec)
//! ```
//!
//! Indexing never copies: it returns a `View` whose spec is the base's
//! spec with the new step folded in, so views never nest. `compute()`
//! reads from the base only the rows the view covers.

use crate::index::{gather, resolve_chain, AxisIndex, AxisSel, ViewSpec};
use crate::{Array, Block, DType, Dim, Layout, RowSource, Shape, TensorError};
use rayon::prelude::*;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// A named-shape, lazily computable array handle.
///
/// Cloning a `Tensor` clones the handle, not the data; use
/// [`Tensor::ptr_eq`] to test identity.
///
/// # Examples
/// ```
/// use tensor_core::{s, Array, Tensor};
/// let t = Tensor::from_array(Array::vector(vec![1i32, 2, 3, 4, 5]));
/// let view = t.slice(s![2..4]).unwrap();
/// assert_eq!(view.shape().to_signed(), vec![2]);
/// assert_eq!(view.compute().unwrap().to_vec::<i32>().unwrap(), vec![3, 4]);
/// ```
#[derive(Clone)]
pub struct Tensor {
    node: Arc<Node>,
}

#[derive(Clone)]
struct Node {
    shape: Shape,
    dtype: DType,
    layout: Layout,
    dtag: Option<String>,
    kind: Kind,
}

#[derive(Clone)]
enum Kind {
    Root(Root),
    View { base: Tensor, spec: ViewSpec },
}

#[derive(Clone)]
enum Root {
    Array(Array),
    Ragged(Arc<[Array]>),
    Concat(Vec<Tensor>),
    Deferred(Arc<dyn RowSource>),
}

impl Tensor {
    fn from_node(node: Node) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    /// Wraps materialised data. Shape and dtype are taken from the array.
    pub fn from_array(array: Array) -> Self {
        Self::from_node(Node {
            shape: Shape::fixed(array.dims()),
            dtype: array.dtype(),
            layout: Layout::Dense,
            dtag: None,
            kind: Kind::Root(Root::Array(array)),
        })
    }

    /// Wraps one array per row. Rows must share `dtype` and rank; their
    /// sizes may differ. Per-row dimensions that differ between rows are
    /// reported as unknown (`-1`).
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Array, DType, Tensor};
    /// let t = Tensor::from_ragged(
    ///     DType::Int32,
    ///     vec![Array::vector(vec![5i32, 6, 7, 8]), Array::vector(vec![7i32, 8, 9])],
    /// ).unwrap();
    /// assert_eq!(t.shape().to_signed(), vec![2, -1]);
    /// assert_eq!(t.get(1).unwrap().compute().unwrap().to_vec::<i32>().unwrap(), vec![7, 8, 9]);
    /// ```
    pub fn from_ragged(dtype: DType, rows: Vec<Array>) -> Result<Self, TensorError> {
        let row_rank = rows.first().map_or(1, Array::ndim);
        let mut row_dims: Vec<Dim> = rows
            .first()
            .map(|r| r.dims().iter().map(|&d| Dim::Fixed(d)).collect())
            .unwrap_or_else(|| vec![Dim::Unknown; row_rank]);
        for (i, row) in rows.iter().enumerate() {
            if row.dtype() != dtype {
                return Err(TensorError::DTypeMismatch {
                    op: "from_ragged",
                    expected: dtype,
                    actual: row.dtype(),
                });
            }
            if row.ndim() != row_rank {
                return Err(TensorError::shape(format!(
                    "ragged row {i} has rank {}, expected {row_rank}",
                    row.ndim()
                )));
            }
            for (dim, &n) in row_dims.iter_mut().zip(row.dims()) {
                if *dim != Dim::Fixed(n) {
                    *dim = Dim::Unknown;
                }
            }
        }
        let mut dims = Vec::with_capacity(row_rank + 1);
        dims.push(Dim::Fixed(rows.len()));
        dims.extend(row_dims);
        Ok(Self::from_node(Node {
            shape: Shape::new(dims),
            dtype,
            layout: Layout::Ragged,
            dtag: None,
            kind: Kind::Root(Root::Ragged(rows.into())),
        }))
    }

    /// Creates a tensor whose rows are produced on demand by `source`.
    ///
    /// `shape` is the declared shape; unknown dims are allowed and are
    /// checked against the data as it is read.
    pub fn deferred(
        shape: Shape,
        dtype: DType,
        layout: Layout,
        source: Arc<dyn RowSource>,
    ) -> Result<Self, TensorError> {
        if shape.rank() == 0 {
            return Err(TensorError::NotIndexable { op: "deferred" });
        }
        Ok(Self::from_node(Node {
            shape,
            dtype,
            layout,
            dtag: None,
            kind: Kind::Root(Root::Deferred(source)),
        }))
    }

    /// Lazily concatenates tensors along axis 0, in order.
    ///
    /// Parts must agree on dtype, layout and rank; fixed trailing
    /// dimensions must match. A single part is returned as-is.
    pub fn concat(parts: &[Tensor]) -> Result<Self, TensorError> {
        let first = parts
            .first()
            .ok_or_else(|| TensorError::shape("cannot concatenate zero tensors"))?;
        if parts.len() == 1 {
            return Ok(first.clone());
        }
        if first.ndim() == 0 {
            return Err(TensorError::NotIndexable { op: "concat" });
        }

        let mut dims = first.shape().dims().to_vec();
        for part in &parts[1..] {
            if part.dtype() != first.dtype() {
                return Err(TensorError::DTypeMismatch {
                    op: "concat",
                    expected: first.dtype(),
                    actual: part.dtype(),
                });
            }
            if part.layout() != first.layout() || part.ndim() != first.ndim() {
                return Err(TensorError::shape(format!(
                    "cannot concatenate {} {} onto {} {}",
                    part.layout().as_str(),
                    part.shape(),
                    first.layout().as_str(),
                    first.shape()
                )));
            }
            for (axis, (acc, &dim)) in dims.iter_mut().zip(part.shape().dims()).enumerate() {
                *acc = match (axis, *acc, dim) {
                    (0, Dim::Fixed(a), Dim::Fixed(b)) => Dim::Fixed(a + b),
                    (_, Dim::Fixed(a), Dim::Fixed(b)) if a != b => {
                        return Err(TensorError::shape(format!(
                            "axis {axis} differs between concatenated tensors: {a} vs {b}"
                        )));
                    }
                    (_, Dim::Fixed(a), Dim::Fixed(_)) => Dim::Fixed(a),
                    _ => Dim::Unknown,
                };
            }
        }

        let dtag = first.dtag().map(str::to_owned).filter(|tag| {
            parts.iter().all(|p| p.dtag() == Some(tag.as_str()))
        });

        Ok(Self::from_node(Node {
            shape: Shape::new(dims),
            dtype: first.dtype(),
            layout: first.layout(),
            dtag,
            kind: Kind::Root(Root::Concat(parts.to_vec())),
        }))
    }

    /// Attaches a semantic label (e.g. `"image"`).
    pub fn with_dtag(self, dtag: impl Into<String>) -> Self {
        self.with_optional_dtag(Some(dtag.into()))
    }

    /// Replaces the semantic label.
    pub fn with_optional_dtag(mut self, dtag: Option<String>) -> Self {
        Arc::make_mut(&mut self.node).dtag = dtag;
        self
    }

    /// Returns the declared shape. Unknown dims stay `-1` until stored.
    pub fn shape(&self) -> &Shape {
        &self.node.shape
    }

    /// Returns the element type.
    pub fn dtype(&self) -> DType {
        self.node.dtype
    }

    /// Returns the row layout.
    pub fn layout(&self) -> Layout {
        self.node.layout
    }

    /// Returns the semantic label, if any.
    pub fn dtag(&self) -> Option<&str> {
        self.node.dtag.as_deref()
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.node.shape.rank()
    }

    /// Returns `true` if both handles point to the same tensor.
    pub fn ptr_eq(a: &Tensor, b: &Tensor) -> bool {
        Arc::ptr_eq(&a.node, &b.node)
    }

    /// Returns the size of axis 0.
    ///
    /// Fails with [`TensorError::NotIndexable`] for scalars. An unknown
    /// leading dimension is resolved by asking the underlying source,
    /// which may materialise it.
    pub fn len(&self) -> Result<usize, TensorError> {
        match self.shape().dim(0) {
            None => Err(TensorError::NotIndexable { op: "len" }),
            Some(Dim::Fixed(n)) => Ok(n),
            Some(Dim::Unknown) => self.resolve_len(),
        }
    }

    /// Returns `true` if axis 0 has no entries.
    pub fn is_empty(&self) -> Result<bool, TensorError> {
        self.len().map(|n| n == 0)
    }

    /// Returns row `index` (negative counts from the end) as a lazy view.
    pub fn get(&self, index: isize) -> Result<Tensor, TensorError> {
        self.index(&[AxisIndex::At(index)])
    }

    /// Applies a multi-axis index, e.g. `t.slice(s![1..3, 1..3])`.
    pub fn slice(&self, index: impl AsRef<[AxisIndex]>) -> Result<Tensor, TensorError> {
        self.index(index.as_ref())
    }

    /// Applies one indexing step and returns a lazy view.
    ///
    /// Bounds on known dimensions are checked here; bounds on unknown
    /// dimensions are checked when the view is computed.
    pub fn index(&self, step: &[AxisIndex]) -> Result<Tensor, TensorError> {
        if self.ndim() == 0 {
            return Err(TensorError::NotIndexable { op: "index" });
        }
        let (base, mut spec) = self.base_and_spec();
        spec.push(step)?;
        let shape = view_shape(base.shape(), &spec)?;
        Ok(self.view_node(base, spec, shape))
    }

    /// Row `i` as a lazy view; the caller guarantees `ndim() >= 1`.
    fn row(&self, i: usize) -> Tensor {
        let (base, mut spec) = self.base_and_spec();
        spec.push_leading(AxisIndex::At(i as isize));
        let shape = Shape::new(self.shape().dims()[1..].to_vec());
        self.view_node(base, spec, shape)
    }

    fn base_and_spec(&self) -> (Tensor, ViewSpec) {
        match &self.node.kind {
            Kind::View { base, spec } => (base.clone(), spec.clone()),
            Kind::Root(_) => (self.clone(), ViewSpec::identity(self.ndim())),
        }
    }

    fn view_node(&self, base: Tensor, spec: ViewSpec, shape: Shape) -> Tensor {
        // A ragged view is dense once one row is picked or every per-row
        // dimension it keeps is fixed.
        let row_picked = spec.chains()[0]
            .iter()
            .any(|ix| matches!(ix, AxisIndex::At(_)));
        let rows_agree = shape.rank() >= 1 && shape.dims()[1..].iter().all(|d| !d.is_unknown());
        let layout = if base.layout() == Layout::Ragged && (row_picked || rows_agree) {
            Layout::Dense
        } else {
            base.layout()
        };
        Self::from_node(Node {
            shape,
            dtype: self.dtype(),
            layout,
            dtag: self.node.dtag.clone(),
            kind: Kind::View { base, spec },
        })
    }

    /// Iterates over axis 0, yielding one lazy row tensor per entry.
    pub fn iter(&self) -> Result<TensorIter, TensorError> {
        let len = self.len()?;
        Ok(TensorIter {
            tensor: self.clone(),
            next: 0,
            len,
        })
    }

    /// Materialises the tensor into one array.
    ///
    /// Fails with [`TensorError::RaggedCompute`] when several rows of a
    /// ragged tensor are selected; see [`compute_rows`](Tensor::compute_rows).
    pub fn compute(&self) -> Result<Array, TensorError> {
        match self.materialize()? {
            Block::Dense(array) => Ok(array),
            Block::Ragged(rows) => Err(TensorError::RaggedCompute { rows: rows.len() }),
        }
    }

    /// Materialises the tensor as one array per entry of axis 0.
    pub fn compute_rows(&self) -> Result<Vec<Array>, TensorError> {
        match self.materialize()? {
            Block::Dense(array) => array.split_rows(),
            Block::Ragged(rows) => Ok(rows),
        }
    }

    /// Materialises rows `rows.start..rows.end` of axis 0.
    pub fn read_rows(&self, rows: Range<usize>) -> Result<Block, TensorError> {
        let n = self.len()?;
        if rows.start > rows.end || rows.end > n {
            return Err(TensorError::IndexOutOfBounds {
                axis: 0,
                index: rows.end as isize,
                size: n,
            });
        }
        match &self.node.kind {
            Kind::Root(_) => self.root_read_rows(rows),
            Kind::View { .. } => self.index(&[AxisIndex::from(rows)])?.materialize(),
        }
    }

    fn materialize(&self) -> Result<Block, TensorError> {
        match &self.node.kind {
            Kind::Root(Root::Array(array)) => Ok(Block::Dense(array.clone())),
            Kind::Root(Root::Ragged(rows)) => Ok(Block::Ragged(rows.to_vec())),
            Kind::Root(_) => {
                let n = self.root_rows()?;
                self.root_read_rows(0..n)
            }
            Kind::View { base, spec } => base.materialize_view(spec, self),
        }
    }

    fn resolve_len(&self) -> Result<usize, TensorError> {
        match &self.node.kind {
            Kind::Root(_) => self.root_rows(),
            Kind::View { base, spec } => {
                if spec.kept_axes().first() == Some(&0) {
                    let n = base.root_rows()?;
                    let sel = resolve_chain(&spec.chains()[0], 0, n)?;
                    Ok(sel.kept_len().unwrap_or(0))
                } else {
                    Ok(self.materialize()?.num_rows())
                }
            }
        }
    }

    // ── Root access ────────────────────────────────────────────

    fn root_rows(&self) -> Result<usize, TensorError> {
        match &self.node.kind {
            Kind::Root(Root::Array(array)) => array
                .leading_dim()
                .ok_or(TensorError::NotIndexable { op: "len" }),
            Kind::Root(Root::Ragged(rows)) => Ok(rows.len()),
            Kind::Root(Root::Concat(parts)) => parts.iter().map(Tensor::len).sum(),
            Kind::Root(Root::Deferred(source)) => source.num_rows(),
            Kind::View { .. } => self.len(),
        }
    }

    fn root_read_rows(&self, rows: Range<usize>) -> Result<Block, TensorError> {
        match &self.node.kind {
            Kind::Root(Root::Array(array)) => array.rows(rows).map(Block::Dense),
            Kind::Root(Root::Ragged(all)) => {
                if rows.end > all.len() || rows.start > rows.end {
                    return Err(TensorError::IndexOutOfBounds {
                        axis: 0,
                        index: rows.end as isize,
                        size: all.len(),
                    });
                }
                Ok(Block::Ragged(all[rows].to_vec()))
            }
            Kind::Root(Root::Concat(parts)) => read_concat(parts, rows),
            Kind::Root(Root::Deferred(source)) => {
                let block = source.read_rows(rows.clone())?;
                self.check_block(&block, rows.len())?;
                Ok(block)
            }
            Kind::View { .. } => self.read_rows(rows),
        }
    }

    /// Verifies that rows read from a deferred source honour the declared
    /// dtype, layout and fixed dimensions.
    fn check_block(&self, block: &Block, expected_rows: usize) -> Result<(), TensorError> {
        if block.num_rows() != expected_rows {
            return Err(TensorError::LengthMismatch {
                name: "deferred rows".into(),
                expected: expected_rows,
                actual: block.num_rows(),
            });
        }
        if block.layout() != self.layout() {
            return Err(TensorError::shape(format!(
                "source produced {} rows for a {} tensor",
                block.layout().as_str(),
                self.layout().as_str()
            )));
        }
        let row_shape = Shape::new(self.shape().dims()[1..].to_vec());
        let arrays: Vec<&Array> = match block {
            Block::Dense(array) => vec![array],
            Block::Ragged(rows) => rows.iter().collect(),
        };
        for array in arrays {
            if array.dtype() != self.dtype() {
                return Err(TensorError::DTypeMismatch {
                    op: "deferred read",
                    expected: self.dtype(),
                    actual: array.dtype(),
                });
            }
            let dims = match block {
                Block::Dense(_) => array.dims().get(1..).unwrap_or(&[]),
                Block::Ragged(_) => array.dims(),
            };
            if !row_shape.admits(dims) {
                return Err(TensorError::shape(format!(
                    "rows of shape {dims:?} do not fit declared shape {}",
                    self.shape()
                )));
            }
        }
        Ok(())
    }

    fn materialize_view(&self, spec: &ViewSpec, view: &Tensor) -> Result<Block, TensorError> {
        let n = self.root_rows()?;
        let first = resolve_chain(&spec.chains()[0], 0, n)?;
        let span = first.covering_range();
        let block = self.root_read_rows(span.clone())?;
        let first = first.shifted_down(span.start);

        match block {
            Block::Dense(array) => {
                let mut sels = Vec::with_capacity(array.ndim());
                sels.push(first);
                for (axis, chain) in spec.chains().iter().enumerate().skip(1) {
                    sels.push(resolve_chain(chain, axis, array.dims()[axis])?);
                }
                gather(&array, &sels).map(Block::Dense)
            }
            Block::Ragged(rows) => {
                let tail = spec.tail(1);
                let select = |row: &Array| -> Result<Array, TensorError> {
                    gather(row, &tail.resolve(row.dims())?)
                };
                match first {
                    AxisSel::Pick(i) => select(&rows[i]).map(Block::Dense),
                    AxisSel::Span { start, len, step } => {
                        let picked = (0..len)
                            .map(|j| select(&rows[start + j * step]))
                            .collect::<Result<Vec<_>, _>>()?;
                        match view.layout() {
                            Layout::Ragged => Ok(Block::Ragged(picked)),
                            Layout::Dense if picked.is_empty() => {
                                let dims: Vec<usize> = view
                                    .shape()
                                    .dims()
                                    .iter()
                                    .skip(1)
                                    .map(|d| d.fixed().unwrap_or(0))
                                    .collect();
                                let mut full = Vec::with_capacity(dims.len() + 1);
                                full.push(0);
                                full.extend(dims);
                                Ok(Block::Dense(Array::zeros(&full, self.dtype())))
                            }
                            Layout::Dense => Array::stack(&picked).map(Block::Dense),
                        }
                    }
                }
            }
        }
    }
}

/// Reads a row range spanning several concatenated parts. Parts are read
/// in parallel and reassembled in part order.
fn read_concat(parts: &[Tensor], rows: Range<usize>) -> Result<Block, TensorError> {
    let mut pieces = Vec::new();
    let mut offset = 0;
    for part in parts {
        let n = part.len()?;
        let start = rows.start.max(offset);
        let end = rows.end.min(offset + n);
        if start < end {
            pieces.push((part, start - offset..end - offset));
        }
        offset += n;
    }
    if rows.end > offset {
        return Err(TensorError::IndexOutOfBounds {
            axis: 0,
            index: rows.end as isize,
            size: offset,
        });
    }
    if pieces.is_empty() {
        return parts[0].read_rows(0..0);
    }
    tracing::trace!(parts = pieces.len(), ?rows, "reading concatenated rows");
    let blocks = pieces
        .par_iter()
        .map(|(part, range)| part.read_rows(range.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    Block::concat(blocks)
}

/// Computes the declared shape of a view over `base`.
fn view_shape(base: &Shape, spec: &ViewSpec) -> Result<Shape, TensorError> {
    let mut dims = Vec::new();
    for (axis, (chain, &dim)) in spec.chains().iter().zip(base.dims()).enumerate() {
        let kept = !chain.iter().any(|ix| matches!(ix, AxisIndex::At(_)));
        match dim {
            Dim::Fixed(n) => {
                let sel = resolve_chain(chain, axis, n)?;
                if let Some(len) = sel.kept_len() {
                    dims.push(Dim::Fixed(len));
                }
            }
            Dim::Unknown if kept => dims.push(Dim::Unknown),
            Dim::Unknown => {}
        }
    }
    Ok(Shape::new(dims))
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.node.kind {
            Kind::Root(Root::Array(_)) => "array",
            Kind::Root(Root::Ragged(_)) => "ragged",
            Kind::Root(Root::Concat(_)) => "concat",
            Kind::Root(Root::Deferred(_)) => "deferred",
            Kind::View { .. } => "view",
        };
        f.debug_struct("Tensor")
            .field("shape", &format_args!("{}", self.shape()))
            .field("dtype", &self.dtype())
            .field("layout", &self.layout())
            .field("dtag", &self.dtag())
            .field("kind", &kind)
            .finish()
    }
}

/// Iterator over the rows of a [`Tensor`]. See [`Tensor::iter`].
#[derive(Debug, Clone)]
pub struct TensorIter {
    tensor: Tensor,
    next: usize,
    len: usize,
}

impl Iterator for TensorIter {
    type Item = Tensor;

    fn next(&mut self) -> Option<Tensor> {
        if self.next >= self.len {
            return None;
        }
        let row = self.tensor.row(self.next);
        self.next += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TensorIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn vector() -> Tensor {
        Tensor::from_array(Array::vector(vec![1i32, 2, 3, 4, 5]))
    }

    fn grid() -> Tensor {
        Tensor::from_array(Array::from_vec(&[3, 3], (1..=9).collect::<Vec<i32>>()).unwrap())
    }

    fn values(t: &Tensor) -> Vec<i32> {
        t.compute().unwrap().to_vec::<i32>().unwrap()
    }

    /// Serves rows of an array and counts how many rows were requested.
    #[derive(Debug)]
    struct CountingSource {
        array: Array,
        rows_read: AtomicUsize,
    }

    impl RowSource for CountingSource {
        fn num_rows(&self) -> Result<usize, TensorError> {
            Ok(self.array.leading_dim().unwrap_or(0))
        }

        fn read_rows(&self, rows: Range<usize>) -> Result<Block, TensorError> {
            self.rows_read.fetch_add(rows.len(), Ordering::Relaxed);
            self.array.rows(rows).map(Block::Dense)
        }
    }

    #[test]
    fn test_getitem_scalar() {
        let t = vector();
        assert_eq!(t.get(2).unwrap().compute().unwrap().item::<i32>().unwrap(), 3);
        assert_eq!(t.get(-1).unwrap().compute().unwrap().item::<i32>().unwrap(), 5);
    }

    #[test]
    fn test_getitem_range() {
        let v = vector().slice(s![2..4]).unwrap();
        assert_eq!(v.shape(), &Shape::fixed(&[2]));
        assert_eq!(values(&v), vec![3, 4]);
    }

    #[test]
    fn test_getitem_multi_axis() {
        let v = grid().slice(s![1..3, 1..3]).unwrap();
        assert_eq!(v.shape(), &Shape::fixed(&[2, 2]));
        assert_eq!(values(&v), vec![5, 6, 8, 9]);
    }

    #[test]
    fn test_slice_of_slice_composes() {
        let t = Tensor::from_array(Array::vector((0..10).collect::<Vec<i32>>()));
        let nested = t.slice(s![2..8]).unwrap().slice(s![1..3]).unwrap();
        let direct = t.slice(s![3..5]).unwrap();
        assert_eq!(values(&nested), values(&direct));
    }

    #[test]
    fn test_index_on_view_addresses_remaining_axes() {
        let row = grid().get(1).unwrap();
        assert_eq!(row.shape(), &Shape::fixed(&[3]));
        assert_eq!(values(&row.get(2).unwrap()), vec![6]);
        let col = grid().slice(s![.., 0]).unwrap();
        assert_eq!(values(&col), vec![1, 4, 7]);
    }

    #[test]
    fn test_eager_bounds_errors() {
        assert!(matches!(
            vector().get(5),
            Err(TensorError::IndexOutOfBounds { .. })
        ));
        assert!(matches!(
            vector().slice(s![0, 0]),
            Err(TensorError::TooManyIndices { .. })
        ));
        let scalar = Tensor::from_array(Array::scalar(1i32));
        assert!(matches!(scalar.len(), Err(TensorError::NotIndexable { .. })));
        assert!(matches!(scalar.get(0), Err(TensorError::NotIndexable { .. })));
    }

    #[test]
    fn test_meta() {
        let t = Tensor::from_array(Array::zeros(&[3, 4], DType::Int32));
        assert_eq!(t.ndim(), 2);
        assert_eq!(t.len().unwrap(), 3);
        assert_eq!(t.shape().to_signed(), vec![3, 4]);
        assert!(t.dtype() == "int32");
    }

    #[test]
    fn test_iter_is_restartable() {
        let t = vector();
        let first: Vec<i32> = t.iter().unwrap().map(|r| values(&r)[0]).collect();
        let second: Vec<i32> = t.iter().unwrap().map(|r| values(&r)[0]).collect();
        assert_eq!(first, vec![1, 2, 3, 4, 5]);
        assert_eq!(first, second);
        assert_eq!(t.iter().unwrap().len(), 5);
    }

    #[test]
    fn test_dtag_survives_views() {
        let t = vector().with_dtag("image");
        assert_eq!(t.dtag(), Some("image"));
        assert_eq!(t.get(0).unwrap().dtag(), Some("image"));
    }

    #[test]
    fn test_concat_lazy() {
        let a = Tensor::from_array(Array::vector(vec![5i32, 6, 7]));
        let b = Tensor::from_array(Array::vector(vec![1i32, 2, 3]));
        let c = Tensor::concat(&[a, b]).unwrap();
        assert_eq!(c.shape(), &Shape::fixed(&[6]));
        assert_eq!(values(&c), vec![5, 6, 7, 1, 2, 3]);
        assert_eq!(values(&c.slice(s![2..4]).unwrap()), vec![7, 1]);
    }

    #[test]
    fn test_concat_validation() {
        let a = Tensor::from_array(Array::zeros(&[2, 3], DType::Int32));
        let b = Tensor::from_array(Array::zeros(&[2, 4], DType::Int32));
        assert!(matches!(
            Tensor::concat(&[a.clone(), b]),
            Err(TensorError::Shape { .. })
        ));
        let c = Tensor::from_array(Array::zeros(&[2, 3], DType::Float32));
        assert!(matches!(
            Tensor::concat(&[a.clone(), c]),
            Err(TensorError::DTypeMismatch { .. })
        ));
        assert!(Tensor::ptr_eq(&Tensor::concat(&[a.clone()]).unwrap(), &a));
    }

    #[test]
    fn test_ragged_rows() {
        let t = Tensor::from_ragged(
            DType::Int32,
            vec![Array::vector(vec![5i32, 6, 7, 8]), Array::vector(vec![7i32, 8, 9])],
        )
        .unwrap();
        assert_eq!(t.layout(), Layout::Ragged);
        assert_eq!(values(&t.get(0).unwrap()), vec![5, 6, 7, 8]);
        assert_eq!(values(&t.slice(s![1, 1..]).unwrap()), vec![8, 9]);
        assert!(matches!(t.compute(), Err(TensorError::RaggedCompute { rows: 2 })));
        let rows = t.compute_rows().unwrap();
        assert_eq!(rows[1].to_vec::<i32>().unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn test_ragged_view_without_varying_axis_is_dense() {
        let t = Tensor::from_ragged(
            DType::Int32,
            vec![Array::vector(vec![5i32, 6, 7]), Array::vector(vec![7i32, 8])],
        )
        .unwrap();
        let firsts = t.slice(s![.., 0]).unwrap();
        assert_eq!(firsts.shape().to_signed(), vec![2]);
        assert_eq!(firsts.layout(), Layout::Dense);
        assert_eq!(values(&firsts), vec![5, 7]);
        assert_eq!(firsts.read_rows(1..2).unwrap().layout(), Layout::Dense);

        let heads = t.slice(s![.., ..2]).unwrap();
        assert_eq!(heads.layout(), Layout::Ragged);
        assert!(matches!(heads.compute(), Err(TensorError::RaggedCompute { rows: 2 })));

        let none = t.slice(s![2.., 0]).unwrap();
        assert_eq!(none.compute().unwrap().dims(), &[0]);
    }

    #[test]
    fn test_deferred_reads_only_needed_rows() {
        let source = Arc::new(CountingSource {
            array: Array::vector((0..100).collect::<Vec<i32>>()),
            rows_read: AtomicUsize::new(0),
        });
        let t = Tensor::deferred(
            Shape::from_signed(&[-1]).unwrap(),
            DType::Int32,
            Layout::Dense,
            source.clone(),
        )
        .unwrap();
        assert_eq!(t.shape().to_signed(), vec![-1]);
        assert_eq!(t.len().unwrap(), 100);

        let v = t.slice(s![10..12]).unwrap();
        assert_eq!(values(&v), vec![10, 11]);
        assert_eq!(source.rows_read.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_deferred_unknown_dim_bounds_checked_at_compute() {
        let source = Arc::new(CountingSource {
            array: Array::vector(vec![1i32, 2]),
            rows_read: AtomicUsize::new(0),
        });
        let t = Tensor::deferred(
            Shape::from_signed(&[-1]).unwrap(),
            DType::Int32,
            Layout::Dense,
            source,
        )
        .unwrap();
        let past_end = t.get(5).unwrap();
        assert!(matches!(
            past_end.compute(),
            Err(TensorError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_deferred_shape_violation() {
        let source = Arc::new(CountingSource {
            array: Array::zeros(&[2, 4], DType::Int32),
            rows_read: AtomicUsize::new(0),
        });
        let t = Tensor::deferred(
            Shape::from_signed(&[-1, 5]).unwrap(),
            DType::Int32,
            Layout::Dense,
            source,
        )
        .unwrap();
        assert!(matches!(t.compute(), Err(TensorError::Shape { .. })));
    }

    #[test]
    fn test_empty_tensor() {
        let t = Tensor::from_array(Array::vector::<u8>(vec![]));
        assert_eq!(t.len().unwrap(), 0);
        assert!(t.is_empty().unwrap());
        assert_eq!(t.iter().unwrap().count(), 0);
        assert_eq!(t.compute().unwrap().dims(), &[0]);
    }
}
