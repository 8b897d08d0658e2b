// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Adapters that present a dataset the way training loaders consume it.
//!
//! Both adapters materialise one row at a time into a [`Sample`] and build
//! [`Batch`]es with the same collation rule: dense fields are stacked into
//! one array with a new leading axis, ragged fields stay a list of
//! per-row arrays.

use crate::{Dataset, DatasetError};
use tensor_core::{Array, Layout, Tensor, TensorError};

/// One materialised row: field name to array, in dataset order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    fields: Vec<(String, Array)>,
}

impl Sample {
    /// Field names, in dataset order.
    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// The array of field `name`.
    pub fn get(&self, name: &str) -> Option<&Array> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Consumes the sample into its `(name, array)` pairs.
    pub fn into_fields(self) -> Vec<(String, Array)> {
        self.fields
    }
}

/// One collated field of a [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Equally shaped rows stacked along a new leading axis.
    Stacked(Array),
    /// Rows of varying shape, kept in order.
    Sequence(Vec<Array>),
}

impl Column {
    /// The stacked array, if this column is dense.
    pub fn as_stacked(&self) -> Option<&Array> {
        match self {
            Column::Stacked(a) => Some(a),
            Column::Sequence(_) => None,
        }
    }

    /// The per-row arrays, if this column is ragged.
    pub fn as_sequence(&self) -> Option<&[Array]> {
        match self {
            Column::Stacked(_) => None,
            Column::Sequence(rows) => Some(rows.as_slice()),
        }
    }
}

/// Several samples collated field by field.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    columns: Vec<(String, Column)>,
    size: usize,
}

impl Batch {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` for a batch without samples.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Field names, in dataset order.
    pub fn keys(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// The column of field `name`.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }
}

/// Map-style dataset: indexable samples plus a collate function.
#[derive(Debug, Clone)]
pub struct TorchDataset {
    dataset: Dataset,
    len: usize,
    collator: Collator,
}

impl TorchDataset {
    pub(crate) fn new(dataset: Dataset) -> Result<Self, DatasetError> {
        let len = dataset.len()?;
        let collator = Collator::for_dataset(&dataset);
        Ok(Self {
            dataset,
            len,
            collator,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Materialises sample `index`.
    pub fn get(&self, index: usize) -> Result<Sample, DatasetError> {
        if index >= self.len {
            return Err(TensorError::IndexOutOfBounds {
                axis: 0,
                index: index as isize,
                size: self.len,
            }
            .into());
        }
        sample_at(&self.dataset, index)
    }

    /// Collates samples into one batch.
    pub fn collate(&self, samples: Vec<Sample>) -> Result<Batch, DatasetError> {
        self.collator.collate(samples)
    }

    /// Iterates over all samples in order.
    pub fn iter(&self) -> Samples {
        Samples {
            dataset: self.dataset.clone(),
            next: 0,
            len: self.len,
        }
    }

    /// Iterates over batches of up to `batch_size` consecutive samples.
    pub fn batches(&self, batch_size: usize) -> Result<Batches, DatasetError> {
        Batches::new(self.iter(), batch_size, self.collator.clone())
    }
}

/// Iterable dataset with `batch` chaining.
#[derive(Debug, Clone)]
pub struct TfDataset {
    dataset: Dataset,
    len: usize,
    collator: Collator,
}

impl TfDataset {
    pub(crate) fn new(dataset: Dataset) -> Result<Self, DatasetError> {
        let len = dataset.len()?;
        let collator = Collator::for_dataset(&dataset);
        Ok(Self {
            dataset,
            len,
            collator,
        })
    }

    /// Iterates over samples in order.
    pub fn iter(&self) -> Samples {
        Samples {
            dataset: self.dataset.clone(),
            next: 0,
            len: self.len,
        }
    }

    /// Groups consecutive samples into batches of `batch_size`; the last
    /// batch may be smaller.
    pub fn batch(&self, batch_size: usize) -> Result<Batches, DatasetError> {
        Batches::new(self.iter(), batch_size, self.collator.clone())
    }
}

/// Iterator over materialised samples.
#[derive(Debug)]
pub struct Samples {
    dataset: Dataset,
    next: usize,
    len: usize,
}

impl Iterator for Samples {
    type Item = Result<Sample, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let sample = sample_at(&self.dataset, self.next);
        self.next += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Samples {}

/// Iterator over collated batches.
#[derive(Debug)]
pub struct Batches {
    samples: Samples,
    size: usize,
    collator: Collator,
}

impl Batches {
    fn new(samples: Samples, size: usize, collator: Collator) -> Result<Self, DatasetError> {
        if size == 0 {
            return Err(DatasetError::Shape("batch size must be positive".into()));
        }
        Ok(Self {
            samples,
            size,
            collator,
        })
    }
}

impl Iterator for Batches {
    type Item = Result<Batch, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut samples = Vec::with_capacity(self.size);
        for sample in self.samples.by_ref().take(self.size) {
            match sample {
                Ok(s) => samples.push(s),
                Err(e) => return Some(Err(e)),
            }
        }
        if samples.is_empty() {
            return None;
        }
        Some(self.collator.collate(samples))
    }
}

// ── Private helpers ────────────────────────────────────────────

fn sample_at(dataset: &Dataset, index: usize) -> Result<Sample, DatasetError> {
    let fields = dataset
        .get(index as isize)?
        .into_fields()
        .into_iter()
        .map(|(name, tensor)| Ok((name, tensor.compute()?)))
        .collect::<Result<Vec<_>, DatasetError>>()?;
    Ok(Sample { fields })
}

/// Per-field collation rule, fixed when the adapter is built.
#[derive(Debug, Clone)]
struct Collator {
    fields: Vec<(String, bool)>,
}

impl Collator {
    fn for_dataset(dataset: &Dataset) -> Self {
        let fields = dataset
            .tensors()
            .map(|(name, tensor)| (name.to_string(), is_ragged(tensor)))
            .collect();
        Self { fields }
    }

    fn collate(&self, samples: Vec<Sample>) -> Result<Batch, DatasetError> {
        if samples.is_empty() {
            return Err(DatasetError::Shape("cannot collate an empty batch".into()));
        }
        let size = samples.len();
        let mut per_field: Vec<Vec<Array>> = (0..self.fields.len())
            .map(|_| Vec::with_capacity(size))
            .collect();
        for sample in samples {
            let mut fields = sample.fields;
            for ((name, _), rows) in self.fields.iter().zip(per_field.iter_mut()) {
                let pos = fields
                    .iter()
                    .position(|(n, _)| n == name)
                    .ok_or_else(|| DatasetError::UnknownField(name.clone()))?;
                rows.push(fields.swap_remove(pos).1);
            }
        }

        let columns = self
            .fields
            .iter()
            .zip(per_field)
            .map(|((name, ragged), rows)| {
                let column = if *ragged {
                    Column::Sequence(rows)
                } else {
                    Column::Stacked(Array::stack(&rows)?)
                };
                Ok((name.clone(), column))
            })
            .collect::<Result<Vec<_>, DatasetError>>()?;
        Ok(Batch { columns, size })
    }
}

/// Rows of a field can differ in shape when it is stored ragged or any
/// per-row dimension is undeclared.
fn is_ragged(tensor: &Tensor) -> bool {
    tensor.layout() == Layout::Ragged || tensor.shape().dims()[1..].iter().any(|d| d.is_unknown())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::DType;

    fn mixed() -> Dataset {
        let t1 = Tensor::from_array(Array::from_rows(vec![vec![1i32, 2], vec![3, 4]]).unwrap());
        let t2 = Tensor::from_ragged(
            DType::Int32,
            vec![
                Array::vector(vec![5i32, 6, 7, 8]),
                Array::vector(vec![7i32, 8, 9]),
            ],
        )
        .unwrap();
        Dataset::from_tensors([("t1", t1), ("t2", t2)]).unwrap()
    }

    #[test]
    fn test_torch_get_and_collate() {
        let torch = mixed().to_pytorch().unwrap();
        assert_eq!(torch.len(), 2);
        let s = torch.get(1).unwrap();
        assert_eq!(s.keys(), vec!["t1", "t2"]);
        assert_eq!(s.get("t2").unwrap().to_vec::<i32>().unwrap(), vec![7, 8, 9]);
        assert!(torch.get(2).is_err());

        let samples = vec![torch.get(0).unwrap(), torch.get(1).unwrap()];
        let batch = torch.collate(samples).unwrap();
        assert_eq!(batch.len(), 2);
        let t1 = batch.get("t1").unwrap().as_stacked().unwrap();
        assert_eq!(t1.dims(), &[2, 2]);
        assert_eq!(t1.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
        let t2 = batch.get("t2").unwrap().as_sequence().unwrap();
        assert_eq!(t2.len(), 2);
        assert_eq!(t2[0].to_vec::<i32>().unwrap(), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_torch_batches_of_one() {
        let torch = mixed().to_pytorch().unwrap();
        let batches: Vec<Batch> = torch
            .batches(1)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(batches.len(), 2);
        let t1 = batches[1].get("t1").unwrap().as_stacked().unwrap();
        assert_eq!(t1.dims(), &[1, 2]);
        assert_eq!(t1.to_vec::<i32>().unwrap(), vec![3, 4]);
        let t2 = batches[1].get("t2").unwrap().as_sequence().unwrap();
        assert_eq!(t2[0].to_vec::<i32>().unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn test_tf_batch_remainder() {
        let ds = Dataset::from_tensors([(
            "x",
            Tensor::from_array(Array::vector((0..20).collect::<Vec<i64>>())),
        )])
        .unwrap();
        let tf = ds.to_tensorflow().unwrap();
        assert_eq!(tf.iter().count(), 20);
        let sizes: Vec<usize> = tf.batch(8).unwrap().map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![8, 8, 4]);
        assert!(matches!(tf.batch(0), Err(DatasetError::Shape(_))));
    }

    #[test]
    fn test_empty_collate_rejected() {
        let torch = mixed().to_pytorch().unwrap();
        assert!(torch.collate(Vec::new()).is_err());
    }
}
