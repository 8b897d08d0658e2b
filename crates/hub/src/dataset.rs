// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Datasets: ordered collections of equally long named tensors.

use crate::export::{TfDataset, TorchDataset};
use crate::{DatasetError, HubConfig};
use chunk_store::{read_dataset, write_dataset, Registry, StorageBackend};
use std::collections::HashSet;
use std::sync::Arc;
use tensor_core::{AxisIndex, Dim, SliceSpec, Tensor};

/// An ordered mapping from field name to [`Tensor`], all fields sharing
/// the same number of rows.
///
/// Every transform returns a new `Dataset`; tensors are shared, never
/// copied, so `select` and no-op slices return handles that are
/// [`Tensor::ptr_eq`] to the originals.
///
/// # Example
/// ```
/// use hub::Dataset;
/// use tensor_core::{Array, Tensor};
///
/// let ds = Dataset::from_tensors([
///     ("t1", Tensor::from_array(Array::vector(vec![1i32, 2, 3]))),
///     ("t2", Tensor::from_array(Array::vector(vec![4i32, 5, 6]))),
/// ]).unwrap();
/// assert_eq!(ds.len().unwrap(), 3);
/// assert_eq!(ds.keys(), vec!["t1", "t2"]);
///
/// let head = ds.slice(0..2).unwrap();
/// assert_eq!(head.len().unwrap(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    fields: Vec<(String, Tensor)>,
}

impl Dataset {
    /// Builds a dataset from `(name, tensor)` pairs, keeping their order.
    ///
    /// Fails on duplicate names, scalar tensors, or known row counts that
    /// disagree. Unknown row counts are checked when materialised.
    pub fn from_tensors<I, S>(pairs: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = (S, Tensor)>,
        S: Into<String>,
    {
        let mut fields: Vec<(String, Tensor)> = Vec::new();
        let mut known: Option<usize> = None;
        for (name, tensor) in pairs {
            let name = name.into();
            if fields.iter().any(|(n, _)| *n == name) {
                return Err(DatasetError::DuplicateField(name));
            }
            match tensor.shape().dim(0) {
                None => {
                    return Err(DatasetError::Shape(format!(
                        "field '{name}' is a scalar; dataset fields need a leading dimension"
                    )));
                }
                Some(Dim::Fixed(n)) => match known {
                    Some(expected) if expected != n => {
                        return Err(DatasetError::LengthMismatch {
                            field: name,
                            expected,
                            actual: n,
                        });
                    }
                    _ => known = Some(n),
                },
                Some(Dim::Unknown) => {}
            }
            fields.push((name, tensor));
        }
        Ok(Self { fields })
    }

    /// Number of rows. Resolves (and may generate) unknown row counts.
    pub fn len(&self) -> Result<usize, DatasetError> {
        let mut len: Option<usize> = None;
        for (name, tensor) in &self.fields {
            let n = tensor.len()?;
            match len {
                Some(expected) if expected != n => {
                    return Err(DatasetError::LengthMismatch {
                        field: name.clone(),
                        expected,
                        actual: n,
                    });
                }
                _ => len = Some(n),
            }
        }
        Ok(len.unwrap_or(0))
    }

    /// Returns `true` when the dataset has no rows.
    pub fn is_empty(&self) -> Result<bool, DatasetError> {
        self.len().map(|n| n == 0)
    }

    /// Number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Returns the tensor stored under `name`.
    pub fn tensor(&self, name: &str) -> Result<&Tensor, DatasetError> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
            .ok_or_else(|| DatasetError::UnknownField(name.to_string()))
    }

    /// Iterates over `(name, tensor)` pairs in order.
    pub fn tensors(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// A dataset with only the named fields, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Dataset, DatasetError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(names.len());
        for &name in names {
            if !seen.insert(name) {
                return Err(DatasetError::DuplicateField(name.to_string()));
            }
            fields.push((name.to_string(), self.tensor(name)?.clone()));
        }
        Ok(Self { fields })
    }

    /// Slices every field along axis 0.
    ///
    /// A slice that selects every row returns the same tensors.
    pub fn slice(&self, rows: impl Into<SliceSpec>) -> Result<Dataset, DatasetError> {
        let rows = rows.into();
        if self.is_noop(&rows)? {
            return Ok(self.clone());
        }
        let fields = self
            .fields
            .iter()
            .map(|(name, tensor)| Ok((name.clone(), tensor.index(&[AxisIndex::Range(rows)])?)))
            .collect::<Result<Vec<_>, DatasetError>>()?;
        Ok(Self { fields })
    }

    /// Selects fields and slices rows in one step. Equivalent to
    /// `select(names)` followed by `slice(rows)`, in either order.
    pub fn view(&self, names: &[&str], rows: impl Into<SliceSpec>) -> Result<Dataset, DatasetError> {
        self.select(names)?.slice(rows)
    }

    /// Row `index` (negative counts from the end) across all fields.
    pub fn get(&self, index: isize) -> Result<Row, DatasetError> {
        let fields = self
            .fields
            .iter()
            .map(|(name, tensor)| Ok((name.clone(), tensor.get(index)?)))
            .collect::<Result<Vec<_>, DatasetError>>()?;
        Ok(Row { fields })
    }

    /// Iterates over rows. Restartable; each call starts from row 0.
    pub fn iter(&self) -> Result<DatasetIter, DatasetError> {
        let len = self.len()?;
        let columns = self
            .fields
            .iter()
            .map(|(name, tensor)| Ok((name.clone(), tensor.iter()?)))
            .collect::<Result<Vec<_>, DatasetError>>()?;
        Ok(DatasetIter {
            columns,
            remaining: len,
        })
    }

    // ── Storage ────────────────────────────────────────────────

    /// Persists the dataset at `url` with the default configuration and
    /// returns it re-opened from storage.
    pub fn store(&self, url: &str) -> Result<Dataset, DatasetError> {
        self.store_with(url, &HubConfig::default())
    }

    /// Persists the dataset at `url` (a local path or `scheme://bucket/path`)
    /// and returns it re-opened from storage.
    pub fn store_with(&self, url: &str, config: &HubConfig) -> Result<Dataset, DatasetError> {
        config.validate()?;
        let backend = Registry::global().open(url)?;
        self.store_to(backend, config)
    }

    /// Persists the dataset to an already resolved backend.
    pub fn store_to(
        &self,
        backend: Arc<dyn StorageBackend>,
        config: &HubConfig,
    ) -> Result<Dataset, DatasetError> {
        write_dataset(backend.as_ref(), &self.fields, &config.store_options())?;
        Self::load_from(backend)
    }

    /// Opens the dataset stored at `url`.
    pub fn load(url: &str) -> Result<Dataset, DatasetError> {
        Self::load_from(Registry::global().open(url)?)
    }

    /// Opens the dataset stored in `backend`.
    pub fn load_from(backend: Arc<dyn StorageBackend>) -> Result<Dataset, DatasetError> {
        let stored = read_dataset(backend)?;
        Ok(Self {
            fields: stored.fields,
        })
    }

    // ── Combining ──────────────────────────────────────────────

    /// Combines the fields of datasets with equal row counts.
    ///
    /// A field name present in more than one input is rejected.
    pub fn merge(datasets: &[Dataset]) -> Result<Dataset, DatasetError> {
        let mut expected: Option<usize> = None;
        let mut fields: Vec<(String, Tensor)> = Vec::new();
        for ds in datasets {
            let n = ds.len()?;
            match expected {
                Some(e) if e != n => {
                    return Err(DatasetError::LengthMismatch {
                        field: ds.keys().join(","),
                        expected: e,
                        actual: n,
                    });
                }
                _ => expected = Some(n),
            }
            for (name, tensor) in &ds.fields {
                if fields.iter().any(|(n, _)| n == name) {
                    return Err(DatasetError::DuplicateField(name.clone()));
                }
                fields.push((name.clone(), tensor.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Appends the rows of each dataset in order.
    ///
    /// Every input must have the same set of field names; the result
    /// keeps the field order of the first.
    pub fn concat(datasets: &[Dataset]) -> Result<Dataset, DatasetError> {
        let Some(first) = datasets.first() else {
            return Ok(Dataset::default());
        };
        let keys: HashSet<&str> = first.keys().into_iter().collect();
        for (i, ds) in datasets.iter().enumerate().skip(1) {
            let other: HashSet<&str> = ds.keys().into_iter().collect();
            if other != keys {
                let mut missing: Vec<&str> = keys.symmetric_difference(&other).copied().collect();
                missing.sort_unstable();
                return Err(DatasetError::SchemaMismatch(format!(
                    "dataset {i} differs from dataset 0 in fields {missing:?}"
                )));
            }
        }

        let fields = first
            .fields
            .iter()
            .map(|(name, _)| {
                let parts = datasets
                    .iter()
                    .map(|ds| ds.tensor(name).cloned())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((name.clone(), Tensor::concat(&parts)?))
            })
            .collect::<Result<Vec<_>, DatasetError>>()?;
        Ok(Self { fields })
    }

    // ── Export ─────────────────────────────────────────────────

    /// A map-style, index-addressable view for batch loaders.
    pub fn to_pytorch(&self) -> Result<TorchDataset, DatasetError> {
        TorchDataset::new(self.clone())
    }

    /// An iterable view with `.batch(n)` chaining.
    pub fn to_tensorflow(&self) -> Result<TfDataset, DatasetError> {
        TfDataset::new(self.clone())
    }

    // ── Private helpers ────────────────────────────────────────

    /// `true` if `rows` selects every row of every field.
    fn is_noop(&self, rows: &SliceSpec) -> Result<bool, DatasetError> {
        if rows.is_full() {
            return Ok(true);
        }
        if rows.step != 1 {
            return Ok(false);
        }
        let mut known = None;
        for (_, tensor) in &self.fields {
            match tensor.shape().dim(0) {
                Some(Dim::Fixed(n)) => known = Some(n),
                _ => return Ok(false),
            }
        }
        match known {
            Some(n) => Ok(rows.resolve(n)? == (0, n)),
            None => Ok(false),
        }
    }
}

/// One row of a dataset: field name to lazy row tensor.
#[derive(Debug, Clone)]
pub struct Row {
    fields: Vec<(String, Tensor)>,
}

impl Row {
    /// Field names, in dataset order.
    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// The row tensor of field `name`.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Iterates over `(name, tensor)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub(crate) fn into_fields(self) -> Vec<(String, Tensor)> {
        self.fields
    }
}

/// Iterator over the rows of a [`Dataset`].
#[derive(Debug)]
pub struct DatasetIter {
    columns: Vec<(String, tensor_core::TensorIter)>,
    remaining: usize,
}

impl Iterator for DatasetIter {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let fields = self
            .columns
            .iter_mut()
            .map(|(name, it)| it.next().map(|t| (name.clone(), t)))
            .collect::<Option<Vec<_>>>()?;
        Some(Row { fields })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for DatasetIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{Array, DType};

    fn vec_tensor(values: Vec<i32>) -> Tensor {
        Tensor::from_array(Array::vector(values))
    }

    fn sample() -> Dataset {
        Dataset::from_tensors([
            ("t1", vec_tensor(vec![1, 2, 3])),
            ("t2", vec_tensor(vec![4, 5, 6])),
        ])
        .unwrap()
    }

    #[test]
    fn test_len_and_keys() {
        let ds = sample();
        assert_eq!(ds.len().unwrap(), 3);
        assert_eq!(ds.keys(), vec!["t1", "t2"]);
        assert_eq!(ds.num_fields(), 2);
        assert!(!ds.is_empty().unwrap());
        assert_eq!(Dataset::default().len().unwrap(), 0);
    }

    #[test]
    fn test_from_tensors_validation() {
        let dup = Dataset::from_tensors([("a", vec_tensor(vec![1])), ("a", vec_tensor(vec![2]))]);
        assert!(matches!(dup, Err(DatasetError::DuplicateField(ref n)) if n == "a"));

        let len = Dataset::from_tensors([("a", vec_tensor(vec![1])), ("b", vec_tensor(vec![1, 2]))]);
        assert!(matches!(
            len,
            Err(DatasetError::LengthMismatch {
                expected: 1,
                actual: 2,
                ..
            })
        ));

        let scalar = Dataset::from_tensors([("s", Tensor::from_array(Array::scalar(1i32)))]);
        assert!(matches!(scalar, Err(DatasetError::Shape(_))));
    }

    #[test]
    fn test_select_keeps_identity() {
        let ds = sample();
        let sel = ds.select(&["t2", "t1"]).unwrap();
        assert_eq!(sel.keys(), vec!["t2", "t1"]);
        for key in ["t1", "t2"] {
            assert!(Tensor::ptr_eq(sel.tensor(key).unwrap(), ds.tensor(key).unwrap()));
        }
        assert!(matches!(ds.select(&["t3"]), Err(DatasetError::UnknownField(_))));
        assert!(matches!(ds.select(&["t1", "t1"]), Err(DatasetError::DuplicateField(_))));
    }

    #[test]
    fn test_full_slice_keeps_identity() {
        let ds = sample();
        for full in [ds.slice(..).unwrap(), ds.slice(0..3).unwrap(), ds.slice(0..10).unwrap()] {
            assert!(Tensor::ptr_eq(full.tensor("t1").unwrap(), ds.tensor("t1").unwrap()));
        }
        let part = ds.slice(0..2).unwrap();
        assert!(!Tensor::ptr_eq(part.tensor("t1").unwrap(), ds.tensor("t1").unwrap()));
    }

    #[test]
    fn test_view_select_and_slice_commute() {
        let ds = sample();
        let a = ds.view(&["t2"], 1..3).unwrap();
        let b = ds.slice(1..3).unwrap().select(&["t2"]).unwrap();
        assert_eq!(
            a.tensor("t2").unwrap().compute().unwrap(),
            b.tensor("t2").unwrap().compute().unwrap()
        );
        assert_eq!(
            a.tensor("t2").unwrap().compute().unwrap().to_vec::<i32>().unwrap(),
            vec![5, 6]
        );
    }

    #[test]
    fn test_get_row() {
        let row = sample().get(-1).unwrap();
        assert_eq!(row.keys(), vec!["t1", "t2"]);
        let t2 = row.get("t2").unwrap().compute().unwrap();
        assert_eq!(t2.item::<i32>().unwrap(), 6);
        assert!(row.get("t3").is_none());
        assert!(sample().get(3).is_err());
    }

    #[test]
    fn test_iter_rows() {
        let ds = sample();
        let rows: Vec<Row> = ds.iter().unwrap().collect();
        assert_eq!(rows.len(), 3);
        let t1: Vec<i32> = rows
            .iter()
            .map(|r| r.get("t1").unwrap().compute().unwrap().item::<i32>().unwrap())
            .collect();
        assert_eq!(t1, vec![1, 2, 3]);
        assert_eq!(ds.iter().unwrap().len(), 3);
    }

    #[test]
    fn test_merge() {
        let a = Dataset::from_tensors([("t1", vec_tensor(vec![1, 2]))]).unwrap();
        let b = Dataset::from_tensors([("t2", vec_tensor(vec![3, 4]))]).unwrap();
        let m = Dataset::merge(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(m.keys(), vec!["t1", "t2"]);
        assert!(Tensor::ptr_eq(m.tensor("t2").unwrap(), b.tensor("t2").unwrap()));

        assert!(matches!(
            Dataset::merge(&[a.clone(), a.clone()]),
            Err(DatasetError::DuplicateField(_))
        ));
        let short = Dataset::from_tensors([("t3", vec_tensor(vec![1]))]).unwrap();
        assert!(matches!(
            Dataset::merge(&[a, short]),
            Err(DatasetError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_concat() {
        let a = Dataset::from_tensors([("t", vec_tensor(vec![5, 6, 7]))]).unwrap();
        let b = Dataset::from_tensors([("t", vec_tensor(vec![1, 2, 3]))]).unwrap();
        let c = Dataset::concat(&[a, b.clone()]).unwrap();
        assert_eq!(c.len().unwrap(), 6);
        assert_eq!(
            c.tensor("t").unwrap().compute().unwrap().to_vec::<i32>().unwrap(),
            vec![5, 6, 7, 1, 2, 3]
        );

        let other = Dataset::from_tensors([("u", vec_tensor(vec![1]))]).unwrap();
        assert!(matches!(
            Dataset::concat(&[b.clone(), other]),
            Err(DatasetError::SchemaMismatch(_))
        ));
        let wrong_dtype =
            Dataset::from_tensors([("t", Tensor::from_array(Array::zeros(&[2], DType::Float32)))])
                .unwrap();
        assert!(Dataset::concat(&[b, wrong_dtype]).is_err());
        assert_eq!(Dataset::concat(&[]).unwrap().num_fields(), 0);
    }

    #[test]
    fn test_store_and_load_memory() {
        let ds = sample();
        let stored = ds.store("mem://unit/dataset-test").unwrap();
        assert_eq!(stored.keys(), ds.keys());
        let loaded = Dataset::load("mem://unit/dataset-test").unwrap();
        assert_eq!(
            loaded.tensor("t2").unwrap().compute().unwrap(),
            ds.tensor("t2").unwrap().compute().unwrap()
        );
        assert!(matches!(
            Dataset::load("mem://unit/nothing-here"),
            Err(DatasetError::Storage(_))
        ));
    }
}
