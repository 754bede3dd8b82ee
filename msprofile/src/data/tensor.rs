use nalgebra::{DMatrix, Scalar};
use num_traits::Zero;

use crate::error::ProfileError;

/// A batch of per-spectrum (channel × bin) matrices, shape (N, C, B).
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor3<T: Scalar> {
    slices: Vec<DMatrix<T>>,
    n_channels: usize,
    n_bins: usize,
}

impl<T: Scalar + Zero + Copy> Tensor3<T> {
    /// Creates a zero filled tensor.
    ///
    /// # Example
    ///
    /// ```
    /// use msprofile::data::tensor::Tensor3;
    ///
    /// let tensor = Tensor3::<f32>::zeros(2, 3, 10);
    /// assert_eq!(tensor.shape(), (2, 3, 10));
    /// assert_eq!(tensor.get(1, 2, 9), 0.0);
    /// ```
    pub fn zeros(n_spectra: usize, n_channels: usize, n_bins: usize) -> Self {
        Tensor3 {
            slices: (0..n_spectra).map(|_| DMatrix::zeros(n_channels, n_bins)).collect(),
            n_channels,
            n_bins,
        }
    }

    /// Wraps per-spectrum matrices, every matrix must have shape (n_channels, n_bins).
    pub fn from_slices(
        slices: Vec<DMatrix<T>>,
        n_channels: usize,
        n_bins: usize,
    ) -> Result<Self, ProfileError> {
        for (i, slice) in slices.iter().enumerate() {
            if slice.nrows() != n_channels {
                let what = format!("channels of spectrum {}", i);
                return Err(ProfileError::shape_mismatch(n_channels, slice.nrows(), what));
            }
            if slice.ncols() != n_bins {
                let what = format!("bins of spectrum {}", i);
                return Err(ProfileError::shape_mismatch(n_bins, slice.ncols(), what));
            }
        }
        Ok(Tensor3 { slices, n_channels, n_bins })
    }

    /// (spectra, channels, bins)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.slices.len(), self.n_channels, self.n_bins)
    }

    pub fn n_spectra(&self) -> usize {
        self.slices.len()
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn get(&self, spectrum: usize, channel: usize, bin: usize) -> T {
        self.slices[spectrum][(channel, bin)]
    }

    pub fn slice(&self, spectrum: usize) -> &DMatrix<T> {
        &self.slices[spectrum]
    }

    pub fn slices(&self) -> &[DMatrix<T>] {
        &self.slices
    }

    pub(crate) fn slices_mut(&mut self) -> &mut [DMatrix<T>] {
        &mut self.slices
    }

    pub fn into_slices(self) -> Vec<DMatrix<T>> {
        self.slices
    }

    /// Applies `f` to every element.
    pub fn map<U: Scalar + Zero + Copy, F: Fn(T) -> U>(&self, f: F) -> Tensor3<U> {
        Tensor3 {
            slices: self.slices.iter().map(|slice| slice.map(&f)).collect(),
            n_channels: self.n_channels,
            n_bins: self.n_bins,
        }
    }

    /// Stacks tensors along the channel axis, in the given order.
    ///
    /// # Example
    ///
    /// ```
    /// use msprofile::data::tensor::Tensor3;
    ///
    /// let a = Tensor3::<u8>::zeros(2, 3, 5);
    /// let b = Tensor3::<u8>::zeros(2, 1, 5).map(|_| 1u8);
    /// let stacked = Tensor3::concat_channels(&[&a, &b]).unwrap();
    /// assert_eq!(stacked.shape(), (2, 4, 5));
    /// assert_eq!(stacked.get(1, 3, 4), 1);
    /// assert_eq!(stacked.get(1, 2, 4), 0);
    /// ```
    pub fn concat_channels(parts: &[&Tensor3<T>]) -> Result<Self, ProfileError> {
        let Some(first) = parts.first() else {
            return Err(ProfileError::Configuration("nothing to concatenate".to_string()));
        };
        let (n_spectra, _, n_bins) = first.shape();
        for part in parts.iter() {
            if part.n_spectra() != n_spectra {
                let found = part.n_spectra();
                return Err(ProfileError::shape_mismatch(n_spectra, found, "spectra of concatenated tensor"));
            }
            if part.n_bins() != n_bins {
                return Err(ProfileError::shape_mismatch(n_bins, part.n_bins(), "bins of concatenated tensor"));
            }
        }
        let n_channels: usize = parts.iter().map(|part| part.n_channels()).sum();

        let slices = (0..n_spectra)
            .map(|i| {
                let mut combined = DMatrix::zeros(n_channels, n_bins);
                let mut offset = 0;
                for part in parts.iter() {
                    let rows = part.n_channels();
                    combined.view_mut((offset, 0), (rows, n_bins)).copy_from(part.slice(i));
                    offset += rows;
                }
                combined
            })
            .collect();

        Ok(Tensor3 { slices, n_channels, n_bins })
    }

    /// Sparse copy of every spectrum slice.
    pub fn to_sparse(&self) -> Vec<SparseSlice<T>> {
        self.slices.iter().map(SparseSlice::from_dense).collect()
    }
}

/// Compressed sparse column copy of one (channel × bin) slice.
///
/// Only non-zero entries are stored, values are kept as they are.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseSlice<T> {
    nrows: usize,
    ncols: usize,
    col_offsets: Vec<usize>,
    row_indices: Vec<usize>,
    values: Vec<T>,
}

impl<T: Scalar + Zero + Copy> SparseSlice<T> {
    /// Collects the non-zero entries of a dense matrix, column by column.
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::DMatrix;
    /// use msprofile::data::tensor::SparseSlice;
    ///
    /// let dense = DMatrix::from_row_slice(2, 3, &[0.0, 1.5, 0.0, 2.0, 0.0, 0.0]);
    /// let sparse = SparseSlice::from_dense(&dense);
    /// assert_eq!(sparse.nnz(), 2);
    /// assert_eq!(sparse.get(1, 0), 2.0);
    /// assert_eq!(sparse.to_dense(), dense);
    /// ```
    pub fn from_dense(dense: &DMatrix<T>) -> Self {
        let mut col_offsets = Vec::with_capacity(dense.ncols() + 1);
        let mut row_indices = Vec::new();
        let mut values = Vec::new();

        col_offsets.push(0);
        for column in dense.column_iter() {
            for (row, value) in column.iter().enumerate() {
                if !value.is_zero() {
                    row_indices.push(row);
                    values.push(*value);
                }
            }
            col_offsets.push(values.len());
        }

        SparseSlice {
            nrows: dense.nrows(),
            ncols: dense.ncols(),
            col_offsets,
            row_indices,
            values,
        }
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for col in 0..self.ncols {
            for k in self.col_offsets[col]..self.col_offsets[col + 1] {
                dense[(self.row_indices[k], col)] = self.values[k];
            }
        }
        dense
    }

    /// (rows, columns) of the dense slice
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        let range = self.col_offsets[col]..self.col_offsets[col + 1];
        match self.row_indices[range.clone()].binary_search(&row) {
            Ok(k) => self.values[range.start + k],
            Err(_) => T::zero(),
        }
    }

    /// Iterates (row, column, value) of the stored entries in column order.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.ncols).flat_map(move |col| {
            (self.col_offsets[col]..self.col_offsets[col + 1])
                .map(move |k| (self.row_indices[k], col, self.values[k]))
        })
    }
}

/// Encoder output, dense or one sparse matrix per spectrum.
#[derive(Clone, Debug, PartialEq)]
pub enum EncodedBatch<T: Scalar> {
    Dense(Tensor3<T>),
    Sparse {
        slices: Vec<SparseSlice<T>>,
        n_channels: usize,
        n_bins: usize,
    },
}

impl<T: Scalar + Zero + Copy> EncodedBatch<T> {
    pub fn from_tensor(tensor: Tensor3<T>, sparse: bool) -> Self {
        if sparse {
            EncodedBatch::Sparse {
                slices: tensor.to_sparse(),
                n_channels: tensor.n_channels(),
                n_bins: tensor.n_bins(),
            }
        } else {
            EncodedBatch::Dense(tensor)
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        match self {
            EncodedBatch::Dense(tensor) => tensor.shape(),
            EncodedBatch::Sparse { slices, n_channels, n_bins } => (slices.len(), *n_channels, *n_bins),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, EncodedBatch::Sparse { .. })
    }

    /// Dense tensor, densifying sparse slices if needed.
    pub fn into_dense(self) -> Tensor3<T> {
        match self {
            EncodedBatch::Dense(tensor) => tensor,
            EncodedBatch::Sparse { slices, n_channels, n_bins } => Tensor3 {
                slices: slices.iter().map(SparseSlice::to_dense).collect(),
                n_channels,
                n_bins,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_sparse_round_trip_is_exact() {
        let mut rng = rand::thread_rng();
        let dense = DMatrix::<f32>::from_fn(7, 300, |_, _| {
            if rng.gen_bool(0.05) { rng.gen_range(-10.0..10.0) } else { 0.0 }
        });
        let sparse = SparseSlice::from_dense(&dense);

        assert_eq!(sparse.shape(), (7, 300));
        assert_eq!(sparse.nnz(), dense.iter().filter(|v| **v != 0.0).count());
        assert_eq!(sparse.to_dense(), dense);
        for (row, col, value) in sparse.triplets() {
            assert_eq!(dense[(row, col)], value);
            assert_eq!(sparse.get(row, col), value);
        }
    }

    #[test]
    fn test_sparse_of_empty_slice() {
        let dense = DMatrix::<u8>::zeros(3, 4);
        let sparse = SparseSlice::from_dense(&dense);
        assert_eq!(sparse.nnz(), 0);
        assert_eq!(sparse.get(2, 3), 0);
        assert_eq!(sparse.to_dense(), dense);
    }

    #[test]
    fn test_encoded_batch_densifies() {
        let tensor = Tensor3::<u8>::zeros(3, 2, 8).map(|_| 1u8);
        let batch = EncodedBatch::from_tensor(tensor.clone(), true);
        assert!(batch.is_sparse());
        assert_eq!(batch.shape(), (3, 2, 8));
        assert_eq!(batch.into_dense(), tensor);
    }

    #[test]
    fn test_from_slices_checks_shape() {
        let slices = vec![DMatrix::<f64>::zeros(2, 5), DMatrix::<f64>::zeros(2, 4)];
        assert!(Tensor3::from_slices(slices, 2, 5).is_err());
    }

    #[test]
    fn test_concat_rejects_mismatched_parts() {
        let a = Tensor3::<f64>::zeros(2, 1, 5);
        let b = Tensor3::<f64>::zeros(3, 1, 5);
        let c = Tensor3::<f64>::zeros(2, 1, 6);
        assert!(Tensor3::concat_channels(&[&a, &b]).is_err());
        assert!(Tensor3::concat_channels(&[&a, &c]).is_err());
        assert!(Tensor3::<f64>::concat_channels(&[]).is_err());
    }
}
