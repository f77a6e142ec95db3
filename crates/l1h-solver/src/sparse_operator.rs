//! Sparse dictionary operator backed by faer's CSC storage.
//!
//! Gaussian PSF columns decay fast; truncating the tails leaves a
//! sparse matrix whose correlation cost scales with the PSF footprint
//! instead of the block area. Useful for large blocks on the CPU path.

use faer::sparse::{SparseColMat, Triplet};
use l1h_core::Dictionary;

use crate::operator::DictionaryOperator;

/// Sparse CSC dictionary operator.
pub struct SparseOperator {
    matrix: SparseColMat<usize, f64>,
    background: Option<usize>,
}

impl SparseOperator {
    /// Build from a dense dictionary, dropping entries smaller than
    /// `threshold` times the column's largest absolute value.
    ///
    /// Returns `None` if the truncated matrix cannot be assembled
    /// (which only happens for degenerate inputs).
    pub fn from_dictionary(dict: &Dictionary, threshold: f64) -> Option<Self> {
        let m = dict.nrows();
        let n = dict.ncols();

        let mut triplets = Vec::new();
        for j in 0..n {
            let col = dict.column(j);
            let peak = col.iter().fold(0.0f64, |acc, &v| acc.max(v.abs()));
            let cut = peak * threshold;
            for (i, &v) in col.iter().enumerate() {
                if v.abs() >= cut {
                    triplets.push(Triplet::new(i, j, v));
                }
            }
        }

        let matrix = SparseColMat::<usize, f64>::try_new_from_triplets(m, n, &triplets).ok()?;
        Some(Self {
            matrix,
            background: dict.background_index(),
        })
    }

    /// Build from explicit triplets `(row, col, value)`.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: &[(usize, usize, f64)],
        background: Option<usize>,
    ) -> Option<Self> {
        let faer_triplets: Vec<_> = triplets
            .iter()
            .map(|&(r, c, v)| Triplet::new(r, c, v))
            .collect();
        let matrix =
            SparseColMat::<usize, f64>::try_new_from_triplets(nrows, ncols, &faer_triplets).ok()?;
        Some(Self { matrix, background })
    }

    /// Fraction of stored entries relative to the dense size.
    pub fn density(&self) -> f64 {
        let mat = self.matrix.as_ref();
        mat.val().len() as f64 / (mat.nrows() * mat.ncols()) as f64
    }

    /// The underlying CSC matrix.
    pub fn matrix(&self) -> &SparseColMat<usize, f64> {
        &self.matrix
    }
}

impl DictionaryOperator for SparseOperator {
    fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    fn correlate(&self, r: &[f64], out: &mut [f64]) {
        let mat = self.matrix.as_ref();
        assert_eq!(r.len(), mat.nrows());
        assert_eq!(out.len(), mat.ncols());

        let col_ptrs = mat.col_ptr();
        let row_indices = mat.row_idx();
        let values = mat.val();

        for (j, oj) in out.iter_mut().enumerate() {
            let mut acc = 0.0;
            for idx in col_ptrs[j]..col_ptrs[j + 1] {
                acc += values[idx] * r[row_indices[idx]];
            }
            *oj = acc;
        }
    }

    fn synthesize(&self, entries: &[(usize, f64)], out: &mut [f64]) {
        let mat = self.matrix.as_ref();
        assert_eq!(out.len(), mat.nrows());

        let col_ptrs = mat.col_ptr();
        let row_indices = mat.row_idx();
        let values = mat.val();

        out.iter_mut().for_each(|v| *v = 0.0);
        for &(j, xj) in entries {
            if xj == 0.0 {
                continue;
            }
            for idx in col_ptrs[j]..col_ptrs[j + 1] {
                out[row_indices[idx]] += values[idx] * xj;
            }
        }
    }

    fn background_index(&self) -> Option<usize> {
        self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::DenseOperator;
    use l1h_core::DictionaryBuilder;

    #[test]
    fn matches_dense_with_zero_threshold() {
        let dict = DictionaryBuilder::new()
            .block_size(4)
            .scale(2)
            .margin(2)
            .sigma(1.0)
            .build()
            .unwrap();

        let sparse = SparseOperator::from_dictionary(&dict, 0.0).unwrap();
        let dense = DenseOperator::new(dict);

        let r: Vec<f64> = (0..dense.nrows()).map(|i| (i as f64) * 0.37 - 1.0).collect();
        let mut cs = vec![0.0; dense.ncols()];
        let mut cd = vec![0.0; dense.ncols()];
        sparse.correlate(&r, &mut cs);
        dense.correlate(&r, &mut cd);

        for j in 0..dense.ncols() {
            assert!((cs[j] - cd[j]).abs() < 1e-12, "column {}", j);
        }
    }

    #[test]
    fn truncation_reduces_density() {
        let dict = DictionaryBuilder::new()
            .block_size(6)
            .scale(2)
            .margin(2)
            .sigma(0.8)
            .build()
            .unwrap();

        let full = SparseOperator::from_dictionary(&dict, 0.0).unwrap();
        let cut = SparseOperator::from_dictionary(&dict, 1e-3).unwrap();
        assert!(cut.density() < full.density());
    }

    #[test]
    fn synthesize_from_triplets() {
        // A = [[1, 0], [2, 3]]
        let op = SparseOperator::from_triplets(
            2,
            2,
            &[(0, 0, 1.0), (1, 0, 2.0), (1, 1, 3.0)],
            None,
        )
        .unwrap();

        let mut out = vec![0.0; 2];
        op.synthesize(&[(0, 2.0), (1, 1.0)], &mut out);
        assert_eq!(out, vec![2.0, 7.0]);
    }
}
