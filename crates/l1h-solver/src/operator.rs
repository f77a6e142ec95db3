//! The dictionary operator seam between the path algorithm and compute
//! backends.
//!
//! The homotopy path touches the dictionary through exactly two
//! products: the full correlation `A^T r` (the O(m*n) cost center,
//! which GPU backends accelerate) and the synthesis `A x` for a sparse
//! `x` (cheap, proportional to the support size).

use l1h_core::Dictionary;

/// A dictionary the solver can apply without knowing its storage.
pub trait DictionaryOperator: Send + Sync {
    /// Number of rows (measurement length).
    fn nrows(&self) -> usize;

    /// Number of columns (grid cells plus background).
    fn ncols(&self) -> usize;

    /// Compute `out = A^T r`. `r` has length `nrows`, `out` length `ncols`.
    fn correlate(&self, r: &[f64], out: &mut [f64]);

    /// Compute `out = A x` for sparse `x` given as `(column, value)`
    /// pairs. `out` has length `nrows` and is overwritten.
    fn synthesize(&self, entries: &[(usize, f64)], out: &mut [f64]);

    /// Column index of the unpenalized background term, if any.
    fn background_index(&self) -> Option<usize> {
        None
    }
}

/// Serial CPU operator over a dense column-major dictionary.
pub struct DenseOperator {
    dict: Dictionary,
}

impl DenseOperator {
    /// Wrap a dictionary.
    pub fn new(dict: Dictionary) -> Self {
        Self { dict }
    }

    /// The wrapped dictionary.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }
}

impl DictionaryOperator for DenseOperator {
    fn nrows(&self) -> usize {
        self.dict.nrows()
    }

    fn ncols(&self) -> usize {
        self.dict.ncols()
    }

    fn correlate(&self, r: &[f64], out: &mut [f64]) {
        let m = self.dict.nrows();
        let n = self.dict.ncols();
        assert_eq!(r.len(), m);
        assert_eq!(out.len(), n);

        for (j, oj) in out.iter_mut().enumerate() {
            let col = self.dict.column(j);
            let mut acc = 0.0;
            for i in 0..m {
                acc += col[i] * r[i];
            }
            *oj = acc;
        }
    }

    fn synthesize(&self, entries: &[(usize, f64)], out: &mut [f64]) {
        let m = self.dict.nrows();
        assert_eq!(out.len(), m);

        out.iter_mut().for_each(|v| *v = 0.0);
        for &(j, xj) in entries {
            if xj == 0.0 {
                continue;
            }
            let col = self.dict.column(j);
            for i in 0..m {
                out[i] += col[i] * xj;
            }
        }
    }

    fn background_index(&self) -> Option<usize> {
        self.dict.background_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_dictionary() -> Dictionary {
        // 2x3, columns [1,0], [0,1], [1,1] (column-major).
        Dictionary::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], 2, 3, false).unwrap()
    }

    #[test]
    fn correlate_is_at_transpose() {
        let op = DenseOperator::new(small_dictionary());
        let mut out = vec![0.0; 3];
        op.correlate(&[2.0, 3.0], &mut out);
        assert_eq!(out, vec![2.0, 3.0, 5.0]);
    }

    #[test]
    fn synthesize_sparse_combination() {
        let op = DenseOperator::new(small_dictionary());
        let mut out = vec![0.0; 2];
        op.synthesize(&[(0, 2.0), (2, -1.0)], &mut out);
        assert_eq!(out, vec![1.0, -1.0]);
    }

    #[test]
    fn background_passthrough() {
        let dict = Dictionary::new(vec![1.0, 0.0, 0.0, 1.0], 2, 2, true).unwrap();
        let op = DenseOperator::new(dict);
        assert_eq!(op.background_index(), Some(1));
    }
}
