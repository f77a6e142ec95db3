//! CPU backend for L1H with rayon-parallel correlations.
//!
//! The correlation `A^T r` is embarrassingly parallel over columns.
//! Below a column-count threshold the rayon overhead is not worth
//! paying, so small dictionaries fall back to the serial loop.

use l1h_core::Dictionary;
use l1h_solver::DictionaryOperator;
use rayon::prelude::*;

/// Column count below which correlations stay serial.
pub const PARALLEL_THRESHOLD: usize = 4096;

/// Dense dictionary operator with rayon-parallel `correlate`.
pub struct RayonDenseOperator {
    dict: Dictionary,
    parallel_threshold: usize,
}

impl RayonDenseOperator {
    /// Wrap a dictionary with the default threshold.
    pub fn new(dict: Dictionary) -> Self {
        Self {
            dict,
            parallel_threshold: PARALLEL_THRESHOLD,
        }
    }

    /// Override the serial/parallel cutover.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// The wrapped dictionary.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    fn correlate_serial(&self, r: &[f64], out: &mut [f64]) {
        for (j, oj) in out.iter_mut().enumerate() {
            *oj = dot(self.dict.column(j), r);
        }
    }

    fn correlate_parallel(&self, r: &[f64], out: &mut [f64]) {
        out.par_iter_mut().enumerate().for_each(|(j, oj)| {
            *oj = dot(self.dict.column(j), r);
        });
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

impl DictionaryOperator for RayonDenseOperator {
    fn nrows(&self) -> usize {
        self.dict.nrows()
    }

    fn ncols(&self) -> usize {
        self.dict.ncols()
    }

    fn correlate(&self, r: &[f64], out: &mut [f64]) {
        assert_eq!(r.len(), self.dict.nrows());
        assert_eq!(out.len(), self.dict.ncols());

        if self.dict.ncols() >= self.parallel_threshold {
            self.correlate_parallel(r, out);
        } else {
            self.correlate_serial(r, out);
        }
    }

    fn synthesize(&self, entries: &[(usize, f64)], out: &mut [f64]) {
        assert_eq!(out.len(), self.dict.nrows());

        out.iter_mut().for_each(|v| *v = 0.0);
        for &(j, xj) in entries {
            if xj == 0.0 {
                continue;
            }
            let col = self.dict.column(j);
            for (oi, ci) in out.iter_mut().zip(col.iter()) {
                *oi += ci * xj;
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
    use l1h_core::DictionaryBuilder;
    use l1h_solver::DenseOperator;

    fn test_dictionary() -> Dictionary {
        DictionaryBuilder::new()
            .block_size(5)
            .scale(2)
            .margin(2)
            .sigma(1.0)
            .build()
            .unwrap()
    }

    #[test]
    fn parallel_matches_serial() {
        let dict = test_dictionary();
        let serial = DenseOperator::new(dict.clone());
        // Threshold 0 forces the parallel path.
        let parallel = RayonDenseOperator::new(dict).with_parallel_threshold(0);

        let r: Vec<f64> = (0..serial.nrows()).map(|i| (i as f64) * 0.31 - 2.0).collect();
        let mut cs = vec![0.0; serial.ncols()];
        let mut cp = vec![0.0; serial.ncols()];
        serial.correlate(&r, &mut cs);
        parallel.correlate(&r, &mut cp);

        for j in 0..serial.ncols() {
            assert!((cs[j] - cp[j]).abs() < 1e-12, "column {}", j);
        }
    }

    #[test]
    fn small_dictionaries_stay_serial() {
        let dict = test_dictionary();
        let ncols = dict.ncols();
        let op = RayonDenseOperator::new(dict);
        assert!(ncols < op.parallel_threshold);
    }

    #[test]
    fn synthesize_matches_dense() {
        let dict = test_dictionary();
        let dense = DenseOperator::new(dict.clone());
        let rayon_op = RayonDenseOperator::new(dict);

        let entries = [(3, 1.5), (40, -0.5)];
        let mut a = vec![0.0; dense.nrows()];
        let mut b = vec![0.0; dense.nrows()];
        dense.synthesize(&entries, &mut a);
        rayon_op.synthesize(&entries, &mut b);
        assert_eq!(a, b);
    }
}
