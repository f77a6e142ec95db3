//! Active-set bookkeeping for the homotopy path.
//!
//! The support is an ordered set of dictionary columns; alongside it we
//! keep each column's coefficient, its sign on the path, and the Gram
//! matrix `G = A_S^T A_S`, grown and shrunk as columns join and leave.

use indexmap::IndexSet;
use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// The current support of the solution.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    indices: IndexSet<usize>,
    signs: Vec<f64>,
    coeffs: Vec<f64>,
    gram: DMatrix<f64>,
}

impl ActiveSet {
    /// Create an empty active set.
    pub fn new() -> Self {
        Self {
            indices: IndexSet::new(),
            signs: Vec::new(),
            coeffs: Vec::new(),
            gram: DMatrix::zeros(0, 0),
        }
    }

    /// Number of columns on the support.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the support is empty.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Whether column `col` is on the support.
    pub fn contains(&self, col: usize) -> bool {
        self.indices.contains(&col)
    }

    /// Position of `col` on the support, if present.
    pub fn position_of(&self, col: usize) -> Option<usize> {
        self.indices.get_index_of(&col)
    }

    /// Column index at support position `pos`.
    pub fn index_at(&self, pos: usize) -> usize {
        self.indices[pos]
    }

    /// Coefficient at support position `pos`.
    pub fn coeff_at(&self, pos: usize) -> f64 {
        self.coeffs[pos]
    }

    /// Iterate `(column, coefficient)` pairs in support order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.coeffs.iter().copied())
    }

    /// Support size excluding the background column, if present.
    pub fn penalized_len(&self, background: Option<usize>) -> usize {
        match background {
            Some(bg) if self.contains(bg) => self.len() - 1,
            _ => self.len(),
        }
    }

    /// Add a column with the given path sign.
    ///
    /// `gram_col` holds `A_S^T a_j` in support order followed by the
    /// diagonal entry `a_j^T a_j`, i.e. it has length `len() + 1`.
    pub fn insert(&mut self, col: usize, sign: f64, gram_col: &[f64]) {
        let k = self.len();
        debug_assert_eq!(gram_col.len(), k + 1);
        debug_assert!(!self.contains(col));

        let mut grown = DMatrix::zeros(k + 1, k + 1);
        grown.view_mut((0, 0), (k, k)).copy_from(&self.gram);
        for i in 0..=k {
            grown[(i, k)] = gram_col[i];
            grown[(k, i)] = gram_col[i];
        }

        self.gram = grown;
        self.indices.insert(col);
        self.signs.push(sign);
        self.coeffs.push(0.0);
    }

    /// Remove the column at support position `pos`.
    pub fn remove_at(&mut self, pos: usize) {
        let k = self.len();
        debug_assert!(pos < k);

        let mut shrunk = DMatrix::zeros(k - 1, k - 1);
        let mut ti = 0;
        for i in 0..k {
            if i == pos {
                continue;
            }
            let mut tj = 0;
            for j in 0..k {
                if j == pos {
                    continue;
                }
                shrunk[(ti, tj)] = self.gram[(i, j)];
                tj += 1;
            }
            ti += 1;
        }

        self.gram = shrunk;
        self.indices.shift_remove_index(pos);
        self.signs.remove(pos);
        self.coeffs.remove(pos);
    }

    /// Solve `G d = s` for the path direction on the support.
    pub fn direction(&self) -> Result<DVector<f64>> {
        let s = DVector::from_column_slice(&self.signs);
        self.gram
            .clone()
            .lu()
            .solve(&s)
            .ok_or(Error::SingularGram {
                support: self.len(),
            })
    }

    /// Advance every coefficient by `gamma` along `d`.
    pub fn step(&mut self, gamma: f64, d: &DVector<f64>) {
        debug_assert_eq!(d.len(), self.len());
        for (c, di) in self.coeffs.iter_mut().zip(d.iter()) {
            *c += gamma * di;
        }
    }

    /// Drop all state.
    pub fn clear(&mut self) {
        self.indices.clear();
        self.signs.clear();
        self.coeffs.clear();
        self.gram = DMatrix::zeros(0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_direction() {
        let mut set = ActiveSet::new();
        // Orthonormal columns: G = I, so d = s.
        set.insert(3, 1.0, &[1.0]);
        set.insert(7, -1.0, &[0.0, 1.0]);

        assert_eq!(set.len(), 2);
        assert!(set.contains(3));
        assert_eq!(set.position_of(7), Some(1));

        let d = set.direction().unwrap();
        assert!((d[0] - 1.0).abs() < 1e-12);
        assert!((d[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlated_columns_direction() {
        let mut set = ActiveSet::new();
        // G = [[1.0, 0.5], [0.5, 1.0]], s = [1, 1] => d = [2/3, 2/3].
        set.insert(0, 1.0, &[1.0]);
        set.insert(1, 1.0, &[0.5, 1.0]);

        let d = set.direction().unwrap();
        assert!((d[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((d[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn remove_preserves_gram() {
        let mut set = ActiveSet::new();
        set.insert(0, 1.0, &[1.0]);
        set.insert(1, 1.0, &[0.25, 1.0]);
        set.insert(2, -1.0, &[0.5, 0.125, 1.0]);

        set.remove_at(1);
        assert_eq!(set.len(), 2);
        assert_eq!(set.index_at(0), 0);
        assert_eq!(set.index_at(1), 2);

        // Remaining Gram must be [[1.0, 0.5], [0.5, 1.0]].
        let d = set.direction().unwrap();
        // s = [1, -1]: d = G^-1 s = [2, -2] for this G.
        assert!((d[0] - 2.0).abs() < 1e-12, "d[0] = {}", d[0]);
        assert!((d[1] + 2.0).abs() < 1e-12, "d[1] = {}", d[1]);
    }

    #[test]
    fn singular_gram_is_reported() {
        let mut set = ActiveSet::new();
        // Identical columns: G is rank one.
        set.insert(0, 1.0, &[1.0]);
        set.insert(1, 1.0, &[1.0, 1.0]);

        assert!(matches!(
            set.direction(),
            Err(Error::SingularGram { support: 2 })
        ));
    }

    #[test]
    fn step_moves_coefficients() {
        let mut set = ActiveSet::new();
        set.insert(0, 1.0, &[1.0]);
        let d = set.direction().unwrap();
        set.step(0.5, &d);
        assert!((set.coeff_at(0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn penalized_len_excludes_background() {
        let mut set = ActiveSet::new();
        set.insert(0, 1.0, &[1.0]);
        set.insert(9, 1.0, &[0.0, 1.0]);

        assert_eq!(set.penalized_len(None), 2);
        assert_eq!(set.penalized_len(Some(9)), 1);
        assert_eq!(set.penalized_len(Some(5)), 2);
    }
}
