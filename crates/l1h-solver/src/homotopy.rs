//! The L1 homotopy (LARS-LASSO) path solver.
//!
//! Minimizes `0.5 * ||A x - y||^2 + lambda * ||x||_1` by following the
//! regularization path from `lambda_max = max_j |a_j^T y|` downward.
//! Between events the solution moves linearly; at each event one column
//! joins or leaves the support. The path stops at the first of: the
//! residual dropping below `epsilon`, the support reaching the
//! non-zero limit, or `lambda` reaching the floor.

use std::sync::Arc;

use l1h_core::Dictionary;
use log::{debug, warn};

use crate::active_set::ActiveSet;
use crate::error::{Error, Result};
use crate::operator::{DenseOperator, DictionaryOperator};

/// Step sizes below this are treated as zero when ranking events.
const STEP_TOL: f64 = 1e-12;

/// Denominators below this cannot produce a join event.
const DENOM_TOL: f64 = 1e-12;

/// Tunable limits for the homotopy path.
#[derive(Debug, Clone)]
pub struct HomotopyConfig {
    /// Restrict penalized coefficients to be non-negative.
    ///
    /// Emitter intensities are physical counts, so localization runs
    /// set this; the background column is never constrained.
    pub positive_only: bool,
    /// Maximum penalized support size before the path stops.
    pub max_nonzero: usize,
    /// Maximum number of path events before giving up.
    pub max_iterations: usize,
    /// The path terminates when `lambda` falls to this value.
    pub lambda_floor: f64,
}

impl Default for HomotopyConfig {
    fn default() -> Self {
        Self {
            positive_only: false,
            max_nonzero: usize::MAX,
            max_iterations: 10_000,
            lambda_floor: 1e-9,
        }
    }
}

impl HomotopyConfig {
    /// Configuration for localization: non-negative coefficients and a
    /// hard support limit.
    pub fn localization(max_nonzero: usize) -> Self {
        Self {
            positive_only: true,
            max_nonzero,
            ..Default::default()
        }
    }
}

/// Why the path stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The residual norm dropped to `epsilon` or below.
    Converged,
    /// Adding another column would exceed the non-zero limit.
    MaxNonzero,
    /// `lambda` reached the configured floor.
    LambdaFloor,
}

/// Outcome of one path run.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// `lambda` at the point where the path stopped.
    pub lambda: f64,
    /// Number of path events taken.
    pub iterations: usize,
    /// Final residual norm `||y - A x||_2`.
    pub residual: f64,
    /// Penalized support size at the stop point.
    pub nonzero: usize,
    /// Why the path stopped.
    pub termination: Termination,
}

/// A pending path event.
#[derive(Debug, Clone, Copy)]
enum Event {
    /// Column joins the support with the given sign.
    Join(usize, f64),
    /// Support position leaves (coefficient crossed zero).
    Leave(usize),
    /// `lambda` reaches the floor first.
    PathEnd,
}

/// The homotopy solver. One instance amortizes dictionary setup across
/// many measurement vectors.
pub struct HomotopySolver {
    op: Arc<dyn DictionaryOperator>,
    config: HomotopyConfig,
    y: Option<Vec<f64>>,
    active: ActiveSet,
}

impl HomotopySolver {
    /// Create a solver over any dictionary operator.
    pub fn new(op: Arc<dyn DictionaryOperator>, config: HomotopyConfig) -> Self {
        Self {
            op,
            config,
            y: None,
            active: ActiveSet::new(),
        }
    }

    /// Convenience constructor over a dense dictionary.
    pub fn from_dictionary(dict: Dictionary, config: HomotopyConfig) -> Self {
        Self::new(Arc::new(DenseOperator::new(dict)), config)
    }

    /// The solver's configuration.
    pub fn config(&self) -> &HomotopyConfig {
        &self.config
    }

    /// The dictionary operator.
    pub fn operator(&self) -> &Arc<dyn DictionaryOperator> {
        &self.op
    }

    /// Set the measurement vector for subsequent solves.
    ///
    /// Resets any previous path state; the solver can be reused across
    /// measurements without rebuilding the dictionary.
    pub fn set_measurement(&mut self, y: &[f64]) -> Result<()> {
        if y.len() != self.op.nrows() {
            return Err(Error::DimensionMismatch {
                expected: self.op.nrows(),
                actual: y.len(),
            });
        }
        self.y = Some(y.to_vec());
        self.active.clear();
        Ok(())
    }

    /// Dense copy of the current solution.
    pub fn solution(&self) -> Vec<f64> {
        let mut x = vec![0.0; self.op.ncols()];
        for (col, coeff) in self.active.iter() {
            x[col] = coeff;
        }
        x
    }

    /// Non-zero entries of the current solution as `(column, value)`.
    pub fn nonzero(&self) -> Vec<(usize, f64)> {
        self.active
            .iter()
            .filter(|&(_, coeff)| coeff != 0.0)
            .collect()
    }

    /// Run the path with the configured non-zero limit.
    pub fn solve(&mut self, epsilon: f64) -> Result<SolveResult> {
        self.solve_with_limit(epsilon, self.config.max_nonzero)
    }

    /// Run the path with an explicit non-zero limit.
    pub fn solve_with_limit(&mut self, epsilon: f64, max_nonzero: usize) -> Result<SolveResult> {
        let y = self.y.clone().ok_or(Error::NoMeasurement)?;
        let m = self.op.nrows();
        let n = self.op.ncols();
        let background = self.op.background_index();

        self.active.clear();

        let mut r = y; // residual y - A x, with x = 0
        let mut c = vec![0.0; n];
        self.op.correlate(&r, &mut c);

        let mut residual = norm2(&r);
        let seeded = self.seed_lambda(&c);
        let mut lambda = seeded.map(|(_, l)| l).unwrap_or(0.0);

        if residual <= epsilon {
            return Ok(self.finish(lambda, 0, residual, Termination::Converged));
        }
        if max_nonzero == 0 {
            return Ok(self.finish(lambda, 0, residual, Termination::MaxNonzero));
        }
        let seed = match seeded {
            Some((j, _)) if lambda > self.config.lambda_floor => j,
            _ => return Ok(self.finish(lambda, 0, residual, Termination::LambdaFloor)),
        };
        self.insert_column(seed, path_sign(c[seed]));

        let mut u = vec![0.0; m];
        let mut b = vec![0.0; n];

        for iteration in 1..=self.config.max_iterations {
            let d = self.active.direction()?;

            let entries: Vec<(usize, f64)> = (0..self.active.len())
                .map(|pos| (self.active.index_at(pos), d[pos]))
                .collect();
            self.op.synthesize(&entries, &mut u);
            self.op.correlate(&u, &mut b);

            // Smallest positive step to the next event; the path ends
            // at the lambda floor if nothing happens sooner.
            let mut gamma = lambda - self.config.lambda_floor;
            let mut event = Event::PathEnd;

            for j in 0..n {
                if self.active.contains(j) {
                    continue;
                }
                let constrained = self.config.positive_only && Some(j) != background;

                let denom = 1.0 - b[j];
                if denom > DENOM_TOL {
                    let g = (lambda - c[j]) / denom;
                    if g > STEP_TOL && g < gamma {
                        gamma = g;
                        event = Event::Join(j, 1.0);
                    }
                }
                if !constrained {
                    let denom = 1.0 + b[j];
                    if denom > DENOM_TOL {
                        let g = (lambda + c[j]) / denom;
                        if g > STEP_TOL && g < gamma {
                            gamma = g;
                            event = Event::Join(j, -1.0);
                        }
                    }
                }
            }

            for pos in 0..self.active.len() {
                let di = d[pos];
                if di.abs() > DENOM_TOL {
                    let g = -self.active.coeff_at(pos) / di;
                    if g > STEP_TOL && g < gamma {
                        gamma = g;
                        event = Event::Leave(pos);
                    }
                }
            }

            if !gamma.is_finite() || gamma < 0.0 {
                return Err(Error::PathStalled {
                    iterations: iteration,
                });
            }

            self.active.step(gamma, &d);
            for (ri, ui) in r.iter_mut().zip(u.iter()) {
                *ri -= gamma * ui;
            }
            for (cj, bj) in c.iter_mut().zip(b.iter()) {
                *cj -= gamma * bj;
            }
            lambda -= gamma;
            residual = norm2(&r);

            if residual <= epsilon {
                return Ok(self.finish(lambda, iteration, residual, Termination::Converged));
            }

            match event {
                Event::Join(j, sign) => {
                    let penalized = Some(j) != background;
                    let next = self.active.penalized_len(background) + usize::from(penalized);
                    if next > max_nonzero {
                        return Ok(self.finish(
                            lambda,
                            iteration,
                            residual,
                            Termination::MaxNonzero,
                        ));
                    }
                    self.insert_column(j, sign);
                }
                Event::Leave(pos) => {
                    debug!(
                        "column {} leaves the support at lambda {:.3e}",
                        self.active.index_at(pos),
                        lambda
                    );
                    self.active.remove_at(pos);
                    if self.active.is_empty() {
                        // Degenerate removal of the last column: restart
                        // the path from the current correlations.
                        match self.seed_lambda(&c) {
                            Some((j, l)) if l > self.config.lambda_floor => {
                                lambda = l;
                                let sign = path_sign(c[j]);
                                self.insert_column(j, sign);
                            }
                            _ => {
                                return Ok(self.finish(
                                    lambda,
                                    iteration,
                                    residual,
                                    Termination::LambdaFloor,
                                ));
                            }
                        }
                    }
                }
                Event::PathEnd => {
                    return Ok(self.finish(
                        lambda,
                        iteration,
                        residual,
                        Termination::LambdaFloor,
                    ));
                }
            }
        }

        warn!(
            "homotopy path exhausted {} iterations (lambda {:.3e}, residual {:.3e})",
            self.config.max_iterations, lambda, residual
        );
        Err(Error::PathStalled {
            iterations: self.config.max_iterations,
        })
    }

    /// Largest admissible correlation and its column.
    fn seed_lambda(&self, c: &[f64]) -> Option<(usize, f64)> {
        let background = self.op.background_index();
        let mut best: Option<(usize, f64)> = None;
        for (j, &cj) in c.iter().enumerate() {
            let constrained = self.config.positive_only && Some(j) != background;
            let value = if constrained { cj } else { cj.abs() };
            if value <= 0.0 {
                continue;
            }
            if best.map_or(true, |(_, v)| value > v) {
                best = Some((j, value));
            }
        }
        best
    }

    /// Add `col` to the support, extending the Gram matrix.
    fn insert_column(&mut self, col: usize, sign: f64) {
        let mut unit = vec![0.0; self.op.nrows()];
        self.op.synthesize(&[(col, 1.0)], &mut unit);
        let mut corr = vec![0.0; self.op.ncols()];
        self.op.correlate(&unit, &mut corr);

        let mut gram_col = Vec::with_capacity(self.active.len() + 1);
        for pos in 0..self.active.len() {
            gram_col.push(corr[self.active.index_at(pos)]);
        }
        gram_col.push(corr[col]);

        self.active.insert(col, sign, &gram_col);
    }

    fn finish(
        &self,
        lambda: f64,
        iterations: usize,
        residual: f64,
        termination: Termination,
    ) -> SolveResult {
        SolveResult {
            lambda,
            iterations,
            residual,
            nonzero: self.active.penalized_len(self.op.background_index()),
            termination,
        }
    }
}

fn norm2(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn path_sign(c: f64) -> f64 {
    if c >= 0.0 { 1.0 } else { -1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l1h_core::{Dictionary, DictionaryBuilder};

    fn identity_dictionary(n: usize) -> Dictionary {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Dictionary::new(data, n, n, false).unwrap()
    }

    #[test]
    fn identity_recovers_soft_threshold() {
        // With A = I the lasso solution is soft thresholding; running
        // the path to a small lambda recovers y almost exactly.
        let mut solver =
            HomotopySolver::from_dictionary(identity_dictionary(4), HomotopyConfig::default());
        solver.set_measurement(&[3.0, 0.0, -1.0, 0.5]).unwrap();

        let result = solver.solve(1e-8).unwrap();
        assert_eq!(result.termination, Termination::Converged);

        let x = solver.solution();
        assert!((x[0] - 3.0).abs() < 1e-6);
        assert!(x[1].abs() < 1e-6);
        assert!((x[2] + 1.0).abs() < 1e-6);
        assert!((x[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn lambda_decreases_along_path() {
        let mut solver =
            HomotopySolver::from_dictionary(identity_dictionary(3), HomotopyConfig::default());
        solver.set_measurement(&[2.0, 1.0, 0.5]).unwrap();

        // Stop early: with one nonzero allowed, the path stops at the
        // event where the second column would join, i.e. lambda = 1.
        let result = solver.solve_with_limit(0.0, 1).unwrap();
        assert_eq!(result.termination, Termination::MaxNonzero);
        assert_eq!(result.nonzero, 1);
        assert!((result.lambda - 1.0).abs() < 1e-9, "lambda = {}", result.lambda);

        let x = solver.solution();
        assert!((x[0] - 1.0).abs() < 1e-9, "x[0] = {}", x[0]);
    }

    #[test]
    fn positive_only_blocks_negative_coefficients() {
        let mut config = HomotopyConfig::default();
        config.positive_only = true;
        let mut solver = HomotopySolver::from_dictionary(identity_dictionary(3), config);
        solver.set_measurement(&[2.0, -5.0, 1.0]).unwrap();

        let result = solver.solve(1e-12).unwrap();
        // y[1] is negative and cannot be represented; the path runs to
        // the lambda floor with the two positive entries recovered.
        assert_eq!(result.termination, Termination::LambdaFloor);

        let x = solver.solution();
        assert!((x[0] - 2.0).abs() < 1e-6);
        assert!(x[1].abs() < 1e-12);
        assert!((x[2] - 1.0).abs() < 1e-6);
        assert!(x.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn iteration_limit_is_an_error() {
        // Three events are needed to converge here; one is allowed.
        let config = HomotopyConfig {
            max_iterations: 1,
            ..Default::default()
        };
        let mut solver = HomotopySolver::from_dictionary(identity_dictionary(3), config);
        solver.set_measurement(&[2.0, 1.0, 0.5]).unwrap();

        assert!(matches!(
            solver.solve(1e-9),
            Err(Error::PathStalled { iterations: 1 })
        ));
    }

    #[test]
    fn zero_measurement_returns_immediately() {
        let mut solver =
            HomotopySolver::from_dictionary(identity_dictionary(3), HomotopyConfig::default());
        solver.set_measurement(&[0.0, 0.0, 0.0]).unwrap();

        let result = solver.solve(1e-9).unwrap();
        assert_eq!(result.termination, Termination::Converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.lambda, 0.0);
        assert!(solver.solution().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn max_nonzero_zero_returns_empty() {
        let mut solver =
            HomotopySolver::from_dictionary(identity_dictionary(3), HomotopyConfig::default());
        solver.set_measurement(&[1.0, 2.0, 3.0]).unwrap();

        let result = solver.solve_with_limit(0.0, 0).unwrap();
        assert_eq!(result.termination, Termination::MaxNonzero);
        assert_eq!(result.nonzero, 0);
        assert!(solver.solution().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn solve_without_measurement_fails() {
        let mut solver =
            HomotopySolver::from_dictionary(identity_dictionary(3), HomotopyConfig::default());
        assert!(matches!(solver.solve(1e-9), Err(Error::NoMeasurement)));
    }

    #[test]
    fn wrong_measurement_length_fails() {
        let mut solver =
            HomotopySolver::from_dictionary(identity_dictionary(3), HomotopyConfig::default());
        assert!(matches!(
            solver.set_measurement(&[1.0, 2.0]),
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn solver_is_reusable_across_measurements() {
        let mut solver =
            HomotopySolver::from_dictionary(identity_dictionary(3), HomotopyConfig::default());

        solver.set_measurement(&[1.0, 0.0, 0.0]).unwrap();
        solver.solve(1e-9).unwrap();
        let first = solver.solution();

        solver.set_measurement(&[0.0, 2.0, 0.0]).unwrap();
        solver.solve(1e-9).unwrap();
        let second = solver.solution();

        assert!((first[0] - 1.0).abs() < 1e-6);
        assert!((second[1] - 2.0).abs() < 1e-6);
        assert!(second[0].abs() < 1e-9);
    }

    #[test]
    fn correlated_columns_respect_kkt() {
        // Non-trivial dictionary: overcomplete PSF dictionary, a
        // measurement synthesized from two emitters.
        let dict = DictionaryBuilder::new()
            .block_size(5)
            .scale(2)
            .margin(2)
            .sigma(1.0)
            .build()
            .unwrap();
        let op = DenseOperator::new(dict.clone());

        let mut y = vec![0.0; dict.nrows()];
        op.synthesize(&[(40, 2.0), (90, 1.0)], &mut y);

        let mut solver = HomotopySolver::from_dictionary(
            dict,
            HomotopyConfig {
                positive_only: true,
                max_nonzero: 10,
                ..Default::default()
            },
        );
        solver.set_measurement(&y).unwrap();
        let result = solver.solve(1e-6).unwrap();

        // KKT at the stop point: off-support correlations must not
        // exceed lambda (up to numerical tolerance).
        let x = solver.solution();
        let mut ax = vec![0.0; y.len()];
        op.synthesize(&solver.nonzero(), &mut ax);
        let r: Vec<f64> = y.iter().zip(ax.iter()).map(|(a, b)| a - b).collect();
        let mut c = vec![0.0; x.len()];
        op.correlate(&r, &mut c);

        for (j, &cj) in c.iter().enumerate() {
            assert!(
                cj <= result.lambda + 1e-6,
                "KKT violated at column {}: c = {}, lambda = {}",
                j,
                cj,
                result.lambda
            );
        }
        assert!(x.iter().all(|&v| v >= -1e-10));
    }

    #[test]
    fn background_column_is_unconstrained() {
        // Identity plus a constant background column; negative uniform
        // offset must be absorbed by the background even in
        // positive-only mode.
        let n = 4;
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        let bg = 1.0 / (n as f64).sqrt();
        data.extend(std::iter::repeat(bg).take(n));
        let dict = Dictionary::new(data, n, n + 1, true).unwrap();

        let mut solver = HomotopySolver::from_dictionary(
            dict,
            HomotopyConfig {
                positive_only: true,
                ..Default::default()
            },
        );
        solver.set_measurement(&[-1.0, -1.0, -1.0, -1.0]).unwrap();

        let result = solver.solve(1e-8).unwrap();
        assert_eq!(result.termination, Termination::Converged);
        // All signal lands on the background coefficient.
        assert_eq!(result.nonzero, 0);
        let x = solver.solution();
        assert!((x[n] + 2.0).abs() < 1e-6, "background = {}", x[n]);
        for &v in &x[..n] {
            assert!(v.abs() < 1e-9);
        }
    }
}
