//! Per-block outcome tracking for frame analysis.
//!
//! Different blocks stop for different reasons: empty blocks converge
//! immediately, dense clusters hit the non-zero limit, and degenerate
//! data can fail outright. The stats make the mix visible without
//! digging through per-block results.

use l1h_core::Block;
use l1h_solver::Termination;

/// How one block's solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Residual reached epsilon.
    Converged,
    /// Non-zero limit reached.
    MaxNonzero,
    /// Path ran to the lambda floor.
    LambdaFloor,
    /// The solver returned an error.
    Failed,
}

impl BlockStatus {
    /// Whether the block produced a usable solution.
    #[inline]
    pub fn is_usable(&self) -> bool {
        !matches!(self, BlockStatus::Failed)
    }
}

impl From<Termination> for BlockStatus {
    fn from(t: Termination) -> Self {
        match t {
            Termination::Converged => BlockStatus::Converged,
            Termination::MaxNonzero => BlockStatus::MaxNonzero,
            Termination::LambdaFloor => BlockStatus::LambdaFloor,
        }
    }
}

/// Outcome of one block's solve.
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    /// The block that was analyzed.
    pub block: Block,
    /// How the solve ended.
    pub status: BlockStatus,
    /// Final lambda (0.0 for failed blocks).
    pub lambda: f64,
    /// Path events taken.
    pub iterations: usize,
    /// Final residual norm.
    pub residual: f64,
    /// Penalized support size.
    pub nonzero: usize,
    /// Error text for failed blocks.
    pub error: Option<String>,
}

/// Aggregate statistics over a frame's blocks.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    /// Blocks that converged to epsilon.
    pub converged: usize,
    /// Blocks that hit the non-zero limit.
    pub max_nonzero: usize,
    /// Blocks that ran to the lambda floor.
    pub lambda_floor: usize,
    /// Blocks whose solve failed.
    pub failed: usize,
    /// Total path events across all blocks.
    pub total_iterations: usize,
    /// Largest per-block event count.
    pub max_iterations: usize,
    /// Total emitters found (sum of penalized support sizes).
    pub total_nonzero: usize,
}

impl BatchStats {
    /// Fold one outcome into the totals.
    pub fn record(&mut self, outcome: &BlockOutcome) {
        match outcome.status {
            BlockStatus::Converged => self.converged += 1,
            BlockStatus::MaxNonzero => self.max_nonzero += 1,
            BlockStatus::LambdaFloor => self.lambda_floor += 1,
            BlockStatus::Failed => self.failed += 1,
        }
        self.total_iterations += outcome.iterations;
        self.max_iterations = self.max_iterations.max(outcome.iterations);
        if outcome.status.is_usable() {
            self.total_nonzero += outcome.nonzero;
        }
    }

    /// Number of blocks recorded.
    pub fn total(&self) -> usize {
        self.converged + self.max_nonzero + self.lambda_floor + self.failed
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} blocks: {} converged, {} at limit, {} at floor, {} failed; {} emitters",
            self.total(),
            self.converged,
            self.max_nonzero,
            self.lambda_floor,
            self.failed,
            self.total_nonzero
        )
    }
}
