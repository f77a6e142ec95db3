//! Frame analysis: run the homotopy solver over every block of a
//! frame and assemble the high-resolution result.

use std::sync::Arc;

use l1h_core::{Block, BlockGrid, Dictionary, GridLayout};
use l1h_solver::{DenseOperator, DictionaryOperator, HomotopyConfig, HomotopySolver};
use log::{debug, info};
use rayon::prelude::*;

use crate::error::{BatchError, Result};
use crate::stats::{BatchStats, BlockOutcome, BlockStatus};

/// Settings for a frame analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Residual target passed to every block solve.
    pub epsilon: f64,
    /// Homotopy limits for every block solve.
    pub solver: HomotopyConfig,
    /// Solve blocks in parallel with rayon.
    ///
    /// Leave off when the operator is a GPU operator: block solves
    /// would serialize on the device queue anyway.
    pub parallel: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-4,
            solver: HomotopyConfig::localization(50),
            parallel: true,
        }
    }
}

/// Result of analyzing one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    /// High-resolution coefficient image, row-major.
    pub hires: Vec<f64>,
    /// High-resolution image width.
    pub width: usize,
    /// High-resolution image height.
    pub height: usize,
    /// Per-block outcomes, in block order.
    pub outcomes: Vec<BlockOutcome>,
    /// Aggregate statistics.
    pub stats: BatchStats,
}

impl FrameAnalysis {
    /// Localizations as `(hi-res x, hi-res y, intensity)` triples.
    pub fn localizations(&self) -> Vec<(usize, usize, f64)> {
        self.hires
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(i, &v)| (i % self.width, i / self.width, v))
            .collect()
    }
}

/// Runs the homotopy solver over every block of a frame.
pub struct BlockAnalyzer {
    grid: BlockGrid,
    layout: GridLayout,
    op: Arc<dyn DictionaryOperator>,
    config: AnalyzerConfig,
}

impl BlockAnalyzer {
    /// Create an analyzer over a dense dictionary.
    ///
    /// The dictionary must carry a grid layout (i.e. come from
    /// [`l1h_core::DictionaryBuilder`]) matching the tiling.
    pub fn new(grid: BlockGrid, dict: Dictionary, config: AnalyzerConfig) -> Result<Self> {
        let layout = dict
            .layout()
            .ok_or_else(|| BatchError::LayoutMismatch("dictionary has no grid layout".into()))?;
        let op: Arc<dyn DictionaryOperator> = Arc::new(DenseOperator::new(dict));
        Self::with_operator(grid, layout, op, config)
    }

    /// Create an analyzer over an explicit operator (e.g. a GPU or
    /// rayon operator sharing one uploaded dictionary).
    pub fn with_operator(
        grid: BlockGrid,
        layout: GridLayout,
        op: Arc<dyn DictionaryOperator>,
        config: AnalyzerConfig,
    ) -> Result<Self> {
        if layout.block_size != grid.block_size() {
            return Err(BatchError::LayoutMismatch(format!(
                "dictionary block size {} vs grid block size {}",
                layout.block_size,
                grid.block_size()
            )));
        }
        if layout.scale != grid.scale() {
            return Err(BatchError::LayoutMismatch(format!(
                "dictionary scale {} vs grid scale {}",
                layout.scale,
                grid.scale()
            )));
        }
        let expected_rows = layout.block_size * layout.block_size;
        if op.nrows() != expected_rows {
            return Err(BatchError::LayoutMismatch(format!(
                "operator has {} rows, layout wants {}",
                op.nrows(),
                expected_rows
            )));
        }
        Ok(Self {
            grid,
            layout,
            op,
            config,
        })
    }

    /// The frame tiling.
    pub fn grid(&self) -> &BlockGrid {
        &self.grid
    }

    /// Analyze one frame (row-major, `width * height` camera pixels).
    pub fn analyze(&self, frame: &[f64]) -> Result<FrameAnalysis> {
        let expected = self.grid.width() * self.grid.height();
        if frame.len() != expected {
            return Err(BatchError::FrameSize {
                expected,
                actual: frame.len(),
            });
        }

        let blocks = self.grid.blocks();
        debug!(
            "analyzing {}x{} frame in {} blocks",
            self.grid.width(),
            self.grid.height(),
            blocks.len()
        );

        let results: Vec<(BlockOutcome, Vec<f64>)> = if self.config.parallel {
            blocks
                .par_iter()
                .map(|&block| self.solve_block(frame, block))
                .collect::<Result<_>>()?
        } else {
            blocks
                .iter()
                .map(|&block| self.solve_block(frame, block))
                .collect::<Result<_>>()?
        };

        let (hw, hh) = self.grid.hires_dims();
        let mut hires = vec![0.0; hw * hh];
        let mut stats = BatchStats::default();
        let mut outcomes = Vec::with_capacity(results.len());

        for (outcome, coeffs) in results {
            if outcome.status.is_usable() {
                self.grid
                    .accumulate(&self.layout, outcome.block, &coeffs, &mut hires)?;
            }
            stats.record(&outcome);
            outcomes.push(outcome);
        }

        info!("{}", stats.summary());

        Ok(FrameAnalysis {
            hires,
            width: hw,
            height: hh,
            outcomes,
            stats,
        })
    }

    /// Solve one block; failures become a `Failed` outcome instead of
    /// aborting the frame.
    fn solve_block(&self, frame: &[f64], block: Block) -> Result<(BlockOutcome, Vec<f64>)> {
        let y = self.grid.extract(frame, block)?;

        let mut solver = HomotopySolver::new(Arc::clone(&self.op), self.config.solver.clone());
        solver.set_measurement(&y)?;

        match solver.solve(self.config.epsilon) {
            Ok(result) => Ok((
                BlockOutcome {
                    block,
                    status: BlockStatus::from(result.termination),
                    lambda: result.lambda,
                    iterations: result.iterations,
                    residual: result.residual,
                    nonzero: result.nonzero,
                    error: None,
                },
                solver.solution(),
            )),
            Err(e) => Ok((
                BlockOutcome {
                    block,
                    status: BlockStatus::Failed,
                    lambda: 0.0,
                    iterations: 0,
                    residual: 0.0,
                    nonzero: 0,
                    error: Some(e.to_string()),
                },
                Vec::new(),
            )),
        }
    }
}
