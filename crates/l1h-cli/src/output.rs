//! JSON interchange types for frames and localization results.

use l1h_batch::FrameAnalysis;
use serde::{Deserialize, Serialize};

/// A camera frame, row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameInput {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<f64>,
}

impl FrameInput {
    /// Check that the pixel buffer matches the declared dimensions.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pixels.len() != self.width * self.height {
            anyhow::bail!(
                "frame declares {}x{} but carries {} pixels",
                self.width,
                self.height,
                self.pixels.len()
            );
        }
        Ok(())
    }
}

/// One recovered emitter, in camera-pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Localization {
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
}

/// Full analysis result written by `l1h analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Hi-res grid width.
    pub width: usize,
    /// Hi-res grid height.
    pub height: usize,
    /// Upsampling factor relating grid cells to camera pixels.
    pub scale: usize,
    pub localizations: Vec<Localization>,
    pub blocks_converged: usize,
    pub blocks_at_limit: usize,
    pub blocks_at_floor: usize,
    pub blocks_failed: usize,
}

impl AnalysisOutput {
    /// Convert a frame analysis into the output form.
    pub fn from_analysis(analysis: &FrameAnalysis, scale: usize) -> Self {
        let localizations = analysis
            .localizations()
            .into_iter()
            .map(|(gx, gy, intensity)| Localization {
                x: (gx as f64 + 0.5) / scale as f64,
                y: (gy as f64 + 0.5) / scale as f64,
                intensity,
            })
            .collect();

        Self {
            width: analysis.width,
            height: analysis.height,
            scale,
            localizations,
            blocks_converged: analysis.stats.converged,
            blocks_at_limit: analysis.stats.max_nonzero,
            blocks_at_floor: analysis.stats.lambda_floor,
            blocks_failed: analysis.stats.failed,
        }
    }
}
