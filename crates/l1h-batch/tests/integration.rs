//! End-to-end frame analysis against synthetic ground truth.

use std::sync::Arc;

use l1h_backend_cpu::RayonDenseOperator;
use l1h_batch::{AnalyzerConfig, BlockAnalyzer, BlockStatus};
use l1h_core::{BlockGrid, DictionaryBuilder};
use l1h_solver::HomotopyConfig;

const SIGMA: f64 = 1.0;
const SCALE: usize = 2;

/// Render a Gaussian emitter into a frame at camera coordinates.
fn render_emitter(frame: &mut [f64], width: usize, cx: f64, cy: f64, amp: f64) {
    let height = frame.len() / width;
    for py in 0..height {
        for px in 0..width {
            let dx = px as f64 + 0.5 - cx;
            let dy = py as f64 + 0.5 - cy;
            frame[py * width + px] += amp * (-(dx * dx + dy * dy) / (2.0 * SIGMA * SIGMA)).exp();
        }
    }
}

fn analyzer_config() -> AnalyzerConfig {
    AnalyzerConfig {
        epsilon: 1e-6,
        solver: HomotopyConfig::localization(10),
        parallel: true,
    }
}

#[test]
fn recovers_single_emitter_position() {
    let builder = DictionaryBuilder::new()
        .block_size(4)
        .scale(SCALE)
        .margin(2)
        .sigma(SIGMA);
    let dict = builder.build().unwrap();
    let grid = BlockGrid::new(6, 6, 4, 1, SCALE).unwrap();
    let analyzer = BlockAnalyzer::new(grid, dict, analyzer_config()).unwrap();

    // Emitter centered on hi-res cell (7, 5): camera (3.75, 2.75).
    let mut frame = vec![0.0; 36];
    render_emitter(&mut frame, 6, 3.75, 2.75, 5.0);

    let analysis = analyzer.analyze(&frame).unwrap();
    assert_eq!(analysis.stats.failed, 0);

    let peak = analysis
        .hires
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(
        (peak % analysis.width, peak / analysis.width),
        (7, 5),
        "peak at wrong hi-res cell"
    );
    assert!(analysis.hires[peak] > 0.0);
}

#[test]
fn two_separated_emitters_both_found() {
    let builder = DictionaryBuilder::new()
        .block_size(4)
        .scale(SCALE)
        .margin(2)
        .sigma(SIGMA);
    let dict = builder.build().unwrap();
    let grid = BlockGrid::new(8, 8, 4, 1, SCALE).unwrap();
    let analyzer = BlockAnalyzer::new(grid, dict, analyzer_config()).unwrap();

    let mut frame = vec![0.0; 64];
    // Hi-res cells (3, 3) and (11, 11): camera (1.75, 1.75), (5.75, 5.75).
    render_emitter(&mut frame, 8, 1.75, 1.75, 4.0);
    render_emitter(&mut frame, 8, 5.75, 5.75, 4.0);

    let analysis = analyzer.analyze(&frame).unwrap();
    assert_eq!(analysis.stats.failed, 0);

    let w = analysis.width;
    let near = |gx: usize, gy: usize| -> f64 {
        let mut best = 0.0f64;
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                let x = gx as isize + dx;
                let y = gy as isize + dy;
                if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < analysis.height {
                    best = best.max(analysis.hires[y as usize * w + x as usize]);
                }
            }
        }
        best
    };

    assert!(near(3, 3) > 0.5, "first emitter missing");
    assert!(near(11, 11) > 0.5, "second emitter missing");
}

#[test]
fn shared_operator_across_blocks() {
    // One rayon operator instance shared by all block solves.
    let builder = DictionaryBuilder::new()
        .block_size(4)
        .scale(SCALE)
        .margin(2)
        .sigma(SIGMA);
    let dict = builder.build().unwrap();
    let layout = dict.layout().unwrap();
    let op = Arc::new(RayonDenseOperator::new(dict));
    let grid = BlockGrid::new(6, 6, 4, 1, SCALE).unwrap();

    let analyzer =
        BlockAnalyzer::with_operator(grid, layout, op, analyzer_config()).unwrap();

    let mut frame = vec![0.0; 36];
    render_emitter(&mut frame, 6, 2.75, 2.75, 3.0);

    let analysis = analyzer.analyze(&frame).unwrap();
    assert_eq!(analysis.stats.failed, 0);
    assert!(
        analysis
            .outcomes
            .iter()
            .all(|o| o.status != BlockStatus::Failed)
    );
    assert!(!analysis.localizations().is_empty());
}
