//! `l1h` - compressed-sensing localization from the command line.

mod backend;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use l1h_backend_cpu::RayonDenseOperator;
use l1h_batch::{AnalyzerConfig, BlockAnalyzer};
use l1h_core::{BlockGrid, Dictionary, DictionaryBuilder};
use l1h_solver::{
    ComputeBackend, DictionaryOperator, DispatchConfig, HomotopyConfig, HomotopySolver,
};

use crate::backend::detect_backend;
use crate::output::{AnalysisOutput, FrameInput};

#[derive(Parser)]
#[command(name = "l1h", version, about = "L1 homotopy sparse recovery")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a camera frame and write localizations as JSON.
    Analyze {
        /// Input frame (JSON: width, height, pixels).
        input: PathBuf,
        /// Output path; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        opts: SolverOpts,
        /// Block overlap in camera pixels.
        #[arg(long, default_value_t = 1)]
        overlap: usize,
        /// Compute backend: auto, cpu, gpu.
        #[arg(long, default_value = "auto")]
        backend: String,
        /// Solve blocks serially instead of with rayon.
        #[arg(long)]
        serial: bool,
    },
    /// Solve a single block and print the path outcome.
    Solve {
        /// Input block (JSON: width, height, pixels); must be square
        /// and match --block-size.
        input: PathBuf,
        #[command(flatten)]
        opts: SolverOpts,
    },
    /// Show backend availability.
    Info,
}

#[derive(Args)]
struct SolverOpts {
    /// Analysis block side length in camera pixels.
    #[arg(long, default_value_t = 7)]
    block_size: usize,
    /// Upsampling factor for the localization grid.
    #[arg(long, default_value_t = 8)]
    scale: usize,
    /// Grid margin beyond the block edge, in grid cells.
    #[arg(long, default_value_t = 8)]
    margin: usize,
    /// PSF sigma in camera pixels.
    #[arg(long, default_value_t = 1.0)]
    sigma: f64,
    /// Residual target for each block solve.
    #[arg(long, default_value_t = 1e-4)]
    epsilon: f64,
    /// Maximum emitters per block.
    #[arg(long, default_value_t = 50)]
    max_nonzero: usize,
    /// Allow negative coefficients (default is non-negative).
    #[arg(long)]
    signed: bool,
}

impl SolverOpts {
    fn dictionary(&self) -> anyhow::Result<Dictionary> {
        DictionaryBuilder::new()
            .block_size(self.block_size)
            .scale(self.scale)
            .margin(self.margin)
            .sigma(self.sigma)
            .build()
            .context("building PSF dictionary")
    }

    fn homotopy_config(&self) -> HomotopyConfig {
        HomotopyConfig {
            positive_only: !self.signed,
            max_nonzero: self.max_nonzero,
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze {
            input,
            output,
            opts,
            overlap,
            backend,
            serial,
        } => run_analyze(&input, output.as_deref(), &opts, overlap, &backend, serial),
        Command::Solve { input, opts } => run_solve(&input, &opts),
        Command::Info => run_info(),
    }
}

fn read_frame(path: &std::path::Path) -> anyhow::Result<FrameInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let frame: FrameInput =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    frame.validate()?;
    Ok(frame)
}

/// Build the dictionary operator for the selected backend.
fn make_operator(
    backend: &ComputeBackend,
    dict: Dictionary,
) -> (Arc<dyn DictionaryOperator>, &'static str) {
    match backend {
        ComputeBackend::Cpu => (Arc::new(RayonDenseOperator::new(dict)), "CPU"),
        ComputeBackend::Gpu { adapter_name } => {
            #[cfg(feature = "metal")]
            {
                use l1h_backend_metal::{GpuDictionaryOperator, WgpuContext};
                match WgpuContext::with_adapter_filter(adapter_name)
                    .and_then(|ctx| GpuDictionaryOperator::new(Arc::new(ctx), dict.clone()))
                {
                    Ok(op) => return (Arc::new(op), "GPU"),
                    Err(e) => {
                        eprintln!("Warning: GPU setup failed ({}), using CPU", e);
                    }
                }
            }
            #[cfg(not(feature = "metal"))]
            let _ = adapter_name;
            (Arc::new(RayonDenseOperator::new(dict)), "CPU")
        }
    }
}

fn run_analyze(
    input: &std::path::Path,
    output: Option<&std::path::Path>,
    opts: &SolverOpts,
    overlap: usize,
    backend_name: &str,
    serial: bool,
) -> anyhow::Result<()> {
    let frame = read_frame(input)?;
    let dict = opts.dictionary()?;
    let layout = dict
        .layout()
        .context("builder dictionaries always carry a layout")?;

    let dispatch = DispatchConfig {
        backend: detect_backend(backend_name),
        ..Default::default()
    };
    let backend = if dispatch.use_gpu(dict.ncols()) {
        dispatch.backend.clone()
    } else {
        ComputeBackend::Cpu
    };
    let gpu_in_use = !matches!(backend, ComputeBackend::Cpu);
    let (op, backend_label) = make_operator(&backend, dict);

    let grid = BlockGrid::new(
        frame.width,
        frame.height,
        opts.block_size,
        overlap,
        opts.scale,
    )?;

    let config = AnalyzerConfig {
        epsilon: opts.epsilon,
        solver: opts.homotopy_config(),
        // Block solves on one GPU queue serialize anyway.
        parallel: !serial && !gpu_in_use,
    };

    let analyzer = BlockAnalyzer::with_operator(grid, layout, op, config)?;
    let analysis = analyzer.analyze(&frame.pixels)?;

    eprintln!("[{}] {}", backend_label, analysis.stats.summary());

    let out = AnalysisOutput::from_analysis(&analysis, opts.scale);
    let json = serde_json::to_string_pretty(&out)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn run_solve(input: &std::path::Path, opts: &SolverOpts) -> anyhow::Result<()> {
    let frame = read_frame(input)?;
    if frame.width != opts.block_size || frame.height != opts.block_size {
        anyhow::bail!(
            "solve expects a single {0}x{0} block, got {1}x{2}",
            opts.block_size,
            frame.width,
            frame.height
        );
    }

    let dict = opts.dictionary()?;
    let mut solver = HomotopySolver::from_dictionary(dict, opts.homotopy_config());
    solver.set_measurement(&frame.pixels)?;
    let result = solver.solve(opts.epsilon)?;

    println!("lambda     = {:.6e}", result.lambda);
    println!("residual   = {:.6e}", result.residual);
    println!("iterations = {}", result.iterations);
    println!("nonzero    = {}", result.nonzero);
    println!("stopped    = {:?}", result.termination);
    for (col, value) in solver.nonzero() {
        println!("x[{}] = {:.6}", col, value);
    }
    Ok(())
}

fn run_info() -> anyhow::Result<()> {
    println!("l1h {}", env!("CARGO_PKG_VERSION"));
    println!("CPU backend: available ({} threads)", rayon_threads());

    #[cfg(feature = "metal")]
    {
        match l1h_backend_metal::WgpuContext::new() {
            Ok(ctx) => println!("GPU backend: available ({})", ctx.adapter_name()),
            Err(_) => println!("GPU backend: no adapter found"),
        }
    }
    #[cfg(not(feature = "metal"))]
    println!("GPU backend: not compiled in (enable the `metal` feature)");

    Ok(())
}

fn rayon_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
