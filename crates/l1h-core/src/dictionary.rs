//! Dictionary matrix construction and storage.
//!
//! The dictionary `A` maps sparse emitter coefficients on an upsampled
//! grid to measured pixel intensities. Columns are stored column-major
//! and L2-normalized so correlations are directly comparable across
//! grid positions.

use nalgebra::DMatrix;

use crate::error::{CoreError, Result};

/// Geometry of the upsampled grid a dictionary was built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// Side length of the measured block, in camera pixels.
    pub block_size: usize,
    /// Upsampling factor (grid cells per camera pixel).
    pub scale: usize,
    /// Extra grid cells beyond the block edge, on each side.
    pub margin: usize,
}

impl GridLayout {
    /// Side length of the upsampled grid, in cells.
    pub fn hires_side(&self) -> usize {
        self.block_size * self.scale + 2 * self.margin
    }

    /// Number of grid cells (dictionary columns, excluding background).
    pub fn num_cells(&self) -> usize {
        let side = self.hires_side();
        side * side
    }

    /// Column index of grid cell `(gx, gy)`.
    pub fn cell_index(&self, gx: usize, gy: usize) -> usize {
        gy * self.hires_side() + gx
    }

    /// Grid cell `(gx, gy)` of a (non-background) column index.
    pub fn cell_of(&self, col: usize) -> (usize, usize) {
        let side = self.hires_side();
        (col % side, col / side)
    }
}

/// A dense, column-major dictionary matrix.
///
/// When `background_term` is set, the final column is a normalized
/// constant and is treated specially by the solver: it carries no sign
/// constraint and does not count toward the non-zero limit.
#[derive(Debug, Clone)]
pub struct Dictionary {
    data: Vec<f64>,
    nrows: usize,
    ncols: usize,
    background_term: bool,
    layout: Option<GridLayout>,
}

impl Dictionary {
    /// Create a dictionary from column-major data.
    pub fn new(data: Vec<f64>, nrows: usize, ncols: usize, background_term: bool) -> Result<Self> {
        if nrows == 0 || ncols == 0 {
            return Err(CoreError::EmptyDictionary { nrows, ncols });
        }
        if data.len() != nrows * ncols {
            return Err(CoreError::DimensionMismatch {
                expected: nrows * ncols,
                actual: data.len(),
            });
        }
        for (idx, &v) in data.iter().enumerate() {
            if !v.is_finite() {
                return Err(CoreError::NonFinite {
                    row: idx % nrows,
                    col: idx / nrows,
                });
            }
        }
        Ok(Self {
            data,
            nrows,
            ncols,
            background_term,
            layout: None,
        })
    }

    /// Attach the grid geometry this dictionary was built on.
    pub fn with_layout(mut self, layout: GridLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Number of rows (measured pixels).
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns (grid cells, plus background if present).
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Whether the final column is a background term.
    pub fn has_background(&self) -> bool {
        self.background_term
    }

    /// Column index of the background term, if present.
    pub fn background_index(&self) -> Option<usize> {
        self.background_term.then(|| self.ncols - 1)
    }

    /// Whether column `j` participates in the L1 penalty and sign
    /// constraints. The background column does not.
    pub fn is_penalized(&self, j: usize) -> bool {
        Some(j) != self.background_index()
    }

    /// Column `j` as a slice of length `nrows`.
    pub fn column(&self, j: usize) -> &[f64] {
        &self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    /// The full column-major data.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Grid geometry, if this dictionary was built by [`DictionaryBuilder`].
    pub fn layout(&self) -> Option<GridLayout> {
        self.layout
    }

    /// Copy into a dense nalgebra matrix.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_column_slice(self.nrows, self.ncols, &self.data)
    }
}

/// Builds a Gaussian-PSF dictionary for one analysis block.
///
/// Each column is the point-spread function of an emitter at one cell
/// of the upsampled grid, sampled at the block's pixel centers and
/// L2-normalized. An optional constant background column is appended.
#[derive(Debug, Clone)]
pub struct DictionaryBuilder {
    block_size: usize,
    scale: usize,
    sigma: f64,
    margin: usize,
    background_term: bool,
}

impl Default for DictionaryBuilder {
    fn default() -> Self {
        Self {
            block_size: 7,
            scale: 8,
            sigma: 1.0,
            margin: 8,
            background_term: true,
        }
    }
}

impl DictionaryBuilder {
    /// Create a builder with default geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Side length of the measured block, in camera pixels.
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Upsampling factor for the localization grid.
    pub fn scale(mut self, scale: usize) -> Self {
        self.scale = scale;
        self
    }

    /// PSF width (Gaussian sigma) in camera pixels.
    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Margin of grid cells beyond the block edge, on each side.
    ///
    /// Emitters just outside the block still contribute light to it;
    /// the margin lets the solver explain that light instead of
    /// misattributing it to edge cells.
    pub fn margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }

    /// Whether to append a constant background column.
    pub fn background_term(mut self, background_term: bool) -> Self {
        self.background_term = background_term;
        self
    }

    /// The grid geometry this builder will produce.
    pub fn layout(&self) -> GridLayout {
        GridLayout {
            block_size: self.block_size,
            scale: self.scale,
            margin: self.margin,
        }
    }

    /// Build the dictionary.
    pub fn build(&self) -> Result<Dictionary> {
        if self.block_size == 0 || self.scale == 0 {
            return Err(CoreError::BadGeometry(format!(
                "block_size = {}, scale = {} (both must be > 0)",
                self.block_size, self.scale
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(CoreError::BadGeometry(format!(
                "sigma = {} (must be finite and > 0)",
                self.sigma
            )));
        }

        let layout = self.layout();
        let nrows = self.block_size * self.block_size;
        let side = layout.hires_side();
        let num_cells = side * side;
        let ncols = num_cells + usize::from(self.background_term);

        let inv_two_sigma2 = 1.0 / (2.0 * self.sigma * self.sigma);
        let mut data = Vec::with_capacity(nrows * ncols);

        for gy in 0..side {
            for gx in 0..side {
                // Emitter center in camera-pixel coordinates.
                let cx = (gx as f64 - self.margin as f64 + 0.5) / self.scale as f64;
                let cy = (gy as f64 - self.margin as f64 + 0.5) / self.scale as f64;

                let col_start = data.len();
                let mut norm2 = 0.0;
                for py in 0..self.block_size {
                    for px in 0..self.block_size {
                        let dx = px as f64 + 0.5 - cx;
                        let dy = py as f64 + 0.5 - cy;
                        let v = (-(dx * dx + dy * dy) * inv_two_sigma2).exp();
                        norm2 += v * v;
                        data.push(v);
                    }
                }

                if norm2 < 1e-300 {
                    return Err(CoreError::ZeroColumn {
                        col: layout.cell_index(gx, gy),
                    });
                }
                let inv_norm = 1.0 / norm2.sqrt();
                for v in &mut data[col_start..] {
                    *v *= inv_norm;
                }
            }
        }

        if self.background_term {
            let v = 1.0 / (nrows as f64).sqrt();
            data.extend(std::iter::repeat(v).take(nrows));
        }

        Ok(Dictionary::new(data, nrows, ncols, self.background_term)?.with_layout(layout))
    }
}
