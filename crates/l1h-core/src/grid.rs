//! Frame tiling and high-resolution accumulation.
//!
//! A camera frame is analyzed in square blocks. Blocks overlap so that
//! a PSF centered near a block edge is fully visible to at least one
//! block; each block writes only its non-overlapped center region into
//! the high-resolution output, so every output cell is written by
//! exactly one block.

use crate::dictionary::GridLayout;
use crate::error::{CoreError, Result};

/// One analysis block, positioned by its top-left corner in camera
/// pixels. The corner can be negative for edge blocks; out-of-frame
/// pixels read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub x0: isize,
    pub y0: isize,
}

/// Tiling of a camera frame into overlapping analysis blocks.
#[derive(Debug, Clone)]
pub struct BlockGrid {
    width: usize,
    height: usize,
    block_size: usize,
    overlap: usize,
    scale: usize,
}

impl BlockGrid {
    /// Create a tiling.
    ///
    /// `overlap` is the number of camera pixels on each side of a block
    /// that are also covered by the neighboring block. The stride
    /// between blocks is `block_size - 2 * overlap`, which must be
    /// positive.
    pub fn new(
        width: usize,
        height: usize,
        block_size: usize,
        overlap: usize,
        scale: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 || scale == 0 {
            return Err(CoreError::BadGeometry(format!(
                "frame {}x{} at scale {}",
                width, height, scale
            )));
        }
        if block_size <= 2 * overlap {
            return Err(CoreError::BadGeometry(format!(
                "block_size {} must exceed 2 * overlap ({})",
                block_size,
                2 * overlap
            )));
        }
        Ok(Self {
            width,
            height,
            block_size,
            overlap,
            scale,
        })
    }

    /// Frame width in camera pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in camera pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Block side length in camera pixels.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Upsampling factor of the output grid.
    pub fn scale(&self) -> usize {
        self.scale
    }

    /// Stride between block corners in camera pixels.
    pub fn step(&self) -> usize {
        self.block_size - 2 * self.overlap
    }

    /// Dimensions of the high-resolution output image.
    pub fn hires_dims(&self) -> (usize, usize) {
        (self.width * self.scale, self.height * self.scale)
    }

    /// All blocks needed to cover the frame.
    pub fn blocks(&self) -> Vec<Block> {
        let step = self.step();
        let nx = self.width.div_ceil(step);
        let ny = self.height.div_ceil(step);
        let mut out = Vec::with_capacity(nx * ny);
        for ky in 0..ny {
            for kx in 0..nx {
                out.push(Block {
                    x0: (kx * step) as isize - self.overlap as isize,
                    y0: (ky * step) as isize - self.overlap as isize,
                });
            }
        }
        out
    }

    /// Extract a block's measurement vector from a frame.
    ///
    /// The frame is row-major `width * height`; the result is row-major
    /// `block_size * block_size`, zero-padded where the block extends
    /// past the frame edge.
    pub fn extract(&self, frame: &[f64], block: Block) -> Result<Vec<f64>> {
        if frame.len() != self.width * self.height {
            return Err(CoreError::DimensionMismatch {
                expected: self.width * self.height,
                actual: frame.len(),
            });
        }

        let mut y = vec![0.0; self.block_size * self.block_size];
        for by in 0..self.block_size {
            let fy = block.y0 + by as isize;
            if fy < 0 || fy >= self.height as isize {
                continue;
            }
            for bx in 0..self.block_size {
                let fx = block.x0 + bx as isize;
                if fx < 0 || fx >= self.width as isize {
                    continue;
                }
                y[by * self.block_size + bx] = frame[fy as usize * self.width + fx as usize];
            }
        }
        Ok(y)
    }

    /// Accumulate a block's solution into the high-resolution image.
    ///
    /// `coeffs` is indexed by grid cell as laid out by `layout`; a
    /// trailing background coefficient, if present, is ignored. Only
    /// cells inside the block's center region (and inside the frame)
    /// are written.
    pub fn accumulate(
        &self,
        layout: &GridLayout,
        block: Block,
        coeffs: &[f64],
        hires: &mut [f64],
    ) -> Result<()> {
        if layout.block_size != self.block_size || layout.scale != self.scale {
            return Err(CoreError::BadGeometry(format!(
                "dictionary layout ({}x at scale {}) does not match grid ({}x at scale {})",
                layout.block_size, layout.scale, self.block_size, self.scale
            )));
        }
        let (hw, hh) = self.hires_dims();
        if hires.len() != hw * hh {
            return Err(CoreError::DimensionMismatch {
                expected: hw * hh,
                actual: hires.len(),
            });
        }
        let side = layout.hires_side();
        if coeffs.len() < side * side {
            return Err(CoreError::DimensionMismatch {
                expected: side * side,
                actual: coeffs.len(),
            });
        }

        // Center region of this block, in hi-res coordinates.
        let cx_lo = (block.x0 + self.overlap as isize) * self.scale as isize;
        let cy_lo = (block.y0 + self.overlap as isize) * self.scale as isize;
        let span = (self.step() * self.scale) as isize;

        for gy in 0..side {
            let oy = block.y0 * self.scale as isize + gy as isize - layout.margin as isize;
            if oy < cy_lo || oy >= cy_lo + span || oy < 0 || oy >= hh as isize {
                continue;
            }
            for gx in 0..side {
                let v = coeffs[gy * side + gx];
                if v == 0.0 {
                    continue;
                }
                let ox = block.x0 * self.scale as isize + gx as isize - layout.margin as isize;
                if ox < cx_lo || ox >= cx_lo + span || ox < 0 || ox >= hw as isize {
                    continue;
                }
                hires[oy as usize * hw + ox as usize] += v;
            }
        }
        Ok(())
    }
}
