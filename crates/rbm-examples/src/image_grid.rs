//! Image grids of visible samples, weights and hidden activations.
//!
//! Rows of a matrix are read as square images and tiled left to right, top to
//! bottom, separated by padding. The whole grid is min/max normalized before
//! it is written as a grayscale PNG.

use std::path::{Path, PathBuf};

use ndarray::{s, Array2};
use plotters::prelude::*;
use rbm_core::error::{RbmError, Result};
use rbm_observers::{EpochSnapshot, TrainingObserver};

/// Tiling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// Images per grid row.
    pub per_row: usize,
    /// Pixels between neighbouring images and around the border.
    pub padding: usize,
    /// Output pixels per grid pixel.
    pub scale: usize,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            per_row: 8,
            padding: 2,
            scale: 2,
        }
    }
}

/// Tile every row of `images` as a `side × side` image.
///
/// Padding pixels are zero. The result is not normalized.
pub fn tile_grid(images: &Array2<f32>, side: usize, layout: &GridLayout) -> Result<Array2<f32>> {
    let (count, width) = images.dim();
    if width != side * side {
        return Err(RbmError::shape("image grid", &[count, side * side], &[count, width]));
    }
    if count == 0 || side == 0 {
        return Err(RbmError::InvalidData("image grid needs at least one image".to_string()));
    }

    let per_row = layout.per_row.max(1).min(count);
    let grid_rows = count.div_ceil(per_row);
    let cell = side + layout.padding;
    let mut grid = Array2::zeros((
        grid_rows * cell + layout.padding,
        per_row * cell + layout.padding,
    ));

    for (index, image) in images.rows().into_iter().enumerate() {
        let top = (index / per_row) * cell + layout.padding;
        let left = (index % per_row) * cell + layout.padding;
        let tile = image
            .to_owned()
            .into_shape_with_order((side, side))
            .map_err(|e| RbmError::InvalidData(format!("image reshape: {e}")))?;
        grid.slice_mut(s![top..top + side, left..left + side])
            .assign(&tile);
    }
    Ok(grid)
}

/// Map values linearly onto `[0, 1]`; a constant grid maps to zero.
pub fn normalize_min_max(grid: &Array2<f32>) -> Array2<f32> {
    let (min, max) = grid
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !(range.is_finite() && range > 0.0) {
        return Array2::zeros(grid.dim());
    }
    grid.mapv(|v| (v - min) / range)
}

/// Write a `[0, 1]` matrix as a grayscale PNG.
pub fn write_grayscale_png(path: &Path, pixels: &Array2<f32>, scale: usize) -> Result<()> {
    let plot_err = |e: &dyn std::fmt::Display| {
        RbmError::io(path, std::io::Error::other(format!("plotting failed: {e}")))
    };
    let scale = scale.max(1);
    let (height, width) = pixels.dim();

    let root = BitMapBackend::new(path, ((width * scale) as u32, (height * scale) as u32))
        .into_drawing_area();
    root.fill(&BLACK).map_err(|e| plot_err(&e))?;

    for ((row, col), &value) in pixels.indexed_iter() {
        let level = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        if level == 0 {
            continue;
        }
        let color = RGBColor(level, level, level);
        let (x, y) = ((col * scale) as i32, (row * scale) as i32);
        let step = scale as i32;
        root.draw(&Rectangle::new([(x, y), (x + step, y + step)], color.filled()))
            .map_err(|e| plot_err(&e))?;
    }

    root.present().map_err(|e| plot_err(&e))
}

/// Tile, normalize and write `images` to `path`.
pub fn write_image_grid(
    path: &Path,
    images: &Array2<f32>,
    side: usize,
    layout: &GridLayout,
) -> Result<()> {
    let grid = tile_grid(images, side, layout)?;
    write_grayscale_png(path, &normalize_min_max(&grid), layout.scale)
}

/// Writes `real<epoch>.png`, `generate<epoch>.png`, `parameter<epoch>.png`
/// and `hidden<epoch>.png` after every epoch.
pub struct ImageGridObserver {
    dir: PathBuf,
    visible_side: usize,
    hidden_side: usize,
    layout: GridLayout,
}

impl ImageGridObserver {
    /// `visible_side²` must equal the visible width and `hidden_side²` the hidden width.
    pub fn new(dir: impl Into<PathBuf>, visible_side: usize, hidden_side: usize) -> Self {
        Self {
            dir: dir.into(),
            visible_side,
            hidden_side,
            layout: GridLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: GridLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn path_for(&self, stem: &str, epoch: usize) -> PathBuf {
        self.dir.join(format!("{stem}{epoch}.png"))
    }
}

impl TrainingObserver for ImageGridObserver {
    fn on_epoch(&mut self, snapshot: &EpochSnapshot) -> Result<()> {
        let epoch = snapshot.epoch;
        let visible = self.visible_side;
        for (stem, images, side) in [
            ("real", &snapshot.input, visible),
            ("generate", &snapshot.reconstruction, visible),
            ("parameter", &snapshot.weights, visible),
            ("hidden", &snapshot.hidden, self.hidden_side),
        ] {
            write_image_grid(&self.path_for(stem, epoch), images, side, &self.layout)?;
        }
        tracing::debug!(epoch, dir = %self.dir.display(), "Image grids written");
        Ok(())
    }
}
