//! Decorative noise overlay.
//!
//! Two independent passes: one scattered point per grid cell, then a few
//! long straight strokes. Only the structure is stable between runs.

use crate::config::{CaptchaConfig, Result};
use rand::Rng;

/// Grid stride of the scatter pass, in pixels.
pub const GRID_STRIDE: usize = 7;
const MAX_POINT_WIDTH: f32 = 2.0;
const MIN_LINES: usize = 4;
const MAX_LINES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoisePoint {
    pub x: f32,
    pub y: f32,
    /// Stroke width in `[0, 2)`.
    pub width: f32,
    pub color_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseLine {
    pub start: (f32, f32),
    pub end: (f32, f32),
    pub color_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoiseOverlay {
    pub points: Vec<NoisePoint>,
    pub lines: Vec<NoiseLine>,
}

#[derive(Debug, Clone, Copy)]
pub struct NoiseOverlayGenerator {
    width: f32,
    height: f32,
    color_count: usize,
}

impl NoiseOverlayGenerator {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` fails validation.
    pub fn from_config(config: &CaptchaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            width: config.width,
            height: config.height,
            color_count: config.noise_colors.len(),
        })
    }

    /// Number of scatter points one pass produces.
    #[must_use]
    pub fn grid_cells(&self) -> usize {
        cells(self.width) * cells(self.height)
    }

    pub fn generate(&self, rng: &mut impl Rng) -> NoiseOverlay {
        NoiseOverlay {
            points: self.scatter(rng),
            lines: self.lines(rng),
        }
    }

    fn scatter(&self, rng: &mut impl Rng) -> Vec<NoisePoint> {
        let mut points = Vec::with_capacity(self.grid_cells());
        for _col in 0..cells(self.width) {
            for _row in 0..cells(self.height) {
                // Positions are not snapped to the cell.
                points.push(NoisePoint {
                    x: rng.random_range(0.0..self.width),
                    y: rng.random_range(0.0..self.height),
                    width: rng.random_range(0.0..MAX_POINT_WIDTH),
                    color_index: self.color(rng),
                });
            }
        }
        points
    }

    fn lines(&self, rng: &mut impl Rng) -> Vec<NoiseLine> {
        let count = rng.random_range(MIN_LINES..=MAX_LINES);
        (0..count)
            .map(|_| NoiseLine {
                start: (
                    rng.random_range(0.0..self.width),
                    rng.random_range(0.0..self.height),
                ),
                end: (
                    rng.random_range(0.0..self.width),
                    rng.random_range(0.0..self.height),
                ),
                color_index: self.color(rng),
            })
            .collect()
    }

    fn color(&self, rng: &mut impl Rng) -> usize {
        rng.random_range(0..self.color_count.max(1))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn cells(extent: f32) -> usize {
    (extent.max(0.0) / GRID_STRIDE as f32).ceil() as usize
}
