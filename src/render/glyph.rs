//! Per-character distortion.
//!
//! Produces the randomized transform parameters for each glyph of a code.
//! No drawing happens here, so layouts can be checked without a surface.

use super::font::FontWeight;
use crate::config::{CaptchaConfig, Result};
use rand::Rng;

/// Auto font size as a fraction of canvas height.
pub const AUTO_FONT_SCALE: f32 = 0.8;
const MIN_FONT_SIZE: f32 = 1.0;

/// Out-of-plane tilt in radians, rendered as a perspective squeeze.
const TILT_MAX: f32 = 0.25;
/// In-plane rotation in radians.
const ROTATION_MAX: f32 = 0.45;
const SKEW_MAX: f32 = 0.3;
const SCALE_MIN: f32 = 0.85;
const SCALE_MAX: f32 = 1.15;
/// Translation jitter as a fraction of the font size.
const OFFSET_MAX: f32 = 0.12;

/// Transform parameters for one glyph. Regenerated every render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphStyle {
    pub ch: char,
    pub tilt: f32,
    pub rotation: f32,
    pub skew: f32,
    pub scale: f32,
    /// Applied to both axes.
    pub offset: f32,
    pub weight: FontWeight,
    pub color_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlyphLayout {
    pub font_size: f32,
    pub glyphs: Vec<GlyphStyle>,
}

/// Computes glyph layouts for one canvas configuration.
#[derive(Debug, Clone, Copy)]
pub struct GlyphTransformer {
    font_size: Option<f32>,
    width: f32,
    height: f32,
    color_count: usize,
}

impl GlyphTransformer {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` fails validation.
    pub fn from_config(config: &CaptchaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            font_size: config.font_size,
            width: config.width,
            height: config.height,
            color_count: config.text_colors.len(),
        })
    }

    /// Glyph size for a code of `char_count` characters.
    ///
    /// A configured size wins. Otherwise the size follows the canvas height
    /// and shrinks by the overflow ratio when `size * char_count` exceeds the
    /// canvas width. The estimate ignores real advances, so unusual glyphs on
    /// narrow canvases can still overflow.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn font_size(&self, char_count: usize) -> f32 {
        if let Some(size) = self.font_size {
            return size;
        }
        let mut scale = AUTO_FONT_SCALE;
        let naive_width = self.height * scale * char_count as f32;
        if naive_width > self.width {
            let overflow = (naive_width - self.width) / naive_width;
            scale *= 1.0 - overflow;
        }
        (self.height * scale).max(MIN_FONT_SIZE)
    }

    /// Draws fresh distortion parameters for every character of `text`.
    pub fn layout(&self, text: &str, rng: &mut impl Rng) -> GlyphLayout {
        let font_size = self.font_size(text.chars().count());
        let glyphs = text
            .chars()
            .map(|ch| self.style(ch, font_size, rng))
            .collect();
        GlyphLayout { font_size, glyphs }
    }

    fn style(&self, ch: char, font_size: f32, rng: &mut impl Rng) -> GlyphStyle {
        let tilt = rng.random_range(0.0..TILT_MAX);
        let tilt = signed(rng, tilt);
        let rotation = rng.random_range(0.0..ROTATION_MAX);
        let rotation = signed(rng, rotation);
        let weight = if rng.random_bool(0.5) {
            FontWeight::Bold
        } else {
            FontWeight::Regular
        };
        GlyphStyle {
            ch,
            tilt,
            rotation,
            skew: rng.random_range(-SKEW_MAX..SKEW_MAX),
            scale: rng.random_range(SCALE_MIN..SCALE_MAX),
            offset: rng.random_range(-OFFSET_MAX..OFFSET_MAX) * font_size,
            weight,
            color_index: rng.random_range(0..self.color_count.max(1)),
        }
    }
}

fn signed(rng: &mut impl Rng, magnitude: f32) -> f32 {
    if rng.random_bool(0.5) {
        -magnitude
    } else {
        magnitude
    }
}
