//! Composition and caching.
//!
//! Renders the glyph layer and the noise layer into one RGBA bitmap and
//! keeps it for as long as the code it was drawn for stays current, so host
//! repaints never re-run the randomized layout.

use super::font::GlyphFonts;
use super::glyph::{GlyphLayout, GlyphStyle, GlyphTransformer};
use super::noise::{NoiseOverlay, NoiseOverlayGenerator};
use crate::captcha::CaptchaCode;
use crate::config::{CaptchaConfig, CaptchaError, Result};
use ab_glyph::PxScale;
use image::{Rgba, RgbaImage, imageops};
use imageproc::drawing::{
    draw_antialiased_line_segment_mut, draw_filled_circle_mut, draw_text_mut, text_size,
};
use imageproc::geometric_transformations::{Interpolation, Projection, warp};
use imageproc::pixelops::interpolate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::debug;

/// Largest surface the renderer will allocate.
const MAX_SURFACE_PIXELS: u64 = 4096 * 4096;
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Immutable bitmap for one generated code.
#[derive(Debug)]
pub struct RenderedCaptchaImage {
    serial: u64,
    text: String,
    image: RgbaImage,
}

impl RenderedCaptchaImage {
    /// Serial of the code this image was drawn for.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn belongs_to(&self, code: &CaptchaCode) -> bool {
        self.serial == code.serial && self.text == code.text
    }
}

pub struct CaptchaRenderer {
    config: Arc<CaptchaConfig>,
    fonts: GlyphFonts,
    glyphs: GlyphTransformer,
    noise: NoiseOverlayGenerator,
    rng: StdRng,
    cache: Option<Arc<RenderedCaptchaImage>>,
}

impl CaptchaRenderer {
    /// Creates a renderer with an entropy-seeded random source.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an invalid config, or
    /// `RenderingUnavailable` if the embedded fonts fail to load.
    pub fn new(config: Arc<CaptchaConfig>) -> Result<Self> {
        Self::with_rng(config, StdRng::from_rng(&mut rand::rng()))
    }

    /// Creates a renderer drawing its distortions from `rng`.
    ///
    /// # Errors
    ///
    /// Same as [`CaptchaRenderer::new`].
    pub fn with_rng(config: Arc<CaptchaConfig>, rng: StdRng) -> Result<Self> {
        Ok(Self {
            glyphs: GlyphTransformer::from_config(&config)?,
            noise: NoiseOverlayGenerator::from_config(&config)?,
            fonts: GlyphFonts::load()?,
            config,
            rng,
            cache: None,
        })
    }

    /// Cached image for `code`, if it has been rendered already.
    #[must_use]
    pub fn cached(&self, code: &CaptchaCode) -> Option<Arc<RenderedCaptchaImage>> {
        self.cache
            .as_ref()
            .filter(|img| img.belongs_to(code))
            .cloned()
    }

    /// Image for `code`, rendering it only if the cache holds another code.
    ///
    /// # Errors
    ///
    /// Returns `RenderingUnavailable` if no surface can be allocated.
    pub fn render(&mut self, code: &CaptchaCode) -> Result<Arc<RenderedCaptchaImage>> {
        if let Some(img) = self.cached(code) {
            debug!(serial = code.serial, "Captcha image served from cache");
            return Ok(img);
        }

        let image = self.rasterize(&code.text)?;
        let rendered = Arc::new(RenderedCaptchaImage {
            serial: code.serial,
            text: code.text.clone(),
            image,
        });
        debug!(
            serial = code.serial,
            width = rendered.image.width(),
            height = rendered.image.height(),
            "Captcha image rasterized"
        );
        self.cache = Some(Arc::clone(&rendered));
        Ok(rendered)
    }

    /// Drops the cached image.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    fn rasterize(&mut self, text: &str) -> Result<RgbaImage> {
        let (width, height) = self.config.pixel_size();
        if width == 0 || height == 0 {
            return Err(CaptchaError::RenderingUnavailable(
                "surface has no area".to_string(),
            ));
        }
        if u64::from(width) * u64::from(height) > MAX_SURFACE_PIXELS {
            return Err(CaptchaError::RenderingUnavailable(format!(
                "surface {width}x{height} exceeds {MAX_SURFACE_PIXELS} pixels"
            )));
        }

        let layout = self.glyphs.layout(text, &mut self.rng);
        let scratch_size = scratch_side(layout.font_size)?;

        let mut canvas = RgbaImage::from_pixel(width, height, self.config.background_color);
        self.draw_glyphs(&mut canvas, &layout, scratch_size);

        let overlay = self.noise.generate(&mut self.rng);
        self.draw_noise(&mut canvas, &overlay);

        Ok(canvas)
    }

    #[allow(clippy::cast_precision_loss)]
    fn draw_glyphs(&self, canvas: &mut RgbaImage, layout: &GlyphLayout, scratch_size: u32) {
        if layout.glyphs.is_empty() {
            return;
        }
        let slot = self.config.width / layout.glyphs.len() as f32;
        let mid_y = self.config.height / 2.0;

        for (i, glyph) in layout.glyphs.iter().enumerate() {
            let cx = (i as f32 + 0.5).mul_add(slot, glyph.offset);
            let cy = mid_y + glyph.offset;
            self.draw_glyph(canvas, glyph, layout.font_size, scratch_size, (cx, cy));
        }
    }

    fn draw_glyph(
        &self,
        canvas: &mut RgbaImage,
        glyph: &GlyphStyle,
        size: f32,
        scratch_size: u32,
        (cx, cy): (f32, f32),
    ) {
        let color = self.config.text_colors[glyph.color_index % self.config.text_colors.len()];
        let face = self.fonts.face(glyph.weight);
        let scale = PxScale::from(size);
        let text = glyph.ch.to_string();

        // Transparent pixels carry the glyph colour so blended edges keep their hue.
        let clear = Rgba([color[0], color[1], color[2], 0]);
        let mut scratch = RgbaImage::from_pixel(scratch_size, scratch_size, clear);
        let (text_w, text_h) = text_size(scale, face, &text);
        let origin_x = (i64::from(scratch_size) - i64::from(text_w)) / 2;
        let origin_y = (i64::from(scratch_size) - i64::from(text_h)) / 2;
        draw_text_mut(
            &mut scratch,
            color,
            i32::try_from(origin_x).unwrap_or(0),
            i32::try_from(origin_y).unwrap_or(0),
            scale,
            face,
            &text,
        );

        let center = f32::from(u16::try_from(scratch_size).unwrap_or(u16::MAX)) / 2.0;
        let projection = glyph_projection(glyph, center);
        let distorted = warp(&scratch, &projection, Interpolation::Bilinear, TRANSPARENT);

        imageops::overlay(
            canvas,
            &distorted,
            i64::from(f32_to_i32(cx - center)),
            i64::from(f32_to_i32(cy - center)),
        );
    }

    fn draw_noise(&self, canvas: &mut RgbaImage, overlay: &NoiseOverlay) {
        let colors = &self.config.noise_colors;

        for point in &overlay.points {
            let radius = f32_to_i32(point.width / 2.0);
            draw_filled_circle_mut(
                canvas,
                (f32_to_i32(point.x), f32_to_i32(point.y)),
                radius,
                colors[point.color_index % colors.len()],
            );
        }

        for line in &overlay.lines {
            draw_antialiased_line_segment_mut(
                canvas,
                (f32_to_i32(line.start.0), f32_to_i32(line.start.1)),
                (f32_to_i32(line.end.0), f32_to_i32(line.end.1)),
                colors[line.color_index % colors.len()],
                interpolate,
            );
        }
    }
}

/// Side of the square scratch surface a glyph of `font_size` is drawn on.
fn scratch_side(font_size: f32) -> Result<u32> {
    let side = f32_to_u32(font_size * 2.0).max(1);
    if u64::from(side) * u64::from(side) > MAX_SURFACE_PIXELS {
        return Err(CaptchaError::RenderingUnavailable(format!(
            "glyph surface for font size {font_size} exceeds {MAX_SURFACE_PIXELS} pixels"
        )));
    }
    Ok(side)
}

/// Maps glyph space to the scratch surface: scale, skew, perspective tilt,
/// then rotation, all about the scratch centre.
fn glyph_projection(glyph: &GlyphStyle, center: f32) -> Projection {
    let identity = Projection::scale(1.0, 1.0);
    let skew = Projection::from_matrix([1.0, glyph.skew, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
        .unwrap_or(identity);
    let depth = (center * 2.0).max(1.0);
    let tilt = Projection::from_matrix([
        glyph.tilt.cos(),
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
        glyph.tilt.sin() / depth,
        0.0,
        1.0,
    ])
    .unwrap_or(identity);

    Projection::translate(-center, -center)
        .and_then(Projection::scale(glyph.scale, glyph.scale))
        .and_then(skew)
        .and_then(tilt)
        .and_then(Projection::rotate(glyph.rotation))
        .and_then(Projection::translate(center, center))
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn f32_to_i32(val: f32) -> i32 {
    val.round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i32
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn f32_to_u32(val: f32) -> u32 {
    val.round().clamp(0.0, f32::from(u16::MAX)) as u32
}
