//! CAPTCHA rendering.
//!
//! Glyph distortion and noise layouts are pure functions of a random source;
//! the renderer composes them into a bitmap and caches it per code.

pub mod encode;
pub mod font;
pub mod glyph;
pub mod noise;
pub mod renderer;

pub use font::{FontWeight, GlyphFonts};
pub use glyph::{GlyphLayout, GlyphStyle, GlyphTransformer};
pub use noise::{NoiseLine, NoiseOverlay, NoiseOverlayGenerator, NoisePoint};
pub use renderer::{CaptchaRenderer, RenderedCaptchaImage};
