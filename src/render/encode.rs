//! Bitmap encoding.
//!
//! Hosts that cannot take raw RGBA (web views, templates) get PNG or WebP
//! bytes, or an inline `data:` URI.

use super::renderer::RenderedCaptchaImage;
use crate::config::{CaptchaError, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use image::ImageFormat;
use std::io::Cursor;

impl RenderedCaptchaImage {
    /// Encodes the bitmap in `format`.
    ///
    /// # Errors
    ///
    /// Returns `RenderingUnavailable` if the encoder rejects the image.
    pub fn encode(&self, format: ImageFormat) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.image()
            .write_to(&mut Cursor::new(&mut data), format)
            .map_err(|e| {
                CaptchaError::RenderingUnavailable(format!("{format:?} encode failed: {e}"))
            })?;
        Ok(data)
    }

    /// # Errors
    ///
    /// See [`RenderedCaptchaImage::encode`].
    pub fn to_png(&self) -> Result<Vec<u8>> {
        self.encode(ImageFormat::Png)
    }

    /// # Errors
    ///
    /// See [`RenderedCaptchaImage::encode`].
    pub fn to_webp(&self) -> Result<Vec<u8>> {
        self.encode(ImageFormat::WebP)
    }

    /// Encodes the bitmap as a base64 `data:` URI.
    ///
    /// # Errors
    ///
    /// See [`RenderedCaptchaImage::encode`].
    pub fn to_data_uri(&self, format: ImageFormat) -> Result<String> {
        let data = self.encode(format)?;
        Ok(format!(
            "data:{};base64,{}",
            format.to_mime_type(),
            STANDARD.encode(&data)
        ))
    }
}
