//! Embedded glyph fonts.

use crate::config::{CaptchaError, Result};
use ab_glyph::FontRef;

const REGULAR_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
const BOLD_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans-Bold.ttf");

/// One of the two weights a glyph is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// Regular and bold faces used for code glyphs.
pub struct GlyphFonts {
    regular: FontRef<'static>,
    bold: FontRef<'static>,
}

impl GlyphFonts {
    /// Loads the bundled faces.
    ///
    /// # Errors
    ///
    /// Returns `RenderingUnavailable` if the embedded font data cannot be parsed.
    pub fn load() -> Result<Self> {
        let parse = |bytes: &'static [u8], name: &str| {
            FontRef::try_from_slice(bytes)
                .map_err(|e| CaptchaError::RenderingUnavailable(format!("{name} font: {e}")))
        };
        Ok(Self {
            regular: parse(REGULAR_BYTES, "regular")?,
            bold: parse(BOLD_BYTES, "bold")?,
        })
    }

    #[must_use]
    pub fn face(&self, weight: FontWeight) -> &FontRef<'static> {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }
}
