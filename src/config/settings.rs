//! Configuration settings.
//!
//! Defines the `CaptchaConfig` struct, its invariants, and environment
//! variable loading logic.

use super::{Alphabet, CaptchaError, Result};
use image::Rgba;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_LENGTH: usize = 5;
const DEFAULT_EXPIRE_AFTER: Duration = Duration::from_secs(10 * 60);
const DEFAULT_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

const DEFAULT_TEXT_COLORS: [Rgba<u8>; 5] = [
    Rgba([27, 27, 27, 255]),
    Rgba([57, 73, 171, 255]),
    Rgba([183, 28, 28, 255]),
    Rgba([27, 94, 32, 255]),
    Rgba([74, 20, 140, 255]),
];

const DEFAULT_NOISE_COLORS: [Rgba<u8>; 5] = [
    Rgba([144, 164, 174, 255]),
    Rgba([176, 190, 197, 255]),
    Rgba([255, 171, 145, 255]),
    Rgba([165, 214, 167, 255]),
    Rgba([206, 147, 216, 255]),
];

fn get_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn get_env_parsed<T: FromStr>(key: &str) -> Result<Option<T>> {
    get_env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| CaptchaError::config(format!("{key} has an invalid value: {raw}")))
        })
        .transpose()
}

fn get_env_required<T: FromStr>(key: &str) -> Result<T> {
    get_env_parsed(key)?.ok_or_else(|| CaptchaError::config(format!("{key} must be set")))
}

fn get_env_bool(key: &str) -> bool {
    get_env(key).is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

/// Widget configuration.
///
/// Owned by the widget instance and never mutated while a code is live;
/// build a new controller to reconfigure.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptchaConfig {
    /// Characters codes are drawn from.
    pub alphabet: Alphabet,
    /// Number of characters per code.
    pub length: usize,
    /// Whether validation compares case-sensitively.
    pub case_sensitive: bool,
    /// Age after which a code no longer validates.
    pub expire_after: Duration,
    /// Fixed glyph size in pixels; auto-sized from the canvas when `None`.
    pub font_size: Option<f32>,
    /// Canvas width in pixels.
    pub width: f32,
    /// Canvas height in pixels. Must not exceed `width`.
    pub height: f32,
    pub background_color: Rgba<u8>,
    pub text_colors: Vec<Rgba<u8>>,
    pub noise_colors: Vec<Rgba<u8>>,
    /// Delay between a refresh and its rasterization, letting host layout settle.
    pub settle_delay: Duration,
}

impl CaptchaConfig {
    /// Creates a configuration for a `width` x `height` canvas with default
    /// alphabet, length, colours, and expiry.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            alphabet: Alphabet::default(),
            length: DEFAULT_LENGTH,
            case_sensitive: false,
            expire_after: DEFAULT_EXPIRE_AFTER,
            font_size: None,
            width,
            height,
            background_color: DEFAULT_BACKGROUND,
            text_colors: DEFAULT_TEXT_COLORS.to_vec(),
            noise_colors: DEFAULT_NOISE_COLORS.to_vec(),
            settle_delay: Duration::ZERO,
        }
    }

    /// Checks every invariant the session and renderer rely on.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.alphabet.is_empty() {
            return Err(CaptchaError::config("alphabet must not be empty"));
        }
        if self.length == 0 {
            return Err(CaptchaError::config("code length must be at least 1"));
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(CaptchaError::config("canvas width must be positive"));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(CaptchaError::config("canvas height must be positive"));
        }
        if self.height > self.width {
            return Err(CaptchaError::config(format!(
                "canvas height ({}) must not exceed width ({})",
                self.height, self.width
            )));
        }
        if let Some(size) = self.font_size
            && !(size.is_finite() && size > 0.0)
        {
            return Err(CaptchaError::config("font size must be positive"));
        }
        if self.expire_after.is_zero() {
            return Err(CaptchaError::config("expiry duration must be positive"));
        }
        if self.text_colors.is_empty() {
            return Err(CaptchaError::config("text colour set must not be empty"));
        }
        if self.noise_colors.is_empty() {
            return Err(CaptchaError::config("noise colour set must not be empty"));
        }
        Ok(())
    }

    /// Loads configuration from environment variables.
    ///
    /// `CAPTCHA_WIDTH` and `CAPTCHA_HEIGHT` are required; everything else
    /// falls back to the defaults of [`CaptchaConfig::new`]:
    /// `CAPTCHA_ALPHABET`, `CAPTCHA_LENGTH`, `CAPTCHA_FONT_SIZE`,
    /// `CAPTCHA_CASE_SENSITIVE`, `CAPTCHA_EXPIRE_SECS`, `CAPTCHA_BACKGROUND`,
    /// `CAPTCHA_TEXT_COLORS`, `CAPTCHA_NOISE_COLORS`, `CAPTCHA_SETTLE_MS`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if a required variable is missing, a
    /// value fails to parse, or the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        let width: f32 = get_env_required("CAPTCHA_WIDTH")?;
        let height: f32 = get_env_required("CAPTCHA_HEIGHT")?;
        let mut config = Self::new(width, height);

        if let Some(alphabet) = get_env("CAPTCHA_ALPHABET") {
            config.alphabet = Alphabet::new(&alphabet)?;
        }
        if let Some(length) = get_env_parsed::<usize>("CAPTCHA_LENGTH")? {
            config.length = length;
        }
        config.font_size = get_env_parsed::<f32>("CAPTCHA_FONT_SIZE")?;
        config.case_sensitive = get_env_bool("CAPTCHA_CASE_SENSITIVE");
        if let Some(secs) = get_env_parsed::<u64>("CAPTCHA_EXPIRE_SECS")? {
            config.expire_after = Duration::from_secs(secs);
        }
        if let Some(raw) = get_env("CAPTCHA_BACKGROUND") {
            config.background_color = parse_color(&raw)?;
        }
        if let Some(raw) = get_env("CAPTCHA_TEXT_COLORS") {
            config.text_colors = parse_color_list(&raw)?;
        }
        if let Some(raw) = get_env("CAPTCHA_NOISE_COLORS") {
            config.noise_colors = parse_color_list(&raw)?;
        }
        if let Some(ms) = get_env_parsed::<u64>("CAPTCHA_SETTLE_MS")? {
            config.settle_delay = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Canvas size rounded up to whole pixels.
    #[must_use]
    pub fn pixel_size(&self) -> (u32, u32) {
        (ceil_to_u32(self.width), ceil_to_u32(self.height))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ceil_to_u32(val: f32) -> u32 {
    val.ceil().clamp(0.0, f32::from(u16::MAX)) as u32
}

/// Parses `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
///
/// # Errors
///
/// Returns `InvalidConfiguration` for any other shape.
pub fn parse_color(raw: &str) -> Result<Rgba<u8>> {
    let hex = raw.trim().trim_start_matches('#');
    let invalid = || CaptchaError::config(format!("invalid colour: {raw}"));
    if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

/// Parses a comma separated colour list; empty lists are rejected.
///
/// # Errors
///
/// Returns `InvalidConfiguration` if the list is empty or any entry is malformed.
pub fn parse_color_list(raw: &str) -> Result<Vec<Rgba<u8>>> {
    let colors = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_color)
        .collect::<Result<Vec<_>>>()?;
    if colors.is_empty() {
        return Err(CaptchaError::config("colour list must not be empty"));
    }
    Ok(colors)
}
