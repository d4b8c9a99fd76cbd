//! Library definitions.
//!
//! A self-contained image CAPTCHA for prototypes and demo applications:
//! random code generation, expiry-aware validation, and a distorted, noisy
//! bitmap that is rendered once per code and cached across repaints.
//!
//! This is not a security boundary. There is no server-side verification and
//! no resistance to OCR.
//!
//! ```rust,ignore
//! use mavecaptcha::{CaptchaConfig, CaptchaController, ValidationResult};
//!
//! let mut controller = CaptchaController::new(CaptchaConfig::new(200.0, 60.0))?;
//! controller.refresh()?;
//! controller.run_deferred();
//! let png = controller.image().map(|img| img.to_png()).transpose()?;
//! assert_eq!(controller.validate("nope")?, ValidationResult::InvalidCode);
//! ```

pub mod captcha;
pub mod config;
pub mod logging;
pub mod render;

pub use captcha::{
    CaptchaCode, CaptchaController, CaptchaSession, ChangeEvent, Clock, ManualClock,
    RandomCodeGenerator, RenderStatus, SubscriptionId, SystemClock, ValidationResult,
};
pub use config::{Alphabet, CaptchaConfig, CaptchaError, Result};
pub use render::{CaptchaRenderer, GlyphTransformer, NoiseOverlayGenerator, RenderedCaptchaImage};
