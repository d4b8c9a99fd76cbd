//! CAPTCHA lifecycle.
//!
//! Code generation, the expiry-aware validation state machine, and the
//! controller that bridges host UI requests into it.

pub mod clock;
pub mod code;
pub mod controller;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use code::{CaptchaCode, RandomCodeGenerator};
pub use controller::{CaptchaController, ChangeEvent, RenderStatus, SubscriptionId};
pub use session::{CaptchaSession, ValidationResult};
