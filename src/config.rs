//! Configuration management.
//!
//! Widget configuration is immutable for the lifetime of one rendered
//! instance and replaced wholesale on reconfiguration. It can be built in
//! code or loaded from environment variables (see [`CaptchaConfig::from_env`]).

mod alphabet;
mod error;
mod settings;

pub use alphabet::{Alphabet, DEFAULT_ALPHABET};
pub use error::{CaptchaError, Result};
pub use settings::{CaptchaConfig, parse_color, parse_color_list};
