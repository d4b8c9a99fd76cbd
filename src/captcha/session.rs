//! Validation state machine.
//!
//! A session starts with no code. Each refresh replaces the current code
//! with a fresh one; expiry is computed at validation time rather than
//! stored as a state.

use super::clock::{Clock, SystemClock};
use super::code::{CaptchaCode, RandomCodeGenerator};
use crate::config::{CaptchaConfig, CaptchaError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// Outcome of checking user input against the current code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    InvalidCode,
    CodeExpired,
}

impl ValidationResult {
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Holds the current code and the rules it is validated with.
pub struct CaptchaSession {
    config: Arc<CaptchaConfig>,
    clock: Box<dyn Clock>,
    rng: StdRng,
    current: Option<CaptchaCode>,
    next_serial: u64,
}

impl CaptchaSession {
    /// Creates a session on the wall clock with an entropy-seeded generator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` violates its invariants.
    pub fn new(config: Arc<CaptchaConfig>) -> Result<Self> {
        Self::with_parts(config, SystemClock, StdRng::from_rng(&mut rand::rng()))
    }

    /// Creates a session with an explicit clock and random source.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` violates its invariants.
    pub fn with_parts(
        config: Arc<CaptchaConfig>,
        clock: impl Clock + 'static,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Box::new(clock),
            rng,
            current: None,
            next_serial: 1,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Arc<CaptchaConfig> {
        &self.config
    }

    #[must_use]
    pub fn current(&self) -> Option<&CaptchaCode> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Replaces the current code with a freshly generated one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the generator rejects the configuration.
    pub fn refresh(&mut self) -> Result<&CaptchaCode> {
        let config = &self.config;
        let text = RandomCodeGenerator::generate(&mut self.rng, &config.alphabet, config.length)?;
        let serial = self.next_serial;
        self.next_serial += 1;

        info!(serial, length = self.config.length, "Captcha code refreshed");
        Ok(&*self.current.insert(CaptchaCode {
            text,
            generated_at: self.clock.now(),
            serial,
        }))
    }

    /// Whether the current code is older than the configured expiry.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before the first refresh.
    pub fn is_expired(&self) -> Result<bool> {
        let code = self.current.as_ref().ok_or(CaptchaError::NotInitialized)?;
        let elapsed = self
            .clock
            .now()
            .duration_since(code.generated_at)
            .unwrap_or_default();
        Ok(elapsed > self.config.expire_after)
    }

    /// Checks `input` against the current code.
    ///
    /// Expiry is checked first, so an expired code never validates even when
    /// the text matches. Empty input simply fails the comparison.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before the first refresh.
    pub fn validate(&self, input: &str) -> Result<ValidationResult> {
        if self.is_expired()? {
            debug!("Captcha validation rejected: code expired");
            return Ok(ValidationResult::CodeExpired);
        }
        let code = self.current.as_ref().ok_or(CaptchaError::NotInitialized)?;

        let matches = if self.config.case_sensitive {
            input == code.text
        } else {
            input.to_lowercase() == code.text.to_lowercase()
        };

        if matches {
            Ok(ValidationResult::Valid)
        } else {
            debug!("Captcha validation rejected: code mismatch");
            Ok(ValidationResult::InvalidCode)
        }
    }
}
