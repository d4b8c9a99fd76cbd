//! Code alphabet.

use super::{CaptchaError, Result};
use std::fmt;
use std::str::FromStr;

/// Characters used when no alphabet is configured.
///
/// Visually ambiguous glyphs (`0`/`O`, `1`/`l`/`I`, `c`/`C`, ...) are left out.
pub const DEFAULT_ALPHABET: &str = "abdefghnryABDEFGHNQRY3468";

/// Ordered set of distinct code points eligible for code generation.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    chars: Vec<char>,
}

impl Alphabet {
    /// Builds an alphabet from the code points of `s`.
    ///
    /// Repeated code points are dropped, keeping the first occurrence, so
    /// uniform sampling over the alphabet stays uniform over its symbols.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `s` contains no characters.
    pub fn new(s: &str) -> Result<Self> {
        let mut chars: Vec<char> = Vec::with_capacity(s.len());
        for ch in s.chars() {
            if !chars.contains(&ch) {
                chars.push(ch);
            }
        }
        if chars.is_empty() {
            return Err(CaptchaError::config("alphabet must not be empty"));
        }
        Ok(Self { chars })
    }

    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    #[must_use]
    pub fn contains(&self, ch: char) -> bool {
        self.chars.contains(&ch)
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            chars: DEFAULT_ALPHABET.chars().collect(),
        }
    }
}

impl FromStr for Alphabet {
    type Err = CaptchaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.chars.iter().try_for_each(|ch| write!(f, "{ch}"))
    }
}
