//! Code generation.

use crate::config::{Alphabet, CaptchaError, Result};
use rand::Rng;
use std::time::SystemTime;

/// The code the user has to re-type.
///
/// Superseded, never mutated, by the next refresh. `serial` is unique per
/// session and identifies this code for render caching even when two
/// refreshes happen to draw the same text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaCode {
    pub text: String,
    pub generated_at: SystemTime,
    pub serial: u64,
}

impl CaptchaCode {
    /// Number of characters (code points) in the code.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether `other` is the same generated code, not just the same text.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.serial == other.serial && self.text == other.text
    }
}

/// Draws codes uniformly, with replacement, from an alphabet.
///
/// Uniformity is the only requirement; the source is not cryptographic.
pub struct RandomCodeGenerator;

impl RandomCodeGenerator {
    /// Generates `length` characters drawn independently from `alphabet`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `length` is zero or the alphabet is empty.
    pub fn generate(rng: &mut impl Rng, alphabet: &Alphabet, length: usize) -> Result<String> {
        if length == 0 {
            return Err(CaptchaError::config("code length must be at least 1"));
        }
        let chars = alphabet.chars();
        if chars.is_empty() {
            return Err(CaptchaError::config("alphabet must not be empty"));
        }
        Ok((0..length)
            .map(|_| chars[rng.random_range(0..chars.len())])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    #[test]
    fn test_length_and_membership() {
        let mut rng = StdRng::seed_from_u64(7);
        let alphabet = Alphabet::new("ABC123").unwrap();
        for length in 1..20 {
            let code = RandomCodeGenerator::generate(&mut rng, &alphabet, length).unwrap();
            assert_eq!(code.chars().count(), length);
            assert!(code.chars().all(|c| alphabet.contains(c)));
        }
    }

    #[test]
    fn test_multibyte_alphabet_counts_code_points() {
        let mut rng = StdRng::seed_from_u64(1);
        let alphabet = Alphabet::new("αβγ").unwrap();
        let code = RandomCodeGenerator::generate(&mut rng, &alphabet, 6).unwrap();
        assert_eq!(code.chars().count(), 6);
        assert_eq!(code.len(), 12);
    }

    #[test]
    fn test_zero_length_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let alphabet = Alphabet::default();
        assert!(matches!(
            RandomCodeGenerator::generate(&mut rng, &alphabet, 0),
            Err(CaptchaError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_single_symbol_alphabet_repeats() {
        let mut rng = StdRng::seed_from_u64(3);
        let alphabet = Alphabet::new("x").unwrap();
        assert_eq!(
            RandomCodeGenerator::generate(&mut rng, &alphabet, 4).unwrap(),
            "xxxx"
        );
    }

    #[test]
    fn test_every_symbol_reachable() {
        let mut rng = StdRng::seed_from_u64(42);
        let alphabet = Alphabet::new("ABCD").unwrap();
        let code = RandomCodeGenerator::generate(&mut rng, &alphabet, 4000).unwrap();

        let mut counts: HashMap<char, usize> = HashMap::new();
        for ch in code.chars() {
            *counts.entry(ch).or_default() += 1;
        }
        assert_eq!(counts.len(), 4);
        for count in counts.values() {
            assert!((800..1200).contains(count), "skewed count {count}");
        }
    }
}
