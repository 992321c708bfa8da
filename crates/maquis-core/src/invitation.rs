//! # Invitation Codes
//!
//! Join codes that let employees enroll in a bar.
//!
//! A code is 8 characters from `A-Z0-9` (36^8 ≈ 2.8 × 10^12 values). Sampling
//! happens here; global uniqueness is the store's job (unique index) and the
//! engine retries a bounded number of times on collision.
//!
//! Codes are compared after trimming and upper-casing, so ` abc123xy ` typed
//! on a phone matches `ABC123XY`.

use rand::Rng;

use crate::error::{CoreError, CoreResult};
use crate::INVITATION_CODE_LENGTH;

/// Characters a code is drawn from.
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws a code of `length` characters from [`ALPHABET`].
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Canonical form used for storage and lookup.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Normalizes `code` and checks its shape.
///
/// ```rust
/// use maquis_core::invitation::parse_code;
///
/// assert_eq!(parse_code(" ab12cd34 ", 8).unwrap(), "AB12CD34");
/// assert!(parse_code("AB12-D34", 8).is_err());
/// assert!(parse_code("AB12", 8).is_err());
/// ```
pub fn parse_code(code: &str, length: usize) -> CoreResult<String> {
    let normalized = normalize_code(code);

    let well_formed = normalized.len() == length
        && normalized.bytes().all(|b| ALPHABET.contains(&b));
    if !well_formed {
        return Err(CoreError::InvalidCode(code.trim().to_string()));
    }

    Ok(normalized)
}

/// Source of candidate codes.
///
/// The engine asks for a fresh candidate on every attempt, so tests can
/// script collisions by returning a known code first.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> String;
}

/// Uniformly random codes from the thread-local RNG.
#[derive(Debug, Clone, Copy)]
pub struct RandomCodeSource {
    length: usize,
}

impl RandomCodeSource {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomCodeSource {
    fn default() -> Self {
        Self::new(INVITATION_CODE_LENGTH)
    }
}

impl CodeSource for RandomCodeSource {
    fn next_code(&self) -> String {
        generate_code(&mut rand::thread_rng(), self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_codes_are_well_formed() {
        let source = RandomCodeSource::default();
        for _ in 0..200 {
            let code = source.next_code();
            assert_eq!(code.len(), 8);
            assert!(parse_code(&code, 8).is_ok(), "bad code {}", code);
        }
    }

    #[test]
    fn test_codes_vary() {
        let source = RandomCodeSource::default();
        let codes: HashSet<String> = (0..100).map(|_| source.next_code()).collect();
        assert!(codes.len() > 95);
    }

    #[test]
    fn test_parse_code_normalizes_case() {
        assert_eq!(parse_code("abcdefgh", 8).unwrap(), "ABCDEFGH");
        assert!(matches!(
            parse_code("ÉCOLE123", 8),
            Err(CoreError::InvalidCode(_))
        ));
    }
}
