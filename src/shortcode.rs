//! Shortcode generation and validation policy.
//!
//! Codes are drawn from a URL-safe 64 character alphabet. The policy never
//! promises uniqueness; callers must treat the store as the authority and
//! retry on collision.

use rand::rngs::SysRng;
use rand::TryRng;
use thiserror::Error;

/// Length used when the caller asks for a zero-length code.
pub const DEFAULT_LENGTH: usize = 6;

/// Longest code, generated or custom, that the policy accepts.
pub const MAX_LENGTH: usize = 12;

/// `[A-Za-z0-9_-]`
pub const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortcodeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal failure: {0}")]
    InternalFailure(String),
}

/// Produce a random code of `length` characters (`0` selects [`DEFAULT_LENGTH`]).
///
/// Draws straight from the operating system's random source. A failure of
/// that source is reported as [`ShortcodeError::InternalFailure`].
pub fn generate(length: usize) -> Result<String, ShortcodeError> {
    generate_from(&mut SysRng, length)
}

/// Same as [`generate`] with an explicit fallible random source.
///
/// Each byte maps onto the alphabet through its low six bits; with a
/// 64-symbol alphabet that keeps every symbol equally likely.
pub fn generate_from<R: TryRng>(rng: &mut R, length: usize) -> Result<String, ShortcodeError> {
    let length = if length == 0 { DEFAULT_LENGTH } else { length };

    let mut bytes = vec![0u8; length];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|err| ShortcodeError::InternalFailure(err.to_string()))?;

    Ok(bytes
        .iter()
        .map(|b| ALPHABET[usize::from(b & 0x3f)] as char)
        .collect())
}

/// Check a caller-supplied code against the character and length policy.
pub fn validate(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_LENGTH
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Source of candidate short codes.
///
/// Implementations are pure generators and never consult the store.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> Result<String, ShortcodeError>;
}

/// Production generator backed by [`generate`].
#[derive(Debug, Clone, Copy)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> Result<String, ShortcodeError> {
        generate(self.length)
    }
}
