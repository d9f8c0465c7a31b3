//! Store configuration and session code generation.

use casefile_protocol::SessionCode;
use rand::Rng;

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Tunables for [`SqliteStore`](crate::SqliteStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Characters per session code. Clamped to
    /// [`SessionCode::MIN_LEN`]..=[`SessionCode::MAX_LEN`].
    pub code_length: usize,

    /// How many codes to try before giving up with
    /// [`StoreError::CodesExhausted`](crate::StoreError::CodesExhausted).
    pub max_code_attempts: u32,
}

impl StoreConfig {
    pub(crate) fn effective_code_length(&self) -> usize {
        self.code_length
            .clamp(SessionCode::MIN_LEN, SessionCode::MAX_LEN)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            code_length: 5,
            max_code_attempts: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// CodeGenerator
// ---------------------------------------------------------------------------

/// Produces candidate session codes.
///
/// The store only *proposes* codes through this trait. Uniqueness among
/// live sessions is enforced by a partial unique index, and a collision
/// just means "ask for another one".
pub trait CodeGenerator: Send + Sync + 'static {
    /// Returns a candidate code of exactly `len` characters from
    /// [`SessionCode::ALPHABET`].
    fn generate(&self, len: usize) -> String;
}

/// Uniform random codes from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn generate(&self, len: usize) -> String {
        let mut rng = rand::rng();
        (0..len)
            .map(|_| {
                let idx = rng.random_range(0..SessionCode::ALPHABET.len());
                SessionCode::ALPHABET[idx] as char
            })
            .collect()
    }
}
