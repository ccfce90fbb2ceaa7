// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plaintext token generation for bootstrap and artifact tokens (spec
//! section 4.2/4.4). The plaintext is handed to the guest once and
//! never stored; only [`sbx_core::hash_token`] of it is persisted.

use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RandomSourceError {
    #[error("random source unavailable: {0}")]
    Unavailable(String),
}

/// Seam over the bytes backing token generation, so a failing entropy
/// source (spec scenario S4) can be simulated without touching the OS RNG.
pub trait RandomSource: Send + Sync + 'static {
    fn fill(&self, buf: &mut [u8]) -> Result<(), RandomSourceError>;
}

/// Backed by `rand`'s thread-local CSPRNG.
#[derive(Default)]
pub struct OsRandomSource;

impl OsRandomSource {
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for OsRandomSource {
    fn fill(&self, buf: &mut [u8]) -> Result<(), RandomSourceError> {
        rand::rng().fill_bytes(buf);
        Ok(())
    }
}

/// 16 random bytes, hex-encoded.
pub fn random_hex_token(source: &dyn RandomSource) -> Result<String, RandomSourceError> {
    let mut bytes = [0u8; 16];
    source.fill(&mut bytes)?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::{RandomSource, RandomSourceError};
    use parking_lot::Mutex;

    /// Fails the next `n` calls to `fill`, then falls back to a
    /// deterministic counter-based byte stream (not cryptographically
    /// random, but distinct per call, which is all tests need).
    #[derive(Default)]
    pub struct FakeRandomSource {
        state: Mutex<FakeState>,
    }

    #[derive(Default)]
    struct FakeState {
        fail_remaining: u32,
        counter: u64,
    }

    impl FakeRandomSource {
        pub fn new() -> Self {
            Self::default()
        }

        /// The next `n` calls to `fill` return `Err`; calls after that succeed.
        pub fn fail_next(&self, n: u32) {
            self.state.lock().fail_remaining = n;
        }
    }

    impl RandomSource for FakeRandomSource {
        fn fill(&self, buf: &mut [u8]) -> Result<(), RandomSourceError> {
            let mut state = self.state.lock();
            if state.fail_remaining > 0 {
                state.fail_remaining -= 1;
                return Err(RandomSourceError::Unavailable("fake random source forced failure".into()));
            }
            state.counter += 1;
            let counter = state.counter;
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = (counter.wrapping_add(i as u64) % 256) as u8;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_32_hex_chars() {
        let token = random_hex_token(&OsRandomSource::new()).unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn successive_tokens_differ() {
        let source = OsRandomSource::new();
        assert_ne!(random_hex_token(&source).unwrap(), random_hex_token(&source).unwrap());
    }

    #[test]
    fn fake_source_fails_the_configured_number_of_times_then_recovers() {
        let source = fake::FakeRandomSource::new();
        source.fail_next(2);
        assert!(random_hex_token(&source).is_err());
        assert!(random_hex_token(&source).is_err());
        assert!(random_hex_token(&source).is_ok());
    }
}
