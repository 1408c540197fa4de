//! Entropy adapters.
//!
//! [`SystemEntropy`] is the production source: the hardware RNG on
//! ESP-IDF, `RandomState` hashing on the host (non-cryptographic, dev and
//! test only).  [`SeqEntropy`] is a deterministic source for tests.

use crate::app::ports::EntropySource;

/// Platform random source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEntropy;

impl SystemEntropy {
    pub fn new() -> Self {
        Self
    }
}

/// ESP-IDF: delegates to the hardware RNG via `esp_fill_random`.
#[cfg(target_os = "espidf")]
impl EntropySource for SystemEntropy {
    fn secure_random_byte(&mut self) -> u8 {
        let mut b = [0u8; 1];
        // SAFETY: esp_fill_random writes exactly `len` bytes into the
        // provided buffer, which is valid and exclusively owned.
        unsafe {
            esp_idf_svc::sys::esp_fill_random(b.as_mut_ptr().cast(), b.len());
        }
        b[0]
    }
}

/// Simulation: `RandomState` hashing, non-cryptographic.
#[cfg(not(target_os = "espidf"))]
impl EntropySource for SystemEntropy {
    fn secure_random_byte(&mut self) -> u8 {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};

        let s = RandomState::new();
        s.build_hasher().finish().to_le_bytes()[0]
    }
}

/// Deterministic source: `start`, `start + step`, `start + 2 * step`, ...
#[derive(Debug, Clone, Copy)]
pub struct SeqEntropy {
    next: u8,
    step: u8,
}

impl SeqEntropy {
    pub fn new(start: u8) -> Self {
        Self {
            next: start,
            step: 1,
        }
    }

    /// Always yields `value`.
    pub fn constant(value: u8) -> Self {
        Self {
            next: value,
            step: 0,
        }
    }
}

impl EntropySource for SeqEntropy {
    fn secure_random_byte(&mut self) -> u8 {
        let b = self.next;
        self.next = self.next.wrapping_add(self.step);
        b
    }
}
