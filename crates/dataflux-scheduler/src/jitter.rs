//! Dispatch jitter.
//!
//! When several scheduler instances share one store, their loops tick on
//! the same wall-clock boundaries and race for the same locks at the same
//! instant. A small random delay before each dispatch spreads those
//! acquisitions out. Disabled by default.

use std::time::Duration;

use rand::Rng;

/// Configuration for pre-dispatch jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterConfig {
    /// Maximum jitter in milliseconds (0 = no jitter).
    pub max_jitter_ms: u64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self { max_jitter_ms: 0 }
    }
}

impl JitterConfig {
    pub fn new(max_jitter_ms: u64) -> Self {
        Self { max_jitter_ms }
    }

    pub fn none() -> Self {
        Self { max_jitter_ms: 0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_jitter_ms > 0
    }

    /// A random delay in `[0, max_jitter_ms)`, or zero when disabled.
    pub fn generate(&self) -> Duration {
        if self.max_jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..self.max_jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_jitter_is_immediate() {
        let config = JitterConfig::none();
        assert!(!config.is_enabled());
        assert_eq!(config.generate(), Duration::ZERO);
    }

    #[test]
    fn test_jitter_within_bounds() {
        let config = JitterConfig::new(50);
        assert!(config.is_enabled());
        for _ in 0..100 {
            assert!(config.generate() < Duration::from_millis(50));
        }
    }

    #[test]
    fn test_jitter_varies() {
        let config = JitterConfig::new(1000);
        let samples: std::collections::HashSet<u128> =
            (0..200).map(|_| config.generate().as_millis()).collect();
        assert!(samples.len() > 1, "jitter should produce varied values");
    }
}
