use std::time::Duration;
use tracing::warn;

use crate::comparables::{MAX_MATCHES, MIN_MATCHES};

pub const DEFAULT_AI_LATENCY_MS: u64 = 700;
pub const DEFAULT_LOOKUP_LATENCY_MS: u64 = 400;

/// Engine settings, read once at start-up.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub ai_latency: Duration,
    pub lookup_latency: Duration,
    pub comparable_limit: usize,
}

impl EngineConfig {
    /// Reads `CLAIMS_AI_LATENCY_MS`, `CLAIMS_LOOKUP_LATENCY_MS` and
    /// `CLAIMS_COMPARABLE_LIMIT`; unset or unparsable values use defaults.
    pub fn from_env() -> Self {
        let ai_latency_ms = env_or("CLAIMS_AI_LATENCY_MS", DEFAULT_AI_LATENCY_MS);
        let lookup_latency_ms = env_or("CLAIMS_LOOKUP_LATENCY_MS", DEFAULT_LOOKUP_LATENCY_MS);
        let comparable_limit = env_or("CLAIMS_COMPARABLE_LIMIT", MIN_MATCHES as u64) as usize;

        Self {
            ai_latency: Duration::from_millis(ai_latency_ms),
            lookup_latency: Duration::from_millis(lookup_latency_ms),
            comparable_limit: comparable_limit.clamp(MIN_MATCHES, MAX_MATCHES),
        }
    }

    /// Zero latency; used by tests.
    pub fn immediate() -> Self {
        Self {
            ai_latency: Duration::ZERO,
            lookup_latency: Duration::ZERO,
            comparable_limit: MIN_MATCHES,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ai_latency: Duration::from_millis(DEFAULT_AI_LATENCY_MS),
            lookup_latency: Duration::from_millis(DEFAULT_LOOKUP_LATENCY_MS),
            comparable_limit: MIN_MATCHES,
        }
    }
}

fn env_or(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}
