//! Per-run research configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable configuration for a single research run.
///
/// Created once alongside the [`super::Question`] at run start; never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub token_budget: u64,
    /// Fraction of `token_budget` reserved for the forced final answer.
    ///
    /// Treated as a fraction of the *total* budget, not of whatever remains
    /// when it is checked (see DESIGN.md Open Question (a)).
    pub reserve_final_ratio: f64,
    pub max_steps: u32,
    pub max_bad_attempts: u32,
    pub max_queries_per_step: u32,
    pub max_urls_per_step: u32,
    pub min_relevance_score: f64,
    pub max_references: u32,
    pub step_timeout_ms: u64,
    pub total_timeout_ms: u64,
    /// Remaining-budget fraction that trips beast mode.
    pub beast_mode_threshold: f64,
    pub language: String,
    /// Search providers in priority order, e.g. `["primary", "secondary"]`.
    pub search_provider_order: Vec<String>,
    pub allow_coding: bool,
    pub rate_limit: RateLimitConfig,
    pub concurrency: ConcurrencyConfig,
    pub cache: CacheConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            token_budget: 1_000_000,
            reserve_final_ratio: 0.15,
            max_steps: 50,
            max_bad_attempts: 3,
            max_queries_per_step: 3,
            max_urls_per_step: 5,
            min_relevance_score: 0.8,
            max_references: 10,
            step_timeout_ms: 30_000,
            total_timeout_ms: 600_000,
            beast_mode_threshold: 0.15,
            language: "en".to_string(),
            search_provider_order: vec!["primary".to_string()],
            allow_coding: false,
            rate_limit: RateLimitConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl ResearchConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_per_minute: u32,
    pub max_per_hour: u32,
    pub max_per_domain: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 60,
            max_per_hour: 1000,
            max_per_domain: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub initial: usize,
    pub min: usize,
    pub max: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { initial: 5, min: 1, max: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size_bytes: u64,
    pub max_entries: usize,
    pub default_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 500 * 1024 * 1024,
            max_entries: 1000,
            default_ttl_ms: 24 * 60 * 60 * 1000,
        }
    }
}
