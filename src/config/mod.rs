//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `SKILLFUSE_*` environment variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{TierPolicy, TieredCacheConfig};
use crate::constants::{
    DEFAULT_CANDIDATE_MULTIPLIER, DEFAULT_DATABASE_FILENAME, DEFAULT_EMBEDDING_DIM,
    DEFAULT_KEYWORD_WEIGHT, DEFAULT_L1_MAX_BYTES, DEFAULT_L1_MAX_ENTRIES,
    DEFAULT_POPULAR_HIT_THRESHOLD, DEFAULT_POPULAR_TTL_SECS, DEFAULT_PRUNE_INTERVAL_SECS,
    DEFAULT_RARE_TTL_SECS, DEFAULT_REFRESH_FRACTION, DEFAULT_RRF_K, DEFAULT_SEMANTIC_WEIGHT,
    DEFAULT_STALL_WINDOW_SECS, DEFAULT_STANDARD_TTL_SECS,
};
use crate::search::SearchConfig;

/// Library configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `SKILLFUSE_*` overrides on top of defaults, then project it
/// into module configs with [`Config::tiered_config`] and [`Config::search_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the SQLite database. Default: `./.data`.
    pub storage_path: PathBuf,

    /// Max entries in the L1 cache. Default: `1000`.
    pub l1_max_entries: usize,

    /// Max estimated bytes in the L1 cache. Default: 64 MiB.
    pub l1_max_bytes: usize,

    /// Consult and populate the durable L2 tier. Default: `true`.
    pub l2_enabled: bool,

    /// Copy L2 hits into L1. Default: `true`.
    pub promotion_enabled: bool,

    pub ttl_standard_secs: u64,
    pub ttl_popular_secs: u64,
    pub ttl_rare_secs: u64,

    /// Hits after which an entry is promoted to the popular tier. Default: `10`.
    pub popular_hit_threshold: u64,

    /// Idle seconds after which an entry's tier decays. Default: `1800`.
    pub stall_window_secs: u64,

    /// Tail fraction of the TTL flagged for refresh. Default: `0.1`.
    pub refresh_fraction: f64,

    /// Background prune period. Default: `300`.
    pub prune_interval_secs: u64,

    /// RRF smoothing constant. Default: `60`.
    pub rrf_k: f64,

    pub keyword_weight: f64,
    pub semantic_weight: f64,

    /// Ranking candidates fetched per requested result. Default: `3`.
    pub candidate_multiplier: usize,

    /// Embedding vector length. Default: `384`.
    pub embedding_dim: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./.data"),
            l1_max_entries: DEFAULT_L1_MAX_ENTRIES,
            l1_max_bytes: DEFAULT_L1_MAX_BYTES,
            l2_enabled: true,
            promotion_enabled: true,
            ttl_standard_secs: DEFAULT_STANDARD_TTL_SECS,
            ttl_popular_secs: DEFAULT_POPULAR_TTL_SECS,
            ttl_rare_secs: DEFAULT_RARE_TTL_SECS,
            popular_hit_threshold: DEFAULT_POPULAR_HIT_THRESHOLD,
            stall_window_secs: DEFAULT_STALL_WINDOW_SECS,
            refresh_fraction: DEFAULT_REFRESH_FRACTION,
            prune_interval_secs: DEFAULT_PRUNE_INTERVAL_SECS,
            rrf_k: DEFAULT_RRF_K,
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl Config {
    const ENV_STORAGE_PATH: &'static str = "SKILLFUSE_STORAGE_PATH";
    const ENV_L1_MAX_ENTRIES: &'static str = "SKILLFUSE_L1_MAX_ENTRIES";
    const ENV_L1_MAX_BYTES: &'static str = "SKILLFUSE_L1_MAX_BYTES";
    const ENV_L2_ENABLED: &'static str = "SKILLFUSE_L2_ENABLED";
    const ENV_PROMOTION_ENABLED: &'static str = "SKILLFUSE_PROMOTION_ENABLED";
    const ENV_TTL_STANDARD_SECS: &'static str = "SKILLFUSE_TTL_STANDARD_SECS";
    const ENV_TTL_POPULAR_SECS: &'static str = "SKILLFUSE_TTL_POPULAR_SECS";
    const ENV_TTL_RARE_SECS: &'static str = "SKILLFUSE_TTL_RARE_SECS";
    const ENV_POPULAR_HIT_THRESHOLD: &'static str = "SKILLFUSE_POPULAR_HIT_THRESHOLD";
    const ENV_STALL_WINDOW_SECS: &'static str = "SKILLFUSE_STALL_WINDOW_SECS";
    const ENV_REFRESH_FRACTION: &'static str = "SKILLFUSE_REFRESH_FRACTION";
    const ENV_PRUNE_INTERVAL_SECS: &'static str = "SKILLFUSE_PRUNE_INTERVAL_SECS";
    const ENV_RRF_K: &'static str = "SKILLFUSE_RRF_K";
    const ENV_KEYWORD_WEIGHT: &'static str = "SKILLFUSE_KEYWORD_WEIGHT";
    const ENV_SEMANTIC_WEIGHT: &'static str = "SKILLFUSE_SEMANTIC_WEIGHT";
    const ENV_CANDIDATE_MULTIPLIER: &'static str = "SKILLFUSE_CANDIDATE_MULTIPLIER";
    const ENV_EMBEDDING_DIM: &'static str = "SKILLFUSE_EMBEDDING_DIM";

    /// Loads configuration from environment variables (falling back to defaults).
    ///
    /// Unparseable values are errors; call [`Config::validate`] for range checks.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();

        Ok(Self {
            storage_path: Self::parse_path_from_env(Self::ENV_STORAGE_PATH, d.storage_path),
            l1_max_entries: Self::parse_from_env(Self::ENV_L1_MAX_ENTRIES, d.l1_max_entries)?,
            l1_max_bytes: Self::parse_from_env(Self::ENV_L1_MAX_BYTES, d.l1_max_bytes)?,
            l2_enabled: Self::parse_bool_from_env(Self::ENV_L2_ENABLED, d.l2_enabled)?,
            promotion_enabled: Self::parse_bool_from_env(
                Self::ENV_PROMOTION_ENABLED,
                d.promotion_enabled,
            )?,
            ttl_standard_secs: Self::parse_from_env(
                Self::ENV_TTL_STANDARD_SECS,
                d.ttl_standard_secs,
            )?,
            ttl_popular_secs: Self::parse_from_env(Self::ENV_TTL_POPULAR_SECS, d.ttl_popular_secs)?,
            ttl_rare_secs: Self::parse_from_env(Self::ENV_TTL_RARE_SECS, d.ttl_rare_secs)?,
            popular_hit_threshold: Self::parse_from_env(
                Self::ENV_POPULAR_HIT_THRESHOLD,
                d.popular_hit_threshold,
            )?,
            stall_window_secs: Self::parse_from_env(
                Self::ENV_STALL_WINDOW_SECS,
                d.stall_window_secs,
            )?,
            refresh_fraction: Self::parse_from_env(Self::ENV_REFRESH_FRACTION, d.refresh_fraction)?,
            prune_interval_secs: Self::parse_from_env(
                Self::ENV_PRUNE_INTERVAL_SECS,
                d.prune_interval_secs,
            )?,
            rrf_k: Self::parse_from_env(Self::ENV_RRF_K, d.rrf_k)?,
            keyword_weight: Self::parse_from_env(Self::ENV_KEYWORD_WEIGHT, d.keyword_weight)?,
            semantic_weight: Self::parse_from_env(Self::ENV_SEMANTIC_WEIGHT, d.semantic_weight)?,
            candidate_multiplier: Self::parse_from_env(
                Self::ENV_CANDIDATE_MULTIPLIER,
                d.candidate_multiplier,
            )?,
            embedding_dim: Self::parse_from_env(Self::ENV_EMBEDDING_DIM, d.embedding_dim)?,
        })
    }

    /// Checks ranges and paths (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_path.exists() && !self.storage_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.storage_path.clone(),
            });
        }

        check_positive(Self::ENV_L1_MAX_ENTRIES, self.l1_max_entries as u64)?;
        check_positive(Self::ENV_L1_MAX_BYTES, self.l1_max_bytes as u64)?;
        check_positive(Self::ENV_TTL_STANDARD_SECS, self.ttl_standard_secs)?;
        check_positive(Self::ENV_TTL_POPULAR_SECS, self.ttl_popular_secs)?;
        check_positive(Self::ENV_TTL_RARE_SECS, self.ttl_rare_secs)?;
        check_positive(Self::ENV_POPULAR_HIT_THRESHOLD, self.popular_hit_threshold)?;
        check_positive(Self::ENV_PRUNE_INTERVAL_SECS, self.prune_interval_secs)?;
        check_positive(Self::ENV_CANDIDATE_MULTIPLIER, self.candidate_multiplier as u64)?;
        check_positive(Self::ENV_EMBEDDING_DIM, self.embedding_dim as u64)?;

        if !(0.0..=1.0).contains(&self.refresh_fraction) {
            return Err(out_of_range(
                Self::ENV_REFRESH_FRACTION,
                self.refresh_fraction,
                "between 0 and 1",
            ));
        }
        if !self.rrf_k.is_finite() || self.rrf_k < 0.0 {
            return Err(out_of_range(
                Self::ENV_RRF_K,
                self.rrf_k,
                "finite and non-negative",
            ));
        }
        for (name, weight) in [
            (Self::ENV_KEYWORD_WEIGHT, self.keyword_weight),
            (Self::ENV_SEMANTIC_WEIGHT, self.semantic_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(out_of_range(name, weight, "finite and non-negative"));
            }
        }

        Ok(())
    }

    /// Path of the SQLite database shared by the L2 store and the skill store.
    pub fn database_path(&self) -> PathBuf {
        self.storage_path.join(DEFAULT_DATABASE_FILENAME)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }

    pub fn tier_policy(&self) -> TierPolicy {
        TierPolicy {
            standard_ttl: Duration::from_secs(self.ttl_standard_secs),
            popular_ttl: Duration::from_secs(self.ttl_popular_secs),
            rare_ttl: Duration::from_secs(self.ttl_rare_secs),
            popular_hit_threshold: self.popular_hit_threshold,
            stall_window: Duration::from_secs(self.stall_window_secs),
            refresh_fraction: self.refresh_fraction,
        }
    }

    pub fn tiered_config(&self) -> TieredCacheConfig {
        TieredCacheConfig::default()
            .with_l1_limits(self.l1_max_entries, self.l1_max_bytes)
            .with_l2_enabled(self.l2_enabled)
            .with_promotion(self.promotion_enabled)
            .with_policy(self.tier_policy())
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::default()
            .with_rrf_k(self.rrf_k)
            .with_weights(self.keyword_weight, self.semantic_weight)
            .with_candidate_multiplier(self.candidate_multiplier)
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(default)
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidNumber {
                    name: var_name,
                    value,
                    reason: e.to_string(),
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match env::var(var_name) {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidBool {
                    name: var_name,
                    value,
                }),
            },
            Err(_) => Ok(default),
        }
    }
}

fn check_positive(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(out_of_range(name, value, "greater than zero"));
    }
    Ok(())
}

fn out_of_range(
    name: &'static str,
    value: impl std::fmt::Display,
    expected: &'static str,
) -> ConfigError {
    ConfigError::OutOfRange {
        name,
        value: value.to_string(),
        expected,
    }
}
