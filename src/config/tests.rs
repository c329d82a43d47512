use super::*;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

const ALL_VARS: &[&str] = &[
    "SKILLFUSE_STORAGE_PATH",
    "SKILLFUSE_L1_MAX_ENTRIES",
    "SKILLFUSE_L1_MAX_BYTES",
    "SKILLFUSE_L2_ENABLED",
    "SKILLFUSE_PROMOTION_ENABLED",
    "SKILLFUSE_TTL_STANDARD_SECS",
    "SKILLFUSE_TTL_POPULAR_SECS",
    "SKILLFUSE_TTL_RARE_SECS",
    "SKILLFUSE_POPULAR_HIT_THRESHOLD",
    "SKILLFUSE_STALL_WINDOW_SECS",
    "SKILLFUSE_REFRESH_FRACTION",
    "SKILLFUSE_PRUNE_INTERVAL_SECS",
    "SKILLFUSE_RRF_K",
    "SKILLFUSE_KEYWORD_WEIGHT",
    "SKILLFUSE_SEMANTIC_WEIGHT",
    "SKILLFUSE_CANDIDATE_MULTIPLIER",
    "SKILLFUSE_EMBEDDING_DIM",
];

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_skillfuse_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for key in ALL_VARS {
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.storage_path, PathBuf::from("./.data"));
    assert_eq!(config.l1_max_entries, 1000);
    assert_eq!(config.l1_max_bytes, 64 * 1024 * 1024);
    assert!(config.l2_enabled);
    assert!(config.promotion_enabled);
    assert_eq!(config.ttl_standard_secs, 3600);
    assert_eq!(config.ttl_popular_secs, 86_400);
    assert_eq!(config.ttl_rare_secs, 300);
    assert_eq!(config.rrf_k, 60.0);
    assert_eq!(config.keyword_weight, 0.5);
    assert_eq!(config.semantic_weight, 0.5);
    assert_eq!(config.candidate_multiplier, 3);
    assert_eq!(config.embedding_dim, 384);
    assert!(config.validate().is_ok());
}

#[test]
fn test_database_path() {
    let config = Config {
        storage_path: PathBuf::from("/var/lib/skillfuse"),
        ..Default::default()
    };
    assert_eq!(
        config.database_path(),
        PathBuf::from("/var/lib/skillfuse/skillfuse.db")
    );
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_skillfuse_env();

    let config = Config::from_env().expect("should parse with defaults");
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_skillfuse_env();

    let config = with_env_vars(
        &[
            ("SKILLFUSE_STORAGE_PATH", "/tmp/skills"),
            ("SKILLFUSE_L1_MAX_ENTRIES", "50"),
            ("SKILLFUSE_L2_ENABLED", "false"),
            ("SKILLFUSE_PROMOTION_ENABLED", "0"),
            ("SKILLFUSE_TTL_RARE_SECS", " 30 "),
            ("SKILLFUSE_RRF_K", "10.5"),
            ("SKILLFUSE_KEYWORD_WEIGHT", "0.7"),
            ("SKILLFUSE_SEMANTIC_WEIGHT", "0.3"),
        ],
        Config::from_env,
    )
    .expect("should parse overrides");

    assert_eq!(config.storage_path, PathBuf::from("/tmp/skills"));
    assert_eq!(config.l1_max_entries, 50);
    assert!(!config.l2_enabled);
    assert!(!config.promotion_enabled);
    assert_eq!(config.ttl_rare_secs, 30);
    assert_eq!(config.rrf_k, 10.5);
    assert_eq!(config.keyword_weight, 0.7);
    assert_eq!(config.semantic_weight, 0.3);
}

#[test]
#[serial]
fn test_from_env_empty_storage_path_uses_default() {
    clear_skillfuse_env();

    let config = with_env_vars(&[("SKILLFUSE_STORAGE_PATH", "   ")], Config::from_env)
        .expect("should parse");
    assert_eq!(config.storage_path, PathBuf::from("./.data"));
}

#[test]
#[serial]
fn test_from_env_rejects_bad_number() {
    clear_skillfuse_env();

    let result = with_env_vars(&[("SKILLFUSE_L1_MAX_ENTRIES", "lots")], Config::from_env);
    match result {
        Err(ConfigError::InvalidNumber { name, value, .. }) => {
            assert_eq!(name, "SKILLFUSE_L1_MAX_ENTRIES");
            assert_eq!(value, "lots");
        }
        other => panic!("expected InvalidNumber, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_from_env_rejects_bad_bool() {
    clear_skillfuse_env();

    let result = with_env_vars(&[("SKILLFUSE_L2_ENABLED", "maybe")], Config::from_env);
    assert!(matches!(result, Err(ConfigError::InvalidBool { .. })));
}

#[test]
fn test_validate_rejects_negative_weight() {
    let config = Config {
        keyword_weight: -0.1,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OutOfRange {
            name: "SKILLFUSE_KEYWORD_WEIGHT",
            ..
        })
    ));
}

#[test]
fn test_validate_rejects_zero_weight_bounds_and_nan() {
    let zero_weight = Config {
        semantic_weight: 0.0,
        ..Default::default()
    };
    assert!(zero_weight.validate().is_ok());

    let nan_fraction = Config {
        refresh_fraction: f64::NAN,
        ..Default::default()
    };
    assert!(nan_fraction.validate().is_err());

    let zero_entries = Config {
        l1_max_entries: 0,
        ..Default::default()
    };
    assert!(zero_entries.validate().is_err());
}

#[test]
fn test_validate_storage_path_must_be_dir() {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let config = Config {
        storage_path: file.path().to_path_buf(),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::NotADirectory { .. })
    ));
}

#[test]
fn test_tiered_config_projection() {
    let config = Config {
        l1_max_entries: 7,
        promotion_enabled: false,
        ttl_standard_secs: 42,
        popular_hit_threshold: 2,
        ..Default::default()
    };
    let tiered = config.tiered_config();

    assert_eq!(tiered.l1_max_entries, 7);
    assert!(tiered.l2_enabled);
    assert!(!tiered.promotion_enabled);
    assert_eq!(tiered.policy.standard_ttl.as_secs(), 42);
    assert_eq!(tiered.policy.popular_hit_threshold, 2);
}

#[test]
fn test_search_config_projection() {
    let config = Config {
        rrf_k: 20.0,
        keyword_weight: 1.0,
        semantic_weight: 0.0,
        candidate_multiplier: 5,
        ..Default::default()
    };
    let search = config.search_config();

    assert_eq!(search.rrf_k, 20.0);
    assert_eq!(search.keyword_weight, 1.0);
    assert_eq!(search.semantic_weight, 0.0);
    assert_eq!(search.candidate_multiplier, 5);
}
