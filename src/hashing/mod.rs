//! Cache-key derivation and validation.
//!
//! Keys are `search:<blake3 hex>` over the normalized query text and a canonical (sorted-key)
//! JSON rendering of the filters, so logically equal requests always land on the same key.
//! `serde_json` renders non-finite floats as `null`, so a `null` anywhere in the filters is
//! rejected instead of hashed.

use blake3::Hasher;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::constants::{MAX_CACHE_KEY_LEN, SEARCH_KEY_PREFIX};

/// Reasons a cache key is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The key is empty.
    #[error("cache key is empty")]
    Empty,

    /// The key exceeds [`MAX_CACHE_KEY_LEN`].
    #[error("cache key is {len} bytes, max is {max}")]
    TooLong { len: usize, max: usize },

    /// The key contains a character outside `[A-Za-z0-9:_.-]`.
    #[error("cache key contains invalid character {ch:?} at byte {index}")]
    InvalidCharacter { ch: char, index: usize },

    /// Filters could not be rendered to JSON.
    #[error("failed to serialize filters: {reason}")]
    Serialize { reason: String },
}

/// Lowercases, trims and collapses internal whitespace.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// BLAKE3 of the normalized query; used to memoize query embeddings.
#[inline]
pub fn hash_query(query: &str) -> [u8; 32] {
    *blake3::hash(normalize_query(query).as_bytes()).as_bytes()
}

/// Renders `value` as JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Derives the cache key for a search query plus its filters.
pub fn derive_cache_key<F: Serialize>(query: &str, filters: &F) -> Result<String, KeyError> {
    let filters = serde_json::to_value(filters).map_err(|e| KeyError::Serialize {
        reason: e.to_string(),
    })?;
    if let Some(path) = find_null(&filters, "$") {
        return Err(KeyError::Serialize {
            reason: format!("{path} is null or a non-finite number"),
        });
    }

    let mut hasher = Hasher::new();
    hasher.update(normalize_query(query).as_bytes());
    hasher.update(b"|");
    hasher.update(canonical_json(&filters).as_bytes());

    Ok(format!("{}:{}", SEARCH_KEY_PREFIX, hasher.finalize().to_hex()))
}

fn find_null(value: &Value, path: &str) -> Option<String> {
    match value {
        Value::Null => Some(path.to_string()),
        Value::Object(map) => map
            .iter()
            .find_map(|(key, member)| find_null(member, &format!("{path}.{key}"))),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| find_null(item, &format!("{path}[{i}]"))),
        _ => None,
    }
}

/// Rejects keys that are empty, too long, or contain characters outside `[A-Za-z0-9:_.-]`.
pub fn validate_cache_key(key: &str) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.len() > MAX_CACHE_KEY_LEN {
        return Err(KeyError::TooLong {
            len: key.len(),
            max: MAX_CACHE_KEY_LEN,
        });
    }
    if let Some((index, ch)) = key
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-' | '.')))
    {
        return Err(KeyError::InvalidCharacter { ch, index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_normalize_query_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  Docker   Compose\tTool "), "docker compose tool");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn test_hash_query_ignores_formatting() {
        assert_eq!(hash_query("Docker  helper"), hash_query("docker helper"));
        assert_ne!(hash_query("docker helper"), hash_query("docker helpers"));
    }

    #[test]
    fn test_canonical_json_sorts_keys_recursively() {
        let a = json!({"b": 1, "a": {"y": [1, {"d": 2, "c": 3}], "x": "s"}});
        let b = json!({"a": {"x": "s", "y": [1, {"c": 3, "d": 2}]}, "b": 1});

        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(
            canonical_json(&a),
            r#"{"a":{"x":"s","y":[1,{"c":3,"d":2}]},"b":1}"#
        );
    }

    #[test]
    fn test_derive_cache_key_rejects_nulls_and_non_finite() {
        let err = derive_cache_key("docker", &json!({"source": null})).unwrap_err();
        assert!(matches!(err, KeyError::Serialize { reason } if reason.contains("$.source")));

        let mut nan = BTreeMap::new();
        nan.insert("minQuality", f64::NAN);
        assert!(matches!(
            derive_cache_key("docker", &nan),
            Err(KeyError::Serialize { .. })
        ));

        let mut inf = BTreeMap::new();
        inf.insert("minQuality", vec![0.5, f64::INFINITY]);
        let err = derive_cache_key("docker", &inf).unwrap_err();
        assert!(matches!(err, KeyError::Serialize { reason } if reason.contains("$.minQuality[1]")));
    }

    #[test]
    fn test_derive_cache_key_is_order_independent() {
        let mut first = BTreeMap::new();
        first.insert("category", "devops");
        first.insert("source", "github");

        let second = json!({"source": "github", "category": "devops"});

        let k1 = derive_cache_key("docker", &first).unwrap();
        let k2 = derive_cache_key("  DOCKER ", &second).unwrap();
        assert_eq!(k1, k2);
        assert!(k1.starts_with("search:"));
        assert!(validate_cache_key(&k1).is_ok());
    }

    #[test]
    fn test_derive_cache_key_distinguishes_filters() {
        let k1 = derive_cache_key("docker", &json!({"source": "a"})).unwrap();
        let k2 = derive_cache_key("docker", &json!({"source": "b"})).unwrap();
        let k3 = derive_cache_key("docker", &json!({})).unwrap();
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_validate_cache_key_rejects_malformed() {
        assert_eq!(validate_cache_key(""), Err(KeyError::Empty));
        assert!(matches!(
            validate_cache_key(&"a".repeat(MAX_CACHE_KEY_LEN + 1)),
            Err(KeyError::TooLong { .. })
        ));
        assert!(matches!(
            validate_cache_key("../etc/passwd"),
            Err(KeyError::InvalidCharacter { ch: '/', .. })
        ));
        assert!(matches!(
            validate_cache_key("search:abc' OR 1=1"),
            Err(KeyError::InvalidCharacter { ch: '\'', .. })
        ));
        assert!(validate_cache_key("search:0123abcdef").is_ok());
        assert!(validate_cache_key("a.b-c_d:e").is_ok());
    }
}
