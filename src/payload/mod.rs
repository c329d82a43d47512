//! Hardened JSON payload codec for the durable cache tier.
//!
//! Payloads read back from L2 are untrusted: before anything is deserialized into a live value,
//! the parsed tree is walked and any object key on the denylist (`__proto__`, `constructor`,
//! `prototype`, also when spelled with `\uXXXX` escapes) fails the whole decode. Nothing is
//! stripped; a poisoned payload is an error.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Object keys that may never appear in a decoded payload.
pub const DANGEROUS_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Errors raised while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Input is not valid JSON or does not match the target type.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A denylisted key was found.
    #[error("payload contains forbidden key {key:?} at {path}")]
    DangerousKey { key: String, path: String },

    /// The value could not be serialized.
    #[error("failed to encode payload: {reason}")]
    Encode { reason: String },
}

/// Serializes a payload to its JSON text form.
pub fn encode<T: Serialize>(value: &T) -> Result<String, PayloadError> {
    serde_json::to_string(value).map_err(|e| PayloadError::Encode {
        reason: e.to_string(),
    })
}

/// Parses, scans, then deserializes a payload.
pub fn decode_guarded<T: DeserializeOwned>(input: &str) -> Result<T, PayloadError> {
    let value: Value = serde_json::from_str(input)?;
    scan_dangerous_keys(&value)?;
    Ok(serde_json::from_value(value)?)
}

/// Walks every object key and array element of `value`.
pub fn scan_dangerous_keys(value: &Value) -> Result<(), PayloadError> {
    let mut path = String::from("$");
    scan(value, &mut path)
}

fn scan(value: &Value, path: &mut String) -> Result<(), PayloadError> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if is_dangerous_key(key) {
                    return Err(PayloadError::DangerousKey {
                        key: key.clone(),
                        path: path.clone(),
                    });
                }
                let len = path.len();
                path.push('.');
                path.push_str(key);
                scan(child, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{i}]"));
                scan(item, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Checks a key as written and with literal `\uXXXX` sequences decoded.
pub fn is_dangerous_key(key: &str) -> bool {
    if DANGEROUS_KEYS.contains(&key) {
        return true;
    }
    if key.contains("\\u") {
        let decoded = decode_unicode_escapes(key);
        return DANGEROUS_KEYS.contains(&decoded.as_str());
    }
    false
}

fn decode_unicode_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find("\\u") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        let decoded = after
            .get(..4)
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &after[4..];
            }
            None => {
                out.push_str("\\u");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
