//! Canonical JSON encoding for signed payloads.
//!
//! Every signature and every block digest in the protocol is computed over
//! the output of this module. Equal value graphs MUST produce byte-identical
//! output, independent of struct field order, platform, or runtime state:
//!
//! - object keys are sorted lexicographically at every nesting level,
//! - array element order is preserved,
//! - strings and numbers are formatted exactly as `serde_json` formats them,
//! - no whitespace between tokens, `null` for absent optionals.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("value is not representable as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Canonical JSON encoding of any serde-serializable value.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let v = serde_json::to_value(value)?;
    Ok(canonical_json_value(&v))
}

/// Canonical encoding of an already-parsed JSON value.
pub fn canonical_json_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        // serde_json's own formatting fixes the numeric and escaping rules.
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            out.push_str(&serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()))
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_string()));
                out.push(':');
                write_value(&map[key], out);
            }
            out.push('}');
        }
    }
}

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_recursively() {
        let v = json!({
            "zebra": 1,
            "alpha": {"inner_z": true, "inner_a": null},
            "list": [{"b": 2, "a": 1}]
        });
        assert_eq!(
            canonical_json_value(&v),
            r#"{"alpha":{"inner_a":null,"inner_z":true},"list":[{"a":1,"b":2}],"zebra":1}"#
        );
    }

    #[test]
    fn preserves_array_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonical_json_value(&v), "[3,1,2]");
    }

    #[test]
    fn equal_values_encode_identically() {
        // Same value graph built in two different key orders.
        let a: serde_json::Value =
            serde_json::from_str(r#"{"x": 1, "y": {"k": "v", "j": 2}}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"y": {"j": 2, "k": "v"}, "x": 1}"#).unwrap();
        assert_eq!(canonical_json_value(&a), canonical_json_value(&b));
    }

    #[test]
    fn escapes_strings_like_serde_json() {
        let v = json!({"s": "line\nbreak \"quoted\""});
        assert_eq!(
            canonical_json_value(&v),
            r#"{"s":"line\nbreak \"quoted\""}"#
        );
    }

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
