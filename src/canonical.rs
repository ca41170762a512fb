//! Deterministic byte serialization ("canonical JSON") and the SHA-256
//! hash helpers built on top of it.
//!
//! `serde_json::Value` objects are backed by a `BTreeMap` in this crate's
//! configuration (the `preserve_order` feature is never enabled), so object
//! keys already come out lexicographically sorted; this module is
//! responsible for the remaining guarantees: stable number formatting,
//! `null` preservation, array order preservation, and cycle rejection.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

/// Recursion depth beyond which a value is treated as cyclic/pathological.
/// `serde_json::Value` cannot structurally contain a reference cycle, so
/// this also serves as a guard against unreasonably deep nesting from an
/// untrusted source.
const MAX_DEPTH: usize = 256;

/// Serialize any `Serialize` value into canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    let v = serde_json::to_value(value)?;
    canonicalize_value(&v)
}

/// Serialize any `Serialize` value into a canonical JSON string.
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String, LedgerError> {
    let bytes = to_canonical_bytes(value)?;
    Ok(String::from_utf8(bytes).expect("canonical encoder only emits valid UTF-8"))
}

/// SHA-256 of the canonical encoding, lowercase hex.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<String, LedgerError> {
    let bytes = to_canonical_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Canonicalize an already-constructed `serde_json::Value`, rejecting
/// excessive nesting depth as a stand-in for cycle detection.
pub fn canonicalize_value(value: &serde_json::Value) -> Result<Vec<u8>, LedgerError> {
    let mut out = Vec::new();
    write_value(value, 0, &mut out)?;
    Ok(out)
}

fn write_value(value: &serde_json::Value, depth: usize, out: &mut Vec<u8>) -> Result<(), LedgerError> {
    if depth > MAX_DEPTH {
        return Err(LedgerError::Cycle);
    }
    match value {
        serde_json::Value::Null => out.extend_from_slice(b"null"),
        serde_json::Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        serde_json::Value::Number(n) => out.extend_from_slice(canonical_number(n).as_bytes()),
        serde_json::Value::String(s) => write_json_string(s, out),
        serde_json::Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, depth + 1, out)?;
            }
            out.push(b']');
        }
        serde_json::Value::Object(map) => {
            out.push(b'{');
            // `map` iterates in sorted key order because the `preserve_order`
            // feature is not enabled on `serde_json` for this crate.
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_string(k, out);
                out.push(b':');
                write_value(v, depth + 1, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn canonical_number(n: &serde_json::Number) -> String {
    // serde_json's own Display already produces the shortest round-trip
    // representation for both integers and floats.
    n.to_string()
}

fn write_json_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

/// Fields stripped before computing the stable "public" state hash used for
/// external attestation: anything that is transient or itself a computed
/// hash would make the hash depend on when/whether it was last recomputed.
const TRANSIENT_FIELDS: &[&str] = &["updated_at", "signatures", "public_state_hash", "tamper_state_hash"];

/// `publicCanonical`: canonicalize a value with transient fields stripped
/// at every object level, for a stable externally-attestable hash.
pub fn public_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    let mut v = serde_json::to_value(value)?;
    strip_transient(&mut v);
    canonicalize_value(&v)
}

pub fn public_state_hash<T: Serialize>(value: &T) -> Result<String, LedgerError> {
    let bytes = public_canonical_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

fn strip_transient(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for field in TRANSIENT_FIELDS {
                map.remove(*field);
            }
            for v in map.values_mut() {
                strip_transient(v);
            }
        }
        serde_json::Value::Array(items) => {
            for v in items.iter_mut() {
                strip_transient(v);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_and_is_stable() {
        let a = json!({"b": 1, "a": 2, "c": {"z": 1, "y": 2}});
        let b = json!({"c": {"y": 2, "z": 1}, "a": 2, "b": 1});
        assert_eq!(canonicalize_value(&a).unwrap(), canonicalize_value(&b).unwrap());
    }

    #[test]
    fn preserves_null_and_array_order() {
        let v = json!({"a": null, "b": [3, 1, 2]});
        let bytes = canonicalize_value(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert_eq!(s, r#"{"a":null,"b":[3,1,2]}"#);
    }

    #[test]
    fn hash_is_deterministic() {
        let v = json!({"x": 1});
        assert_eq!(hash_canonical(&v).unwrap(), hash_canonical(&v).unwrap());
    }

    #[test]
    fn public_canonical_strips_transient_fields() {
        let v = json!({"updated_at": "2026-01-01", "state": "DRAFT", "nested": {"signatures": ["x"], "keep": 1}});
        let bytes = public_canonical_bytes(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(!s.contains("updated_at"));
        assert!(!s.contains("signatures"));
        assert!(s.contains("keep"));
    }

    #[test]
    fn rejects_excessive_depth() {
        let mut v = json!(1);
        for _ in 0..(MAX_DEPTH + 10) {
            v = json!([v]);
        }
        assert!(matches!(canonicalize_value(&v), Err(LedgerError::Cycle)));
    }
}
