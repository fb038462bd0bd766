//! Hashing System - SHA-256 for Manifests
//!
//! Provides deterministic, reproducible hashes tying outputs back to inputs.

use sha2::{Sha256, Digest};
use serde::Serialize;
use serde_json::{Value, to_string};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::enumerate::ColorTuple;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => {
            Value::Array(arr.iter().map(sort_value).collect())
        }
        _ => v.clone()
    }
}

/// Content hash of a color tuple (the manifest's `variant_key`)
/// variant_key = sha256(canonical_json(["#RRGGBB", ...]))
pub fn compute_variant_key(tuple: &ColorTuple) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(tuple)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// SHA-256 of a file's bytes, streamed. Empty string if the file is absent.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash of a JSON config normalized to canonical form, so whitespace and key
/// order don't matter. Falls back to raw bytes when the file isn't JSON.
/// Empty string if the file is absent.
pub fn config_hash(path: &Path) -> io::Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    let bytes = std::fs::read(path)?;
    let canonical = serde_json::from_slice::<Value>(&bytes)
        .and_then(|v| canonical_json(&v));
    Ok(match canonical {
        Ok(c) => sha256_hex(c.as_bytes()),
        Err(_) => sha256_hex(&bytes),
    })
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
