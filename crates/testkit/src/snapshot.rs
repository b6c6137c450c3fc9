//! Deterministic snapshot utilities.
//!
//! Snapshots are serialized as canonical pretty JSON with object keys sorted,
//! so two states compare equal exactly when their JSON text does. The blake3
//! digest of that text is a compact fingerprint for before/after checks.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Canonical pretty JSON for `value`.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value).context("Failed to serialize snapshot value")?;
    let value = canonicalize_value(value);
    let mut s = serde_json::to_string_pretty(&value).context("Failed to format snapshot JSON")?;
    s.push('\n');
    Ok(s)
}

/// Hex blake3 digest of the canonical JSON of `value`.
pub fn state_digest<T: Serialize>(value: &T) -> Result<String> {
    let json = canonical_json(value)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// Fail unless `before` and `after` have identical canonical JSON.
pub fn assert_unchanged<T: Serialize>(before: &T, after: &T) -> Result<()> {
    let before = canonical_json(before)?;
    let after = canonical_json(after)?;
    if before != after {
        let line = before
            .lines()
            .zip(after.lines())
            .position(|(a, b)| a != b)
            .unwrap_or(0);
        anyhow::bail!("State changed (first difference at line {})", line + 1);
    }
    Ok(())
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k, canonicalize_value(v));
            }
            Value::Object(out)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize_value).collect()),
        other => other,
    }
}
