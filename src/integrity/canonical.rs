//! Canonical JSON encoding.
//!
//! Object keys are emitted in sorted order at every depth and no whitespace
//! is produced, so logically equal values always encode to the same bytes.

use crate::core::Result;
use serde::Serialize;
use serde_json::Value;

/// Encode `value` canonically.
pub fn to_canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_value(value, &mut out);
    out
}

/// Serialize any `Serialize` type to canonical bytes.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    Ok(to_canonical_bytes(&value))
}

/// Parse bytes as JSON and re-encode them canonically.
pub fn recanonicalize(bytes: &[u8]) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_slice(bytes)?;
    Ok(to_canonical_bytes(&value))
}

fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            // `serde_json::Map` keeps insertion order once any crate in the
            // build enables `preserve_order`, so sort here.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_value(item, out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        Value::String(s) => write_string(s, out),
        // Scalars already have a single serde_json rendering.
        scalar => out.extend_from_slice(scalar.to_string().as_bytes()),
    }
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(Value::String(s.to_owned()).to_string().as_bytes());
}
