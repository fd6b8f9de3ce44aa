//! Canonical JSON encoding and the dataset checksum.
//!
//! The canonical form sorts object keys at every depth, separates items
//! with `", "` and keys from values with `": "`, and escapes every
//! non-ASCII character as `\uXXXX`. Numbers keep the representation they
//! were parsed with, so `80` and `80.0` hash differently.

use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Key holding the digest inside a dataset document.
pub const CHECKSUM_KEY: &str = "checksum";

/// Formatter producing the canonical separators and ASCII-only strings.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.bytes().all(|b| b.is_ascii() && b != 0x7f) {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() && ch != '\u{7f}' {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Rebuilds `value` with object keys inserted in sorted order.
///
/// Without serde_json's `preserve_order` feature the map is already
/// ordered; rebuilding keeps the encoding stable if it is ever enabled.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                if let Some(inner) = map.get(key) {
                    out.insert(key.clone(), sorted(inner));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Encodes `value` in the canonical form.
pub fn to_canonical_string(value: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, CanonicalFormatter);
    sorted(value).serialize(&mut serializer)?;
    // The formatter only ever emits ASCII.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// SHA-256 (lowercase hex) of the canonical form of `document` with the
/// checksum key removed.
pub fn compute_checksum(document: &Value) -> Result<String, serde_json::Error> {
    let stripped = match document {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove(CHECKSUM_KEY);
            Value::Object(map)
        }
        other => other.clone(),
    };
    let canonical = to_canonical_string(&stripped)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Checks the stored checksum of a parsed document against its content.
///
/// A missing or non-string checksum never verifies.
pub fn verify_checksum(document: &Value) -> Result<bool, serde_json::Error> {
    let expected = match document.get(CHECKSUM_KEY).and_then(Value::as_str) {
        Some(expected) => expected,
        None => return Ok(false),
    };
    Ok(compute_checksum(document)? == expected)
}
