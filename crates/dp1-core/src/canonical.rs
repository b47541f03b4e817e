//! Canonical JSON encoding for deterministic hashing and signing.
//!
//! This module implements the RFC 8785 (JCS) serialization rules:
//! - Object keys sorted by their UTF-16 code units
//! - Arrays keep their original order
//! - Strings use the minimal JSON escape set
//! - Numbers follow ECMAScript `Number.prototype.toString`
//! - No insignificant whitespace
//!
//! The output is UTF-8 without a byte-order mark and ends with exactly one
//! `\n`. These bytes are what gets hashed for both legacy and chain
//! signatures, so any divergence here breaks verification everywhere.

use std::cmp::Ordering;
use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::CanonicalizationError;

/// Fields that carry signatures and are never part of the signed content.
pub mod fields {
    pub const SIGNATURE: &str = "signature";
    pub const SIGNATURES: &str = "signatures";
}

/// Largest integer magnitude an IEEE-754 double represents exactly.
const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// Encode a JSON value to canonical bytes.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    let mut buf = String::new();
    encode_value_to(&mut buf, value)?;
    buf.push('\n');
    Ok(buf.into_bytes())
}

/// Encode any serializable value to canonical bytes.
///
/// Fails if the value has no JSON representation (for example a map with
/// non-string keys).
pub fn canonicalize_serializable<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Vec<u8>, CanonicalizationError> {
    let value = serde_json::to_value(value)
        .map_err(|e| CanonicalizationError::NotRepresentable(e.to_string()))?;
    canonicalize(&value)
}

/// Parse JSON bytes and re-encode them canonically.
///
/// Canonical input yields byte-identical output: the trailing newline is
/// insignificant whitespace to the parser and is emitted exactly once.
pub fn canonicalize_json(bytes: &[u8]) -> Result<Vec<u8>, CanonicalizationError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| CanonicalizationError::InvalidJson(e.to_string()))?;
    canonicalize(&value)
}

/// Return a copy of `value` with the named top-level fields removed.
///
/// Non-object values are returned unchanged.
pub fn strip_fields(value: &Value, names: &[&str]) -> Value {
    match value {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !names.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(kept)
        }
        other => other.clone(),
    }
}

/// Compare two keys by UTF-16 code units, as JCS requires.
///
/// This differs from byte order only for characters outside the BMP
/// compared against characters in U+E000..U+FFFF.
fn cmp_utf16(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Recursively encode a value.
fn encode_value_to(buf: &mut String, value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => encode_number(buf, n)?,
        Value::String(s) => encode_string(buf, s),
        Value::Array(arr) => {
            buf.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                encode_value_to(buf, item)?;
            }
            buf.push(']');
        }
        Value::Object(map) => encode_object(buf, map)?,
    }
    Ok(())
}

/// Encode an object with keys in UTF-16 order.
fn encode_object(buf: &mut String, map: &Map<String, Value>) -> Result<(), CanonicalizationError> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| cmp_utf16(a.0, b.0));

    buf.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        encode_string(buf, key);
        buf.push(':');
        encode_value_to(buf, value)?;
    }
    buf.push('}');
    Ok(())
}

/// Encode a string with the minimal escape set.
fn encode_string(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\u{08}' => buf.push_str("\\b"),
            '\u{09}' => buf.push_str("\\t"),
            '\u{0a}' => buf.push_str("\\n"),
            '\u{0c}' => buf.push_str("\\f"),
            '\u{0d}' => buf.push_str("\\r"),
            c if (c as u32) < 0x20 => {
                // Writing to a String cannot fail.
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
}

/// Encode a number.
///
/// Integers inside the exactly-representable range are written verbatim.
/// Everything else goes through the double formatting path, which is what
/// a JCS implementation on an IEEE-754 runtime would produce.
fn encode_number(buf: &mut String, n: &Number) -> Result<(), CanonicalizationError> {
    if let Some(u) = n.as_u64() {
        if u <= MAX_SAFE_INTEGER {
            let _ = write!(buf, "{}", u);
            return Ok(());
        }
    } else if let Some(i) = n.as_i64() {
        if i.unsigned_abs() <= MAX_SAFE_INTEGER {
            let _ = write!(buf, "{}", i);
            return Ok(());
        }
    }

    let f = n
        .as_f64()
        .ok_or_else(|| CanonicalizationError::NotRepresentable(n.to_string()))?;
    buf.push_str(&format_double(f)?);
    Ok(())
}

/// Format a double the way ECMAScript `Number.prototype.toString` does.
pub(crate) fn format_double(f: f64) -> Result<String, CanonicalizationError> {
    if !f.is_finite() {
        return Err(CanonicalizationError::NonFiniteNumber);
    }
    if f == 0.0 {
        // Covers -0 as well.
        return Ok("0".to_string());
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e-7".
    let sci = format!("{:e}", f.abs());
    let (mantissa, exponent) = sci
        .split_once('e')
        .ok_or_else(|| CanonicalizationError::NotRepresentable(sci.clone()))?;
    let exponent: i32 = exponent
        .parse()
        .map_err(|_| CanonicalizationError::NotRepresentable(sci.clone()))?;
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let k = digits.len() as i32;
    let n = exponent + 1;

    let mut out = String::new();
    if f < 0.0 {
        out.push('-');
    }

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        out.push_str(&digits[..n as usize]);
        out.push('.');
        out.push_str(&digits[n as usize..]);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-n) as usize));
        out.push_str(&digits);
    } else {
        out.push_str(&digits[..1]);
        if k > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if n - 1 >= 0 { '+' } else { '-' });
        let _ = write!(out, "{}", (n - 1).abs());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(value: &Value) -> String {
        String::from_utf8(canonicalize(value).unwrap()).unwrap()
    }

    #[test]
    fn test_key_order_independent() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":true,"x":null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":null,"y":true},"b":1}"#).unwrap();
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
        assert_eq!(canon(&a), "{\"a\":{\"x\":null,\"y\":true},\"b\":1}\n");
    }

    #[test]
    fn test_array_order_preserved() {
        let v = json!({"items": ["B", "A"]});
        assert_eq!(canon(&v), "{\"items\":[\"B\",\"A\"]}\n");
    }

    #[test]
    fn test_single_trailing_newline_idempotent() {
        let v = json!({"title": "x", "n": [1, 2]});
        let once = canonicalize(&v).unwrap();
        let twice = canonicalize_json(&once).unwrap();
        assert_eq!(once, twice);
        assert!(once.ends_with(b"\n"));
        assert!(!once.ends_with(b"\n\n"));
        assert!(!once.contains(&b'\r'));
    }

    #[test]
    fn test_string_escaping() {
        let v = json!("a\"b\\c\n\t\u{1}/é");
        assert_eq!(canon(&v), "\"a\\\"b\\\\c\\n\\t\\u0001/é\"\n");
    }

    #[test]
    fn test_utf16_key_ordering() {
        // U+1F600 encodes as surrogates 0xD83D.., which sort before U+FB01
        // in UTF-16 even though its UTF-8 bytes sort after.
        let mut map = Map::new();
        map.insert("\u{fb01}".to_string(), json!(1));
        map.insert("\u{1f600}".to_string(), json!(2));
        let out = canon(&Value::Object(map));
        let smiley = out.find('\u{1f600}').unwrap();
        let ligature = out.find('\u{fb01}').unwrap();
        assert!(smiley < ligature);
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_double(1e21).unwrap(), "1e+21");
        assert_eq!(format_double(1e20).unwrap(), "100000000000000000000");
        assert_eq!(format_double(0.000001).unwrap(), "0.000001");
        assert_eq!(format_double(1e-7).unwrap(), "1e-7");
        assert_eq!(format_double(123.456).unwrap(), "123.456");
        assert_eq!(format_double(-1.5).unwrap(), "-1.5");
        assert_eq!(format_double(-0.0).unwrap(), "0");
        assert_eq!(format_double(4.5e-10).unwrap(), "4.5e-10");
        assert!(format_double(f64::NAN).is_err());
    }

    #[test]
    fn test_integers_and_floats_in_values() {
        let v: Value = serde_json::from_str(r#"[0, -7, 10.0, 2.50, 9007199254740993]"#).unwrap();
        assert_eq!(canon(&v), "[0,-7,10,2.5,9007199254740992]\n");
    }

    #[test]
    fn test_strip_fields() {
        let v = json!({"id": "x", "signature": "ed25519:00", "signatures": []});
        let stripped = strip_fields(&v, &[fields::SIGNATURE, fields::SIGNATURES]);
        assert_eq!(canon(&stripped), "{\"id\":\"x\"}\n");
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(vec![1u8], 1u8);
        assert!(matches!(
            canonicalize_serializable(&map),
            Err(CanonicalizationError::NotRepresentable(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_insertion_order_irrelevant(
            entries in proptest::collection::btree_map("[a-zA-Z\u{e9}\u{fb01}]{1,6}", proptest::num::i64::ANY, 0..12)
        ) {
            let forward: Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let reverse: Map<String, Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
            let a = canonicalize(&json!({"outer": Value::Object(forward)})).unwrap();
            let b = canonicalize(&json!({"outer": Value::Object(reverse)})).unwrap();
            proptest::prop_assert_eq!(&a, &b);
            proptest::prop_assert_eq!(canonicalize_json(&a).unwrap(), a);
        }
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(matches!(
            canonicalize_json(b"{not json"),
            Err(CanonicalizationError::InvalidJson(_))
        ));
    }
}
