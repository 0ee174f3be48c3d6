//! Canonical JSON serialization helpers.
//!
//! Model and metrics artifacts are written with recursively sorted object
//! keys and stable two-space formatting, so the same fitted model always
//! produces the same bytes and the same BLAKE3 digest.

use serde::{ser::Error as SerdeSerError, Serialize};
use serde_json::{self, ser::PrettyFormatter, Serializer};
use std::io::Write;

/// Serialize a value into canonical JSON and write it to the provided writer.
pub fn write_canonical_json<T, W>(mut writer: W, value: &T) -> Result<(), serde_json::Error>
where
    T: Serialize,
    W: Write,
{
    // `serde_json::Map` is a BTreeMap unless `preserve_order` is enabled, so
    // going through `Value` sorts every object's keys
    let canonical_value = serde_json::to_value(value)?;
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    canonical_value.serialize(&mut serializer)?;
    Ok(())
}

/// Serialize a value into canonical JSON and return it as a String.
pub fn canonical_json_string<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: Serialize,
{
    let mut buffer = Vec::new();
    write_canonical_json(&mut buffer, value)?;
    String::from_utf8(buffer).map_err(|err| SerdeSerError::custom(err.to_string()))
}

/// BLAKE3 digest of `bytes` as lowercase hex
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// BLAKE3 digest of the canonical JSON form of `value`
pub fn canonical_digest_hex<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: Serialize,
{
    Ok(digest_hex(canonical_json_string(value)?.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let value = json!({"b": 1, "a": {"d": 2, "c": [ {"z": 1, "y": 2} ]}});
        let out = canonical_json_string(&value).unwrap();
        let a = out.find("\"a\"").unwrap();
        let b = out.find("\"b\"").unwrap();
        let c = out.find("\"c\"").unwrap();
        let d = out.find("\"d\"").unwrap();
        let y = out.find("\"y\"").unwrap();
        let z = out.find("\"z\"").unwrap();
        assert!(a < b && c < d && y < z);
    }

    #[test]
    fn struct_fields_are_written_in_key_order() {
        #[derive(Serialize)]
        struct Record {
            zeta: u8,
            alpha: Inner,
        }

        #[derive(Serialize)]
        struct Inner {
            second: u8,
            first: u8,
        }

        let out = canonical_json_string(&Record {
            zeta: 1,
            alpha: Inner { second: 2, first: 3 },
        })
        .unwrap();
        assert_eq!(
            out,
            "{\n  \"alpha\": {\n    \"first\": 3,\n    \"second\": 2\n  },\n  \"zeta\": 1\n}"
        );
    }

    #[test]
    fn digest_is_stable_for_equal_values() {
        let v1 = json!({"x": 1.5, "y": [1, 2, 3]});
        let v2 = json!({"y": [1, 2, 3], "x": 1.5});
        assert_eq!(
            canonical_digest_hex(&v1).unwrap(),
            canonical_digest_hex(&v2).unwrap()
        );
        assert_eq!(canonical_digest_hex(&v1).unwrap().len(), 64);
    }
}
