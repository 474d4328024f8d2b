//! Hashing - SHA-256 for Reports and Artifacts
//!
//! Deterministic digests so a run report can be checked against the files it lists.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Stream a file through SHA-256.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Raw digest bytes, used to seed deterministic generation.
pub fn digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// report_hash = sha256(canonical report JSON without the `report_hash` field)
pub fn compute_report_hash<T: Serialize>(report: &T) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(report)?;
    if let Value::Object(map) = &mut value {
        map.remove("report_hash");
    }
    Ok(sha256_hex(canonical_json(&value)?.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": {"y": 2, "b": 3}, "m": [{"k": 1, "c": 2}]});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":{"b":3,"y":2},"m":[{"c":2,"k":1}],"z":1}"#);
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_file_hash_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(file_sha256(&path).unwrap(), sha256_hex(b"abc"));
    }

    #[test]
    fn test_report_hash_ignores_own_field() {
        let a = json!({"campaign": "x", "report_hash": ""});
        let b = json!({"report_hash": "deadbeef", "campaign": "x"});
        assert_eq!(compute_report_hash(&a).unwrap(), compute_report_hash(&b).unwrap());
        let c = json!({"campaign": "y", "report_hash": ""});
        assert_ne!(compute_report_hash(&a).unwrap(), compute_report_hash(&c).unwrap());
    }
}
