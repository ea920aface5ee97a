//! Codec Module
//!
//! Transparent compression of oversized payloads. Values are serialized to
//! JSON, deflated and base64-encoded so the stored form stays plain text.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::cache::Payload;
use crate::error::{CodecError, Result};

// == Compress ==
/// Deflates and base64-encodes a serialized value.
pub fn compress(serialized: &str) -> std::result::Result<String, CodecError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(serialized.as_bytes())?;
    let bytes = encoder.finish()?;
    Ok(BASE64.encode(bytes))
}

// == Decompress ==
/// Inverse of [`compress`].
pub fn decompress(data: &str) -> std::result::Result<String, CodecError> {
    let bytes = BASE64.decode(data)?;
    let mut decoder = DeflateDecoder::new(bytes.as_slice());
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(String::from_utf8(out)?)
}

// == Encode ==
/// Serializes `value` and picks its stored form.
///
/// Returns the payload together with the serialized length. Values whose
/// JSON is longer than `threshold` bytes are compressed; if compression
/// fails the value is kept raw.
pub fn encode_payload<T: Serialize>(value: T, threshold: usize) -> Result<(Payload<T>, usize)> {
    let serialized = serde_json::to_string(&value)?;
    let len = serialized.len();

    if len <= threshold {
        return Ok((Payload::Raw(value), len));
    }

    match compress(&serialized) {
        Ok(compressed) => Ok((Payload::Compressed(compressed), len)),
        Err(e) => {
            warn!("Compression failed, storing uncompressed: {}", e);
            Ok((Payload::Raw(value), len))
        }
    }
}

// == Decode ==
/// Recovers the value from a stored payload.
///
/// A compressed payload that cannot be decoded is read back as the raw
/// stored string when `T` accepts one. Returns None when the payload is
/// unusable.
pub fn decode_payload<T: Clone + DeserializeOwned>(payload: &Payload<T>) -> Option<T> {
    match payload {
        Payload::Raw(value) => Some(value.clone()),
        Payload::Compressed(data) => {
            let decoded = decompress(data)
                .map_err(|e| e.to_string())
                .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()));
            match decoded {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Decompression failed, falling back to stored string: {}", e);
                    serde_json::from_value(serde_json::Value::String(data.clone())).ok()
                }
            }
        }
    }
}

/// Length of the payload's serialized form, used for size statistics.
pub fn stored_len<T: Serialize>(payload: &Payload<T>) -> usize {
    match payload {
        Payload::Raw(value) => serde_json::to_string(value).map(|s| s.len()).unwrap_or(0),
        Payload::Compressed(data) => data.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Report {
        id: u32,
        lines: Vec<String>,
    }

    fn big_report() -> Report {
        Report {
            id: 7,
            lines: (0..500).map(|i| format!("line number {i}")).collect(),
        }
    }

    #[test]
    fn test_compress_decompress() {
        let text = "hello ".repeat(1000);
        let compressed = compress(&text).unwrap();

        assert!(compressed.len() < text.len());
        assert_eq!(decompress(&compressed).unwrap(), text);
    }

    #[test]
    fn test_compress_handles_non_ascii() {
        let text = "ünïcødé 🚀 ".repeat(50);
        assert_eq!(decompress(&compress(&text).unwrap()).unwrap(), text);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(matches!(decompress("not base64!"), Err(CodecError::Base64(_))));
        // Valid base64, not a deflate stream
        assert!(decompress(&BASE64.encode([0xffu8, 0xff, 0xff])).is_err());
    }

    #[test]
    fn test_encode_small_value_stays_raw() {
        let (payload, len) = encode_payload("small".to_string(), 100).unwrap();

        assert_eq!(payload, Payload::Raw("small".to_string()));
        assert_eq!(len, 7);
    }

    #[test]
    fn test_encode_large_value_is_compressed() {
        let report = big_report();
        let (payload, len) = encode_payload(report.clone(), 1_000).unwrap();

        assert!(matches!(payload, Payload::Compressed(_)));
        assert!(len > 1_000);
        assert_eq!(decode_payload(&payload), Some(report));
    }

    #[test]
    fn test_encode_threshold_is_exclusive() {
        // "abc" serializes to 5 bytes including quotes
        let (payload, _) = encode_payload("abc".to_string(), 5).unwrap();
        assert!(matches!(payload, Payload::Raw(_)));

        let (payload, _) = encode_payload("abc".to_string(), 4).unwrap();
        assert!(matches!(payload, Payload::Compressed(_)));
    }

    #[test]
    fn test_encode_reports_serialization_failure() {
        // Maps with non-string keys cannot become JSON objects
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1u8);

        assert!(encode_payload(map, 10).is_err());
    }

    #[test]
    fn test_decode_corrupt_payload_falls_back_to_string() {
        let payload: Payload<String> = Payload::Compressed("%%corrupt%%".to_string());
        assert_eq!(decode_payload(&payload), Some("%%corrupt%%".to_string()));
    }

    #[test]
    fn test_decode_corrupt_payload_of_non_string_type() {
        let payload: Payload<Report> = Payload::Compressed("%%corrupt%%".to_string());
        assert_eq!(decode_payload(&payload), None);
    }

    #[test]
    fn test_stored_len() {
        assert_eq!(stored_len(&Payload::Raw(1234u32)), 4);
        assert_eq!(stored_len::<u32>(&Payload::Compressed("abcd".to_string())), 4);
    }
}
