//! Session payload encoding.

use crate::error::{SessionError, SessionResult};
use crate::value::{SessionData, Value};

/// Converts a session's value map to and from the stored payload.
///
/// Decoding an empty payload yields an empty map.
pub trait SessionCodec: Send + Sync + 'static {
    /// Short name, used in logs.
    fn name(&self) -> &'static str;

    /// Encode a value map.
    fn encode(&self, data: &SessionData) -> SessionResult<Vec<u8>>;

    /// Decode a value map.
    fn decode(&self, bytes: &[u8]) -> SessionResult<SessionData>;
}

/// Compact binary encoding with `bincode`. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl SessionCodec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode(&self, data: &SessionData) -> SessionResult<Vec<u8>> {
        bincode::serde::encode_to_vec(data, bincode::config::standard())
            .map_err(|e| SessionError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> SessionResult<SessionData> {
        if bytes.is_empty() {
            return Ok(SessionData::new());
        }

        let (data, read): (SessionData, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| SessionError::Deserialization(e.to_string()))?;

        if read != bytes.len() {
            return Err(SessionError::Deserialization(format!(
                "{} trailing bytes after session payload",
                bytes.len() - read
            )));
        }

        Ok(data)
    }
}

/// Human-readable encoding with `serde_json`.
///
/// JSON has no representation for NaN or infinity, so maps holding a
/// non-finite [`Value::Float`] are rejected on encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl SessionCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, data: &SessionData) -> SessionResult<Vec<u8>> {
        for (key, value) in data {
            if let Some(f) = find_non_finite(value) {
                return Err(SessionError::Serialization(format!(
                    "value for key {key:?} holds the non-finite float {f}"
                )));
            }
        }
        serde_json::to_vec(data).map_err(|e| SessionError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> SessionResult<SessionData> {
        if bytes.is_empty() {
            return Ok(SessionData::new());
        }
        serde_json::from_slice(bytes).map_err(|e| SessionError::Deserialization(e.to_string()))
    }
}

fn find_non_finite(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) if !f.is_finite() => Some(*f),
        Value::List(items) => items.iter().find_map(find_non_finite),
        Value::Map(map) => map.values().find_map(find_non_finite),
        _ => None,
    }
}
