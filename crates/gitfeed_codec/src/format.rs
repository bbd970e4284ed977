//! On-disk record formats.

use crate::error::{CodecError, CodecResult};
use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Serialization format used for record files in the store.
///
/// The format decides both the bytes written for a record and the file
/// extension of `<category>/<id>.<ext>` paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// Compact JSON objects (`.json`).
    #[default]
    Json,
    /// CBOR maps (`.cbor`).
    Cbor,
}

impl RecordFormat {
    /// File extension for this format, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            RecordFormat::Json => "json",
            RecordFormat::Cbor => "cbor",
        }
    }

    /// Encodes a record.
    pub fn encode(&self, record: &Record) -> CodecResult<Vec<u8>> {
        match self {
            RecordFormat::Json => serde_json::to_vec(record)
                .map_err(|e| CodecError::encoding_failed(e.to_string())),
            RecordFormat::Cbor => {
                let mut buf = Vec::new();
                ciborium::into_writer(record, &mut buf)
                    .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
                Ok(buf)
            }
        }
    }

    /// Decodes a record, failing if the bytes are malformed or the top-level
    /// value is not a map.
    pub fn decode(&self, bytes: &[u8]) -> CodecResult<Record> {
        let value: Value = match self {
            RecordFormat::Json => serde_json::from_slice(bytes)
                .map_err(|e| CodecError::decoding_failed(e.to_string()))?,
            RecordFormat::Cbor => ciborium::from_reader(bytes)
                .map_err(|e| CodecError::decoding_failed(e.to_string()))?,
        };

        match value {
            Value::Object(map) => Ok(map),
            other => Err(CodecError::NotARecord {
                found: value_kind(&other),
            }),
        }
    }

    /// Decodes a record, returning an empty record on any failure.
    pub fn decode_lenient(&self, bytes: &[u8]) -> Record {
        match self.decode(bytes) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(record_format = %self, error = %e, "payload did not decode; using empty record");
                Record::new()
            }
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for RecordFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(RecordFormat::Json),
            "cbor" => Ok(RecordFormat::Cbor),
            _ => Err(CodecError::UnknownFormat { name: s.into() }),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}
