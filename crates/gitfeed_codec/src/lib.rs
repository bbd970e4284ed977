//! # gitfeed Codec
//!
//! Structured record encoding for gitfeed.
//!
//! Producers serialize records into path-addressed files and consumers parse
//! them back out of the versioned store. This crate owns that byte format:
//!
//! - [`Record`] is the structured payload handed to record categories
//! - [`RecordFormat`] selects the on-disk serialization (JSON by default)
//! - [`FileContent`] is what a producer writes: a record or raw text
//!
//! Decoding has two flavours. [`RecordFormat::decode`] is strict and reports
//! why a file could not be parsed; [`RecordFormat::decode_lenient`] never
//! fails and yields an empty record instead, which is what change
//! classification uses.
//!
//! ## Usage
//!
//! ```
//! use gitfeed_codec::{Record, RecordFormat};
//! use serde_json::json;
//!
//! let mut record = Record::new();
//! record.insert("id".into(), json!(1));
//! record.insert("val".into(), json!("Party"));
//!
//! let bytes = RecordFormat::Json.encode(&record).unwrap();
//! assert_eq!(RecordFormat::Json.decode(&bytes).unwrap(), record);
//! assert!(RecordFormat::Json.decode_lenient(b"{not json").is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod content;
mod error;
mod format;

pub use content::FileContent;
pub use error::{CodecError, CodecResult};
pub use format::RecordFormat;

/// A structured record: a string-keyed map of JSON-compatible values.
///
/// Key order is preserved as written, so re-encoding a decoded record is
/// byte-stable for the JSON format.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Builds a [`Record`] from a JSON object value.
///
/// Returns `None` if `value` is not an object.
pub fn record_from_value(value: serde_json::Value) -> Option<Record> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}
