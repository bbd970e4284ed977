//! Content written by producers.

use crate::error::CodecResult;
use crate::format::RecordFormat;
use crate::Record;

/// Content of a path-addressed file: either a structured record, serialized
/// with the configured format, or raw text written verbatim.
///
/// Raw text is used for repository bookkeeping files such as `.gitignore`.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    /// A structured record.
    Record(Record),
    /// Raw text.
    Text(String),
}

impl FileContent {
    /// Serializes the content.
    pub fn to_bytes(&self, format: RecordFormat) -> CodecResult<Vec<u8>> {
        match self {
            FileContent::Record(record) => format.encode(record),
            FileContent::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }
}

impl From<Record> for FileContent {
    fn from(record: Record) -> Self {
        FileContent::Record(record)
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        FileContent::Text(text.to_string())
    }
}

impl From<String> for FileContent {
    fn from(text: String) -> Self {
        FileContent::Text(text)
    }
}
