use serde::{Deserialize, Serialize};

/// Metadata describing one stored file.
///
/// `uploaded_at` travels as Unix epoch seconds; the client formats it for
/// display when it builds its local records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_name: String,
    pub file_size: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub uploaded_at: i64,
}

pub(crate) fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}
