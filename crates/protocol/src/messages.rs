use serde::{Deserialize, Serialize};

use crate::types::{FileMetadata, is_zero_i64};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Uploads a whole file in one unary message.
///
/// The `data` field is base64-encoded in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    pub metadata: FileMetadata,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Opens a streamed upload. Metadata only; chunk data follows as binary
/// frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStreamOpenRequest {
    pub metadata: FileMetadata,
}

/// Vault's answer to [`UploadStreamOpenRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStreamOpened {
    pub upload_id: String,
}

/// Closes a streamed upload after every chunk has been acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStreamCloseRequest {
    pub upload_id: String,
}

/// Requests a download, a deletion, or a size probe for a named file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRequest {
    pub file_name: String,
}

/// Subscribes to (or unsubscribes from) the file-event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub subscriber_id: i64,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Generic acknowledgment carrying an explicit success indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub successful: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Whole-payload download response for files below the unary ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub metadata: FileMetadata,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Answer to a size probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSizeResponse {
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub file_size: i64,
}

/// One entry of the `list_files` snapshot stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoResponse {
    pub metadata: FileMetadata,
}

// ---------------------------------------------------------------------------
// Push event payloads
// ---------------------------------------------------------------------------

/// Payload of a `file_added` push event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAddedEvent {
    pub metadata: FileMetadata,
}

/// Payload of a `file_removed` push event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRemovedEvent {
    pub file_name: String,
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
