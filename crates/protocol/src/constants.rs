use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest payload the vault accepts in a single unary message (4 MiB).
///
/// Files at or above this size must go through the streamed upload/download
/// paths; below it the whole payload travels in one request.
pub const UNARY_MESSAGE_CEILING: i64 = 4 * 1024 * 1024;

/// Size of one streamed chunk (2 MiB). The final chunk of a file may be
/// shorter.
pub const CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Maximum WebSocket message size in bytes (50 MiB).
pub const WS_MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

/// Timeout for request/response operations (text messages).
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for an individual chunk acknowledgment.
///
/// Chunk writes on the vault side may be slowed by disk I/O, so this is
/// deliberately looser than [`WS_REQUEST_TIMEOUT`].
pub const WS_CHUNK_ACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Deadline for a whole streamed upload call.
pub const UPLOAD_STREAM_DEADLINE: Duration = Duration::from_secs(30);

/// How often to send keepalive pings.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Read deadline: if *nothing* arrives within this window (no pong, no
/// response, no push event) the connection is considered dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// Fixed backoff before the event subscription is reopened after a stream
/// error or end-of-stream.
pub const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// WebSocket message type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Requests from client to vault
    #[serde(rename = "upload_file")]
    UploadFile,
    #[serde(rename = "upload_stream_open")]
    UploadStreamOpen,
    #[serde(rename = "upload_stream_close")]
    UploadStreamClose,
    #[serde(rename = "download_file")]
    DownloadFile,
    #[serde(rename = "download_uncapped_file")]
    DownloadUncappedFile,
    #[serde(rename = "delete_file")]
    DeleteFile,
    #[serde(rename = "file_size")]
    FileSize,
    #[serde(rename = "list_files")]
    ListFiles,
    #[serde(rename = "subscribe_file_events")]
    SubscribeFileEvents,
    #[serde(rename = "unsubscribe_file_events")]
    UnsubscribeFileEvents,
    #[serde(rename = "ping")]
    Ping,

    // Responses from vault to client
    #[serde(rename = "operation_result")]
    OperationResult,
    #[serde(rename = "upload_stream_opened")]
    UploadStreamOpened,
    #[serde(rename = "download_response")]
    DownloadResponse,
    #[serde(rename = "file_size_response")]
    FileSizeResponse,
    #[serde(rename = "file_info")]
    FileInfo,
    #[serde(rename = "stream_end")]
    StreamEnd,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error,

    // Push events on the file-event stream
    #[serde(rename = "file_added")]
    FileAdded,
    #[serde(rename = "file_removed")]
    FileRemoved,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

/// Common wire error codes.
pub const ERR_CODE_BAD_REQUEST: i32 = 400;
pub const ERR_CODE_NOT_FOUND: i32 = 404;
pub const ERR_CODE_INTERNAL: i32 = 500;
