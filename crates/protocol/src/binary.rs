//! Binary chunk frames: 4-byte big-endian header length + JSON header + raw
//! chunk bytes.
//!
//! Upload chunks travel client-to-vault with `upload_id` set; download
//! chunks travel vault-to-client with `upload_id` empty. Either direction
//! correlates by `id`.

use serde::{Deserialize, Serialize};

/// JSON header preceding the raw bytes of a chunk frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHeader {
    /// Correlation id: the request id of a streamed download, or a fresh id
    /// for each uploaded chunk.
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub upload_id: String,
    /// Byte offset of this chunk within the file.
    pub offset: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
}

/// Errors from parsing a binary frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short for header length prefix")]
    TooShort,

    #[error("header truncated: expected {expected} bytes, got {got}")]
    HeaderTruncated { expected: usize, got: usize },

    #[error("invalid header JSON: {0}")]
    InvalidJson(String),
}

/// Encodes a chunk frame for sending over the wire.
pub fn encode_chunk_frame(header: &ChunkHeader, payload: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let header_json = serde_json::to_vec(header)?;
    let header_len = header_json.len() as u32;

    let mut buf = Vec::with_capacity(4 + header_json.len() + payload.len());
    buf.extend_from_slice(&header_len.to_be_bytes());
    buf.extend_from_slice(&header_json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Parses a raw binary frame into its header and payload bytes.
pub fn parse_chunk_frame(data: &[u8]) -> Result<(ChunkHeader, Vec<u8>), FrameError> {
    if data.len() < 4 {
        return Err(FrameError::TooShort);
    }

    let header_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if data.len() < 4 + header_len {
        return Err(FrameError::HeaderTruncated {
            expected: header_len,
            got: data.len() - 4,
        });
    }

    let header: ChunkHeader = serde_json::from_slice(&data[4..4 + header_len])
        .map_err(|e| FrameError::InvalidJson(e.to_string()))?;
    let payload = data[4 + header_len..].to_vec();

    Ok((header, payload))
}
