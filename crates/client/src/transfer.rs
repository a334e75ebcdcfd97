//! Size branching and chunking for file transfers.

use sha2::{Digest, Sha256};

use stowbox_protocol::constants::UNARY_MESSAGE_CEILING;

/// Which transfer path a payload takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRoute {
    /// Whole payload in a single unary message.
    Unary,
    /// Metadata frame followed by 2 MiB chunks on a stream.
    Streamed,
}

/// Selects the transfer path for a payload of `size` bytes.
///
/// Decided once, before any data is read: from a local size stat for
/// uploads, from the vault's size probe for downloads.
pub fn route_for_size(size: i64) -> TransferRoute {
    if size >= UNARY_MESSAGE_CEILING {
        TransferRoute::Streamed
    } else {
        TransferRoute::Unary
    }
}

/// One chunk of a streamed upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPayload {
    /// Byte offset within the file.
    pub offset: i64,
    pub data: Vec<u8>,
}

/// Number of chunks a payload of `size` bytes splits into.
pub fn chunk_count(size: usize, chunk_size: usize) -> usize {
    size.div_ceil(chunk_size)
}

/// Splits `data` into chunks of `chunk_size` bytes in ascending offset
/// order. The final chunk may be shorter.
pub fn split_into_chunks(data: &[u8], chunk_size: usize) -> Vec<ChunkPayload> {
    data.chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| ChunkPayload {
            offset: (i * chunk_size) as i64,
            data: chunk.to_vec(),
        })
        .collect()
}

/// SHA-256 of `data` as a hex digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
