//! Server-stream plumbing: frames routed by request id to a per-stream
//! channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use stowbox_protocol::binary::ChunkHeader;
use stowbox_protocol::envelope::Message;

/// Buffered frames per open stream. A slow consumer stalls the read pump
/// rather than letting frames pile up unbounded.
pub(crate) const STREAM_BUFFER: usize = 32;

/// One frame of a server stream.
#[derive(Debug)]
pub enum StreamFrame {
    /// A text message correlated to the stream (listing entries, push
    /// events, errors).
    Message(Message),
    /// A binary chunk frame (streamed downloads).
    Chunk { header: ChunkHeader, data: Vec<u8> },
}

/// Registry of open server streams, keyed by request id.
pub(crate) type StreamMap = Arc<Mutex<HashMap<String, mpsc::Sender<StreamFrame>>>>;

/// Receiving half of a server-streaming call.
///
/// The stream ends (`recv` returns `None`) when the vault sends
/// `stream_end`, when the connection dies, or when the stream is dropped.
pub struct ServerStream {
    id: String,
    rx: mpsc::Receiver<StreamFrame>,
    streams: StreamMap,
}

impl ServerStream {
    pub(crate) fn register(id: String, streams: &StreamMap) -> Self {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        streams
            .lock()
            .expect("stream registry poisoned")
            .insert(id.clone(), tx);
        Self {
            id,
            rx,
            streams: Arc::clone(streams),
        }
    }

    /// Receives the next frame, or `None` at end-of-stream.
    pub async fn recv(&mut self) -> Option<StreamFrame> {
        self.rx.recv().await
    }

    /// The request id this stream is correlated to.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for ServerStream {
    fn drop(&mut self) {
        if let Ok(mut map) = self.streams.lock() {
            map.remove(&self.id);
        }
    }
}
