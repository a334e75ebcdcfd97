//! RPC client over a single WebSocket connection.
//!
//! Unary calls follow a request-response pattern with UUID correlation.
//! Client-streaming uploads enqueue binary chunk frames in offset order and
//! hand back a ticket per chunk so acknowledgments can be awaited together.
//! Server-streaming calls register a stream id before the request goes out,
//! so no frame can race past the registration.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tracing::debug;

use stowbox_protocol::binary::{ChunkHeader, encode_chunk_frame};
use stowbox_protocol::constants::{
    MessageType, WS_CHUNK_ACK_TIMEOUT, WS_MAX_MESSAGE_SIZE, WS_REQUEST_TIMEOUT,
};
use stowbox_protocol::envelope::Message;

use crate::pumps::read::PendingMap;
use crate::streams::{ServerStream, StreamMap};

/// Errors from the RPC client.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("vault error {code}: {message}")]
    Vault { code: i32, message: String },
}

/// RPC client connected to a single vault.
pub struct RpcClient {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingMap,
    streams: StreamMap,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
    cancel: tokio_util::sync::CancellationToken,
}

impl RpcClient {
    /// Connects to the vault WebSocket endpoint.
    pub async fn connect(url: &str) -> Result<Self, RpcError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let streams: StreamMap = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let cancel = tokio_util::sync::CancellationToken::new();

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::write::write_pump(write, write_rx, cancel))
        };

        let read_handle = {
            let pending = pending.clone();
            let streams = streams.clone();
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::read::read_pump(
                read, pending, streams, write_tx, cancel,
            ))
        };

        let ping_handle = {
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::ping::ping_pump(write_tx, cancel))
        };

        debug!(url = %url, "connected to vault");

        Ok(Self {
            write_tx,
            pending,
            streams,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
            cancel,
        })
    }

    /// Sends a unary request and waits for the response.
    pub async fn request<T: serde::Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Message, RpcError> {
        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(&id, msg_type, payload)?;
        let json = serde_json::to_string(&msg)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self
            .write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(RpcError::Closed);
        }

        let result = tokio::time::timeout(WS_REQUEST_TIMEOUT, rx).await;

        // Clean up the pending entry on any exit path.
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(resp)) => check_vault_error(resp),
            Ok(Err(_)) => Err(RpcError::Closed),
            Err(_) => Err(RpcError::Timeout),
        }
    }

    /// Enqueues one chunk of a streamed upload.
    ///
    /// The frame goes onto the write queue immediately, preserving call
    /// order on the wire; the returned ticket resolves to the vault's
    /// per-chunk acknowledgment, so many chunks can be in flight at once.
    pub async fn send_chunk(
        &self,
        upload_id: &str,
        offset: i64,
        checksum: &str,
        data: &[u8],
    ) -> Result<ChunkAckTicket, RpcError> {
        let id = uuid::Uuid::new_v4().to_string();
        let header = ChunkHeader {
            id: id.clone(),
            upload_id: upload_id.to_string(),
            offset,
            checksum: checksum.to_string(),
        };
        let frame = encode_chunk_frame(&header, data)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self
            .write_tx
            .send(tungstenite::Message::Binary(frame.into()))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(RpcError::Closed);
        }

        Ok(ChunkAckTicket {
            id,
            rx,
            pending: self.pending.clone(),
        })
    }

    /// Opens a server-streaming call.
    ///
    /// The stream is registered before the request is sent, so the first
    /// frame cannot be lost.
    pub async fn open_stream<T: serde::Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<ServerStream, RpcError> {
        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(&id, msg_type, payload)?;
        let json = serde_json::to_string(&msg)?;

        let stream = ServerStream::register(id, &self.streams);

        if self
            .write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .is_err()
        {
            return Err(RpcError::Closed);
        }

        Ok(stream)
    }

    /// Gracefully closes the connection.
    pub async fn close(&self) {
        self.cancel.cancel();
        let _ = self.write_tx.send(tungstenite::Message::Close(None)).await;
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
        self._ping_handle.abort();
    }
}

/// Pending acknowledgment for one enqueued upload chunk.
pub struct ChunkAckTicket {
    id: String,
    rx: oneshot::Receiver<Message>,
    pending: PendingMap,
}

impl ChunkAckTicket {
    /// Waits for the vault to acknowledge the chunk.
    pub async fn wait(self) -> Result<Message, RpcError> {
        let Self { id, rx, pending } = self;

        let result = tokio::time::timeout(WS_CHUNK_ACK_TIMEOUT, rx).await;
        pending.lock().await.remove(&id);

        match result {
            Ok(Ok(resp)) => check_vault_error(resp),
            Ok(Err(_)) => Err(RpcError::Closed),
            Err(_) => Err(RpcError::Timeout),
        }
    }
}

fn check_vault_error(resp: Message) -> Result<Message, RpcError> {
    if let Some(err) = &resp.error {
        return Err(RpcError::Vault {
            code: err.code,
            message: err.message.clone(),
        });
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowbox_protocol::binary::parse_chunk_frame;
    use stowbox_protocol::messages::FileRequest;

    fn offline_client() -> (RpcClient, mpsc::Receiver<tungstenite::Message>) {
        let (write_tx, write_rx) = mpsc::channel(16);
        let client = RpcClient {
            write_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            streams: Arc::new(std::sync::Mutex::new(HashMap::new())),
            _read_handle: tokio::spawn(async {}),
            _write_handle: tokio::spawn(async {}),
            _ping_handle: tokio::spawn(async {}),
            cancel: tokio_util::sync::CancellationToken::new(),
        };
        (client, write_rx)
    }

    #[test]
    fn rpc_error_display() {
        assert_eq!(RpcError::Timeout.to_string(), "request timed out");
        assert_eq!(RpcError::Closed.to_string(), "connection closed");

        let err = RpcError::Vault {
            code: 404,
            message: "no such file".into(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn vault_error_envelope_becomes_rpc_error() {
        let msg = Message::error("m1", 500, "boom");
        let result = check_vault_error(msg);
        assert!(matches!(result, Err(RpcError::Vault { code: 500, .. })));
    }

    #[tokio::test]
    async fn request_resolves_when_response_arrives() {
        let (client, mut write_rx) = offline_client();
        let pending = client.pending.clone();

        let req = FileRequest {
            file_name: "a.txt".into(),
        };
        let handle =
            tokio::spawn(async move { client.request(MessageType::FileSize, Some(&req)).await });

        // Read the outbound frame to learn the request id.
        let sent = write_rx.recv().await.unwrap();
        let sent_msg: Message = match sent {
            tungstenite::Message::Text(t) => serde_json::from_str(t.as_str()).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        };
        assert_eq!(sent_msg.msg_type, MessageType::FileSize);

        // Deliver the response the way the read pump would.
        let resp = Message::new::<()>(&sent_msg.id, MessageType::FileSizeResponse, None).unwrap();
        let tx = pending.lock().await.remove(&sent_msg.id).unwrap();
        tx.send(resp).unwrap();

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.msg_type, MessageType::FileSizeResponse);
    }

    #[tokio::test]
    async fn send_chunk_builds_correct_wire_format() {
        let (client, mut write_rx) = offline_client();

        let ticket = client
            .send_chunk("up-7", 4096, "cafe", b"chunk payload")
            .await
            .unwrap();

        let frame = match write_rx.recv().await.unwrap() {
            tungstenite::Message::Binary(b) => b.to_vec(),
            other => panic!("expected binary frame, got {other:?}"),
        };

        let (header, payload) = parse_chunk_frame(&frame).unwrap();
        assert_eq!(header.upload_id, "up-7");
        assert_eq!(header.offset, 4096);
        assert_eq!(header.checksum, "cafe");
        assert!(!header.id.is_empty());
        assert_eq!(payload, b"chunk payload");

        // The ticket is registered under the generated id.
        assert!(client.pending.lock().await.contains_key(&header.id));
        drop(ticket);
    }

    #[tokio::test]
    async fn chunk_ack_ticket_resolves() {
        let (client, mut write_rx) = offline_client();
        let pending = client.pending.clone();

        let ticket = client.send_chunk("up-1", 0, "", b"data").await.unwrap();
        let frame = match write_rx.recv().await.unwrap() {
            tungstenite::Message::Binary(b) => b.to_vec(),
            other => panic!("expected binary frame, got {other:?}"),
        };
        let (header, _) = parse_chunk_frame(&frame).unwrap();

        let ack = Message::new::<()>(&header.id, MessageType::OperationResult, None).unwrap();
        let tx = pending.lock().await.remove(&header.id).unwrap();
        tx.send(ack).unwrap();

        let resp = ticket.wait().await.unwrap();
        assert_eq!(resp.msg_type, MessageType::OperationResult);
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn open_stream_registers_before_sending() {
        let (client, mut write_rx) = offline_client();

        let stream = client
            .open_stream::<()>(MessageType::ListFiles, None)
            .await
            .unwrap();

        let sent_msg: Message = match write_rx.recv().await.unwrap() {
            tungstenite::Message::Text(t) => serde_json::from_str(t.as_str()).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        };
        assert_eq!(sent_msg.id, stream.id());
        assert!(client.streams.lock().unwrap().contains_key(stream.id()));
    }

    #[tokio::test]
    async fn request_fails_closed_when_write_queue_is_gone() {
        let (client, write_rx) = offline_client();
        drop(write_rx);

        let result = client.request::<()>(MessageType::Ping, None).await;
        assert!(matches!(result, Err(RpcError::Closed)));
        assert!(client.pending.lock().await.is_empty());
    }
}
