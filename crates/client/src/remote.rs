//! Production [`FileStore`] over the RPC channel.

use std::sync::Arc;

use futures_util::future::try_join_all;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use stowbox_connection::{ChunkAckTicket, RpcClient, RpcError, StreamFrame};
use stowbox_protocol::constants::{MessageType, UPLOAD_STREAM_DEADLINE};
use stowbox_protocol::envelope::Message;
use stowbox_protocol::messages::{
    DownloadResponse, FileAddedEvent, FileInfoResponse, FileRemovedEvent, FileRequest,
    FileSizeResponse, OperationResult, SubscribeRequest, UploadFileRequest,
    UploadStreamCloseRequest, UploadStreamOpenRequest, UploadStreamOpened,
};
use stowbox_protocol::types::FileMetadata;

use crate::error::ClientError;
use crate::reconciler::{ChangeEvent, ChangeKind};
use crate::store::FileStore;
use crate::transfer::{ChunkPayload, checksum_bytes};

/// Vault operations over a live [`RpcClient`].
pub struct RemoteFileStore {
    rpc: Arc<RpcClient>,
    subscriber_id: i64,
}

impl RemoteFileStore {
    pub fn new(rpc: Arc<RpcClient>, subscriber_id: i64) -> Self {
        Self { rpc, subscriber_id }
    }

    /// The per-session identifier the vault keys the event stream by.
    pub fn subscriber_id(&self) -> i64 {
        self.subscriber_id
    }

    async fn upload_streamed_inner(
        &self,
        metadata: FileMetadata,
        chunks: Vec<ChunkPayload>,
    ) -> Result<OperationResult, ClientError> {
        // Metadata-only first frame opens the stream.
        let opened = self
            .rpc
            .request(
                MessageType::UploadStreamOpen,
                Some(&UploadStreamOpenRequest { metadata }),
            )
            .await?;
        let opened: UploadStreamOpened = parse_payload(&opened)?;

        // Enqueue every chunk in ascending offset order; the acks resolve
        // concurrently behind a join barrier.
        let mut tickets = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let checksum = checksum_bytes(&chunk.data);
            let ticket = self
                .rpc
                .send_chunk(&opened.upload_id, chunk.offset, &checksum, &chunk.data)
                .await?;
            tickets.push(ticket);
        }

        let acks = try_join_all(tickets.into_iter().map(ChunkAckTicket::wait)).await?;
        for ack in &acks {
            let result: OperationResult = parse_payload(ack)?;
            if !result.successful {
                return Err(ClientError::Protocol(refusal(&result, "chunk rejected")));
            }
        }

        // Close the stream and read the final acknowledgment.
        let closed = self
            .rpc
            .request(
                MessageType::UploadStreamClose,
                Some(&UploadStreamCloseRequest {
                    upload_id: opened.upload_id,
                }),
            )
            .await?;
        parse_payload(&closed)
    }
}

impl FileStore for RemoteFileStore {
    async fn file_size(&self, name: &str) -> Result<i64, ClientError> {
        let resp = self
            .rpc
            .request(
                MessageType::FileSize,
                Some(&FileRequest {
                    file_name: name.to_string(),
                }),
            )
            .await?;
        let size: FileSizeResponse = parse_payload(&resp)?;
        Ok(size.file_size)
    }

    async fn upload_unary(
        &self,
        metadata: FileMetadata,
        data: Vec<u8>,
    ) -> Result<OperationResult, ClientError> {
        let resp = self
            .rpc
            .request(
                MessageType::UploadFile,
                Some(&UploadFileRequest { metadata, data }),
            )
            .await?;
        parse_payload(&resp)
    }

    async fn upload_streamed(
        &self,
        metadata: FileMetadata,
        chunks: Vec<ChunkPayload>,
    ) -> Result<OperationResult, ClientError> {
        debug!(
            file = %metadata.file_name,
            chunks = chunks.len(),
            "starting streamed upload"
        );
        match tokio::time::timeout(
            UPLOAD_STREAM_DEADLINE,
            self.upload_streamed_inner(metadata, chunks),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ClientError::Transport(RpcError::Timeout)),
        }
    }

    async fn download_unary(&self, name: &str) -> Result<DownloadResponse, ClientError> {
        let resp = self
            .rpc
            .request(
                MessageType::DownloadUncappedFile,
                Some(&FileRequest {
                    file_name: name.to_string(),
                }),
            )
            .await?;
        parse_payload(&resp)
    }

    async fn download_streamed(
        &self,
        name: &str,
    ) -> Result<mpsc::Receiver<Result<Vec<u8>, ClientError>>, ClientError> {
        let mut stream = self
            .rpc
            .open_stream(
                MessageType::DownloadFile,
                Some(&FileRequest {
                    file_name: name.to_string(),
                }),
            )
            .await?;

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let mut expected_offset: i64 = 0;
            while let Some(frame) = stream.recv().await {
                match frame {
                    StreamFrame::Chunk { header, data } => {
                        if header.offset != expected_offset {
                            let _ = tx
                                .send(Err(ClientError::Protocol(format!(
                                    "chunk out of order: offset {} where {} was expected",
                                    header.offset, expected_offset
                                ))))
                                .await;
                            return;
                        }
                        expected_offset += data.len() as i64;
                        if tx.send(Ok(data)).await.is_err() {
                            return;
                        }
                    }
                    StreamFrame::Message(msg) => {
                        if let Some(err) = msg.error {
                            let _ = tx
                                .send(Err(ClientError::Transport(RpcError::Vault {
                                    code: err.code,
                                    message: err.message,
                                })))
                                .await;
                            return;
                        }
                        warn!(msg_type = ?msg.msg_type, "unexpected message on download stream");
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn delete_file(&self, name: &str) -> Result<OperationResult, ClientError> {
        let resp = self
            .rpc
            .request(
                MessageType::DeleteFile,
                Some(&FileRequest {
                    file_name: name.to_string(),
                }),
            )
            .await?;
        parse_payload(&resp)
    }

    async fn list_files(&self) -> Result<Vec<FileMetadata>, ClientError> {
        let mut stream = self.rpc.open_stream::<()>(MessageType::ListFiles, None).await?;

        let mut files = Vec::new();
        while let Some(frame) = stream.recv().await {
            match frame {
                StreamFrame::Message(msg) => {
                    if let Some(err) = msg.error {
                        return Err(ClientError::Transport(RpcError::Vault {
                            code: err.code,
                            message: err.message,
                        }));
                    }
                    let info: FileInfoResponse = parse_payload(&msg)?;
                    files.push(info.metadata);
                }
                StreamFrame::Chunk { .. } => {
                    warn!("unexpected binary frame on listing stream");
                }
            }
        }
        Ok(files)
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ChangeEvent>, ClientError> {
        let mut stream = self
            .rpc
            .open_stream(
                MessageType::SubscribeFileEvents,
                Some(&SubscribeRequest {
                    subscriber_id: self.subscriber_id,
                }),
            )
            .await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            while let Some(frame) = stream.recv().await {
                let StreamFrame::Message(msg) = frame else {
                    continue;
                };
                let event = match msg.msg_type {
                    MessageType::FileAdded => match msg.parse_payload::<FileAddedEvent>() {
                        Ok(Some(ev)) => ChangeEvent {
                            kind: ChangeKind::Added,
                            file_name: ev.metadata.file_name,
                        },
                        other => {
                            warn!(?other, "bad file_added payload, skipping");
                            continue;
                        }
                    },
                    MessageType::FileRemoved => match msg.parse_payload::<FileRemovedEvent>() {
                        Ok(Some(ev)) => ChangeEvent {
                            kind: ChangeKind::Deleted,
                            file_name: ev.file_name,
                        },
                        other => {
                            warn!(?other, "bad file_removed payload, skipping");
                            continue;
                        }
                    },
                    MessageType::Error => {
                        if let Some(err) = &msg.error {
                            warn!(code = err.code, message = %err.message, "event stream error");
                        }
                        return;
                    }
                    other => {
                        warn!(msg_type = ?other, "unexpected message on event stream");
                        continue;
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<(), ClientError> {
        let resp = self
            .rpc
            .request(
                MessageType::UnsubscribeFileEvents,
                Some(&SubscribeRequest {
                    subscriber_id: self.subscriber_id,
                }),
            )
            .await?;
        let result: OperationResult = parse_payload(&resp)?;
        if !result.successful {
            return Err(ClientError::Protocol(refusal(&result, "unsubscribe refused")));
        }
        Ok(())
    }
}

/// Deserializes a response payload, mapping decode failures to transport
/// errors and a missing payload to a protocol error.
fn parse_payload<T: for<'de> serde::Deserialize<'de>>(msg: &Message) -> Result<T, ClientError> {
    msg.parse_payload::<T>()
        .map_err(|e| ClientError::Transport(RpcError::Json(e)))?
        .ok_or_else(|| ClientError::Protocol("response payload missing".into()))
}

fn refusal(result: &OperationResult, fallback: &str) -> String {
    if result.message.is_empty() {
        fallback.to_string()
    } else {
        result.message.clone()
    }
}
