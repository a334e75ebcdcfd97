//! The vault surface the transfer engine runs against.

use std::future::Future;

use tokio::sync::mpsc;

use stowbox_protocol::messages::{DownloadResponse, OperationResult};
use stowbox_protocol::types::FileMetadata;

use crate::error::ClientError;
use crate::reconciler::ChangeEvent;
use crate::transfer::ChunkPayload;

/// Remote vault operations.
///
/// [`RemoteFileStore`](crate::remote::RemoteFileStore) is the production
/// implementation over the RPC channel; tests substitute an in-memory one
/// to exercise routing, suppression, and failure handling without a
/// network.
pub trait FileStore: Send + Sync + 'static {
    /// Size probe for a stored file.
    fn file_size(&self, name: &str) -> impl Future<Output = Result<i64, ClientError>> + Send;

    /// Whole-payload upload in one unary message.
    fn upload_unary(
        &self,
        metadata: FileMetadata,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<OperationResult, ClientError>> + Send;

    /// Streamed upload: metadata-only first frame, then the given chunks in
    /// ascending offset order, closed after every chunk is acknowledged.
    fn upload_streamed(
        &self,
        metadata: FileMetadata,
        chunks: Vec<ChunkPayload>,
    ) -> impl Future<Output = Result<OperationResult, ClientError>> + Send;

    /// Whole-payload download in one unary message.
    fn download_unary(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<DownloadResponse, ClientError>> + Send;

    /// Streamed download. Chunks arrive on the returned channel in
    /// ascending offset order; the channel closes at end-of-stream.
    fn download_streamed(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<mpsc::Receiver<Result<Vec<u8>, ClientError>>, ClientError>> + Send;

    /// Deletes a stored file.
    fn delete_file(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<OperationResult, ClientError>> + Send;

    /// Drains the listing snapshot stream.
    fn list_files(&self) -> impl Future<Output = Result<Vec<FileMetadata>, ClientError>> + Send;

    /// Opens the long-lived push-event stream for this session. The channel
    /// closes when the stream errors or ends; the reconciler resubscribes.
    fn subscribe_events(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<ChangeEvent>, ClientError>> + Send;

    /// Tears down the push-event subscription.
    fn unsubscribe(&self) -> impl Future<Output = Result<(), ClientError>> + Send;
}
