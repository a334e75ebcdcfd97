//! In-memory [`FileStore`] and notifier used across the crate's tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use stowbox_connection::RpcError;
use stowbox_protocol::messages::{DownloadResponse, OperationResult};
use stowbox_protocol::types::FileMetadata;

use crate::error::ClientError;
use crate::notify::Notifier;
use crate::reconciler::ChangeEvent;
use crate::store::FileStore;
use crate::transfer::ChunkPayload;

/// In-memory vault double with switchable failure modes.
pub(crate) struct MockStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    sizes: Mutex<HashMap<String, i64>>,

    pub(crate) unary_uploads: AtomicUsize,
    pub(crate) streamed_uploads: AtomicUsize,
    pub(crate) unary_downloads: AtomicUsize,
    pub(crate) streamed_downloads: AtomicUsize,
    pub(crate) subscribe_calls: AtomicUsize,
    pub(crate) last_chunk_offsets: Mutex<Vec<i64>>,

    /// Acknowledge uploads with `successful: false`.
    pub(crate) refuse_uploads: AtomicBool,
    /// Acknowledge deletes with `successful: false`.
    pub(crate) refuse_deletes: AtomicBool,
    /// Fail every call with a transport error.
    pub(crate) fail_transport: AtomicBool,
    /// Number of subscribe attempts to fail before succeeding.
    pub(crate) fail_subscribes: AtomicUsize,
    pub(crate) unsubscribed: AtomicBool,

    pub(crate) download_chunk_size: AtomicUsize,
    event_tx: Mutex<Option<mpsc::Sender<ChangeEvent>>>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            sizes: Mutex::new(HashMap::new()),
            unary_uploads: AtomicUsize::new(0),
            streamed_uploads: AtomicUsize::new(0),
            unary_downloads: AtomicUsize::new(0),
            streamed_downloads: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            last_chunk_offsets: Mutex::new(Vec::new()),
            refuse_uploads: AtomicBool::new(false),
            refuse_deletes: AtomicBool::new(false),
            fail_transport: AtomicBool::new(false),
            fail_subscribes: AtomicUsize::new(0),
            unsubscribed: AtomicBool::new(false),
            download_chunk_size: AtomicUsize::new(4),
            event_tx: Mutex::new(None),
        }
    }
}

impl MockStore {
    pub(crate) fn stored(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }

    pub(crate) fn insert_file(&self, name: &str, data: Vec<u8>) {
        self.files.lock().unwrap().insert(name.to_string(), data);
    }

    pub(crate) fn stub_size(&self, name: &str, size: i64) {
        self.sizes.lock().unwrap().insert(name.to_string(), size);
    }

    /// Waits for the reconciler to subscribe and returns the injection
    /// handle for push events.
    pub(crate) async fn wait_for_subscription(&self) -> mpsc::Sender<ChangeEvent> {
        for _ in 0..3000 {
            if let Some(tx) = self.event_tx.lock().unwrap().clone() {
                return tx;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("reconciler never subscribed");
    }

    /// Drops the stored event sender, ending the current subscription
    /// stream once every other sender clone is gone.
    pub(crate) fn close_events(&self) {
        *self.event_tx.lock().unwrap() = None;
    }

    fn transport_check(&self) -> Result<(), ClientError> {
        if self.fail_transport.load(Ordering::Relaxed) {
            Err(ClientError::Transport(RpcError::Closed))
        } else {
            Ok(())
        }
    }
}

fn ok() -> OperationResult {
    OperationResult {
        successful: true,
        message: String::new(),
    }
}

fn refused() -> OperationResult {
    OperationResult {
        successful: false,
        message: "refused by test".into(),
    }
}

impl FileStore for MockStore {
    async fn file_size(&self, name: &str) -> Result<i64, ClientError> {
        self.transport_check()?;
        if let Some(size) = self.sizes.lock().unwrap().get(name) {
            return Ok(*size);
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(name)
            .map(|d| d.len() as i64)
            .unwrap_or(0))
    }

    async fn upload_unary(
        &self,
        metadata: FileMetadata,
        data: Vec<u8>,
    ) -> Result<OperationResult, ClientError> {
        self.transport_check()?;
        self.unary_uploads.fetch_add(1, Ordering::Relaxed);
        if self.refuse_uploads.load(Ordering::Relaxed) {
            return Ok(refused());
        }
        self.sizes
            .lock()
            .unwrap()
            .insert(metadata.file_name.clone(), metadata.file_size);
        self.files.lock().unwrap().insert(metadata.file_name, data);
        Ok(ok())
    }

    async fn upload_streamed(
        &self,
        metadata: FileMetadata,
        chunks: Vec<ChunkPayload>,
    ) -> Result<OperationResult, ClientError> {
        self.transport_check()?;
        self.streamed_uploads.fetch_add(1, Ordering::Relaxed);
        *self.last_chunk_offsets.lock().unwrap() =
            chunks.iter().map(|c| c.offset).collect();
        if self.refuse_uploads.load(Ordering::Relaxed) {
            return Ok(refused());
        }

        let mut assembled = Vec::new();
        for chunk in &chunks {
            assembled.extend_from_slice(&chunk.data);
        }
        self.sizes
            .lock()
            .unwrap()
            .insert(metadata.file_name.clone(), metadata.file_size);
        self.files
            .lock()
            .unwrap()
            .insert(metadata.file_name, assembled);
        Ok(ok())
    }

    async fn download_unary(&self, name: &str) -> Result<DownloadResponse, ClientError> {
        self.transport_check()?;
        self.unary_downloads.fetch_add(1, Ordering::Relaxed);
        let data = self
            .stored(name)
            .ok_or_else(|| ClientError::Protocol(format!("file not found: {name}")))?;
        Ok(DownloadResponse {
            metadata: FileMetadata {
                file_name: name.to_string(),
                file_size: data.len() as i64,
                content_hash: String::new(),
                uploaded_at: 1_700_000_000,
            },
            data,
        })
    }

    async fn download_streamed(
        &self,
        name: &str,
    ) -> Result<mpsc::Receiver<Result<Vec<u8>, ClientError>>, ClientError> {
        self.transport_check()?;
        self.streamed_downloads.fetch_add(1, Ordering::Relaxed);
        let data = self
            .stored(name)
            .ok_or_else(|| ClientError::Protocol(format!("file not found: {name}")))?;
        let chunk_size = self.download_chunk_size.load(Ordering::Relaxed).max(1);

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for chunk in data.chunks(chunk_size) {
                if tx.send(Ok(chunk.to_vec())).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn delete_file(&self, name: &str) -> Result<OperationResult, ClientError> {
        self.transport_check()?;
        if self.refuse_deletes.load(Ordering::Relaxed) {
            return Ok(refused());
        }
        self.files.lock().unwrap().remove(name);
        self.sizes.lock().unwrap().remove(name);
        Ok(ok())
    }

    async fn list_files(&self) -> Result<Vec<FileMetadata>, ClientError> {
        self.transport_check()?;
        let files = self.files.lock().unwrap();
        let mut listing: Vec<FileMetadata> = files
            .iter()
            .map(|(name, data)| FileMetadata {
                file_name: name.clone(),
                file_size: data.len() as i64,
                content_hash: String::new(),
                uploaded_at: 1_700_000_000,
            })
            .collect();
        listing.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(listing)
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ChangeEvent>, ClientError> {
        self.subscribe_calls.fetch_add(1, Ordering::Relaxed);
        let failures = self.fail_subscribes.load(Ordering::Relaxed);
        if failures > 0 {
            self.fail_subscribes.store(failures - 1, Ordering::Relaxed);
            return Err(ClientError::Transport(RpcError::Closed));
        }

        let (tx, rx) = mpsc::channel(32);
        *self.event_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<(), ClientError> {
        self.unsubscribed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Notifier that records messages for assertions.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub(crate) fn successes(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }

    pub(crate) fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
