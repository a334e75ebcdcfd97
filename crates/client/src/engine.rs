//! Size-branched upload/download against a [`FileStore`].
//!
//! Every operation is synchronous to its caller: it returns once the vault
//! has acknowledged (or refused) the transfer. Internally the streamed
//! paths fan out per-chunk work behind the store's join barrier.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use stowbox_protocol::constants::CHUNK_SIZE;
use stowbox_protocol::messages::OperationResult;
use stowbox_protocol::types::FileMetadata;

use crate::crypto;
use crate::error::ClientError;
use crate::filetype::is_binary_payload;
use crate::metadata::{FileRecord, format_now};
use crate::notify::Notifier;
use crate::session::SessionState;
use crate::store::FileStore;
use crate::transfer::{TransferRoute, checksum_bytes, route_for_size, split_into_chunks};

pub(crate) struct TransferEngine<S> {
    store: Arc<S>,
    state: Arc<SessionState>,
    notifier: Arc<dyn Notifier>,
}

impl<S: FileStore> TransferEngine<S> {
    pub(crate) fn new(store: Arc<S>, state: Arc<SessionState>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            state,
            notifier,
        }
    }

    /// Uploads a local file under `name`, renamed first if the name is
    /// taken. Returns the name the file was stored under.
    ///
    /// The transfer path is decided once, from the size stat, before any
    /// data is read.
    pub(crate) async fn upload(&self, path: &Path, name: &str) -> Result<String, ClientError> {
        let size = std::fs::metadata(path)?.len() as i64;
        let resolved = self.state.names.resolve_unique(name)?;

        let content_hash = match route_for_size(size) {
            TransferRoute::Unary => self.upload_unary(path, &resolved, size).await?,
            TransferRoute::Streamed => self.upload_streamed(path, &resolved, size).await?,
        };

        self.state.cache.save(FileRecord {
            name: resolved.clone(),
            size,
            content_hash,
            uploaded_at: format_now(),
        });
        self.state.names.insert(&resolved);
        self.notifier.success("File uploaded");
        info!(file = %resolved, size, "upload complete");
        Ok(resolved)
    }

    async fn upload_unary(&self, path: &Path, name: &str, size: i64) -> Result<String, ClientError> {
        debug!(file = %name, size, "uploading file");
        let data = std::fs::read(path)?;
        let content_hash = checksum_bytes(&data);
        let payload = self.encrypt_payload(data);
        let metadata = self.wire_metadata(name, size, &content_hash);

        self.state.flags.expect_upload();
        let ack = match self.store.upload_unary(metadata, payload).await {
            Ok(ack) => ack,
            Err(e) => {
                self.state.flags.clear_upload();
                return Err(e);
            }
        };
        if !ack.successful {
            self.state.flags.clear_upload();
            return Err(ClientError::Protocol(failure_message(&ack, "upload refused")));
        }
        Ok(content_hash)
    }

    async fn upload_streamed(
        &self,
        path: &Path,
        name: &str,
        size: i64,
    ) -> Result<String, ClientError> {
        debug!(file = %name, size, "sending large file");
        let data = std::fs::read(path)?;
        let content_hash = checksum_bytes(&data);

        let settings = &self.state.settings;
        let encrypt = settings.encrypted
            && !is_binary_payload(&data, &settings.binary_signatures);
        if settings.encrypted && !encrypt {
            debug!("binary payload, chunks go out in clear form");
        }

        let mut chunks = split_into_chunks(&data, CHUNK_SIZE);
        if encrypt {
            // Each chunk is encrypted independently so the receiving side
            // can decrypt them one at a time.
            for chunk in &mut chunks {
                chunk.data = crypto::encrypt(&settings.password, &chunk.data);
            }
        }

        let metadata = self.wire_metadata(name, size, &content_hash);
        self.state.flags.expect_upload();
        let ack = match self.store.upload_streamed(metadata, chunks).await {
            Ok(ack) => ack,
            Err(e) => {
                self.state.flags.clear_upload();
                return Err(e);
            }
        };
        if !ack.successful {
            self.state.flags.clear_upload();
            return Err(ClientError::Protocol(failure_message(&ack, "upload refused")));
        }
        Ok(content_hash)
    }

    /// Downloads `name` into the configured download directory and returns
    /// the local path.
    pub(crate) async fn download(&self, name: &str) -> Result<PathBuf, ClientError> {
        match self.download_inner(name).await {
            Ok(path) => {
                self.notifier.success(&format!("File {name} downloaded"));
                Ok(path)
            }
            Err(e) => {
                self.notifier.error(&format!("Error downloading file: {name}"));
                Err(e)
            }
        }
    }

    async fn download_inner(&self, name: &str) -> Result<PathBuf, ClientError> {
        // The vault's size probe decides the branch before any data moves.
        let size = self.store.file_size(name).await?;
        let target = self.state.settings.download_path.join(name);

        match route_for_size(size) {
            TransferRoute::Unary => {
                debug!(file = %name, "downloading file");
                let resp = self.store.download_unary(name).await?;
                let data = self.decrypt_payload(resp.data);
                std::fs::write(&target, data)?;
            }
            TransferRoute::Streamed => {
                debug!(file = %name, size, "downloading large file");
                let mut file = std::fs::OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(&target)?;
                let mut chunks = self.store.download_streamed(name).await?;
                while let Some(chunk) = chunks.recv().await {
                    let data = self.decrypt_payload(chunk?);
                    let written = file.write(&data)?;
                    if written == 0 {
                        return Err(ClientError::LocalIo(std::io::Error::new(
                            std::io::ErrorKind::WriteZero,
                            "no bytes written to download file",
                        )));
                    }
                    file.write_all(&data[written..])?;
                }
            }
        }
        Ok(target)
    }

    /// Deletes `name` on the vault and drops the local record.
    pub(crate) async fn delete(&self, name: &str) -> Result<(), ClientError> {
        self.state.flags.expect_delete();
        let ack = match self.store.delete_file(name).await {
            Ok(ack) => ack,
            Err(e) => {
                self.state.flags.clear_delete();
                return Err(e);
            }
        };
        if !ack.successful {
            self.state.flags.clear_delete();
            return Err(ClientError::Protocol(failure_message(&ack, "delete refused")));
        }

        self.state.cache.delete(name);
        self.state.names.remove(name);
        self.notifier.success("File deleted");
        info!(file = %name, "delete complete");
        Ok(())
    }

    /// Drains the vault's listing snapshot into the cache and name set.
    /// Returns the number of files listed.
    pub(crate) async fn load_files(&self) -> Result<usize, ClientError> {
        let files = match self.store.list_files().await {
            Ok(files) => files,
            Err(e) => {
                self.notifier
                    .error(&format!("Error loading files from vault: {e}"));
                return Err(e);
            }
        };

        let count = files.len();
        for meta in files {
            self.state.names.insert(&meta.file_name);
            self.state.cache.save(FileRecord::from_wire(&meta));
        }
        debug!(count, "file listing loaded");
        Ok(count)
    }

    pub(crate) fn metadata(&self, name: &str) -> Option<FileRecord> {
        self.state.cache.get(name)
    }

    /// Reads back a previously downloaded file as editable text.
    pub(crate) fn read_downloaded(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        let path = self.state.settings.download_path.join(name);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.notifier
                    .error("File not found locally, download it first");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        if is_binary_payload(&data, &self.state.settings.binary_signatures) {
            self.notifier.error("Can only edit non-binary files");
            return Err(ClientError::Validation(
                "can only edit non-binary files".into(),
            ));
        }
        Ok(data)
    }

    /// Rewrites the downloaded copy of `name` and re-uploads it. Returns
    /// the name the new revision was stored under.
    pub(crate) async fn save_edited(&self, name: &str, contents: &str) -> Result<String, ClientError> {
        let path = self.state.settings.download_path.join(name);
        std::fs::write(&path, contents)?;
        self.upload(&path, name).await
    }

    fn wire_metadata(&self, name: &str, size: i64, content_hash: &str) -> FileMetadata {
        FileMetadata {
            file_name: name.to_string(),
            file_size: size,
            content_hash: content_hash.to_string(),
            uploaded_at: Utc::now().timestamp(),
        }
    }

    fn encrypt_payload(&self, data: Vec<u8>) -> Vec<u8> {
        let settings = &self.state.settings;
        if !settings.encrypted {
            return data;
        }
        if is_binary_payload(&data, &settings.binary_signatures) {
            debug!("binary payload, skipping encryption");
            return data;
        }
        crypto::encrypt(&settings.password, &data)
    }

    fn decrypt_payload(&self, data: Vec<u8>) -> Vec<u8> {
        let settings = &self.state.settings;
        if settings.encrypted {
            crypto::decrypt(&settings.password, &data)
        } else {
            data
        }
    }
}

fn failure_message(ack: &OperationResult, fallback: &str) -> String {
    if ack.message.is_empty() {
        fallback.to_string()
    } else {
        ack.message.clone()
    }
}
