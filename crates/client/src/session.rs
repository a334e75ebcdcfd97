//! The owned session object exposed to the presentation layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use stowbox_connection::RpcClient;

use crate::engine::TransferEngine;
use crate::error::ClientError;
use crate::metadata::{FileRecord, MetadataCache};
use crate::naming::NameSet;
use crate::notify::Notifier;
use crate::reconciler::{ChangeEvent, SuppressionFlags, run_subscribe_loop};
use crate::remote::RemoteFileStore;
use crate::settings::Settings;
use crate::store::FileStore;

/// State shared between the transfer engine and the reconciler task.
pub(crate) struct SessionState {
    pub(crate) settings: Settings,
    pub(crate) cache: MetadataCache,
    pub(crate) names: NameSet,
    pub(crate) flags: SuppressionFlags,
}

impl SessionState {
    pub(crate) fn new(settings: Settings) -> Self {
        Self {
            settings,
            cache: MetadataCache::default(),
            names: NameSet::default(),
            flags: SuppressionFlags::default(),
        }
    }
}

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// One client session against a vault.
///
/// Owns the metadata cache, active name set, and suppression state, and
/// runs the event reconciler as a background task for its lifetime.
/// Sessions are self-contained; several can coexist in one process.
pub struct FileSession<S: FileStore> {
    store: Arc<S>,
    state: Arc<SessionState>,
    engine: TransferEngine<S>,
    added_rx: Mutex<Option<mpsc::Receiver<ChangeEvent>>>,
    deleted_rx: Mutex<Option<mpsc::Receiver<ChangeEvent>>>,
    cancel: CancellationToken,
    reconciler: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl FileSession<RemoteFileStore> {
    /// Connects to the vault named in `settings` and starts the session.
    pub async fn connect(
        settings: Settings,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ClientError> {
        let rpc = RpcClient::connect(&settings.endpoint_url()).await?;
        let subscriber_id = uuid::Uuid::new_v4().as_u128() as i64;
        let store = RemoteFileStore::new(Arc::new(rpc), subscriber_id);
        Ok(Self::with_store(Arc::new(store), settings, notifier))
    }
}

impl<S: FileStore> FileSession<S> {
    /// Builds a session over any store and spawns the reconciler loop.
    /// Must be called from within a tokio runtime.
    pub fn with_store(store: Arc<S>, settings: Settings, notifier: Arc<dyn Notifier>) -> Self {
        let state = Arc::new(SessionState::new(settings));
        let engine = TransferEngine::new(store.clone(), state.clone(), notifier);

        let (added_tx, added_rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
        let (deleted_tx, deleted_rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let reconciler = tokio::spawn(run_subscribe_loop(
            store.clone(),
            state.clone(),
            added_tx,
            deleted_tx,
            cancel.clone(),
        ));

        Self {
            store,
            state,
            engine,
            added_rx: Mutex::new(Some(added_rx)),
            deleted_rx: Mutex::new(Some(deleted_rx)),
            cancel,
            reconciler: Mutex::new(Some(reconciler)),
        }
    }

    /// Uploads a local file. Returns the (possibly renamed) stored name.
    pub async fn upload(&self, path: impl AsRef<Path>, name: &str) -> Result<String, ClientError> {
        self.engine.upload(path.as_ref(), name).await
    }

    /// Downloads a stored file into the download directory and returns the
    /// local path.
    pub async fn download(&self, name: &str) -> Result<PathBuf, ClientError> {
        self.engine.download(name).await
    }

    /// Deletes a stored file.
    pub async fn delete(&self, name: &str) -> Result<(), ClientError> {
        self.engine.delete(name).await
    }

    /// Returns the cached record for `name`, if any.
    pub fn metadata(&self, name: &str) -> Option<FileRecord> {
        self.engine.metadata(name)
    }

    /// Loads the initial file listing into the cache and name set.
    pub async fn load_files(&self) -> Result<usize, ClientError> {
        self.engine.load_files().await
    }

    /// Reads back a downloaded file as editable text.
    pub fn read_downloaded(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        self.engine.read_downloaded(name)
    }

    /// Rewrites a downloaded file and re-uploads it.
    pub async fn save_edited(&self, name: &str, contents: &str) -> Result<String, ClientError> {
        self.engine.save_edited(name, contents).await
    }

    /// Takes the file-added change channel. Can only be taken once.
    pub async fn take_added_events(&self) -> Option<mpsc::Receiver<ChangeEvent>> {
        self.added_rx.lock().await.take()
    }

    /// Takes the file-deleted change channel. Can only be taken once.
    pub async fn take_deleted_events(&self) -> Option<mpsc::Receiver<ChangeEvent>> {
        self.deleted_rx.lock().await.take()
    }

    /// Tears the session down: stops the reconciler and unsubscribes from
    /// the vault's event stream.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Err(e) = self.store.unsubscribe().await {
            debug!(error = %e, "unsubscribe failed during teardown");
        }
        if let Some(handle) = self.reconciler.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        info!("session shut down");
    }
}
