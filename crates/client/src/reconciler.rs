//! Reconciliation of vault push notifications against the client's own
//! in-flight operations.
//!
//! The client's uploads and deletes come back as push events like anyone
//! else's. The transfer engine marks each self-initiated operation just
//! before issuing the RPC; the reconciler consumes at most one matching
//! push event per marker and forwards everything else as a genuine remote
//! change.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stowbox_protocol::constants::RESUBSCRIBE_DELAY;

use crate::session::SessionState;
use crate::store::FileStore;

/// What happened to a file on the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Deleted,
}

/// A genuine remote change, forwarded on the public change channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub file_name: String,
}

#[derive(Debug, Default)]
struct Pending {
    self_upload: bool,
    self_delete: bool,
}

/// One-shot markers for self-initiated operations.
///
/// Non-blocking set and consume; at most one outstanding marker per kind.
/// A marker set for an RPC that later fails must be cleared by the caller
/// so it can never suppress an unrelated future event.
#[derive(Debug, Default)]
pub struct SuppressionFlags {
    inner: Mutex<Pending>,
}

impl SuppressionFlags {
    /// Marks the next `file_added` push event as self-caused.
    pub fn expect_upload(&self) {
        self.inner.lock().unwrap().self_upload = true;
    }

    /// Marks the next `file_removed` push event as self-caused.
    pub fn expect_delete(&self) {
        self.inner.lock().unwrap().self_delete = true;
    }

    pub fn clear_upload(&self) {
        self.inner.lock().unwrap().self_upload = false;
    }

    pub fn clear_delete(&self) {
        self.inner.lock().unwrap().self_delete = false;
    }

    /// Consumes the marker matching `kind`, self-delete checked first.
    /// Returns `true` if a marker was pending and is now spent.
    pub fn consume_for(&self, kind: ChangeKind) -> bool {
        let mut pending = self.inner.lock().unwrap();
        if kind == ChangeKind::Deleted && pending.self_delete {
            pending.self_delete = false;
            return true;
        }
        if kind == ChangeKind::Added && pending.self_upload {
            pending.self_upload = false;
            return true;
        }
        false
    }
}

/// Applies suppression to one push event. Returns the event if it is a
/// genuine remote change, `None` if it was self-caused.
pub(crate) fn reconcile(event: ChangeEvent, flags: &SuppressionFlags) -> Option<ChangeEvent> {
    if flags.consume_for(event.kind) {
        debug!(file = %event.file_name, kind = ?event.kind, "suppressed self-caused event");
        None
    } else {
        Some(event)
    }
}

/// Background task: subscribes to the vault's event stream for the session
/// lifetime, reapplying a fixed backoff whenever the stream errors or ends.
///
/// Genuine remote changes update the active name set and are forwarded on
/// the public channels. The loop exits only on cancellation (session
/// teardown) or when the presentation layer drops its receivers.
pub(crate) async fn run_subscribe_loop<S: FileStore>(
    store: Arc<S>,
    state: Arc<SessionState>,
    added_tx: mpsc::Sender<ChangeEvent>,
    deleted_tx: mpsc::Sender<ChangeEvent>,
    cancel: CancellationToken,
) {
    loop {
        let mut events = tokio::select! {
            _ = cancel.cancelled() => return,
            result = store.subscribe_events() => match result {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(error = %e, "event subscription failed, retrying");
                    if !backoff_or_cancel(&cancel).await {
                        return;
                    }
                    continue;
                }
            }
        };
        debug!("subscribed to file events");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                ev = events.recv() => ev,
            };
            let Some(event) = event else {
                break;
            };

            let Some(event) = reconcile(event, &state.flags) else {
                continue;
            };

            match event.kind {
                ChangeKind::Added => {
                    state.names.insert(&event.file_name);
                    if added_tx.send(event).await.is_err() {
                        return;
                    }
                }
                ChangeKind::Deleted => {
                    state.names.remove(&event.file_name);
                    if deleted_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }

        info!("event stream ended, resubscribing");
        if !backoff_or_cancel(&cancel).await {
            return;
        }
    }
}

/// Waits out the fixed backoff. Returns `false` on cancellation.
async fn backoff_or_cancel(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => true,
    }
}
