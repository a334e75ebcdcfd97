//! Stowbox session core.
//!
//! A [`session::FileSession`] owns everything one client needs against a
//! remote vault: size-branched chunked transfers, collision-safe naming, a
//! local metadata cache, optional symmetric encryption, and a background
//! reconciler that filters the vault's push notifications down to genuine
//! remote changes.

pub mod crypto;
pub mod engine;
pub mod error;
pub mod filetype;
pub mod metadata;
pub mod naming;
pub mod notify;
pub mod reconciler;
pub mod remote;
pub mod session;
pub mod settings;
pub mod store;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::ClientError;
pub use metadata::{FileRecord, MetadataCache};
pub use notify::{LogNotifier, Notifier};
pub use reconciler::{ChangeEvent, ChangeKind};
pub use remote::RemoteFileStore;
pub use session::FileSession;
pub use settings::Settings;
pub use store::FileStore;
