use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::filetype::DEFAULT_BINARY_SIGNATURES;

/// Session settings, read-only from the core's perspective.
///
/// Persistence to disk belongs to the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Directory downloaded files are written to.
    pub download_path: PathBuf,
    /// When set, payloads are encrypted with `password` before upload and
    /// decrypted after download.
    pub encrypted: bool,
    pub password: String,
    /// Header signatures that identify a payload as binary. Binary payloads
    /// are never encrypted and never opened as editable text.
    pub binary_signatures: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9000,
            download_path: PathBuf::from("."),
            encrypted: false,
            password: String::new(),
            binary_signatures: DEFAULT_BINARY_SIGNATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Settings {
    /// WebSocket endpoint the session connects to.
    pub fn endpoint_url(&self) -> String {
        format!("ws://{}:{}/rpc", self.host, self.port)
    }
}
