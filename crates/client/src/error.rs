use stowbox_connection::RpcError;

/// Errors surfaced to the presentation layer.
///
/// None of these terminate the process; every operation returns its failure
/// to the invoking layer for display.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The RPC channel failed: connection error, timeout, or broken stream.
    #[error("transport failure: {0}")]
    Transport(#[from] RpcError),

    /// The RPC completed but the vault's success flag was false.
    #[error("vault refused operation: {0}")]
    Protocol(String),

    /// A local file could not be opened, read, or written. Surfaced before
    /// any RPC is attempted.
    #[error("local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),

    /// The operation was refused by the client itself (binary payload
    /// treated as editable text, naming cap exceeded).
    #[error("{0}")]
    Validation(String),
}
