//! Binary-content heuristic.
//!
//! Executable formats carry their magic in the first bytes of the file;
//! the window at offset 1..4 holds the printable part ("ELF", "EXE").
//! Binary payloads are transferred in clear form even when encryption is
//! enabled, and are refused as editable text.

/// Signatures recognised as binary by default.
pub const DEFAULT_BINARY_SIGNATURES: &[&str] = &["ELF", "EXE"];

/// Returns `true` if the payload header matches a known binary signature.
///
/// Payloads shorter than four bytes cannot carry a signature and are
/// treated as text.
pub fn is_binary_payload(data: &[u8], signatures: &[String]) -> bool {
    if data.len() < 4 {
        return false;
    }

    let header = &data[1..4];
    signatures.iter().any(|sig| sig.as_bytes() == header)
}
