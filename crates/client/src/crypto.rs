//! Password-keyed symmetric transform for file payloads.
//!
//! ChaCha20 keystream with key and nonce derived from the password, applied
//! from position zero on every call. The transform is length-preserving and
//! self-inverse, so whole payloads and individual chunks of a streamed
//! transfer are decryptable on their own.

use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use sha2::{Digest, Sha256};

fn derive_key(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

fn derive_nonce(password: &str) -> [u8; 12] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(b":stowbox-nonce");
    let digest: [u8; 32] = hasher.finalize().into();

    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&digest[..12]);
    nonce
}

fn apply_keystream(password: &str, data: &[u8]) -> Vec<u8> {
    let key = derive_key(password);
    let nonce = derive_nonce(password);

    let mut buf = data.to_vec();
    let mut cipher = ChaCha20::new(&key.into(), &nonce.into());
    cipher.apply_keystream(&mut buf);
    buf
}

/// Encrypts `data` under `password`.
pub fn encrypt(password: &str, data: &[u8]) -> Vec<u8> {
    apply_keystream(password, data)
}

/// Decrypts `data` under `password`.
pub fn decrypt(password: &str, data: &[u8]) -> Vec<u8> {
    apply_keystream(password, data)
}
