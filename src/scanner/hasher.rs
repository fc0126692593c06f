//! Streaming BLAKE3 content hashing.
//!
//! Files are read in fixed-size chunks so memory use stays flat regardless
//! of file size. The hex digest is the content identity used by both the
//! registry and the content cache.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read buffer size for streaming hashes (64 KiB).
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Hash a file's content, returning the lowercase BLAKE3 hex digest.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash a byte slice, returning the lowercase BLAKE3 hex digest.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
