//! Content addressing: SHA-256 over a file's bytes.
//!
//! The lowercase hex digest names the per-document directory, so the same
//! bytes always land in the same place whatever the filename or source URL.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read block size; memory use stays constant regardless of file size.
const BLOCK_SIZE: usize = 64 * 1024;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the lowercase hex SHA-256 digest of the file at `path`.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    reader_digest(file)
}

/// Digest everything `reader` yields, block by block.
pub fn reader_digest(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest a file on the blocking pool.
pub async fn file_digest_async(path: &Path) -> io::Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || file_digest(&path))
        .await
        .map_err(|e| io::Error::other(format!("digest task panicked: {e}")))?
}
