//! Document download: stream one PDF into the download directory.
//!
//! The skip check is name-based: if a file with the URL's last path segment
//! already exists, it is reused without contacting the server. A remote file
//! replaced under the same name is therefore not noticed. Deciding freshness
//! by digest would require downloading first, which is the cost this skip
//! exists to avoid.
//!
//! Bytes are streamed to a temporary file in the destination directory and
//! renamed into place only after the `%PDF` magic has been seen and the
//! stream ended cleanly, so an interrupted download never leaves a file the
//! skip check would later accept.

use crate::error::DocumentError;
use futures::StreamExt;
use reqwest::Url;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fallback name when a URL has no usable last segment.
const FALLBACK_FILENAME: &str = "documento.pdf";

/// A local PDF produced by [`fetch_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub path: PathBuf,
    /// True when an existing file was reused without downloading.
    pub reused: bool,
}

/// Download `url` into `dest_dir`, or reuse an existing file of the same name.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &Url,
    dest_dir: &Path,
) -> Result<FetchedDocument, DocumentError> {
    let fetch_err = |reason: String| DocumentError::Fetch {
        url: url.to_string(),
        reason,
    };

    let path = dest_dir.join(filename_from_url(url));
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        debug!("Already downloaded, skipping: {}", path.display());
        return Ok(FetchedDocument { path, reused: true });
    }

    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| fetch_err(format!("cannot create {}: {e}", dest_dir.display())))?;

    info!("Downloading {}", url);
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fetch_err(describe_reqwest_error(&e)))?;

    if !response.status().is_success() {
        return Err(fetch_err(format!("HTTP {}", response.status())));
    }

    // Removed automatically on every early return below.
    let mut tmp = tempfile::Builder::new()
        .prefix(".download-")
        .suffix(".part")
        .tempfile_in(dest_dir)
        .map_err(|e| fetch_err(format!("cannot create temp file: {e}")))?;

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    let mut magic = Vec::with_capacity(4);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| fetch_err(describe_reqwest_error(&e)))?;
        if magic.len() < 4 {
            let take = (4 - magic.len()).min(chunk.len());
            magic.extend_from_slice(&chunk[..take]);
        }
        tmp.write_all(&chunk)
            .map_err(|e| fetch_err(format!("write failed: {e}")))?;
        written += chunk.len() as u64;
    }

    if magic != b"%PDF" {
        return Err(fetch_err(format!(
            "response is not a PDF (first bytes: {:?})",
            String::from_utf8_lossy(&magic)
        )));
    }

    tmp.as_file()
        .sync_all()
        .map_err(|e| fetch_err(format!("flush failed: {e}")))?;
    tmp.persist(&path)
        .map_err(|e| fetch_err(format!("cannot move into place: {}", e.error)))?;

    info!("Saved {} ({} bytes)", path.display(), written);
    Ok(FetchedDocument {
        path,
        reused: false,
    })
}

/// Derive the local filename from the URL's last path segment.
///
/// Percent-escapes are decoded so `Ata%20da%2025.pdf` is stored as
/// `Ata da 25.pdf`; path separators and NULs are replaced.
pub fn filename_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .unwrap_or("");
    let decoded = urlencoding::decode(segment)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let cleaned: String = decoded
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
