//! Record storage: one directory per content digest.
//!
//! ```text
//! <output_dir>/<sha256>/
//!   ata.pdf                       copy of the source PDF
//!   texto_extraido.txt            OCR text
//!   dados_votacoes.json           canonical record (only when it parses)
//!   dados_votacoes.json.invalido  raw model output that did not parse
//! ```
//!
//! The canonical record is never written unless the candidate parses as
//! JSON. [`persist_record`] does not return an error: every call ends in a
//! canonical file, a diagnostic file, or a logged write failure.

use crate::error::DocumentError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const PDF_FILENAME: &str = "ata.pdf";
pub const TEXT_FILENAME: &str = "texto_extraido.txt";
pub const RECORD_FILENAME: &str = "dados_votacoes.json";
pub const DIAGNOSTIC_SUFFIX: &str = ".invalido";

/// Paths inside one document's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDir {
    root: PathBuf,
}

impl DocumentDir {
    pub fn new(output_dir: &Path, digest: &str) -> Self {
        Self {
            root: output_dir.join(digest),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.root.join(PDF_FILENAME)
    }

    pub fn text_path(&self) -> PathBuf {
        self.root.join(TEXT_FILENAME)
    }

    pub fn record_path(&self) -> PathBuf {
        self.root.join(RECORD_FILENAME)
    }

    pub fn diagnostic_path(&self) -> PathBuf {
        diagnostic_path_for(&self.record_path())
    }

    /// Create the directory if needed.
    pub async fn ensure(&self) -> Result<(), DocumentError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DocumentError::storage(&self.root, e))
    }

    /// Copy the source PDF in, unless a copy is already there.
    ///
    /// The directory is named by the digest, so an existing copy has the
    /// same bytes. The copy goes through a temporary file in the same
    /// directory; an interrupted run never leaves a partial `ata.pdf`.
    pub async fn store_pdf(&self, source: &Path) -> Result<(), DocumentError> {
        let dest = self.pdf_path();
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            debug!("PDF already stored at {}", dest.display());
            return Ok(());
        }
        let (src, dst) = (source.to_path_buf(), dest.clone());
        tokio::task::spawn_blocking(move || copy_atomic(&src, &dst))
            .await
            .map_err(|e| std::io::Error::other(format!("copy task panicked: {e}")))
            .and_then(|copied| copied)
            .map_err(|e| DocumentError::storage(&dest, e))
    }

    /// Write (or overwrite) the extracted text.
    pub async fn store_text(&self, text: &str) -> Result<(), DocumentError> {
        let dest = self.text_path();
        write_atomic(&dest, text.as_bytes()).map_err(|e| DocumentError::storage(&dest, e))
    }
}

/// How [`persist_record`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The candidate parsed and was written pretty-printed.
    Canonical(PathBuf),
    /// The candidate did not parse; it was written verbatim here.
    Diagnostic { path: PathBuf, reason: String },
    /// Neither file could be written. Already logged.
    WriteFailed { path: PathBuf, reason: String },
}

/// `record.json` → `record.json.invalido`.
pub fn diagnostic_path_for(record_path: &Path) -> PathBuf {
    let mut name = record_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(DIAGNOSTIC_SUFFIX);
    record_path.with_file_name(name)
}

/// Validate `candidate` as JSON and persist it.
///
/// On success the record is re-serialised with two-space indentation,
/// keys in the order the model wrote them and non-ASCII text unescaped,
/// and any stale diagnostic file from an earlier run is removed. On parse
/// failure only the diagnostic file is written; an existing canonical
/// record is left untouched.
pub fn persist_record(candidate: &str, record_path: &Path) -> StoreOutcome {
    match serde_json::from_str::<serde_json::Value>(candidate) {
        Ok(value) => {
            let pretty = match serde_json::to_string_pretty(&value) {
                Ok(s) => s,
                Err(e) => return write_failed(record_path, e),
            };
            if let Err(e) = write_atomic(record_path, pretty.as_bytes()) {
                return write_failed(record_path, e);
            }
            let stale = diagnostic_path_for(record_path);
            if stale.exists() {
                if let Err(e) = std::fs::remove_file(&stale) {
                    debug!("Could not remove stale {}: {}", stale.display(), e);
                }
            }
            info!("Record saved: {}", record_path.display());
            StoreOutcome::Canonical(record_path.to_path_buf())
        }
        Err(parse_err) => {
            let diag = diagnostic_path_for(record_path);
            let reason = parse_err.to_string();
            warn!(
                "Model output for {} is not valid JSON ({}); raw response saved to {}",
                record_path.display(),
                reason,
                diag.display()
            );
            match write_atomic(&diag, candidate.as_bytes()) {
                Ok(()) => StoreOutcome::Diagnostic { path: diag, reason },
                Err(e) => write_failed(&diag, e),
            }
        }
    }
}

fn write_failed(path: &Path, e: impl std::fmt::Display) -> StoreOutcome {
    error!("Failed to write {}: {}", path.display(), e);
    StoreOutcome::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Write via a temp file in the same directory, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn copy_atomic(source: &Path, dest: &Path) -> std::io::Result<()> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut input = std::fs::File::open(source)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::copy(&mut input, &mut tmp)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
