//! Error types for the atas2json library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AtasError`]: **Fatal**: the batch cannot proceed at all (listing
//!   page unreachable, provider not configured, invalid configuration).
//!   Returned as `Err(AtasError)` from the top-level entry points in
//!   [`crate::batch`].
//!
//! * [`DocumentError`]: **Non-fatal**: a single document failed at one
//!   stage (download, rasterizer, model call) but the rest of the batch is
//!   fine. Stored inside [`crate::output::DocumentOutcome`] so callers see a
//!   mixture of successes and documented failures instead of losing the
//!   whole run to one bad document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the atas2json library.
///
/// Per-document failures use [`DocumentError`] and never surface here once
/// discovery has succeeded.
#[derive(Debug, Error)]
pub enum AtasError {
    // ── Discovery errors ──────────────────────────────────────────────────
    /// The listing page URL could not be parsed.
    #[error("Invalid listing URL '{url}': {reason}")]
    InvalidListingUrl { url: String, reason: String },

    /// Connection-level failure while fetching the listing page.
    #[error("Failed to fetch listing page '{url}': {reason}\nCheck your internet connection.")]
    ListingFetchFailed { url: String, reason: String },

    /// The listing page answered with a non-2xx status.
    #[error("Listing page '{url}' returned HTTP {status}")]
    ListingStatus { url: String, status: u16 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A working directory could not be created.
    #[error("Failed to prepare directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The pipeline stage a document was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Identify,
    Extract,
    Analyze,
    Store,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Identify => "identify",
            Stage::Extract => "extract",
            Stage::Analyze => "analyze",
            Stage::Store => "store",
        };
        f.write_str(name)
    }
}

/// A non-fatal error for a single document (or a single page of one).
///
/// The orchestrator records it in the batch report and moves on to the
/// next document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DocumentError {
    /// Download failed: connection error, timeout, non-2xx or not a PDF.
    #[error("Failed to download '{url}': {reason}")]
    Fetch { url: String, reason: String },

    /// The PDF bytes could not be read for digesting.
    #[error("Failed to digest '{path}': {reason}")]
    Identify { path: PathBuf, reason: String },

    /// Copying into or writing the per-document directory failed.
    #[error("Storage error at '{path}': {reason}")]
    Storage { path: PathBuf, reason: String },

    /// The rasterizer could not be run or exited non-zero.
    #[error("External tool not found or failed ({tool}): {detail}")]
    RasterizerFailed { tool: String, detail: String },

    /// OCR failed on one page. Logged and skipped; the page text is omitted.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The text-generation call failed after all attempts.
    #[error("Model call failed after {attempts} attempt(s): {detail}")]
    AnalysisFailed { attempts: u32, detail: String },

    /// The text-generation call exceeded the configured timeout.
    #[error("Model call timed out after {secs}s")]
    AnalysisTimeout { secs: u64 },
}

impl DocumentError {
    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            DocumentError::Fetch { .. } => Stage::Fetch,
            DocumentError::Identify { .. } => Stage::Identify,
            DocumentError::Storage { .. } => Stage::Store,
            DocumentError::RasterizerFailed { .. } | DocumentError::OcrFailed { .. } => {
                Stage::Extract
            }
            DocumentError::AnalysisFailed { .. } | DocumentError::AnalysisTimeout { .. } => {
                Stage::Analyze
            }
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: impl fmt::Display) -> Self {
        DocumentError::Storage {
            path: path.into(),
            reason: source.to_string(),
        }
    }
}
