//! Per-document reports and the batch summary.

use crate::error::{DocumentError, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// Discovered on the listing page.
    Url(String),
    /// Supplied locally; no source URL.
    Local(PathBuf),
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Url(url) => f.write_str(url),
            DocumentSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How processing of one document ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// A parseable record was written as the canonical artifact.
    Recorded { record_path: PathBuf },
    /// The model answered with something unparseable; the raw response was
    /// written next to where the record would be.
    Diagnostic {
        diagnostic_path: PathBuf,
        reason: String,
    },
    /// OCR recovered no text, so the model was not called.
    NoText,
    /// A stage failed; the document produced no record this run.
    Failed { stage: Stage, error: DocumentError },
}

impl DocumentOutcome {
    pub fn failed(error: DocumentError) -> Self {
        DocumentOutcome::Failed {
            stage: error.stage(),
            error,
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, DocumentOutcome::Recorded { .. })
    }
}

/// Result of processing a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub source: DocumentSource,

    /// SHA-256 of the PDF bytes, once computed.
    pub digest: Option<String>,

    /// Per-document directory under the output root, once created.
    pub directory: Option<PathBuf>,

    /// Page images produced by the rasterizer.
    pub pages_total: usize,

    /// Pages whose OCR failed and were left out of the text.
    pub pages_failed: usize,

    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration_ms: u64,

    pub outcome: DocumentOutcome,
}

impl DocumentReport {
    pub(crate) fn new(source: DocumentSource, outcome: DocumentOutcome) -> Self {
        Self {
            source,
            digest: None,
            directory: None,
            pages_total: 0,
            pages_failed: 0,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            outcome,
        }
    }
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub recorded: usize,
    pub diagnostic: usize,
    pub no_text: usize,
    pub failed: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

/// Everything a batch run produced, in processing order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
    pub stats: BatchStats,
}

impl BatchReport {
    /// Assemble the report and tally the stats from the document list.
    pub fn from_documents(documents: Vec<DocumentReport>, total_duration_ms: u64) -> Self {
        let mut stats = BatchStats {
            total: documents.len(),
            total_duration_ms,
            ..BatchStats::default()
        };
        for doc in &documents {
            match doc.outcome {
                DocumentOutcome::Recorded { .. } => stats.recorded += 1,
                DocumentOutcome::Diagnostic { .. } => stats.diagnostic += 1,
                DocumentOutcome::NoText => stats.no_text += 1,
                DocumentOutcome::Failed { .. } => stats.failed += 1,
            }
            stats.total_input_tokens += doc.input_tokens as u64;
            stats.total_output_tokens += doc.output_tokens as u64;
        }
        Self { documents, stats }
    }

    /// Documents that failed at `stage`.
    pub fn failures_at(&self, stage: Stage) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(move |d| {
            matches!(&d.outcome, DocumentOutcome::Failed { stage: s, .. } if *s == stage)
        })
    }
}
