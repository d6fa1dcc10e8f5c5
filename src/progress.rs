//! Progress-callback trait for per-document stage markers.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the orchestrator moves each document through the pipeline.
//!
//! # Example
//!
//! ```rust
//! use atas2json::{BatchProgressCallback, PipelineConfig, Stage};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl BatchProgressCallback for StageLogger {
//!     fn on_stage(&self, label: &str, stage: Stage) {
//!         eprintln!("{label}: {stage}");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(StageLogger))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{DocumentError, Stage};
use crate::output::{BatchReport, DocumentOutcome};
use std::sync::Arc;

/// Called by the orchestrator as it processes each document.
///
/// Documents are processed strictly one after another, but implementations
/// must still be `Send + Sync` since the pipeline runs on a Tokio runtime.
/// All methods have default no-op implementations.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after discovery, before the first document.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document enters the pipeline.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the batch
    /// * `label`: source URL or local path
    fn on_document_start(&self, index: usize, total: usize, label: &str) {
        let _ = (index, total, label);
    }

    /// Called when a document moves into a new stage.
    fn on_stage(&self, label: &str, stage: Stage) {
        let _ = (label, stage);
    }

    /// Called when a document finished without a stage failure
    /// (recorded, diverted to a diagnostic file, or had no text).
    fn on_document_complete(&self, index: usize, total: usize, outcome: &DocumentOutcome) {
        let _ = (index, total, outcome);
    }

    /// Called when a document failed at some stage.
    fn on_document_error(&self, index: usize, total: usize, error: &DocumentError) {
        let _ = (index, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, report: &BatchReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
