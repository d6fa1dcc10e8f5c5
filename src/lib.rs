//! # atas2json
//!
//! Turn municipal council session minutes ("atas") published as scanned PDFs
//! into structured voting records.
//!
//! ## Pipeline Overview
//!
//! ```text
//! listing page
//!  │
//!  ├─ 1. List      collect absolute PDF links from the HTML
//!  ├─ 2. Fetch     stream each PDF to ./data (skip names already present)
//!  ├─ 3. Identify  SHA-256 of the bytes → ./atas/<digest>/
//!  ├─ 4. Extract   pdftoppm (or pdfium) → tesseract -l por, page by page
//!  ├─ 5. Analyze   one prompt per document → JSON candidate
//!  └─ 6. Store     dados_votacoes.json, or .invalido when it does not parse
//! ```
//!
//! Documents are processed one at a time. A failure in any stage after
//! discovery is recorded in the [`BatchReport`] and the batch continues.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use atas2json::{run, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = PipelineConfig::builder()
//!         .listing_url("https://camara.example.gov.br/atas?ano=2024")
//!         .build()?;
//!     let report = run(&config).await?;
//!     eprintln!(
//!         "{} recorded, {} failed",
//!         report.stats.recorded, report.stats.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `atas2json` binary (clap + anyhow + tracing-subscriber) |
//! | `pdfium` | on      | In-process rasterizer backend via pdfium-render |
//!
//! The default rasterizer is `pdftoppm` (poppler-utils); `tesseract` with
//! the `por` language pack must be on `PATH` for OCR.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{list_sources, run, run_local, Pipeline};
pub use config::{PipelineConfig, PipelineConfigBuilder, RasterizerBackend};
pub use error::{AtasError, DocumentError, Stage};
pub use output::{BatchReport, BatchStats, DocumentOutcome, DocumentReport, DocumentSource};
pub use pipeline::extract::{ExtractedText, PageText, TextExtractor};
pub use pipeline::llm::{Analysis, RecordAnalyzer};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{MemberVote, SessionMetadata, VotingEvent, VotingRecord};
