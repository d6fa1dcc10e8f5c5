//! Batch orchestration: discover → fetch → identify → extract → analyze → store.
//!
//! Documents are processed strictly one after another. Every per-document
//! step returns a `Result<_, DocumentError>`; [`Pipeline::process_document`]
//! turns the first error into a [`DocumentOutcome::Failed`] and the batch
//! moves on. Only discovery and setup (provider, config, output directory)
//! can fail the whole run with an [`AtasError`]; [`run`] and [`run_local`]
//! create the output directory before the first document.

use crate::config::PipelineConfig;
use crate::error::{AtasError, DocumentError, Stage};
use crate::output::{BatchReport, DocumentOutcome, DocumentReport, DocumentSource};
use crate::pipeline::digest::file_digest_async;
use crate::pipeline::extract::{OcrTextExtractor, TextExtractor};
use crate::pipeline::fetch::fetch_document;
use crate::pipeline::listing::{build_client, list_pdf_urls};
use crate::pipeline::llm::{LlmRecordAnalyzer, RecordAnalyzer};
use crate::pipeline::store::{persist_record, DocumentDir, StoreOutcome};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use edgequake_llm::{LLMProvider, ProviderFactory};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Discover every PDF on the configured listing page and process each one.
///
/// Fails only when the listing page cannot be read or the pipeline cannot
/// be set up. Per-document failures are reported in the returned
/// [`BatchReport`].
pub async fn run(config: &PipelineConfig) -> Result<BatchReport, AtasError> {
    let pipeline = Pipeline::from_config(config).await?;
    pipeline.prepare_output_dir().await?;
    let urls = list_pdf_urls(&pipeline.client, require_listing_url(config)?).await?;
    let sources = urls
        .into_iter()
        .map(|u| DocumentSource::Url(u.to_string()))
        .collect();
    Ok(pipeline.run_batch(sources).await)
}

/// Process local PDF files; no listing page and no downloads.
pub async fn run_local(
    paths: &[PathBuf],
    config: &PipelineConfig,
) -> Result<BatchReport, AtasError> {
    let pipeline = Pipeline::from_config(config).await?;
    pipeline.prepare_output_dir().await?;
    let sources = paths.iter().cloned().map(DocumentSource::Local).collect();
    Ok(pipeline.run_batch(sources).await)
}

/// Fetch the listing page and return its PDF links without downloading them.
pub async fn list_sources(config: &PipelineConfig) -> Result<Vec<Url>, AtasError> {
    let client = build_client(config.download_timeout_secs)?;
    list_pdf_urls(&client, require_listing_url(config)?).await
}

fn require_listing_url(config: &PipelineConfig) -> Result<&str, AtasError> {
    config.listing_url.as_deref().ok_or_else(|| {
        AtasError::InvalidConfig(
            "no listing URL configured; set one or pass local PDF paths".to_string(),
        )
    })
}

/// The per-document pipeline with its collaborators wired in.
///
/// Build it with [`Pipeline::from_config`] for the real rasterizer, OCR and
/// model provider, or with [`Pipeline::new`] to substitute any of them.
pub struct Pipeline {
    output_dir: PathBuf,
    download_dir: PathBuf,
    client: reqwest::Client,
    extractor: Arc<dyn TextExtractor>,
    analyzer: Arc<dyn RecordAnalyzer>,
    progress: ProgressCallback,
}

impl Pipeline {
    /// Wire a pipeline from explicit collaborators.
    ///
    /// Directories, timeouts and the progress callback come from `config`.
    pub fn new(
        config: &PipelineConfig,
        extractor: Arc<dyn TextExtractor>,
        analyzer: Arc<dyn RecordAnalyzer>,
    ) -> Result<Self, AtasError> {
        Ok(Self {
            output_dir: config.output_dir.clone(),
            download_dir: config.download_dir.clone(),
            client: build_client(config.download_timeout_secs)?,
            extractor,
            analyzer,
            progress: config
                .progress_callback
                .clone()
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
        })
    }

    /// Resolve the model provider and build the OCR extractor from `config`.
    pub async fn from_config(config: &PipelineConfig) -> Result<Self, AtasError> {
        let provider = resolve_provider(config)?;
        debug!(
            "Provider resolved (requested provider={:?} model={})",
            config.provider_name,
            config.model_or_default()
        );
        let analyzer = Arc::new(LlmRecordAnalyzer::new(provider, config));
        let extractor = Arc::new(OcrTextExtractor::from_config(config));
        Self::new(config, extractor, analyzer)
    }

    /// Create the output directory. A batch cannot store anything without
    /// it, so [`run`] and [`run_local`] stop here on failure.
    pub async fn prepare_output_dir(&self) -> Result<(), AtasError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AtasError::Io {
                path: self.output_dir.clone(),
                source: e,
            })
    }

    /// Process `sources` in order and summarise the outcome.
    ///
    /// Never fails: each document ends in some [`DocumentOutcome`]. Call
    /// [`Pipeline::prepare_output_dir`] first to fail fast on an unusable
    /// output directory.
    pub async fn run_batch(&self, sources: Vec<DocumentSource>) -> BatchReport {
        let start = Instant::now();
        let total = sources.len();

        self.progress.on_batch_start(total);

        let mut documents = Vec::with_capacity(total);
        for (i, source) in sources.into_iter().enumerate() {
            let index = i + 1;
            let label = source.to_string();
            info!("[{}/{}] {}", index, total, label);
            self.progress.on_document_start(index, total, &label);

            let report = self.process_source(source).await;
            match &report.outcome {
                DocumentOutcome::Failed { stage, error } => {
                    warn!(
                        "[{}/{}] {} failed at {} (digest {}): {}",
                        index,
                        total,
                        label,
                        stage,
                        report.digest.as_deref().unwrap_or("unknown"),
                        error
                    );
                    self.progress.on_document_error(index, total, error);
                }
                outcome => self.progress.on_document_complete(index, total, outcome),
            }
            documents.push(report);
        }

        let report = BatchReport::from_documents(documents, start.elapsed().as_millis() as u64);
        info!(
            "Batch finished: {} document(s), {} recorded, {} diagnostic, {} without text, {} failed",
            report.stats.total,
            report.stats.recorded,
            report.stats.diagnostic,
            report.stats.no_text,
            report.stats.failed
        );
        self.progress.on_batch_complete(&report);
        report
    }

    /// Fetch the document if it is remote, then process it.
    pub async fn process_source(&self, source: DocumentSource) -> DocumentReport {
        let pdf_path = match &source {
            DocumentSource::Local(path) => path.clone(),
            DocumentSource::Url(raw) => {
                self.progress.on_stage(raw, Stage::Fetch);
                match self.fetch(raw).await {
                    Ok(path) => path,
                    Err(e) => {
                        return DocumentReport::new(source, DocumentOutcome::failed(e));
                    }
                }
            }
        };
        self.process_document(source, &pdf_path).await
    }

    async fn fetch(&self, raw: &str) -> Result<PathBuf, DocumentError> {
        let url = Url::parse(raw).map_err(|e| DocumentError::Fetch {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        let fetched = fetch_document(&self.client, &url, &self.download_dir).await?;
        if fetched.reused {
            info!("Using existing download {}", fetched.path.display());
        }
        Ok(fetched.path)
    }

    /// Run one local PDF through identify → extract → analyze → store.
    pub async fn process_document(&self, source: DocumentSource, pdf: &Path) -> DocumentReport {
        let start = Instant::now();
        let label = source.to_string();
        let mut report = DocumentReport::new(source, DocumentOutcome::NoText);

        let outcome = match self.try_process(&label, pdf, &mut report).await {
            Ok(outcome) => outcome,
            Err(e) => DocumentOutcome::failed(e),
        };
        report.outcome = outcome;
        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    async fn try_process(
        &self,
        label: &str,
        pdf: &Path,
        report: &mut DocumentReport,
    ) -> Result<DocumentOutcome, DocumentError> {
        self.progress.on_stage(label, Stage::Identify);
        let digest = file_digest_async(pdf)
            .await
            .map_err(|e| DocumentError::Identify {
                path: pdf.to_path_buf(),
                reason: e.to_string(),
            })?;
        debug!("{} → {}", label, digest);
        report.digest = Some(digest.clone());

        let dir = DocumentDir::new(&self.output_dir, &digest);
        dir.ensure().await?;
        dir.store_pdf(pdf).await?;
        report.directory = Some(dir.root().to_path_buf());

        self.progress.on_stage(label, Stage::Extract);
        let extracted = self.extractor.extract(pdf).await?;
        report.pages_total = extracted.page_count();
        report.pages_failed = extracted.failed_pages.len();

        let text = extracted.text();
        dir.store_text(&text).await?;

        if extracted.is_empty() {
            info!("{}: no text recovered, skipping analysis", label);
            return Ok(DocumentOutcome::NoText);
        }

        self.progress.on_stage(label, Stage::Analyze);
        let analysis = self.analyzer.analyze(&text, &digest).await?;
        report.input_tokens = analysis.input_tokens;
        report.output_tokens = analysis.output_tokens;

        self.progress.on_stage(label, Stage::Store);
        match persist_record(&analysis.payload, &dir.record_path()) {
            StoreOutcome::Canonical(record_path) => Ok(DocumentOutcome::Recorded { record_path }),
            StoreOutcome::Diagnostic { path, reason } => Ok(DocumentOutcome::Diagnostic {
                diagnostic_path: path,
                reason,
            }),
            StoreOutcome::WriteFailed { path, reason } => {
                Err(DocumentError::Storage { path, reason })
            }
        }
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AtasError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AtasError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the model provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` with the configured (or default) model.
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. `GEMINI_API_KEY` present: Gemini with the configured model.
/// 5. Whatever [`ProviderFactory::from_env`] finds.
fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, AtasError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("gemini", config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AtasError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
