//! Integration tests for the document pipeline.
//!
//! External tools and the model are replaced by in-process fakes; the
//! listing page and PDF downloads are served by `wiremock`. Nothing here
//! needs pdftoppm, tesseract or an API key.

use async_trait::async_trait;
use atas2json::pipeline::extract::OcrTextExtractor;
use atas2json::pipeline::fetch::fetch_document;
use atas2json::pipeline::ocr::OcrEngine;
use atas2json::pipeline::raster::Rasterizer;
use atas2json::{
    list_sources, Analysis, AtasError, BatchProgressCallback, DocumentError, DocumentOutcome,
    DocumentSource, ExtractedText, MemberVote, PageText, Pipeline, PipelineConfig,
    RecordAnalyzer, SessionMetadata, Stage, TextExtractor, VotingEvent, VotingRecord,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Returns the same extraction for every document.
struct FixedExtractor(ExtractedText);

#[async_trait]
impl TextExtractor for FixedExtractor {
    async fn extract(&self, _pdf: &Path) -> Result<ExtractedText, DocumentError> {
        Ok(self.0.clone())
    }
}

/// Answers every call with `response` and remembers the texts it was given.
struct ScriptedAnalyzer {
    response: String,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, text: &str, _document_id: &str) -> Result<Analysis, DocumentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        Ok(Analysis {
            payload: atas2json::pipeline::postprocess::extract_json_payload(&self.response),
            input_tokens: 100,
            output_tokens: 20,
            duration_ms: 1,
        })
    }
}

/// Fails the first call as a provider error would, then answers `response`.
struct FailFirstAnalyzer {
    response: String,
    calls: AtomicUsize,
}

#[async_trait]
impl RecordAnalyzer for FailFirstAnalyzer {
    async fn analyze(&self, _text: &str, _document_id: &str) -> Result<Analysis, DocumentError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(DocumentError::AnalysisFailed {
                attempts: 1,
                detail: "API error: quota exhausted".into(),
            });
        }
        Ok(Analysis {
            payload: atas2json::pipeline::postprocess::extract_json_payload(&self.response),
            ..Analysis::default()
        })
    }
}

/// Writes `pages` empty page images, or fails for PDFs named `broken*`.
struct FakeRasterizer {
    pages: usize,
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<(), DocumentError> {
        let name = pdf.file_name().unwrap().to_string_lossy();
        if name.starts_with("broken") {
            return Err(DocumentError::RasterizerFailed {
                tool: "fake".into(),
                detail: "exit status: 1".into(),
            });
        }
        for page in 1..=self.pages {
            std::fs::write(out_dir.join(format!("pagina-{page}.png")), b"").unwrap();
        }
        Ok(())
    }
}

/// Recognises "texto da página N"; fails on the pages listed in `fail_on`.
struct FakeOcr {
    fail_on: Vec<usize>,
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn recognize(&self, _image: &Path, page: usize) -> Result<String, DocumentError> {
        if self.fail_on.contains(&page) {
            return Err(DocumentError::OcrFailed {
                page,
                detail: "Tesseract couldn't load any languages".into(),
            });
        }
        Ok(format!("texto da página {page}\n\u{000C}"))
    }
}

#[derive(Default)]
struct StageRecorder {
    stages: Mutex<Vec<Stage>>,
    errors: AtomicUsize,
}

impl BatchProgressCallback for StageRecorder {
    fn on_stage(&self, _label: &str, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn on_document_error(&self, _index: usize, _total: usize, _error: &DocumentError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const RECORD_JSON: &str = r#"```json
{
  "metadata_ata": {
    "ata_id": "x",
    "titulo_sessao": "Sessão Ordinária",
    "data_sessao": "2024-03-12",
    "numero_sessao": 7,
    "tipo_sessao": "Ordinária"
  },
  "votacoes": [
    {
      "objeto_da_votacao": "PL 12/2024",
      "resumo": "Denominação de logradouro",
      "resultado": "Aprovado",
      "votos": [
        { "vereador": "João Araújo", "voto": "Sim" },
        { "vereador": "Conceição Brás", "voto": "contrário" }
      ]
    }
  ]
}
```"#;

fn config_in(dir: &TempDir) -> PipelineConfig {
    PipelineConfig::builder()
        .download_dir(dir.path().join("data"))
        .output_dir(dir.path().join("atas"))
        .scratch_dir(dir.path().join("temp_images"))
        .download_timeout_secs(5)
        .build()
        .unwrap()
}

fn write_pdf(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let p = dir.path().join(name);
    std::fs::write(&p, format!("%PDF-1.4\n{body}")).unwrap();
    p
}

fn page(page: usize, text: &str) -> PageText {
    PageText {
        page,
        text: text.to_string(),
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_ocr_never_calls_the_analyzer() {
    let dir = TempDir::new().unwrap();
    let pdf = write_pdf(&dir, "ata.pdf", "blank scan");
    let analyzer = ScriptedAnalyzer::new(RECORD_JSON);
    let extractor = Arc::new(FixedExtractor(ExtractedText {
        pages: vec![page(1, ""), page(2, "  \n ")],
        failed_pages: vec![],
    }));
    let pipeline = Pipeline::new(&config_in(&dir), extractor, analyzer.clone()).unwrap();

    let report = pipeline
        .process_document(DocumentSource::Local(pdf.clone()), &pdf)
        .await;

    assert!(matches!(report.outcome, DocumentOutcome::NoText));
    assert_eq!(analyzer.calls(), 0);
    let doc_dir = report.directory.unwrap();
    assert!(doc_dir.join("ata.pdf").exists());
    assert!(!doc_dir.join("dados_votacoes.json").exists());
}

#[tokio::test]
async fn failed_ocr_page_is_omitted_and_batch_continues() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let first = write_pdf(&dir, "ata-1.pdf", "one");
    let second = write_pdf(&dir, "ata-2.pdf", "two");

    let extractor = Arc::new(OcrTextExtractor::new(
        Arc::new(FakeRasterizer { pages: 2 }),
        Arc::new(FakeOcr { fail_on: vec![2] }),
        config.scratch_dir.clone(),
    ));
    let analyzer = ScriptedAnalyzer::new(RECORD_JSON);
    let pipeline = Pipeline::new(&config, extractor, analyzer.clone()).unwrap();

    let report = pipeline
        .run_batch(vec![
            DocumentSource::Local(first),
            DocumentSource::Local(second),
        ])
        .await;

    assert_eq!(report.stats.total, 2);
    assert_eq!(report.stats.recorded, 2);
    assert_eq!(
        analyzer.texts.lock().unwrap()[0],
        "texto da página 1",
        "page 2 must be left out, not abort the document"
    );
    let doc = &report.documents[0];
    assert_eq!(doc.pages_total, 2);
    assert_eq!(doc.pages_failed, 1);
    assert_eq!(
        std::fs::read_dir(&config.scratch_dir).unwrap().count(),
        0,
        "page images are deleted after OCR"
    );
}

#[tokio::test]
async fn rasterizer_failure_skips_only_that_document() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let broken = write_pdf(&dir, "broken.pdf", "bad");
    let good = write_pdf(&dir, "ata.pdf", "good");

    let extractor = Arc::new(OcrTextExtractor::new(
        Arc::new(FakeRasterizer { pages: 1 }),
        Arc::new(FakeOcr { fail_on: vec![] }),
        config.scratch_dir.clone(),
    ));
    let analyzer = ScriptedAnalyzer::new(RECORD_JSON);
    let pipeline = Pipeline::new(&config, extractor, analyzer.clone()).unwrap();

    let report = pipeline
        .run_batch(vec![DocumentSource::Local(broken), DocumentSource::Local(good)])
        .await;

    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.recorded, 1);
    assert_eq!(report.failures_at(Stage::Extract).count(), 1);
    match &report.documents[0].outcome {
        DocumentOutcome::Failed { error, .. } => {
            assert!(error.to_string().contains("External tool not found or failed"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn model_failure_skips_only_that_document() {
    let dir = TempDir::new().unwrap();
    let first = write_pdf(&dir, "ata-1.pdf", "one");
    let second = write_pdf(&dir, "ata-2.pdf", "two");
    let extractor = Arc::new(FixedExtractor(ExtractedText {
        pages: vec![page(1, "Ata da sessão")],
        failed_pages: vec![],
    }));
    let analyzer = Arc::new(FailFirstAnalyzer {
        response: RECORD_JSON.to_string(),
        calls: AtomicUsize::new(0),
    });
    let pipeline = Pipeline::new(&config_in(&dir), extractor, analyzer.clone()).unwrap();

    let report = pipeline
        .run_batch(vec![
            DocumentSource::Local(first),
            DocumentSource::Local(second),
        ])
        .await;

    assert_eq!(report.failures_at(Stage::Analyze).count(), 1);
    assert!(!report.documents[0].outcome.is_recorded());
    assert!(report.documents[1].outcome.is_recorded());
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
    let failed_dir = report.documents[0].directory.clone().unwrap();
    assert!(failed_dir.join("texto_extraido.txt").exists());
    assert!(!failed_dir.join("dados_votacoes.json").exists());
}

#[tokio::test]
async fn unparseable_model_output_is_diverted() {
    let dir = TempDir::new().unwrap();
    let pdf = write_pdf(&dir, "ata.pdf", "text");
    let extractor = Arc::new(FixedExtractor(ExtractedText {
        pages: vec![page(1, "Ata da sessão")],
        failed_pages: vec![],
    }));
    let pipeline = Pipeline::new(
        &config_in(&dir),
        extractor,
        ScriptedAnalyzer::new("{\"metadata_ata\":"),
    )
    .unwrap();

    let report = pipeline
        .process_document(DocumentSource::Local(pdf.clone()), &pdf)
        .await;

    let doc_dir = report.directory.clone().unwrap();
    match report.outcome {
        DocumentOutcome::Diagnostic {
            diagnostic_path, ..
        } => {
            assert_eq!(diagnostic_path, doc_dir.join("dados_votacoes.json.invalido"));
            assert_eq!(
                std::fs::read_to_string(diagnostic_path).unwrap(),
                "{\"metadata_ata\":"
            );
        }
        other => panic!("expected diagnostic, got {other:?}"),
    }
    assert!(!doc_dir.join("dados_votacoes.json").exists());
}

#[tokio::test]
async fn record_round_trips_with_accents_and_stage_markers() {
    let dir = TempDir::new().unwrap();
    let pdf = write_pdf(&dir, "ata.pdf", "text");
    let recorder = Arc::new(StageRecorder::default());
    let config = PipelineConfig::builder()
        .output_dir(dir.path().join("atas"))
        .scratch_dir(dir.path().join("temp_images"))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let extractor = Arc::new(FixedExtractor(ExtractedText {
        pages: vec![page(1, "Votação nominal")],
        failed_pages: vec![],
    }));
    let pipeline = Pipeline::new(&config, extractor, ScriptedAnalyzer::new(RECORD_JSON)).unwrap();

    let report = pipeline
        .process_document(DocumentSource::Local(pdf.clone()), &pdf)
        .await;

    let record_path = match report.outcome {
        DocumentOutcome::Recorded { record_path } => record_path,
        other => panic!("expected record, got {other:?}"),
    };
    let vote = |vereador: &str, voto: &str| MemberVote {
        vereador: vereador.to_string(),
        voto: voto.to_string(),
    };
    let expected = VotingRecord {
        metadata_ata: SessionMetadata {
            ata_id: "x".to_string(),
            titulo_sessao: "Sessão Ordinária".to_string(),
            data_sessao: "2024-03-12".to_string(),
            numero_sessao: Some(7),
            tipo_sessao: "Ordinária".to_string(),
        },
        votacoes: vec![VotingEvent {
            objeto_da_votacao: "PL 12/2024".to_string(),
            projetos_relacionados: vec![],
            resumo: "Denominação de logradouro".to_string(),
            resultado: "Aprovado".to_string(),
            votos: vec![vote("João Araújo", "Sim"), vote("Conceição Brás", "contrário")],
        }],
    };
    let record = VotingRecord::load(&record_path).unwrap();
    assert_eq!(record, expected);
    assert_eq!(record.vote_count(), 2);

    let text = std::fs::read_to_string(record_path.with_file_name("texto_extraido.txt")).unwrap();
    assert_eq!(text, "Votação nominal");
    assert_eq!(report.input_tokens, 100);
    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![Stage::Identify, Stage::Extract, Stage::Analyze, Stage::Store]
    );
}

#[tokio::test]
async fn same_bytes_land_in_same_directory() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(&dir, "a.pdf", "identical");
    let b = write_pdf(&dir, "b.pdf", "identical");
    let extractor = Arc::new(FixedExtractor(ExtractedText::default()));
    let pipeline =
        Pipeline::new(&config_in(&dir), extractor, ScriptedAnalyzer::new("{}")).unwrap();

    let ra = pipeline.process_document(DocumentSource::Local(a.clone()), &a).await;
    let rb = pipeline.process_document(DocumentSource::Local(b.clone()), &b).await;

    assert_eq!(ra.digest, rb.digest);
    assert_eq!(ra.directory, rb.directory);
    assert_eq!(ra.digest.unwrap().len(), 64);
}

// ── Discovery and download ───────────────────────────────────────────────────

#[tokio::test]
async fn listing_resolves_relative_and_absolute_links() {
    let server = MockServer::start().await;
    let html = format!(
        r#"<html><body>
            <a href="/docs/a.pdf">Ata 1</a>
            <a href="/noticias/index.html">Notícias</a>
            <a href="{}/docs/b.pdf">Ata 2</a>
        </body></html>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/atas"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::builder()
        .listing_url(format!("{}/atas?ano=2024", server.uri()))
        .scratch_dir(dir.path().join("temp_images"))
        .build()
        .unwrap();

    let urls = list_sources(&config).await.unwrap();

    let expected: Vec<String> = vec![
        format!("{}/docs/a.pdf", server.uri()),
        format!("{}/docs/b.pdf", server.uri()),
    ];
    let got: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn listing_error_status_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/atas"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = PipelineConfig::builder()
        .listing_url(format!("{}/atas", server.uri()))
        .build()
        .unwrap();

    let err = list_sources(&config).await.unwrap_err();
    assert!(matches!(err, AtasError::ListingStatus { status: 503, .. }));
}

#[tokio::test]
async fn second_fetch_reuses_the_file_without_downloading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/ata-12.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 body".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let url = reqwest::Url::parse(&format!("{}/docs/ata-12.pdf", server.uri())).unwrap();

    let first = fetch_document(&client, &url, dir.path()).await.unwrap();
    let second = fetch_document(&client, &url, dir.path()).await.unwrap();

    assert!(!first.reused);
    assert!(second.reused);
    assert_eq!(first.path, second.path);
    assert_eq!(std::fs::read(&second.path).unwrap(), b"%PDF-1.7 body");
}

#[tokio::test]
async fn non_pdf_body_is_rejected_and_not_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/ata.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = reqwest::Url::parse(&format!("{}/docs/ata.pdf", server.uri())).unwrap();

    let err = fetch_document(&reqwest::Client::new(), &url, dir.path())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Fetch);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn download_failure_is_isolated_in_a_url_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/a.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 a".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(StageRecorder::default());
    let config = PipelineConfig::builder()
        .download_dir(dir.path().join("data"))
        .output_dir(dir.path().join("atas"))
        .scratch_dir(dir.path().join("temp_images"))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let extractor = Arc::new(FixedExtractor(ExtractedText {
        pages: vec![page(1, "Ata")],
        failed_pages: vec![],
    }));
    let pipeline = Pipeline::new(&config, extractor, ScriptedAnalyzer::new(RECORD_JSON)).unwrap();

    let report = pipeline
        .run_batch(vec![
            DocumentSource::Url(format!("{}/docs/missing.pdf", server.uri())),
            DocumentSource::Url(format!("{}/docs/a.pdf", server.uri())),
        ])
        .await;

    assert_eq!(report.failures_at(Stage::Fetch).count(), 1);
    assert!(report.documents[1].outcome.is_recorded());
    assert!(dir.path().join("data/a.pdf").exists());
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
}
