//! CLI binary for atas2json.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints the batch summary.

use anyhow::{Context, Result};
use atas2json::{
    list_sources, run, run_local, BatchProgressCallback, BatchReport, DocumentError,
    DocumentOutcome, PipelineConfig, ProgressCallback, RasterizerBackend, Stage,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the batch, one log line per
/// finished document, the current stage in the bar message.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the document currently in flight.
    started: Mutex<Option<Instant>>,
}

/// Spinner prefix and message shown before the batch starts.
fn initial_status(local: bool) -> (&'static str, &'static str) {
    if local {
        ("Preparing", "Resolving model provider…")
    } else {
        ("Discovering", "Reading listing page…")
    }
}

impl CliProgressCallback {
    fn new(local: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        let (prefix, message) = initial_status(local);
        bar.set_prefix(prefix);
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    /// Stop the spinner when the run ends before `on_batch_complete`.
    fn abandon(&self) {
        self.bar.finish_and_clear();
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut g| g.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} atas  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_documents as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Processing");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_documents} document(s) to process…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, _label: &str) {
        if let Ok(mut g) = self.started.lock() {
            *g = Some(Instant::now());
        }
    }

    fn on_stage(&self, label: &str, stage: Stage) {
        self.bar.set_message(format!("{stage}  {}", dim(short_label(label))));
    }

    fn on_document_complete(&self, index: usize, total: usize, outcome: &DocumentOutcome) {
        let secs = self.elapsed_secs();
        let (mark, detail) = match outcome {
            DocumentOutcome::Recorded { record_path } => {
                (green("✓"), record_path.display().to_string())
            }
            DocumentOutcome::Diagnostic {
                diagnostic_path, ..
            } => (
                yellow("⚠"),
                format!("invalid JSON → {}", diagnostic_path.display()),
            ),
            DocumentOutcome::NoText => (dim("·"), "no text recovered".to_string()),
            DocumentOutcome::Failed { stage, error } => (red("✗"), format!("[{stage}] {error}")),
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            mark,
            index,
            total,
            detail,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &DocumentError) {
        let secs = self.elapsed_secs();
        let msg = error.to_string();
        let msg = if msg.chars().count() > 100 {
            format!("{}\u{2026}", msg.chars().take(99).collect::<String>())
        } else {
            msg
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  [{}] {}  {}",
            red("✗"),
            index,
            total,
            error.stage(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}

/// Last path segment of a URL or path, for the bar message.
fn short_label(label: &str) -> &str {
    label.rsplit(['/', '\\']).next().unwrap_or(label)
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process every PDF on a listing page
  atas2json --listing-url 'https://camara.example.gov.br/atas?ano=2024'

  # Only show which PDFs would be processed
  atas2json --listing-url 'https://camara.example.gov.br/atas' --list-only

  # Process local files
  atas2json data/ata-12.pdf data/ata-13.pdf

  # Machine-readable batch report
  atas2json --json data/*.pdf > report.json

OUTPUT LAYOUT:
  atas/<sha256>/ata.pdf                       copy of the source PDF
  atas/<sha256>/texto_extraido.txt            OCR text
  atas/<sha256>/dados_votacoes.json           voting record
  atas/<sha256>/dados_votacoes.json.invalido  raw model output that did not parse

EXTERNAL TOOLS:
  pdftoppm    poppler-utils (default rasterizer)
  tesseract   with the Portuguese language pack (tesseract-ocr-por)

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         libpdfium location for --rasterizer pdfium
  RUST_LOG                Log filter, e.g. atas2json=debug
"#;

/// Extract voting records from council session minutes.
#[derive(Parser, Debug)]
#[command(
    name = "atas2json",
    version,
    about = "Extract voting records from council session minutes (PDF) with OCR and an LLM",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF files. When given, the listing page is not used.
    pdfs: Vec<PathBuf>,

    /// Listing page whose PDF links are processed.
    #[arg(long, env = "ATAS_LISTING_URL")]
    listing_url: Option<String>,

    /// Print the discovered PDF URLs and exit.
    #[arg(long)]
    list_only: bool,

    /// Where downloaded PDFs are kept.
    #[arg(long, env = "ATAS_DOWNLOAD_DIR", default_value = "data")]
    download_dir: PathBuf,

    /// Root of the per-document output directories.
    #[arg(short, long, env = "ATAS_OUTPUT_DIR", default_value = "atas")]
    output_dir: PathBuf,

    /// Scratch directory for page images; emptied before every document.
    #[arg(long, env = "ATAS_SCRATCH_DIR", default_value = "temp_images")]
    scratch_dir: PathBuf,

    /// LLM model ID.
    #[arg(long, env = "ATAS_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "ATAS_PROVIDER")]
    provider: Option<String>,

    /// Page rasterizer.
    #[arg(long, env = "ATAS_RASTERIZER", value_enum, default_value = "pdftoppm")]
    rasterizer: RasterizerArg,

    /// Rasterization DPI (72–600).
    #[arg(long, env = "ATAS_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tesseract language code.
    #[arg(long, env = "ATAS_OCR_LANG", default_value = "por")]
    ocr_lang: String,

    /// Max LLM output tokens per document.
    #[arg(long, env = "ATAS_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "ATAS_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Extra attempts on LLM failure (0 = single request).
    #[arg(long, env = "ATAS_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// HTTP connect/read timeout in seconds.
    #[arg(long, env = "ATAS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "ATAS_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "ATAS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ATAS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ATAS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the completion line.
    #[arg(short, long, env = "ATAS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RasterizerArg {
    Pdftoppm,
    Pdfium,
}

impl From<RasterizerArg> for RasterizerBackend {
    fn from(v: RasterizerArg) -> Self {
        match v {
            RasterizerArg::Pdftoppm => RasterizerBackend::Pdftoppm,
            RasterizerArg::Pdfium => RasterizerBackend::Pdfium,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are muted while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let spinner = show_progress.then(|| CliProgressCallback::new(!cli.pdfs.is_empty()));
    let abandon_spinner = || {
        if let Some(ref s) = spinner {
            s.abandon();
        }
    };
    let progress_cb: Option<ProgressCallback> = spinner
        .clone()
        .map(|s| s as Arc<dyn BatchProgressCallback>);

    let config = build_config(&cli, progress_cb).inspect_err(|_| abandon_spinner())?;

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list_only {
        let urls = list_sources(&config)
            .await
            .context("Failed to read the listing page")?;
        for url in &urls {
            println!("{url}");
        }
        if !cli.quiet {
            eprintln!("{} {} PDF link(s)", green("✔"), bold(&urls.len().to_string()));
        }
        return Ok(());
    }

    // ── Run batch ────────────────────────────────────────────────────────
    let result = if cli.pdfs.is_empty() {
        run(&config).await
    } else {
        run_local(&cli.pdfs, &config).await
    };
    let report = result
        .inspect_err(|_| abandon_spinner())
        .context("Batch aborted")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    print_completion(&report, &config);
    Ok(())
}

/// The final line, printed whatever happened to individual documents.
fn print_completion(report: &BatchReport, config: &PipelineConfig) {
    let s = &report.stats;
    let mark = if s.failed == 0 && s.diagnostic == 0 {
        green("✔")
    } else if s.recorded == 0 && s.total > 0 {
        red("✘")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{} Done: {}/{} recorded, {} invalid JSON, {} without text, {} failed  {}ms  →  {}",
        mark,
        bold(&s.recorded.to_string()),
        s.total,
        s.diagnostic,
        s.no_text,
        if s.failed > 0 {
            red(&s.failed.to_string())
        } else {
            s.failed.to_string()
        },
        s.total_duration_ms,
        bold(&config.output_dir.display().to_string()),
    );
    if s.total_input_tokens > 0 {
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&s.total_input_tokens.to_string()),
            dim(&s.total_output_tokens.to_string()),
        );
    }
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .download_dir(&cli.download_dir)
        .output_dir(&cli.output_dir)
        .scratch_dir(&cli.scratch_dir)
        .rasterizer(cli.rasterizer.into())
        .dpi(cli.dpi)
        .ocr_language(&cli.ocr_lang)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref url) = cli.listing_url {
        builder = builder.listing_url(url);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
