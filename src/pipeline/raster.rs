//! Page rasterisation: turn a PDF into one PNG per page.
//!
//! Both backends write `pagina-N.png` files into the scratch directory with
//! N zero-padded to the width of the page count (pdftoppm's own scheme), so
//! [`crate::pipeline::extract::collect_page_images`] can recover page order
//! from the filenames alone.
//!
//! A rasterizer failure is a setup problem (tool missing, unreadable PDF),
//! not a per-page one: the whole document is skipped.

use crate::config::{PipelineConfig, RasterizerBackend};
use crate::error::DocumentError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Filename prefix of every page image.
pub const PAGE_PREFIX: &str = "pagina";

/// Capability: render every page of `pdf` into `out_dir` as `pagina-N.png`.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Short tool name for diagnostics.
    fn name(&self) -> &str;

    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<(), DocumentError>;
}

/// Build the rasterizer selected in `config`.
pub fn from_config(config: &PipelineConfig) -> Arc<dyn Rasterizer> {
    match config.rasterizer {
        RasterizerBackend::Pdftoppm => Arc::new(PdftoppmRasterizer::new(config.dpi)),
        #[cfg(feature = "pdfium")]
        RasterizerBackend::Pdfium => Arc::new(PdfiumRasterizer::new(config.dpi)),
        #[cfg(not(feature = "pdfium"))]
        RasterizerBackend::Pdfium => {
            tracing::warn!("Built without the `pdfium` feature; falling back to pdftoppm");
            Arc::new(PdftoppmRasterizer::new(config.dpi))
        }
    }
}

// ── pdftoppm ─────────────────────────────────────────────────────────────

/// Spawns `pdftoppm -png -r <dpi> <pdf> <out_dir>/pagina`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: String,
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self {
            program: "pdftoppm".to_string(),
            dpi,
        }
    }

    /// Use a different executable (e.g. an absolute path).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    fn name(&self) -> &str {
        &self.program
    }

    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<(), DocumentError> {
        let prefix = out_dir.join(PAGE_PREFIX);
        debug!("{} -png -r {} {:?} {:?}", self.program, self.dpi, pdf, prefix);

        let output = tokio::process::Command::new(&self.program)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf)
            .arg(&prefix)
            .output()
            .await
            .map_err(|e| DocumentError::RasterizerFailed {
                tool: self.program.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocumentError::RasterizerFailed {
                tool: self.program.clone(),
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Renders in-process through libpdfium.
///
/// The library is bound at call time from `PDFIUM_LIB_PATH` when set,
/// otherwise from the system library search path.
#[cfg(feature = "pdfium")]
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
}

#[cfg(feature = "pdfium")]
impl PdfiumRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

#[cfg(feature = "pdfium")]
#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    fn name(&self) -> &str {
        "pdfium"
    }

    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<(), DocumentError> {
        let pdf = pdf.to_path_buf();
        let out_dir = out_dir.to_path_buf();
        let dpi = self.dpi;

        tokio::task::spawn_blocking(move || pdfium_render_blocking(&pdf, &out_dir, dpi))
            .await
            .map_err(|e| DocumentError::RasterizerFailed {
                tool: "pdfium".into(),
                detail: format!("render task panicked: {e}"),
            })?
    }
}

#[cfg(feature = "pdfium")]
fn pdfium_render_blocking(pdf: &Path, out_dir: &Path, dpi: u32) -> Result<(), DocumentError> {
    use pdfium_render::prelude::*;

    let fail = |detail: String| DocumentError::RasterizerFailed {
        tool: "pdfium".into(),
        detail,
    };

    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path),
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| fail(format!("cannot bind libpdfium: {e:?}")))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_file(pdf, None)
        .map_err(|e| fail(format!("cannot open {}: {e:?}", pdf.display())))?;

    let pages = document.pages();
    let total = pages.len() as usize;
    let width = total.to_string().len();
    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| fail(format!("page {}: {e:?}", idx + 1)))?;
        let path = out_dir.join(format!("{PAGE_PREFIX}-{:0width$}.png", idx + 1));
        bitmap
            .as_image()
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| fail(format!("page {}: cannot write PNG: {e}", idx + 1)))?;
    }

    tracing::info!("pdfium rendered {} page(s) of {}", total, pdf.display());
    Ok(())
}
