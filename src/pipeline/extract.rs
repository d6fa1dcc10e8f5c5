//! Text extraction: PDF → ordered page texts.
//!
//! [`TextExtractor`] is the seam the orchestrator depends on.
//! [`OcrTextExtractor`] implements it by composing a [`Rasterizer`] and an
//! [`OcrEngine`] over a scratch directory:
//!
//! 1. remove page images left in the scratch directory by a prior run
//! 2. rasterise every page to `pagina-N.png`
//! 3. order the images by page number
//! 4. OCR each page in order; a failed page is logged and omitted
//! 5. delete each image as soon as it has been read
//!
//! The scratch directory is the only resource shared between documents.
//! Documents are processed one at a time, so clearing it at the start of
//! each extraction is enough to keep pages of different documents apart.
//! Nothing but page images is ever deleted from it.

use crate::config::PipelineConfig;
use crate::error::DocumentError;
use crate::pipeline::ocr::{OcrEngine, TesseractOcr};
use crate::pipeline::postprocess::clean_ocr_text;
use crate::pipeline::raster::{self, Rasterizer, PAGE_PREFIX};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// OCR text of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-indexed page number.
    pub page: usize,
    pub text: String,
}

/// Everything recovered from one PDF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedText {
    /// Successfully recognised pages, in page order.
    pub pages: Vec<PageText>,
    /// Pages whose OCR failed, with the error that was logged.
    pub failed_pages: Vec<DocumentError>,
}

impl ExtractedText {
    /// Page texts joined with newlines, in page order.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True when no page produced any non-whitespace text.
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len() + self.failed_pages.len()
    }
}

/// Capability: PDF in, ordered page texts out.
///
/// `Err` means the whole document could not be read (rasterizer failure);
/// page-level OCR failures are reported inside [`ExtractedText`].
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, pdf: &Path) -> Result<ExtractedText, DocumentError>;
}

/// Rasterise + OCR extractor over a scratch directory.
pub struct OcrTextExtractor {
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    scratch_dir: PathBuf,
}

impl OcrTextExtractor {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn OcrEngine>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rasterizer,
            ocr,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// pdftoppm/pdfium + tesseract, as selected in `config`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            raster::from_config(config),
            Arc::new(TesseractOcr::new(config.ocr_language.clone())),
            config.scratch_dir.clone(),
        )
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}

#[async_trait]
impl TextExtractor for OcrTextExtractor {
    async fn extract(&self, pdf: &Path) -> Result<ExtractedText, DocumentError> {
        let scratch_err = |e: io::Error| DocumentError::storage(&self.scratch_dir, e);

        prepare_scratch_dir(&self.scratch_dir)
            .await
            .map_err(scratch_err)?;

        self.rasterizer.rasterize(pdf, &self.scratch_dir).await?;

        let images = collect_page_images(&self.scratch_dir)
            .await
            .map_err(scratch_err)?;
        info!(
            "{}: {} page image(s) from {}",
            pdf.display(),
            images.len(),
            self.rasterizer.name()
        );

        let mut out = ExtractedText::default();
        for (i, image) in images.iter().enumerate() {
            let page = i + 1;
            match self.ocr.recognize(image, page).await {
                Ok(raw) => out.pages.push(PageText {
                    page,
                    text: clean_ocr_text(&raw),
                }),
                Err(e) => {
                    warn!("{}: {}", pdf.display(), e);
                    out.failed_pages.push(e);
                }
            }
            if let Err(e) = tokio::fs::remove_file(image).await {
                debug!("Could not remove {}: {}", image.display(), e);
            }
        }

        Ok(out)
    }
}

/// Create the scratch directory and remove page images left by a prior run.
///
/// Only files named like page images are deleted; anything else in the
/// directory, subdirectories included, is left alone.
pub async fn prepare_scratch_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() || !is_page_image(&path) {
            continue;
        }
        tokio::fs::remove_file(&path).await?;
        debug!("Removed stale page image {}", path.display());
    }
    Ok(())
}

fn is_page_image(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with(PAGE_PREFIX) && name.ends_with(".png"))
}

/// List the `pagina-N.png` files in `dir`, ordered by page number.
///
/// pdftoppm zero-pads N to the width of the page count, so lexicographic
/// order already matches page order; sorting on the parsed number as well
/// keeps the order right for any unpadded producer.
pub async fn collect_page_images(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut pages: Vec<(Option<u64>, PathBuf)> = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_page_image(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            pages.push((page_number(name), path.clone()));
        }
    }
    pages.sort();
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

/// The trailing number in `pagina-07.png` → `Some(7)`.
fn page_number(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(".png")?;
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}
