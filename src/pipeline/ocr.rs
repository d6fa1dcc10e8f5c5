//! OCR: recognise the text of one page image.

use crate::error::DocumentError;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Capability: image in, recognised text out.
///
/// `page` is the 1-indexed page number, used only for error attribution.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path, page: usize) -> Result<String, DocumentError>;
}

/// Runs `tesseract <image> stdout -l <language>`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    program: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            program: "tesseract".to_string(),
            language: language.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &Path, page: usize) -> Result<String, DocumentError> {
        let output = tokio::process::Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|e| DocumentError::OcrFailed {
                page,
                detail: format!("cannot run {}: {e}", self.program),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocumentError::OcrFailed {
                page,
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("Page {}: {} chars recognised", page, text.len());
        Ok(text)
    }
}
