//! Pipeline stages for turning session minutes into voting records.
//!
//! Each submodule implements one step; [`crate::batch`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! listing ──▶ fetch ──▶ digest ──▶ extract ──▶ llm ──▶ store
//! (HTML)     (reqwest)  (sha256)   (raster+ocr) (model) (json)
//! ```
//!
//! 1. [`listing`]: fetch the listing page, collect absolute PDF links
//! 2. [`fetch`]: stream each PDF to disk; skip names already present
//! 3. [`digest`]: SHA-256 of the bytes names the document directory
//! 4. [`extract`]: rasterise pages ([`raster`]), OCR them ([`ocr`]) and
//!    join the text in page order
//! 5. [`llm`]: one prompt per document; recover the JSON candidate
//!    via [`postprocess`]
//! 6. [`store`]: validate and persist, or divert to a diagnostic file

pub mod digest;
pub mod extract;
pub mod fetch;
pub mod listing;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod raster;
pub mod store;
