//! # edgequake-docextract
//!
//! Extract structured text from PDFs and scanned images with an OCR layout
//! back-end and a Vision Language Model (VLM), side by side.
//!
//! ## Why two pipelines?
//!
//! OCR back-ends find blocks reliably but misread their text; VLMs read text
//! well but are vague about where it sits. Each document therefore goes
//! through both: layout blocks are re-read one by one by the VLM, and every
//! page is also transcribed whole to Markdown. Either result is useful on its
//! own, so a failure in one pipeline never discards the other.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input     base64 upload, local file or URL
//!  ├─ 2. Render    rasterise pages via pdfium (spawn_blocking)
//!  ├─┬─ 3a. Layout    OCR back-end → blocks (fast-generic | high-accuracy)
//!  │ └─ 3b. Blocks    VLM re-extraction, adaptive concurrency, retry + back-off
//!  ├─── 4.  Full text VLM page → Markdown
//!  └─ 5. Assemble  per-pipeline status, blocks and texts grouped by page
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docextract::{extract_path, ExtractionConfig, LayoutMethod};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::builder()
//!         .layout_method(LayoutMethod::FastGeneric)
//!         .fast_endpoint("http://localhost:8000/layout")
//!         .build()?;
//!     let output = extract_path("scan.pdf", &config).await?.into_result()?;
//!     println!("{}", output.full_text.unwrap_or_default());
//!     eprintln!("{} blocks, {} degraded",
//!         output.stats.total_blocks,
//!         output.stats.degraded_blocks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docextract` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docextract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConcurrencyLimits, ExtractionConfig, ExtractionConfigBuilder, LayoutMethod, RetryPolicy};
pub use error::{CallError, DocExtractError};
pub use extract::{extract, extract_base64, extract_pages, extract_path, extract_sync};
pub use output::{
    Block, BoundingBox, ExtractedText, ExtractionOutput, ExtractionResult, ExtractionStats,
    ExtractionTask, LayoutData, Page, PipelineStatus,
};
pub use pipeline::concurrency::ConcurrencyController;
pub use pipeline::input::DocumentInput;
pub use pipeline::layout::{HttpLayoutBackend, LayoutBackend, LayoutRequest};
pub use pipeline::llm::{ProviderModel, VisionModel, VisionRequest};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
