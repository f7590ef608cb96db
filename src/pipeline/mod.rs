//! Pipeline stages for document extraction.
//!
//! Each submodule implements one step. Two pipelines share the rendered pages
//! and otherwise run independently:
//!
//! ```text
//!                     ┌─▶ layout ──▶ blocks/scheduler ─┐
//! input ──▶ render ──▶┤   (OCR)      (VLM, adaptive)   ├─▶ assemble
//!                     └─▶ fulltext ────────────────────┘
//!                         (VLM, one call per page)
//! ```
//!
//! 1. [`input`]  — decode base64, read a path or download a URL
//! 2. [`render`] — rasterise PDF pages in `spawn_blocking`; images pass through
//! 3. [`encode`] — PNG + base64 data URLs
//! 4. [`layout`] — OCR back-end call, provider payloads normalised to blocks
//! 5. [`blocks`] and [`scheduler`] — re-read every block with the vision model
//!    under the [`concurrency`] controller's adaptive window
//! 6. [`fulltext`] — whole-page Markdown transcription
//! 7. [`llm`] — the vision-model seam and the shared retry loop
//! 8. [`postprocess`] — deterministic cleanup of model output
//! 9. [`assemble`] — merge both outcomes, with independent status per pipeline

pub mod assemble;
pub mod blocks;
pub mod concurrency;
pub mod encode;
pub mod fulltext;
pub mod input;
pub mod layout;
pub mod llm;
pub mod postprocess;
pub mod render;
pub mod scheduler;
