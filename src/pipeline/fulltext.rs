//! Full-document pipeline: transcribe every page image straight to Markdown.
//!
//! Runs independently of layout detection and shares nothing with it but the
//! rendered pages. Pages go through the same retry policy as blocks but not
//! through the adaptive controller; a small fixed `buffered` window is enough
//! here since there is one call per page, not per block.

use crate::config::ExtractionConfig;
use crate::error::DocExtractError;
use crate::output::Page;
use crate::pipeline::llm::{complete_with_retry, VisionModel, VisionRequest};
use crate::pipeline::postprocess;
use crate::prompts;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-page transcriptions and the joined document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullText {
    /// Cleaned Markdown of each page, in page order.
    pub pages: Vec<String>,
    pub markdown: String,
}

pub fn page_request(page: &Page, total_pages: usize, config: &ExtractionConfig) -> VisionRequest {
    VisionRequest {
        system_prompt: prompts::PAGE_SYSTEM_PROMPT.to_string(),
        user_prompt: prompts::page_prompt(page.page_number, total_pages),
        image_data_url: Arc::clone(&page.image_data_url),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Transcribe one page. Fails once the retry budget is spent.
pub async fn extract_page_markdown(
    model: &dyn VisionModel,
    page: &Page,
    total_pages: usize,
    config: &ExtractionConfig,
) -> Result<String, DocExtractError> {
    let request = page_request(page, total_pages, config);
    let label = format!("page {}", page.page_number);

    let done = complete_with_retry(model, &request, &config.retry_policy(), &label, |_| {})
        .await
        .map_err(|e| DocExtractError::FullTextFailed {
            page: page.page_number,
            attempts: e.attempts,
            detail: e.last_error.to_string(),
        })?;

    let markdown = postprocess::clean_markdown(&done.text);
    debug!("Page {}: {} chars of markdown", page.page_number, markdown.len());
    Ok(markdown)
}

/// Transcribe all pages, at most `full_text_concurrency` at a time.
///
/// Output order follows page order regardless of completion order.
pub async fn extract_full_text(
    model: &dyn VisionModel,
    pages: &[Page],
    config: &ExtractionConfig,
) -> Result<FullText, DocExtractError> {
    let total = pages.len();
    info!("Full-text extraction of {} pages", total);

    let texts: Vec<String> = stream::iter(
        pages
            .iter()
            .map(|page| extract_page_markdown(model, page, total, config)),
    )
    .buffered(config.full_text_concurrency.max(1))
    .try_collect()
    .await?;

    let markdown = join_pages(&texts);
    Ok(FullText {
        pages: texts,
        markdown,
    })
}

/// `## Page N` heading per page, `---` between pages.
pub fn join_pages(pages: &[String]) -> String {
    if pages.is_empty() {
        return String::new();
    }
    let body = pages
        .iter()
        .enumerate()
        .map(|(i, md)| format!("## Page {}\n\n{}", i + 1, md.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    format!("{body}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers `# P<n>` for page n, after a delay that favours later pages.
    struct PerPage {
        failing_page: Option<usize>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl VisionModel for PerPage {
        async fn complete(&self, request: &VisionRequest) -> Result<String, CallError> {
            *self.calls.lock().unwrap() += 1;
            let n: usize = request
                .user_prompt
                .split_whitespace()
                .nth(2)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(100 * (10 - n as u64))).await;
            if self.failing_page == Some(n) {
                return Err(CallError::new(Some(500), "page model down"));
            }
            Ok(format!("```markdown\n# P{n}\n```"))
        }
    }

    fn pages(n: usize) -> Vec<Page> {
        (0..n).map(|i| Page::new(i, 10, 10, "data:image/png;base64,AA==")).collect()
    }

    #[test]
    fn join_adds_headings_and_separators() {
        let md = join_pages(&["# A\n".into(), "# B\n".into()]);
        assert_eq!(md, "## Page 1\n\n# A\n\n---\n\n## Page 2\n\n# B\n");
        assert_eq!(join_pages(&[]), "");
    }

    #[tokio::test(start_paused = true)]
    async fn pages_come_back_in_order_and_cleaned() {
        let model = PerPage {
            failing_page: None,
            calls: Mutex::new(0),
        };
        let out = extract_full_text(&model, &pages(3), &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(out.pages, vec!["# P1\n", "# P2\n", "# P3\n"]);
        assert!(out.markdown.starts_with("## Page 1\n\n# P1"));
        assert!(out.markdown.contains("---\n\n## Page 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn a_failing_page_fails_the_pipeline() {
        let model = PerPage {
            failing_page: Some(2),
            calls: Mutex::new(0),
        };
        let err = extract_full_text(&model, &pages(3), &ExtractionConfig::default())
            .await
            .unwrap_err();
        match err {
            DocExtractError::FullTextFailed { page, attempts, detail } => {
                assert_eq!(page, 2);
                assert_eq!(attempts, 4);
                assert_eq!(detail, "page model down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
