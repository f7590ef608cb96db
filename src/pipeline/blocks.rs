//! Block text extraction: re-read one layout block with the vision model.
//!
//! Each block is sent together with the image of its page, its pixel box and
//! whatever text OCR produced for it. The model either returns corrected text
//! or, after the retry budget is spent, the block degrades to its OCR text.
//! [`extract_block`] never fails; the failure is recorded on the result.

use crate::config::ExtractionConfig;
use crate::output::{block_locations, ExtractionResult, ExtractionTask, Page};
use crate::pipeline::concurrency::ConcurrencyController;
use crate::pipeline::llm::{complete_with_retry, RetriesExhausted, VisionModel, VisionRequest};
use crate::pipeline::postprocess;
use crate::prompts;
use std::sync::Arc;
use tracing::{debug, warn};

/// Turn detected blocks into work items, numbering them across the document.
///
/// Zero-area blocks have nothing to look at; they skip the model and come back
/// as passthrough results carrying their OCR text.
pub fn plan_tasks(pages: &[Page]) -> (Vec<ExtractionTask>, Vec<ExtractionResult>) {
    let mut tasks = Vec::new();
    let mut passthrough = Vec::new();

    for (loc, block) in block_locations(pages) {
        if block.bbox.is_empty() {
            debug!("Block {} has an empty box; keeping OCR text", loc.global_index);
            passthrough.push(ExtractionResult::passthrough(loc.global_index, block));
            continue;
        }
        let page = &pages[loc.page_slot];
        tasks.push(ExtractionTask {
            index: loc.global_index,
            page_index: page.page_index,
            block: block.clone(),
            image_data_url: Arc::clone(&page.image_data_url),
        });
    }

    (tasks, passthrough)
}

/// Build the model request for one block.
pub fn block_request(task: &ExtractionTask, config: &ExtractionConfig) -> VisionRequest {
    VisionRequest {
        system_prompt: prompts::BLOCK_SYSTEM_PROMPT.to_string(),
        user_prompt: prompts::block_prompt(&task.block.kind, task.bbox(), task.ocr_text()),
        image_data_url: Arc::clone(&task.image_data_url),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Extract the text of one block, feeding every attempt into `controller`.
pub async fn extract_block(
    model: &dyn VisionModel,
    task: &ExtractionTask,
    controller: &ConcurrencyController,
    config: &ExtractionConfig,
) -> ExtractionResult {
    let request = block_request(task, config);
    let label = format!("block {}", task.index);

    match complete_with_retry(
        model,
        &request,
        &config.retry_policy(),
        &label,
        |outcome| controller.record(outcome),
    )
    .await
    {
        Ok(done) => {
            ExtractionResult::corrected(task, postprocess::clean_block_text(&done.text), done.attempts)
        }
        Err(exhausted) => {
            warn!(
                "Block {} fell back to OCR text after {} attempts: {}",
                task.index, exhausted.attempts, exhausted.last_error
            );
            ExtractionResult::degraded(task, failure_message(&exhausted), exhausted.attempts)
        }
    }
}

/// Degraded results always carry a non-empty reason.
fn failure_message(exhausted: &RetriesExhausted) -> String {
    let message = exhausted.last_error.to_string();
    if !message.trim().is_empty() {
        return message;
    }
    match exhausted.last_error.status {
        Some(status) => format!(
            "HTTP {} with no message after {} attempts",
            status, exhausted.attempts
        ),
        None => format!("model call failed after {} attempts", exhausted.attempts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConcurrencyLimits;
    use crate::error::CallError;
    use crate::output::{Block, BoundingBox};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    fn block(content: &str, w: f64) -> Block {
        Block {
            kind: "TEXT".into(),
            bbox: BoundingBox::new(10.0, 20.0, w, 40.0),
            original_bbox: Some([10.0, 20.0, 10.0 + w, 60.0]),
            content: content.into(),
        }
    }

    fn task() -> ExtractionTask {
        ExtractionTask {
            index: 7,
            page_index: 0,
            block: block("0CR text", 100.0),
            image_data_url: Arc::from("data:image/png;base64,AA=="),
        }
    }

    /// Fails with the scripted errors, then answers; records when each call began.
    struct Flaky {
        failures: Mutex<Vec<CallError>>,
        calls: Mutex<Vec<Instant>>,
        answer: &'static str,
    }

    impl Flaky {
        fn new(failures: Vec<CallError>, answer: &'static str) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: Mutex::new(Vec::new()),
                answer,
            }
        }
    }

    #[async_trait]
    impl VisionModel for Flaky {
        async fn complete(&self, _request: &VisionRequest) -> Result<String, CallError> {
            self.calls.lock().unwrap().push(Instant::now());
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(self.answer.to_string())
            } else {
                Err(failures.remove(0))
            }
        }
    }

    fn controller() -> ConcurrencyController {
        ConcurrencyController::new(ConcurrencyLimits::default())
    }

    #[test]
    fn plan_numbers_globally_and_skips_empty_boxes() {
        let mut p0 = Page::new(0, 100, 100, "data:image/png;base64,AA==");
        p0.blocks = vec![block("a", 10.0), block("b", 0.0)];
        let mut p1 = Page::new(1, 100, 100, "data:image/png;base64,BB==");
        p1.blocks = vec![block("c", 10.0)];

        let (tasks, passthrough) = plan_tasks(&[p0, p1]);
        assert_eq!(tasks.iter().map(|t| t.index).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(tasks[1].page_index, 1);
        assert_eq!(&*tasks[1].image_data_url, "data:image/png;base64,BB==");
        assert_eq!(passthrough.len(), 1);
        assert_eq!(passthrough[0].block_index, 1);
        assert_eq!(passthrough[0].text, "b");
        assert_eq!(passthrough[0].attempts, 0);
    }

    #[test]
    fn request_carries_box_kind_and_ocr_text() {
        let req = block_request(&task(), &ExtractionConfig::default());
        assert!(req.user_prompt.contains("TEXT"));
        assert!(req.user_prompt.contains("0CR text"));
        assert!(req.user_prompt.contains("x=10, y=20, width=100, height=40"));
        assert_eq!(req.temperature, 0.1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_returns_trimmed_text() {
        let model = Flaky::new(vec![], "  OCR text \n");
        let c = controller();
        let r = extract_block(&model, &task(), &c, &ExtractionConfig::default()).await;
        assert_eq!(r.text, "OCR text");
        assert_eq!(r.ocr_text, "0CR text");
        assert_eq!(r.block_index, 7);
        assert_eq!(r.original_bbox, Some([10.0, 20.0, 110.0, 60.0]));
        assert!(r.error.is_none());
        assert_eq!(c.state().consecutive_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fail_succeed_waits_one_then_two_seconds() {
        let model = Flaky::new(
            vec![CallError::from_message("boom"), CallError::from_message("boom")],
            "fixed",
        );
        let c = controller();
        let r = extract_block(&model, &task(), &c, &ExtractionConfig::default()).await;

        assert_eq!(r.text, "fixed");
        assert_eq!(r.attempts, 3);
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_millis(1000));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(2000));
        // Plain failures never shrink the window.
        assert_eq!(c.concurrency(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_block_degrades_to_ocr_text() {
        let failures = (0..4).map(|_| CallError::new(Some(503), "upstream down")).collect();
        let model = Flaky::new(failures, "never");
        let c = controller();
        let r = extract_block(&model, &task(), &c, &ExtractionConfig::default()).await;

        assert_eq!(r.text, r.ocr_text);
        assert_eq!(r.error.as_deref(), Some("upstream down"));
        assert_eq!(r.attempts, 4);
        assert_eq!(c.state().consecutive_failures, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_provider_error_still_explains_degradation() {
        let failures = (0..4).map(|_| CallError::new(Some(500), "  ")).collect();
        let model = Flaky::new(failures, "never");
        let r = extract_block(&model, &task(), &controller(), &ExtractionConfig::default()).await;

        assert_eq!(r.text, "0CR text");
        assert_eq!(r.error.as_deref(), Some("HTTP 500 with no message after 4 attempts"));

        let failures = (0..4).map(|_| CallError::new(None, "")).collect();
        let model = Flaky::new(failures, "never");
        let r = extract_block(&model, &task(), &controller(), &ExtractionConfig::default()).await;
        assert!(r.error.as_deref().is_some_and(|e| !e.trim().is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_shrink_the_window_once_per_attempt() {
        let model = Flaky::new(
            vec![CallError::new(Some(429), "Too Many Requests")],
            "ok",
        );
        let c = ConcurrencyController::new(ConcurrencyLimits {
            initial: 10,
            ..Default::default()
        });
        let r = extract_block(&model, &task(), &c, &ExtractionConfig::default()).await;
        assert!(r.error.is_none());
        assert_eq!(c.concurrency(), 6);
    }
}
