//! Parallel extraction scheduler.
//!
//! ## Admission
//!
//! Tasks wait in a FIFO queue. Before each dispatch the scheduler re-reads the
//! controller's window and asks the [`AdmissionGate`] for a [`Permit`]; the
//! permit travels inside the task future and is released by `Drop` when that
//! future finishes, whichever way it finishes. `in_flight ≤ window` therefore
//! holds by construction: the count only goes up through the gate, and only
//! when it is below the limit read at that moment.
//!
//! When the window shrinks below the current in-flight count nothing is
//! cancelled. Running tasks drain, and admission resumes once the count falls
//! under the new limit.
//!
//! All futures are polled cooperatively from one `FuturesUnordered`; the
//! scheduler spawns nothing.

use crate::config::ExtractionConfig;
use crate::output::{ExtractionResult, ExtractionTask};
use crate::pipeline::blocks::extract_block;
use crate::pipeline::concurrency::ConcurrencyController;
use crate::pipeline::llm::VisionModel;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Counting gate over the number of tasks in flight.
#[derive(Debug, Default)]
pub struct AdmissionGate {
    in_flight: AtomicUsize,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a slot if fewer than `limit` are held.
    pub fn try_acquire(&self, limit: usize) -> Option<Permit<'_>> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .ok()
            .map(|_| Permit { gate: self })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// One admitted task. Dropping it frees the slot.
#[derive(Debug)]
pub struct Permit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Extract every task under the controller's adaptive window.
///
/// Returns exactly one result per task, sorted by `block_index`. Never fails:
/// a block whose retries run out comes back degraded to its OCR text.
pub async fn extract_all(
    model: &dyn VisionModel,
    tasks: Vec<ExtractionTask>,
    controller: &ConcurrencyController,
    config: &ExtractionConfig,
) -> Vec<ExtractionResult> {
    let total = tasks.len();
    let progress = config.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_extraction_start(total);
    }
    info!(
        "Extracting {} blocks, starting concurrency {}",
        total,
        controller.concurrency()
    );

    let gate = AdmissionGate::new();
    let mut pending: VecDeque<ExtractionTask> = tasks.into();
    let mut in_flight = FuturesUnordered::new();
    let mut results = Vec::with_capacity(total);
    let mut peak = 0;

    loop {
        while !pending.is_empty() {
            let Some(permit) = gate.try_acquire(controller.concurrency()) else {
                break;
            };
            let Some(task) = pending.pop_front() else {
                break;
            };
            debug!("Dispatching block {}", task.index);
            in_flight.push(async move {
                let _permit = permit;
                extract_block(model, &task, controller, config).await
            });
            peak = peak.max(gate.in_flight());
        }

        let Some(result) = in_flight.next().await else {
            break;
        };

        if let Some(cb) = progress {
            match result.error {
                None => cb.on_block_complete(result.block_index, total, result.text.len()),
                Some(ref e) => cb.on_block_error(result.block_index, total, e),
            }
        }
        results.push(result);
    }

    results.sort_by_key(|r| r.block_index);

    let succeeded = results.iter().filter(|r| r.error.is_none()).count();
    info!(
        "Block extraction done: {}/{} corrected, peak {} in flight, final concurrency {}",
        succeeded,
        total,
        peak,
        controller.concurrency()
    );
    if let Some(cb) = progress {
        cb.on_extraction_complete(total, succeeded);
    }
    results
}
