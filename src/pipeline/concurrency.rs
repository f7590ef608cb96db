//! Adaptive concurrency controller for block re-extraction.
//!
//! Additive increase, multiplicative decrease: the window grows by one after
//! a streak of successes and shrinks to `floor(window × factor)` on every
//! rate-limit signal. Other failures reset the success streak but leave the
//! window alone; those are the retry loop's business, not admission
//! control's.
//!
//! The controller has no timers. It changes only when
//! [`on_success`](ConcurrencyController::on_success),
//! [`on_rate_limit`](ConcurrencyController::on_rate_limit) or
//! [`on_error`](ConcurrencyController::on_error) is called. One instance
//! belongs to one job and is passed by reference to every call site.

use crate::config::ConcurrencyLimits;
use crate::pipeline::llm::AttemptOutcome;
use crate::progress::ProgressCallback;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Snapshot of the controller's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    pub current_concurrency: usize,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

pub struct ConcurrencyController {
    limits: ConcurrencyLimits,
    state: Mutex<ControllerState>,
    progress: Option<ProgressCallback>,
}

impl ConcurrencyController {
    /// `limits.initial` is clamped into `[min, max]`.
    pub fn new(limits: ConcurrencyLimits) -> Self {
        let min = limits.min.max(1);
        let max = limits.max.max(min);
        let limits = ConcurrencyLimits { min, max, ..limits };
        Self {
            state: Mutex::new(ControllerState {
                current_concurrency: limits.initial.clamp(min, max),
                consecutive_successes: 0,
                consecutive_failures: 0,
            }),
            limits,
            progress: None,
        }
    }

    /// Report window changes to `cb`.
    pub fn with_progress(mut self, cb: Option<ProgressCallback>) -> Self {
        self.progress = cb;
        self
    }

    /// Current admission budget.
    pub fn concurrency(&self) -> usize {
        self.lock().current_concurrency
    }

    pub fn state(&self) -> ControllerState {
        *self.lock()
    }

    pub fn limits(&self) -> &ConcurrencyLimits {
        &self.limits
    }

    pub fn on_success(&self) {
        let (before, after) = {
            let mut s = self.lock();
            let before = s.current_concurrency;
            s.consecutive_failures = 0;
            s.consecutive_successes += 1;
            if s.consecutive_successes >= self.limits.ramp_up_after {
                s.current_concurrency = (s.current_concurrency + 1).min(self.limits.max);
                s.consecutive_successes = 0;
            }
            (before, s.current_concurrency)
        };
        if after != before {
            debug!("Concurrency ramped up {} → {}", before, after);
            self.notify(before, after);
        }
    }

    pub fn on_rate_limit(&self) {
        let (before, after) = {
            let mut s = self.lock();
            let before = s.current_concurrency;
            s.consecutive_failures += 1;
            s.consecutive_successes = 0;
            let shrunk = (before as f64 * self.limits.backoff_factor).floor() as usize;
            s.current_concurrency = shrunk.max(self.limits.min);
            (before, s.current_concurrency)
        };
        if after != before {
            info!("Rate limited: concurrency {} → {}", before, after);
            self.notify(before, after);
        }
    }

    pub fn on_error(&self) {
        let mut s = self.lock();
        s.consecutive_failures += 1;
        s.consecutive_successes = 0;
    }

    /// Dispatch an attempt outcome to the matching notification.
    pub fn record(&self, outcome: AttemptOutcome) {
        match outcome {
            AttemptOutcome::Success => self.on_success(),
            AttemptOutcome::RateLimited => self.on_rate_limit(),
            AttemptOutcome::Failed => self.on_error(),
        }
    }

    fn notify(&self, before: usize, after: usize) {
        if let Some(ref cb) = self.progress {
            cb.on_concurrency_change(before, after);
        }
    }

    // State is plain data; a panic elsewhere cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
