//! Step progress reporting.
//!
//! Renders lines like `Creating 3/7 Tables - Complete` and records how long
//! each step took.

use std::fmt;
use std::time::Instant;
use tracing::info;

/// State of a numbered step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    InProgress,
    Complete,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => f.write_str("In Progress"),
            Self::Complete => f.write_str("Complete"),
        }
    }
}

/// Format a progress line.
pub fn format_step(action: &str, index: usize, total: usize, noun: &str, state: StepState) -> String {
    format!("{} {}/{} {} - {}", action, index, total, noun, state)
}

/// Progress over a fixed number of sequential steps.
pub struct Progress {
    action: &'static str,
    noun: &'static str,
    total: usize,
    done: usize,
    step_started: Instant,
}

impl Progress {
    pub fn new(action: &'static str, noun: &'static str, total: usize) -> Self {
        Self {
            action,
            noun,
            total,
            done: 0,
            step_started: Instant::now(),
        }
    }

    /// Announce that the next step is starting.
    pub fn start(&mut self) {
        self.step_started = Instant::now();
        info!(
            "{}",
            format_step(self.action, self.done + 1, self.total, self.noun, StepState::InProgress)
        );
    }

    /// Mark the current step complete.
    pub fn complete(&mut self) {
        self.done += 1;
        let elapsed_ms = self.step_started.elapsed().as_millis() as u64;
        info!(
            elapsed_ms = elapsed_ms,
            "{}",
            format_step(self.action, self.done, self.total, self.noun, StepState::Complete)
        );
        self.step_started = Instant::now();
    }

    #[cfg(test)]
    fn done(&self) -> usize {
        self.done
    }
}
