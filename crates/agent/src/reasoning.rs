//! Reasoning channel capture.
//!
//! Consecutive reasoning deltas of one model turn form a single step. Any
//! other event (content, a tool call, end of turn) closes the open step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub timestamp: DateTime<Utc>,
    /// Round the step was produced in
    pub iteration: u32,
    pub content: String,
}

/// Append-only log of reasoning steps for a session.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReasoningLog {
    steps: Vec<ReasoningStep>,
    #[serde(skip)]
    open: bool,
}

impl ReasoningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reasoning delta, extending the open step if there is one.
    pub fn append(&mut self, iteration: u32, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.steps.last_mut() {
            Some(step) if self.open && step.iteration == iteration => step.content.push_str(text),
            _ => {
                self.steps.push(ReasoningStep {
                    timestamp: Utc::now(),
                    iteration,
                    content: text.to_string(),
                });
                self.open = true;
            }
        }
    }

    /// Close the open step; the next delta starts a new one.
    pub fn close_step(&mut self) {
        self.open = false;
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub fn for_iteration(&self, iteration: u32) -> impl Iterator<Item = &ReasoningStep> {
        self.steps.iter().filter(move |s| s.iteration == iteration)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_merge_until_closed() {
        let mut log = ReasoningLog::new();
        log.append(1, "Need ");
        log.append(1, "sources.");
        log.close_step();
        log.append(1, "Now crawl.");
        assert_eq!(log.len(), 2);
        assert_eq!(log.steps()[0].content, "Need sources.");
        assert_eq!(log.steps()[1].content, "Now crawl.");
    }

    #[test]
    fn new_iteration_starts_new_step() {
        let mut log = ReasoningLog::new();
        log.append(1, "first");
        log.append(2, "second");
        assert_eq!(log.len(), 2);
        assert_eq!(log.for_iteration(2).count(), 1);
    }

    #[test]
    fn empty_deltas_are_ignored() {
        let mut log = ReasoningLog::new();
        log.append(1, "");
        assert!(log.is_empty());
    }
}
