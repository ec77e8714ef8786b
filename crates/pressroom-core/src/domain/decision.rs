//! Decision model: what happens to a step after a failed attempt.
//!
//! The Decider is a pure function of the step record and the error; applying
//! the decision (recording it, sleeping, failing the run) is the step
//! runner's job.

use std::time::Duration;

use super::errors::{ErrorKind, StepError};
use super::run::StepRecord;
use crate::queue::RetryPolicy;

/// The next action for a step whose attempt just failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run the step body again after a delay.
    Retry { delay: Duration, reason: String },

    /// Give up on the step; the run becomes Errored.
    MarkFailed { reason: String },
}

pub trait Decider: Send + Sync {
    /// Decide the next action for a step.
    ///
    /// `step.attempts` already counts the attempt that just failed.
    fn decide(&self, step: &StepRecord, error: &StepError) -> Decision;
}

/// Attempt-budget decider with exponential backoff.
///
/// - Permanent errors fail the step immediately.
/// - Transient errors retry while `attempts < max_attempts`.
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, step: &StepRecord, error: &StepError) -> Decision {
        let max_attempts = self.retry_policy.max_attempts;
        if error.kind() == ErrorKind::Permanent {
            Decision::MarkFailed {
                reason: format!("Permanent error on attempt {}", step.attempts),
            }
        } else if step.attempts >= max_attempts {
            Decision::MarkFailed {
                reason: format!("Max attempts reached: {}/{}", step.attempts, max_attempts),
            }
        } else {
            let delay = self.retry_policy.next_delay(step.attempts);
            Decision::Retry {
                delay,
                reason: format!(
                    "Retry attempt {}/{} after {:?}",
                    step.attempts + 1,
                    max_attempts,
                    delay
                ),
            }
        }
    }
}
