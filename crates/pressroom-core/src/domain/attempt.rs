//! Attempt and Decision models for execution history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::AttemptId;

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// A single execution attempt of a step.
///
/// Records what ran, when, and how it ended. Together with
/// [`DecisionRecord`] this is what lets a status query explain a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: AttemptId,
    pub step: String,

    /// 1-based attempt number within the step.
    pub number: u32,

    pub outcome: AttemptOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn succeeded(
        attempt_id: AttemptId,
        step: impl Into<String>,
        number: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempt_id,
            step: step.into(),
            number,
            outcome: AttemptOutcome::Success,
            error: None,
            started_at,
            completed_at,
        }
    }

    pub fn failed(
        attempt_id: AttemptId,
        step: impl Into<String>,
        number: u32,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempt_id,
            step: step.into(),
            number,
            outcome: AttemptOutcome::Failure,
            error: Some(error.into()),
            started_at,
            completed_at,
        }
    }
}

/// A decision made after a failed attempt.
///
/// Records the trigger, the policy that was applied and what it decided
/// ("schedule_retry" or "mark_failed").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub step: String,

    /// What was observed that triggered this decision.
    pub trigger: serde_json::Value,

    pub policy: String,

    pub decision: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,

    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(
        step: impl Into<String>,
        trigger: serde_json::Value,
        policy: impl Into<String>,
        decision: impl Into<String>,
        context: Option<serde_json::Value>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            step: step.into(),
            trigger,
            policy: policy.into(),
            decision: decision.into(),
            context,
            decided_at,
        }
    }
}
