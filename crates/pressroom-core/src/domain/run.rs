//! Run record: the journal entry of one pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attempt::{AttemptRecord, DecisionRecord};
use super::ids::RunId;
use super::request::RenderRequest;
use super::state::{RunState, StepState};

/// What a successful run reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
}

impl RunOutcome {
    pub fn delivered() -> Self {
        Self {
            success: true,
            message: "Article processed successfully".to_string(),
        }
    }
}

/// Journal entry of one named step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub state: StepState,

    /// Attempts started so far (including one in flight).
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StepState::Running,
            attempts: 0,
            last_error: None,
            next_run_at: None,
        }
    }

    /// Recorded result, if the step completed.
    pub fn output(&self) -> Option<&serde_json::Value> {
        match &self.state {
            StepState::Completed { output } => Some(output),
            _ => None,
        }
    }
}

/// Run record.
///
/// Single source of truth for a run: the request, where it stands, what each
/// step produced and the full attempt/decision history. State transitions go
/// through the methods below, never through direct field writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub request: RenderRequest,
    pub state: RunState,

    /// Steps in execution order.
    pub steps: Vec<StepRecord>,

    pub attempts: Vec<AttemptRecord>,
    pub decisions: Vec<DecisionRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<RunOutcome>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(run_id: RunId, request: RenderRequest, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            request,
            state: RunState::Queued,
            steps: Vec::new(),
            attempts: Vec::new(),
            decisions: Vec::new(),
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    fn step_mut(&mut self, name: &str) -> &mut StepRecord {
        let index = match self.steps.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.steps.push(StepRecord::new(name));
                self.steps.len() - 1
            }
        };
        &mut self.steps[index]
    }

    /// A worker picked the run up (fresh, or again after an interruption).
    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        self.state = RunState::Running;
        self.updated_at = now;
    }

    /// Start a new attempt of `step`. Returns the attempt number (1-based).
    pub fn begin_attempt(&mut self, step: &str, now: DateTime<Utc>) -> u32 {
        let record = self.step_mut(step);
        record.state = StepState::Running;
        record.attempts += 1;
        record.next_run_at = None;
        let number = record.attempts;
        self.state = RunState::Running;
        self.updated_at = now;
        number
    }

    pub fn complete_step(&mut self, step: &str, output: serde_json::Value, attempt: AttemptRecord, now: DateTime<Utc>) {
        let record = self.step_mut(step);
        record.state = StepState::Completed { output };
        record.next_run_at = None;
        self.attempts.push(attempt);
        self.updated_at = now;
    }

    pub fn schedule_retry(
        &mut self,
        step: &str,
        error: &str,
        next_run_at: DateTime<Utc>,
        attempt: AttemptRecord,
        decision: DecisionRecord,
    ) {
        let record = self.step_mut(step);
        record.state = StepState::RetryScheduled;
        record.last_error = Some(error.to_string());
        record.next_run_at = Some(next_run_at);
        self.state = RunState::Waiting;
        self.updated_at = decision.decided_at;
        self.attempts.push(attempt);
        self.decisions.push(decision);
    }

    pub fn fail_step(&mut self, step: &str, error: &str, attempt: AttemptRecord, decision: DecisionRecord) {
        let record = self.step_mut(step);
        record.state = StepState::Failed {
            error: error.to_string(),
        };
        record.last_error = Some(error.to_string());
        record.next_run_at = None;
        self.updated_at = decision.decided_at;
        self.attempts.push(attempt);
        self.decisions.push(decision);
    }

    pub fn mark_complete(&mut self, output: RunOutcome, now: DateTime<Utc>) {
        self.state = RunState::Complete;
        self.output = Some(output);
        self.error = None;
        self.updated_at = now;
    }

    pub fn mark_errored(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.state = RunState::Errored;
        self.error = Some(error.into());
        self.updated_at = now;
    }

    /// Serializable view for status queries.
    pub fn status(&self) -> RunStatus {
        RunStatus {
            run_id: self.run_id,
            status: self.state,
            url: self.request.url().to_string(),
            steps: self
                .steps
                .iter()
                .map(|s| StepStatus {
                    name: s.name.clone(),
                    state: s.state.clone(),
                    attempts: s.attempts,
                    last_error: s.last_error.clone(),
                })
                .collect(),
            output: self.output.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Run status for API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: RunId,
    pub status: RunState,
    pub url: String,
    pub steps: Vec<StepStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<RunOutcome>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStatus {
    pub name: String,
    pub state: StepState,
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
