//! Run and step states.

use serde::{Deserialize, Serialize};

/// Run state.
///
/// State transitions:
/// - Queued -> Running -> Complete
/// - Queued -> Running -> Waiting -> Running (retry backoff, until the step budget is spent)
/// - Queued -> Running -> Errored
///
/// A run interrupted while Running or Waiting stays in that state in the
/// journal and is picked up again by resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Accepted, not yet picked up by a worker.
    Queued,

    /// A worker is executing steps.
    Running,

    /// A step failed and waits for its retry delay.
    Waiting,

    /// All steps completed.
    Complete,

    /// A step failed terminally.
    Errored,
}

impl RunState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Complete | RunState::Errored)
    }
}

/// Step state as recorded in the journal.
///
/// `Completed` carries the serialized step result; that value is what replay
/// hands back instead of running the body again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepState {
    /// An attempt is in flight (or was, when the process stopped).
    Running,

    /// Last attempt failed; another one is scheduled.
    RetryScheduled,

    Completed { output: serde_json::Value },

    Failed { error: String },
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Completed { .. } | StepState::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::queued(RunState::Queued, false)]
    #[case::running(RunState::Running, false)]
    #[case::waiting(RunState::Waiting, false)]
    #[case::complete(RunState::Complete, true)]
    #[case::errored(RunState::Errored, true)]
    fn terminal_run_states(#[case] state: RunState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn step_state_is_tagged() {
        let state = StepState::Completed {
            output: serde_json::json!(true),
        };
        let v = serde_json::to_value(&state).unwrap();
        assert_eq!(v["status"], "completed");
        assert_eq!(v["output"], true);
    }
}
