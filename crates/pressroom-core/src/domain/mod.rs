//! Domain model (ids, requests, run/step records, attempts, decisions, errors).

pub mod attempt;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod request;
pub mod run;
pub mod state;

pub use attempt::{AttemptOutcome, AttemptRecord, DecisionRecord};
pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{ErrorKind, PipelineError, StepError};
pub use ids::{AttemptId, ParseIdError, RunId};
pub use request::{RenderRequest, ValidationError};
pub use run::{RunOutcome, RunRecord, RunStatus, StepRecord, StepStatus};
pub use state::{RunState, StepState};
