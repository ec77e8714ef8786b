//! StepRunner - memoized, retryable steps over a run record.
//!
//! # Flow of `step(name, body)`
//! 1. Completed in the journal: deserialize the recorded output, skip the body
//! 2. Otherwise: begin attempt -> save -> run body
//! 3. Ok: record the output -> save -> return it
//! 4. Err: Decider -> Retry (record, save, sleep, go to 2) or MarkFailed (record, save, fail)
//!
//! The record is saved before every body call, so an interrupted attempt is
//! visible in the journal and counts against the budget on resume.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{
    AttemptRecord, Decider, Decision, DecisionRecord, ErrorKind, PipelineError, RunRecord, StepError, StepRecord,
    StepState,
};
use crate::ports::{Clock, IdGenerator, RunStore, StoreError};

pub struct StepRunner<'a> {
    record: RunRecord,
    store: &'a dyn RunStore,
    decider: &'a dyn Decider,
    ids: &'a dyn IdGenerator,
    clock: &'a dyn Clock,
}

impl<'a> StepRunner<'a> {
    pub fn new(
        record: RunRecord,
        store: &'a dyn RunStore,
        decider: &'a dyn Decider,
        ids: &'a dyn IdGenerator,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            record,
            store,
            decider,
            ids,
            clock,
        }
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    pub fn into_record(self) -> RunRecord {
        self.record
    }

    /// Mark the run Running and persist it.
    pub async fn start(&mut self) -> Result<(), StoreError> {
        self.record.mark_running(self.clock.now());
        self.store.save(&self.record).await
    }

    /// Run `body` as the step `name`, at most once to completion per run.
    pub async fn step<T, F, Fut>(&mut self, name: &str, mut body: F) -> Result<T, PipelineError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        if let Some(output) = self.record.step(name).and_then(StepRecord::output) {
            tracing::debug!(step = name, "replaying recorded step result");
            return serde_json::from_value(output.clone()).map_err(|source| PipelineError::Replay {
                step: name.to_string(),
                source,
            });
        }

        if let Some(step) = self.record.step(name) {
            if let StepState::Failed { error } = &step.state {
                return Err(PipelineError::StepExhausted {
                    step: name.to_string(),
                    attempts: step.attempts,
                    last_error: error.clone(),
                });
            }
        }

        self.wait_for_scheduled_retry(name).await;

        loop {
            let started_at = self.clock.now();
            let number = self.record.begin_attempt(name, started_at);
            self.store.save(&self.record).await?;
            let attempt_id = self.ids.generate_attempt_id();
            tracing::debug!(step = name, attempt = number, "step attempt started");

            let error = match body().await {
                Ok(value) => {
                    let output = serde_json::to_value(&value).map_err(StoreError::from)?;
                    let now = self.clock.now();
                    let attempt = AttemptRecord::succeeded(attempt_id, name, number, started_at, now);
                    self.record.complete_step(name, output, attempt, now);
                    self.store.save(&self.record).await?;
                    tracing::info!(step = name, attempt = number, "step completed");
                    return Ok(value);
                }
                Err(error) => error,
            };

            let now = self.clock.now();
            let attempt = AttemptRecord::failed(attempt_id, name, number, error.message(), started_at, now);
            let decision = match self.record.step(name) {
                Some(step) => self.decider.decide(step, &error),
                None => Decision::MarkFailed {
                    reason: "step missing from run record".to_string(),
                },
            };
            let trigger = serde_json::json!({
                "attempt": number,
                "error": error.message(),
                "kind": error.kind(),
            });

            match decision {
                Decision::Retry { delay, reason } => {
                    let next_run_at = chrono::Duration::from_std(delay)
                        .ok()
                        .and_then(|d| now.checked_add_signed(d))
                        .unwrap_or(now);
                    let context = serde_json::json!({
                        "reason": reason,
                        "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    });
                    let decision = DecisionRecord::new(name, trigger, "retry_policy", "schedule_retry", Some(context), now);
                    self.record.schedule_retry(name, error.message(), next_run_at, attempt, decision);
                    self.store.save(&self.record).await?;

                    tracing::warn!(step = name, attempt = number, error = %error, ?delay, "step failed, retry scheduled");
                    tokio::time::sleep(delay).await;
                }
                Decision::MarkFailed { reason } => {
                    let context = serde_json::json!({ "reason": reason });
                    let decision = DecisionRecord::new(name, trigger, "retry_policy", "mark_failed", Some(context), now);
                    self.record.fail_step(name, error.message(), attempt, decision);
                    self.store.save(&self.record).await?;

                    tracing::error!(step = name, attempt = number, error = %error, %reason, "step failed");
                    return Err(match error.kind() {
                        ErrorKind::Permanent => PipelineError::Permanent {
                            step: name.to_string(),
                            error: error.message().to_string(),
                        },
                        ErrorKind::Transient => PipelineError::StepExhausted {
                            step: name.to_string(),
                            attempts: number,
                            last_error: error.message().to_string(),
                        },
                    });
                }
            }
        }
    }

    /// A run resumed while waiting on a retry finishes the remaining delay.
    async fn wait_for_scheduled_retry(&self, name: &str) {
        let Some(next_run_at) = self.record.step(name).and_then(|s| s.next_run_at) else {
            return;
        };
        if let Ok(remaining) = (next_run_at - self.clock.now()).to_std() {
            tracing::debug!(step = name, ?remaining, "waiting for scheduled retry");
            tokio::time::sleep(remaining).await;
        }
    }
}
