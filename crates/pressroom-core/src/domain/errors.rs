//! Error classification for step attempts and terminal pipeline failures.
//!
//! Port-level errors (`CacheError`, `RenderError`, `DeliveryError`,
//! `StoreError`) live next to their ports. This module holds the two errors the
//! orchestration engine itself reasons about.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::RunId;
use crate::ports::StoreError;

/// Operational classification of a failed attempt.
///
/// - Transient: worth retrying (the retry policy decides how often).
/// - Permanent: retrying cannot help; the step fails on the spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// One failed attempt of a step body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepError {
    kind: ErrorKind,
    message: String,
}

impl StepError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (kind: {:?})", self.message, self.kind)
    }
}

impl std::error::Error for StepError {}

/// A pipeline run ended without producing its result.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("step '{step}' failed after {attempts} attempts: {last_error}")]
    StepExhausted {
        step: String,
        attempts: u32,
        last_error: String,
    },

    #[error("step '{step}' failed permanently: {error}")]
    Permanent { step: String, error: String },

    #[error("recorded result of step '{step}' could not be replayed: {source}")]
    Replay {
        step: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("run {run_id} already failed: {error}")]
    AlreadyErrored { run_id: RunId, error: String },

    #[error("run journal: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Name of the step that failed, if the failure belongs to one.
    pub fn step(&self) -> Option<&str> {
        match self {
            PipelineError::StepExhausted { step, .. }
            | PipelineError::Permanent { step, .. }
            | PipelineError::Replay { step, .. } => Some(step),
            PipelineError::AlreadyErrored { .. } | PipelineError::Store(_) => None,
        }
    }
}
