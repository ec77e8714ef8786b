//! App - wiring of the ports into a running pipeline.
//!
//! # Components
//! - **AppBuilder**: collects collaborators, fails fast on missing ones
//! - **Pipeline**: the cache-check -> render -> deliver steps
//! - **StepRunner**: memoized, retryable step execution
//! - **PipelineService**: submit, status, resume
//! - **WorkerGroup**: workers pulling runs from the queue

pub mod builder;
pub mod pipeline;
pub mod service;
pub mod status;
pub mod step;
pub mod worker_loop;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::pipeline::{CACHE_CHECK, CacheLookup, DELIVER, Pipeline, PipelineConfig, RENDER};
pub use self::service::{PipelineService, SubmitError, Submission};
pub use self::status::PipelineCounts;
pub use self::step::StepRunner;
pub use self::worker_loop::WorkerGroup;
