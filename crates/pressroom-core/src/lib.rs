//! pressroom-core
//!
//! Turns a URL into a rendered document and delivers it, through a journaled
//! three-step pipeline and a renderer actor that keeps one rendering session
//! warm between requests.
//!
//! # Modules
//! - **domain**: ids, requests, run/step records, attempts, decisions, errors
//! - **ports**: traits at the external seams (ContentCache, RenderEngine, Mailer, RunStore, Clock, IdGenerator)
//! - **impls**: in-memory and reference implementations of the ports
//! - **actor**: the renderer actor and its directory
//! - **app**: step runner, pipeline, service, workers, builder
//! - **queue**: run queue and retry policy
//! - **config**: settings
//! - **testing**: fake engine and recording mailer

pub mod actor;
pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod testing;
