//! Impls - in-process and reference implementations of the ports.
//!
//! # Included
//! - **InMemoryContentCache** / **FileContentCache**: TTL caches driven by a `Clock`
//! - **InMemoryRunStore** / **FileRunStore**: run journals
//! - **HttpSnapshotEngine**: rendering engine backed by an HTTP client
//! - **OutboxMailer**: writes parcels into a directory

pub mod file_cache;
pub mod file_run_store;
pub mod http_engine;
pub mod inmem_cache;
pub mod inmem_run_store;
pub mod outbox_mailer;

pub use self::file_cache::FileContentCache;
pub use self::file_run_store::FileRunStore;
pub use self::http_engine::HttpSnapshotEngine;
pub use self::inmem_cache::InMemoryContentCache;
pub use self::inmem_run_store::InMemoryRunStore;
pub use self::outbox_mailer::OutboxMailer;
