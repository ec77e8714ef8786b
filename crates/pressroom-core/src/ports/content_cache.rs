//! ContentCache port - rendered documents keyed by source URL.
//!
//! Written by the renderer actor, read by the pipeline. No transactions:
//! the last writer wins and entries only disappear through expiry.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache write rejected for '{key}': {reason}")]
    Rejected { key: String, reason: String },
}

#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Store `value` under `key`; it expires `ttl` after the write.
    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Read the value under exactly `key`. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Keys (live entries only) starting with `prefix`, in key order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, CacheError>;
}
