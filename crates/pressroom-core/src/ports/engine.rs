//! Rendering engine port.
//!
//! The engine hands out a `Session` (the expensive resource the renderer
//! actor keeps warm). A session opens short-lived `Page`s, one per render.
//!
//! # Implementations
//! - **HttpSnapshotEngine**: session = HTTP client, capture = fetched body
//! - **FakeEngine** (`crate::testing`): scripted, counts launches and closes

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch rendering session: {0}")]
    Launch(String),

    #[error("navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("{0} is not supported by this engine")]
    Unsupported(&'static str),
}

/// When navigation counts as finished: at most `max_connections` in flight
/// for at least `quiet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitUntil {
    pub max_connections: u32,
    pub quiet: Duration,
}

impl WaitUntil {
    /// No more than two connections for 500 ms.
    pub const NETWORK_QUIET: WaitUntil = WaitUntil {
        max_connections: 2,
        quiet: Duration::from_millis(500),
    };
}

/// Fixed document format for captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    pub print_background: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            print_background: true,
        }
    }
}

#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Session>, EngineError>;
}

#[async_trait]
pub trait Session: Send {
    /// Whether the session can still serve pages.
    fn is_connected(&self) -> bool;

    async fn new_page(&mut self) -> Result<Box<dyn Page>, EngineError>;

    async fn close(self: Box<Self>) -> Result<(), EngineError>;
}

#[async_trait]
pub trait Page: Send {
    async fn goto(&mut self, url: &str, wait_until: WaitUntil) -> Result<(), EngineError>;

    /// Dismiss a consent overlay if one is shown.
    async fn dismiss_consent(&mut self) -> Result<(), EngineError>;

    async fn pdf(&mut self, options: &CaptureOptions) -> Result<Bytes, EngineError>;

    async fn close(self: Box<Self>) -> Result<(), EngineError>;
}
