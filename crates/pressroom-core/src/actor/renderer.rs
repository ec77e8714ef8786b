//! Renderer actor: owns one rendering session and keeps it warm.
//!
//! # Session lifecycle
//! ```text
//!            render (launch ok)
//!   Absent ──────────────────────▶ Live { idle }
//!     ▲  ▲ render (launch fails)      │  render: idle = 0, arm wake-up
//!     │  └─────── stays Absent        │  tick:   idle += tick interval
//!     │                               │          idle <  threshold: re-arm
//!     └───────────────────────────────┘          idle >= threshold: close
//! ```
//!
//! Commands are processed one at a time from the mailbox, so a wake-up never
//! interleaves with a render in flight.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::alarm::Alarm;
use crate::ports::{CacheError, CaptureOptions, ContentCache, EngineError, Page, RenderEngine, Session, WaitUntil};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to acquire rendering session: {0}")]
    Acquisition(#[source] EngineError),

    #[error("failed to open page: {0}")]
    Page(#[source] EngineError),

    #[error("navigation failed: {0}")]
    Navigation(#[source] EngineError),

    #[error("navigation to '{url}' timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("capture failed: {0}")]
    Capture(#[source] EngineError),

    #[error("failed to write rendered document to cache: {0}")]
    CacheWrite(#[from] CacheError),

    #[error("renderer actor is not running")]
    ActorStopped,
}

/// Timing and retention knobs of a renderer actor.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererPolicy {
    /// Delay between idle wake-ups.
    pub tick_interval: Duration,

    /// Accumulated idle time after which the session is closed.
    pub idle_threshold: Duration,

    /// Upper bound for a single navigation.
    pub navigation_timeout: Duration,

    /// TTL of cache entries written after a render.
    pub retention: Duration,

    pub mailbox_capacity: usize,
}

impl Default for RendererPolicy {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            idle_threshold: Duration::from_secs(600),
            navigation_timeout: Duration::from_secs(30),
            retention: Duration::from_secs(72 * 60 * 60),
            mailbox_capacity: 32,
        }
    }
}

enum SessionState {
    Absent,
    Live { session: Box<dyn Session>, idle: Duration },
}

/// Point-in-time view of an actor, for status and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub live: bool,

    /// Idle time accumulated since the last render (zero while absent).
    pub idle: Duration,

    pub alarm_pending: bool,
}

enum Command {
    Render {
        url: String,
        reply: oneshot::Sender<Result<(), RenderError>>,
    },
    Tick,
    Inspect {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Address of a running renderer actor.
///
/// Cloning is cheap. The actor stops once every handle (including the one
/// kept by the directory) is dropped and its mailbox is drained.
#[derive(Clone)]
pub struct RendererHandle {
    name: Arc<str>,
    tx: mpsc::Sender<Command>,
}

impl RendererHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render `url` and store the document in the content cache under the
    /// literal URL.
    pub async fn render_and_cache(&self, url: &str) -> Result<(), RenderError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Render {
                url: url.to_string(),
                reply,
            })
            .await
            .map_err(|_| RenderError::ActorStopped)?;
        rx.await.map_err(|_| RenderError::ActorStopped)?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, RenderError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Inspect { reply })
            .await
            .map_err(|_| RenderError::ActorStopped)?;
        rx.await.map_err(|_| RenderError::ActorStopped)
    }
}

/// Start a renderer actor on the current runtime.
pub(crate) fn spawn(
    name: &str,
    engine: Arc<dyn RenderEngine>,
    cache: Arc<dyn ContentCache>,
    policy: RendererPolicy,
) -> (RendererHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(policy.mailbox_capacity.max(1));
    let actor = RendererActor {
        name: name.to_string(),
        engine,
        cache,
        policy,
        state: SessionState::Absent,
        alarm: Alarm::default(),
        mailbox: tx.downgrade(),
    };
    let join = tokio::spawn(actor.run(rx));
    let handle = RendererHandle {
        name: Arc::from(name),
        tx,
    };
    (handle, join)
}

struct RendererActor {
    name: String,
    engine: Arc<dyn RenderEngine>,
    cache: Arc<dyn ContentCache>,
    policy: RendererPolicy,
    state: SessionState,
    alarm: Alarm,
    mailbox: mpsc::WeakSender<Command>,
}

impl RendererActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        tracing::debug!(actor = %self.name, "renderer actor started");
        while let Some(command) = rx.recv().await {
            match command {
                Command::Render { url, reply } => {
                    let result = self.render(&url).await;
                    // caller gone: the document is cached anyway
                    let _ = reply.send(result);
                }
                Command::Tick => self.tick().await,
                Command::Inspect { reply } => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }

        self.alarm.cancel();
        self.close_session("actor stopped").await;
        tracing::debug!(actor = %self.name, "renderer actor stopped");
    }

    async fn render(&mut self, url: &str) -> Result<(), RenderError> {
        let mut session = match std::mem::replace(&mut self.state, SessionState::Absent) {
            SessionState::Live { session, .. } if session.is_connected() => session,
            SessionState::Live { session, .. } => {
                tracing::warn!(actor = %self.name, "session disconnected, re-acquiring");
                if let Err(error) = session.close().await {
                    tracing::warn!(actor = %self.name, %error, "failed to close disconnected session");
                }
                self.acquire().await?
            }
            SessionState::Absent => self.acquire().await?,
        };

        let captured = capture(session.as_mut(), url, self.policy.navigation_timeout).await;
        self.state = SessionState::Live {
            session,
            idle: Duration::ZERO,
        };
        self.arm_alarm();

        let document = captured?;
        let size = document.len();
        self.cache.put(url, document, self.policy.retention).await?;
        tracing::info!(actor = %self.name, url, bytes = size, "document rendered and cached");
        Ok(())
    }

    async fn acquire(&mut self) -> Result<Box<dyn Session>, RenderError> {
        let session = self.engine.launch().await.map_err(|e| {
            tracing::warn!(actor = %self.name, error = %e, "session acquisition failed");
            RenderError::Acquisition(e)
        })?;
        tracing::info!(actor = %self.name, "rendering session acquired");
        Ok(session)
    }

    async fn tick(&mut self) {
        self.alarm.clear();

        let idle = match &mut self.state {
            SessionState::Absent => return,
            SessionState::Live { idle, .. } => {
                *idle += self.policy.tick_interval;
                *idle
            }
        };

        if idle < self.policy.idle_threshold {
            self.arm_alarm();
            return;
        }

        tracing::info!(actor = %self.name, idle_secs = idle.as_secs(), "closing idle rendering session");
        self.close_session("idle").await;
    }

    fn arm_alarm(&mut self) {
        if matches!(self.state, SessionState::Live { .. }) {
            self.alarm.arm(self.policy.tick_interval, self.mailbox.clone(), Command::Tick);
        }
    }

    /// Drop the session (Live -> Absent). Close errors are logged; the
    /// handle is released either way.
    async fn close_session(&mut self, reason: &str) {
        if let SessionState::Live { session, .. } = std::mem::replace(&mut self.state, SessionState::Absent) {
            if let Err(error) = session.close().await {
                tracing::warn!(actor = %self.name, reason, %error, "failed to close rendering session");
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        match &self.state {
            SessionState::Absent => SessionSnapshot {
                live: false,
                idle: Duration::ZERO,
                alarm_pending: self.alarm.is_pending(),
            },
            SessionState::Live { idle, .. } => SessionSnapshot {
                live: true,
                idle: *idle,
                alarm_pending: self.alarm.is_pending(),
            },
        }
    }
}

/// Open a page, load `url` and print it. The page is closed on every path.
async fn capture(session: &mut dyn Session, url: &str, navigation_timeout: Duration) -> Result<Bytes, RenderError> {
    let mut page = session.new_page().await.map_err(RenderError::Page)?;
    let result = load_and_print(page.as_mut(), url, navigation_timeout).await;
    if let Err(error) = page.close().await {
        tracing::warn!(url, %error, "failed to close page");
    }
    result
}

async fn load_and_print(page: &mut dyn Page, url: &str, navigation_timeout: Duration) -> Result<Bytes, RenderError> {
    match tokio::time::timeout(navigation_timeout, page.goto(url, WaitUntil::NETWORK_QUIET)).await {
        Ok(navigated) => navigated.map_err(RenderError::Navigation)?,
        Err(_) => {
            return Err(RenderError::NavigationTimeout {
                url: url.to_string(),
                timeout: navigation_timeout,
            });
        }
    }

    best_effort("consent dismissal", page.dismiss_consent().await);

    page.pdf(&CaptureOptions::default()).await.map_err(RenderError::Capture)
}

/// Log and drop the error of an optional sub-step.
fn best_effort(operation: &str, result: Result<(), EngineError>) {
    match result {
        Ok(()) => {}
        Err(EngineError::Unsupported(_)) => {
            tracing::debug!(operation, "not supported by engine, skipped");
        }
        Err(error) => {
            tracing::warn!(operation, %error, "best-effort step failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryContentCache;
    use crate::ports::SystemClock;
    use crate::testing::FakeEngine;

    fn start(engine: &FakeEngine) -> (RendererHandle, Arc<InMemoryContentCache>) {
        let cache = Arc::new(InMemoryContentCache::new(Arc::new(SystemClock)));
        let (handle, _join) = spawn(
            "rendering_browser",
            Arc::new(engine.clone()),
            cache.clone(),
            RendererPolicy::default(),
        );
        (handle, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn first_render_acquires_session_and_caches() {
        let engine = FakeEngine::new();
        let (handle, cache) = start(&engine);

        handle.render_and_cache("https://example.com/a").await.unwrap();

        assert_eq!(engine.launches(), 1);
        let doc = cache.get("https://example.com/a").await.unwrap().unwrap();
        assert_eq!(doc, FakeEngine::document_for("https://example.com/a"));

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.live);
        assert!(snapshot.alarm_pending);
        assert_eq!(engine.open_pages(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_acquisition_leaves_actor_absent() {
        let engine = FakeEngine::new();
        engine.fail_next_launches(1);
        let (handle, cache) = start(&engine);

        let err = handle.render_and_cache("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, RenderError::Acquisition(_)));

        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.live);
        assert!(!snapshot.alarm_pending);
        assert!(cache.is_empty().await);

        handle.render_and_cache("https://example.com/a").await.unwrap();
        assert_eq!(engine.launches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn session_is_reused_within_idle_threshold() {
        let engine = FakeEngine::new();
        let (handle, _cache) = start(&engine);

        handle.render_and_cache("https://example.com/a").await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        handle.render_and_cache("https://example.com/b").await.unwrap();

        assert_eq!(engine.launches(), 1);
        assert_eq!(engine.closes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_closed_after_threshold() {
        let engine = FakeEngine::new();
        let (handle, _cache) = start(&engine);

        handle.render_and_cache("https://example.com/a").await.unwrap();
        tokio::time::sleep(Duration::from_secs(595)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.live);
        assert_eq!(snapshot.idle, Duration::from_secs(590));

        tokio::time::sleep(Duration::from_secs(10)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.live);
        assert!(!snapshot.alarm_pending);
        assert_eq!(engine.closes(), 1);

        handle.render_and_cache("https://example.com/a").await.unwrap();
        assert_eq!(engine.launches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn render_resets_idle_time() {
        let engine = FakeEngine::new();
        let (handle, _cache) = start(&engine);

        handle.render_and_cache("https://example.com/a").await.unwrap();
        tokio::time::sleep(Duration::from_secs(585)).await;
        handle.render_and_cache("https://example.com/b").await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap().idle, Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(585)).await;
        assert!(handle.snapshot().await.unwrap().live);
        assert_eq!(engine.launches(), 1);
        assert_eq!(engine.closes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn consent_failure_does_not_fail_render() {
        let engine = FakeEngine::new();
        engine.fail_consent(true);
        let (handle, cache) = start(&engine);

        handle.render_and_cache("https://example.com/a").await.unwrap();
        assert!(cache.get("https://example.com/a").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_session_is_replaced() {
        let engine = FakeEngine::new();
        let (handle, _cache) = start(&engine);

        handle.render_and_cache("https://example.com/a").await.unwrap();
        engine.disconnect();
        handle.render_and_cache("https://example.com/a").await.unwrap();

        assert_eq!(engine.launches(), 2);
        assert_eq!(engine.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_last_handle_closes_session() {
        let engine = FakeEngine::new();
        let cache = Arc::new(InMemoryContentCache::new(Arc::new(SystemClock)));
        let (handle, join) = spawn("r", Arc::new(engine.clone()), cache, RendererPolicy::default());

        handle.render_and_cache("https://example.com/a").await.unwrap();
        drop(handle);
        join.await.unwrap();

        assert_eq!(engine.closes(), 1);
    }

    /// Accepts reads, refuses every write.
    struct ReadOnlyCache;

    #[async_trait::async_trait]
    impl ContentCache for ReadOnlyCache {
        async fn put(&self, key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Rejected {
                key: key.to_string(),
                reason: "read-only".to_string(),
            })
        }

        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            Ok(None)
        }

        async fn list(&self, _prefix: &str) -> Result<Vec<String>, CacheError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cache_write_failure_fails_the_call_but_keeps_session() {
        let engine = FakeEngine::new();
        let (handle, _join) = spawn(
            "rendering_browser",
            Arc::new(engine.clone()),
            Arc::new(ReadOnlyCache),
            RendererPolicy::default(),
        );

        let err = handle.render_and_cache("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, RenderError::CacheWrite(CacheError::Rejected { .. })));

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.live);
        assert!(snapshot.alarm_pending);

        let err = handle.render_and_cache("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, RenderError::CacheWrite(_)));
        assert_eq!(engine.launches(), 1);
        assert_eq!(engine.captures(), 2);
        assert_eq!(engine.open_pages(), 0);
    }
}
