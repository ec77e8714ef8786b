//! AppBuilder - construction and wiring of the application.
//!
//! # Fail-fast
//! `build()` checks that every required collaborator was provided and that
//! the settings are usable, and reports everything missing at once.

use std::sync::Arc;

use super::pipeline::Pipeline;
use super::service::PipelineService;
use super::worker_loop::WorkerGroup;
use crate::actor::RendererDirectory;
use crate::config::Settings;
use crate::domain::{Decider, DefaultDecider};
use crate::impls::InMemoryContentCache;
use crate::ports::{Clock, ContentCache, IdGenerator, Mailer, RenderEngine, RunStore, SystemClock, UlidGenerator};
use crate::queue::{InMemoryRunQueue, RunQueue};

/// AppBuilder builds an [`App`].
///
/// # Example
/// ```ignore
/// let app = AppBuilder::new(settings)
///     .engine(HttpSnapshotEngine::new(Duration::from_secs(30)))
///     .mailer(OutboxMailer::new("outbox"))
///     .store(InMemoryRunStore::new())
///     .build()?;
/// let workers = app.start();
/// ```
///
/// The content cache defaults to an [`InMemoryContentCache`] and the clock to
/// [`SystemClock`].
pub struct AppBuilder {
    settings: Settings,
    engine: Option<Arc<dyn RenderEngine>>,
    mailer: Option<Arc<dyn Mailer>>,
    store: Option<Arc<dyn RunStore>>,
    cache: Option<Arc<dyn ContentCache>>,
    clock: Option<Arc<dyn Clock>>,
    decider: Option<Arc<dyn Decider>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing collaborators: {0:?}. These must be provided before build().")]
    MissingCollaborators(Vec<&'static str>),

    #[error("Invalid settings: {}", .0.join("; "))]
    InvalidSettings(Vec<String>),
}

impl AppBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            engine: None,
            mailer: None,
            store: None,
            cache: None,
            clock: None,
            decider: None,
        }
    }

    pub fn engine(self, engine: impl RenderEngine + 'static) -> Self {
        self.shared_engine(Arc::new(engine))
    }

    pub fn shared_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn mailer(self, mailer: impl Mailer + 'static) -> Self {
        self.shared_mailer(Arc::new(mailer))
    }

    pub fn shared_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn store(self, store: impl RunStore + 'static) -> Self {
        self.shared_store(Arc::new(store))
    }

    pub fn shared_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the retry decider built from `settings.retry`.
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let problems = self.settings.problems();
        if !problems.is_empty() {
            return Err(BuildError::InvalidSettings(problems));
        }

        let (Some(engine), Some(mailer), Some(store)) = (self.engine.clone(), self.mailer.clone(), self.store.clone())
        else {
            let missing = [
                ("engine", self.engine.is_none()),
                ("mailer", self.mailer.is_none()),
                ("store", self.store.is_none()),
            ]
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(name, _)| name)
            .collect();
            return Err(BuildError::MissingCollaborators(missing));
        };

        let settings = self.settings;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache: Arc<dyn ContentCache> = self
            .cache
            .unwrap_or_else(|| Arc::new(InMemoryContentCache::new(clock.clone())));
        let decider: Arc<dyn Decider> = self
            .decider
            .unwrap_or_else(|| Arc::new(DefaultDecider::new(settings.retry_policy())));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
        let queue: Arc<dyn RunQueue> = Arc::new(InMemoryRunQueue::default());

        let directory = Arc::new(RendererDirectory::new(engine, cache.clone(), settings.renderer_policy()));
        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            cache.clone(),
            directory.clone(),
            mailer,
            decider,
            ids.clone(),
            clock.clone(),
            settings.pipeline_config(),
        ));
        let service = Arc::new(PipelineService::new(store, queue.clone(), ids, clock));

        Ok(App {
            service,
            pipeline,
            directory,
            cache,
            queue,
            workers: settings.workers,
        })
    }
}

/// A wired application.
///
/// Workers are started separately so the caller controls when runs begin to
/// execute (for example after `resume`).
pub struct App {
    service: Arc<PipelineService>,
    pipeline: Arc<Pipeline>,
    directory: Arc<RendererDirectory>,
    cache: Arc<dyn ContentCache>,
    queue: Arc<dyn RunQueue>,
    workers: usize,
}

impl App {
    pub fn service(&self) -> Arc<PipelineService> {
        self.service.clone()
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    pub fn directory(&self) -> Arc<RendererDirectory> {
        self.directory.clone()
    }

    pub fn cache(&self) -> Arc<dyn ContentCache> {
        self.cache.clone()
    }

    /// Spawn the configured number of workers.
    pub fn start(&self) -> WorkerGroup {
        WorkerGroup::spawn(self.workers, self.queue.clone(), self.pipeline.clone())
    }

    /// Stop accepting runs, let in-flight runs finish, then stop the
    /// renderer actors (closing their sessions).
    pub async fn shutdown(&self, workers: WorkerGroup) {
        self.service.close();
        workers.shutdown_and_join().await;
        self.directory.shutdown().await;
        tracing::info!("pipeline stopped");
    }
}
