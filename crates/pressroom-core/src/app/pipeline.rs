//! Pipeline - the three-step render pipeline.
//!
//! ```text
//! cache-check ──hit──────────────────────────▶ deliver
//!      └──miss──▶ render (renderer actor) ───▶ deliver
//! ```
//!
//! Steps run strictly in order through a [`StepRunner`], so each one is
//! journaled, retried by the decider and never re-executed once completed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::step::StepRunner;
use crate::actor::RendererDirectory;
use crate::domain::{Decider, PipelineError, RenderRequest, RunId, RunOutcome, RunState, StepError};
use crate::ports::{Clock, ContentCache, DeliveryError, DeliveryReceipt, IdGenerator, Mailer, Parcel, RunStore, StoreError};

pub const CACHE_CHECK: &str = "cache-check";
pub const RENDER: &str = "render";
pub const DELIVER: &str = "deliver";

/// How the cache-check step decides membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLookup {
    /// A listed key must equal the URL.
    #[default]
    Exact,

    /// Any key starting with the URL counts as a hit.
    Prefix,
}

impl CacheLookup {
    pub fn is_hit(self, url: &str, keys: &[String]) -> bool {
        match self {
            CacheLookup::Exact => keys.iter().any(|k| k == url),
            CacheLookup::Prefix => keys.iter().any(|k| k.starts_with(url)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Logical name of the renderer actor.
    pub actor_name: String,

    /// From address of delivered parcels.
    pub sender: String,

    pub lookup: CacheLookup,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            actor_name: "rendering_browser".to_string(),
            sender: "pressroom@localhost".to_string(),
            lookup: CacheLookup::default(),
        }
    }
}

pub struct Pipeline {
    store: Arc<dyn RunStore>,
    cache: Arc<dyn ContentCache>,
    directory: Arc<RendererDirectory>,
    mailer: Arc<dyn Mailer>,
    decider: Arc<dyn Decider>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RunStore>,
        cache: Arc<dyn ContentCache>,
        directory: Arc<RendererDirectory>,
        mailer: Arc<dyn Mailer>,
        decider: Arc<dyn Decider>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            directory,
            mailer,
            decider,
            ids,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute (or continue) the run `run_id` to a terminal state.
    ///
    /// Steps already completed in the journal are replayed from their
    /// recorded results.
    pub async fn execute(&self, run_id: RunId) -> Result<RunOutcome, PipelineError> {
        let span = tracing::info_span!("pipeline", run_id = %run_id);
        self.execute_inner(run_id).instrument(span).await
    }

    async fn execute_inner(&self, run_id: RunId) -> Result<RunOutcome, PipelineError> {
        let record = self.store.load(run_id).await?.ok_or(StoreError::NotFound(run_id))?;
        match record.state {
            RunState::Complete => {
                tracing::debug!("run already complete");
                return Ok(record.output.unwrap_or_else(RunOutcome::delivered));
            }
            RunState::Errored => {
                return Err(PipelineError::AlreadyErrored {
                    run_id,
                    error: record.error.unwrap_or_default(),
                });
            }
            RunState::Queued | RunState::Running | RunState::Waiting => {}
        }

        let request = record.request.clone();
        let mut runner = StepRunner::new(
            record,
            self.store.as_ref(),
            self.decider.as_ref(),
            self.ids.as_ref(),
            self.clock.as_ref(),
        );
        runner.start().await?;
        tracing::info!(url = request.url(), "run started");

        let result = self.run_steps(&mut runner, &request).await;

        let mut record = runner.into_record();
        match result {
            Ok(outcome) => {
                record.mark_complete(outcome.clone(), self.clock.now());
                self.store.save(&record).await?;
                tracing::info!("run complete");
                Ok(outcome)
            }
            Err(error) => {
                record.mark_errored(error.to_string(), self.clock.now());
                if let Err(store_error) = self.store.save(&record).await {
                    tracing::error!(error = %store_error, "failed to journal run failure");
                }
                tracing::error!(%error, "run failed");
                Err(error)
            }
        }
    }

    async fn run_steps(&self, runner: &mut StepRunner<'_>, request: &RenderRequest) -> Result<RunOutcome, PipelineError> {
        let url = request.url();
        let recipient = request.recipient();
        let cache = self.cache.as_ref();
        let lookup = self.config.lookup;

        let cached: bool = runner
            .step(CACHE_CHECK, || async move {
                let keys = cache.list(url).await.map_err(|e| StepError::transient(e.to_string()))?;
                Ok::<_, StepError>(lookup.is_hit(url, &keys))
            })
            .await?;

        if cached {
            tracing::info!(url, "cache hit, render skipped");
        } else {
            let directory = self.directory.as_ref();
            let actor = self.config.actor_name.as_str();
            runner
                .step(RENDER, || async move {
                    let renderer = directory.get(actor).await;
                    let rendered = renderer.render_and_cache(url).await;
                    drop(renderer);
                    rendered.map_err(|e| StepError::transient(e.to_string()))
                })
                .await?;
        }

        let mailer = self.mailer.as_ref();
        let sender = self.config.sender.as_str();
        let receipt: DeliveryReceipt = runner
            .step(DELIVER, || async move {
                let document = cache
                    .get(url)
                    .await
                    .map_err(|e| StepError::transient(e.to_string()))?
                    .ok_or_else(|| StepError::transient(format!("rendered document for '{url}' missing from cache")))?;
                let parcel = Parcel::compose(sender, recipient, document, url);
                mailer.send(&parcel).await.map_err(|e| match e {
                    DeliveryError::Rejected(_) => StepError::permanent(e.to_string()),
                    DeliveryError::Unavailable(_) | DeliveryError::Io(_) => StepError::transient(e.to_string()),
                })
            })
            .await?;

        tracing::info!(receipt = %receipt.id, recipient, "document delivered");
        Ok(RunOutcome::delivered())
    }
}
