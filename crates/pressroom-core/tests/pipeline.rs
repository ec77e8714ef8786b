use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use pressroom_core::app::{App, AppBuilder, CACHE_CHECK, CacheLookup, DELIVER, RENDER, SubmitError, WorkerGroup};
use pressroom_core::config::Settings;
use pressroom_core::domain::{RunId, RunState, RunStatus, StepState, ValidationError};
use pressroom_core::impls::{InMemoryContentCache, InMemoryRunStore};
use pressroom_core::ports::{CacheError, ContentCache, SystemClock};
use pressroom_core::testing::{FakeEngine, RecordingMailer};

const URL: &str = "https://example.com/a";
const RECIPIENT: &str = "x@y.com";
const POLL: Duration = Duration::from_millis(50);

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.workers = 1;
    settings.retry.base_delay_ms = 100;
    settings
}

struct Harness {
    app: App,
    workers: WorkerGroup,
    engine: FakeEngine,
    mailer: RecordingMailer,
}

impl Harness {
    fn start(settings: Settings, cache: Arc<dyn ContentCache>) -> Self {
        let engine = FakeEngine::new();
        let mailer = RecordingMailer::new();
        let app = AppBuilder::new(settings)
            .engine(engine.clone())
            .mailer(mailer.clone())
            .store(InMemoryRunStore::new())
            .cache(cache)
            .build()
            .unwrap();
        let workers = app.start();
        Self {
            app,
            workers,
            engine,
            mailer,
        }
    }

    fn with_memory_cache(settings: Settings) -> Self {
        Self::start(settings, Arc::new(InMemoryContentCache::new(Arc::new(SystemClock))))
    }

    async fn run(&self, url: &str) -> RunStatus {
        let service = self.app.service();
        let submission = service.submit(url, RECIPIENT).await.unwrap();
        service.wait(submission.id, POLL).await.unwrap()
    }

    async fn stop(self) {
        self.app.shutdown(self.workers).await;
    }
}

fn step<'a>(status: &'a RunStatus, name: &str) -> Option<&'a pressroom_core::domain::StepStatus> {
    status.steps.iter().find(|s| s.name == name)
}

#[tokio::test(start_paused = true)]
async fn miss_renders_caches_and_delivers() {
    let h = Harness::with_memory_cache(settings());

    let status = h.run(URL).await;

    assert_eq!(status.status, RunState::Complete);
    let output = status.output.clone().unwrap();
    assert!(output.success);
    assert_eq!(output.message, "Article processed successfully");

    let names: Vec<&str> = status.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec![CACHE_CHECK, RENDER, DELIVER]);
    assert_eq!(
        step(&status, CACHE_CHECK).unwrap().state,
        StepState::Completed {
            output: serde_json::json!(false)
        }
    );

    assert_eq!(h.engine.captures(), 1);
    let cached = h.app.cache().get(URL).await.unwrap();
    assert_eq!(cached, Some(FakeEngine::document_for(URL)));

    let parcels = h.mailer.parcels();
    assert_eq!(parcels.len(), 1);
    assert_eq!(parcels[0].recipient, RECIPIENT);
    assert_eq!(parcels[0].attachment.content, FakeEngine::document_for(URL));
    assert_eq!(parcels[0].attachment.filename, "https-example-com-a.pdf");

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn second_run_hits_cache_and_skips_render() {
    let h = Harness::with_memory_cache(settings());

    let first = h.run(URL).await;
    let second = h.run(URL).await;

    assert_eq!(first.status, RunState::Complete);
    assert_eq!(second.status, RunState::Complete);
    assert!(step(&second, RENDER).is_none());
    assert_eq!(
        step(&second, CACHE_CHECK).unwrap().state,
        StepState::Completed {
            output: serde_json::json!(true)
        }
    );

    assert_eq!(h.engine.captures(), 1);
    assert_eq!(h.engine.launches(), 1);
    assert_eq!(h.mailer.deliveries(), 2);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn acquisition_failures_exhaust_retries() {
    let h = Harness::with_memory_cache(settings());
    h.engine.fail_next_launches(3);

    let status = h.run(URL).await;

    assert_eq!(status.status, RunState::Errored);
    let error = status.error.clone().unwrap();
    assert!(error.contains("'render'"), "{error}");
    assert!(error.contains("after 3 attempts"), "{error}");

    let render = step(&status, RENDER).unwrap();
    assert_eq!(render.attempts, 3);
    assert!(matches!(render.state, StepState::Failed { .. }));
    assert!(step(&status, DELIVER).is_none());
    assert_eq!(h.mailer.deliveries(), 0);
    assert_eq!(h.engine.launches(), 0);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn acquisition_recovers_within_budget() {
    let h = Harness::with_memory_cache(settings());
    h.engine.fail_next_launches(2);

    let status = h.run(URL).await;

    assert_eq!(status.status, RunState::Complete);
    assert_eq!(step(&status, RENDER).unwrap().attempts, 3);
    assert_eq!(h.mailer.deliveries(), 1);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_request_is_rejected_without_a_run() {
    let h = Harness::with_memory_cache(settings());
    let service = h.app.service();

    let err = service.submit("not a url", RECIPIENT).await.unwrap_err();
    assert!(matches!(err, SubmitError::Validation(ValidationError::InvalidUrl(_))));

    let err = service.submit(URL, "nobody").await.unwrap_err();
    assert!(matches!(err, SubmitError::Validation(ValidationError::InvalidEmail(_))));

    assert_eq!(service.counts().await.unwrap().total(), 0);
    assert_eq!(h.engine.launches(), 0);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn consent_failure_does_not_fail_the_run() {
    let h = Harness::with_memory_cache(settings());
    h.engine.fail_consent(true);

    let status = h.run(URL).await;

    assert_eq!(status.status, RunState::Complete);
    assert_eq!(step(&status, RENDER).unwrap().attempts, 1);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn delivery_failure_is_retried_without_rendering_again() {
    let h = Harness::with_memory_cache(settings());
    h.mailer.fail_next(1);

    let status = h.run(URL).await;

    assert_eq!(status.status, RunState::Complete);
    assert_eq!(step(&status, RENDER).unwrap().attempts, 1);
    assert_eq!(step(&status, DELIVER).unwrap().attempts, 2);
    assert_eq!(h.engine.captures(), 1);
    assert_eq!(h.mailer.deliveries(), 1);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn session_is_shared_across_runs_and_closed_when_idle() {
    let h = Harness::with_memory_cache(settings());

    h.run("https://example.com/a").await;
    h.run("https://example.com/b").await;
    assert_eq!(h.engine.launches(), 1);

    tokio::time::sleep(Duration::from_secs(700)).await;
    assert_eq!(h.engine.closes(), 1);

    let status = h.run("https://example.com/c").await;
    assert_eq!(status.status, RunState::Complete);
    assert_eq!(h.engine.launches(), 2);

    // shutdown closes the live session
    let engine = h.engine.clone();
    h.stop().await;
    assert_eq!(engine.closes(), 2);
}

/// Accepts writes and forgets them.
struct ForgetfulCache;

#[async_trait]
impl ContentCache for ForgetfulCache {
    async fn put(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<String>, CacheError> {
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn artifact_missing_after_render_fails_delivery() {
    let h = Harness::start(settings(), Arc::new(ForgetfulCache));

    let status = h.run(URL).await;

    assert_eq!(status.status, RunState::Errored);
    assert!(matches!(step(&status, RENDER).unwrap().state, StepState::Completed { .. }));
    let deliver = step(&status, DELIVER).unwrap();
    assert_eq!(deliver.attempts, 3);
    assert!(deliver.last_error.as_deref().unwrap().contains("missing from cache"));
    assert_eq!(h.engine.captures(), 1);
    assert_eq!(h.mailer.deliveries(), 0);

    h.stop().await;
}

async fn seeded_cache(key: &str) -> Arc<InMemoryContentCache> {
    let cache = Arc::new(InMemoryContentCache::new(Arc::new(SystemClock)));
    cache
        .put(key, Bytes::from_static(b"%PDF-other"), Duration::from_secs(3600))
        .await
        .unwrap();
    cache
}

#[tokio::test(start_paused = true)]
async fn exact_lookup_ignores_longer_keys() {
    let cache = seeded_cache("https://example.com/ab").await;
    let h = Harness::start(settings(), cache);

    let status = h.run(URL).await;

    assert_eq!(status.status, RunState::Complete);
    assert_eq!(h.engine.captures(), 1);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn prefix_lookup_takes_longer_key_as_hit() {
    let cache = seeded_cache("https://example.com/ab").await;
    let mut settings = settings();
    settings.cache.lookup = CacheLookup::Prefix;
    let h = Harness::start(settings, cache);

    let status = h.run(URL).await;

    // the hit skips render, then the exact read finds nothing
    assert_eq!(status.status, RunState::Errored);
    assert!(step(&status, RENDER).is_none());
    assert_eq!(step(&status, DELIVER).unwrap().attempts, 3);
    assert_eq!(h.engine.captures(), 0);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn status_of_unknown_run_is_none() {
    let h = Harness::with_memory_cache(settings());
    let unknown = RunId::from_ulid(ulid::Ulid::new());
    assert!(h.app.service().status(unknown).await.unwrap().is_none());
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn counts_reflect_finished_runs() {
    let h = Harness::with_memory_cache(settings());
    h.run("https://example.com/a").await;
    h.mailer.fail_next(3);
    h.run("https://example.com/b").await;

    let counts = h.app.service().counts().await.unwrap();
    assert_eq!(counts.complete, 1);
    assert_eq!(counts.errored, 1);
    assert_eq!(counts.total(), 2);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_delivery_fails_without_retrying() {
    let h = Harness::with_memory_cache(settings());
    h.mailer.reject_all(true);

    let status = h.run(URL).await;

    assert_eq!(status.status, RunState::Errored);
    let error = status.error.clone().unwrap();
    assert!(error.contains("failed permanently"), "{error}");
    assert!(error.contains("does not exist"), "{error}");
    assert_eq!(step(&status, DELIVER).unwrap().attempts, 1);
    // the rendered document stays cached for a corrected request
    assert!(h.app.cache().get(URL).await.unwrap().is_some());

    h.stop().await;
}
