mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use pressroom_core::app::{AppBuilder, SubmitError};
use pressroom_core::config::Settings;
use pressroom_core::domain::RunId;
use pressroom_core::impls::{FileContentCache, FileRunStore, HttpSnapshotEngine, InMemoryRunStore, OutboxMailer};
use pressroom_core::ports::{RunStore, SystemClock};

const POLL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "pressroom", about = "Render web pages to documents and deliver them", version)]
struct Cli {
    /// Optional path to a configuration file
    #[arg(long = "config-file", env = "PRESSROOM_CONFIG_FILE", value_name = "PATH", global = true)]
    config_file: Option<PathBuf>,

    /// Keep the run journal in this directory (in memory when omitted)
    #[arg(long, value_name = "DIR", global = true)]
    journal_dir: Option<PathBuf>,

    /// Keep rendered documents in this directory (defaults to <journal-dir>/cache)
    #[arg(long, value_name = "DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Directory delivered parcels are written to
    #[arg(long, value_name = "DIR", global = true)]
    outbox_dir: Option<PathBuf>,

    /// Number of pipeline workers
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Base log level (trace|debug|info|warn|error); RUST_LOG adds directives
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a URL for rendering and delivery
    Send {
        #[arg(long)]
        url: String,

        /// Recipient address
        #[arg(long)]
        email: String,

        /// Wait for the run to finish and print its final status
        #[arg(long)]
        wait: bool,
    },

    /// Show the status of a journaled run
    Status {
        /// Run id (run-...)
        id: String,
    },

    /// Continue every unfinished run in the journal
    Resume,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        let code = match e.downcast_ref::<SubmitError>() {
            Some(SubmitError::Validation(_)) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = settings::Overrides {
        journal_dir: cli.journal_dir.clone(),
        cache_dir: cli.cache_dir.clone(),
        outbox_dir: cli.outbox_dir.clone(),
        workers: cli.workers,
    };
    let settings = settings::load(cli.config_file.as_deref(), &overrides)?;

    match cli.command {
        Commands::Send { url, email, wait } => send(settings, &url, &email, wait).await,
        Commands::Status { id } => status(settings, &id).await,
        Commands::Resume => resume(settings).await,
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn RunStore>> {
    let store: Arc<dyn RunStore> = match &settings.journal_dir {
        Some(dir) => Arc::new(
            FileRunStore::open(dir)
                .await
                .with_context(|| format!("failed to open journal at {}", dir.display()))?,
        ),
        None => Arc::new(InMemoryRunStore::new()),
    };
    Ok(store)
}

async fn builder(settings: Settings, store: Arc<dyn RunStore>) -> anyhow::Result<AppBuilder> {
    let engine = HttpSnapshotEngine::new(settings.renderer_policy().navigation_timeout);
    let mailer = OutboxMailer::new(settings.outbox_dir.clone());
    let cache_dir = settings.effective_cache_dir();

    let mut builder = AppBuilder::new(settings).engine(engine).mailer(mailer).shared_store(store);
    if let Some(dir) = cache_dir {
        let cache = FileContentCache::open(&dir, Arc::new(SystemClock))
            .await
            .with_context(|| format!("failed to open cache at {}", dir.display()))?;
        builder = builder.cache(Arc::new(cache));
    }
    Ok(builder)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn send(settings: Settings, url: &str, email: &str, wait: bool) -> anyhow::Result<()> {
    let store = open_store(&settings).await?;
    let app = builder(settings, store).await?.build()?;
    let service = app.service();
    let workers = app.start();

    let submission = match service.submit(url, email).await {
        Ok(submission) => submission,
        Err(e) => {
            app.shutdown(workers).await;
            return Err(e.into());
        }
    };
    print_json(&submission)?;

    if wait {
        let status = service.wait(submission.id, POLL).await?;
        print_json(&status)?;
    }

    // in-flight runs finish before the actors stop
    app.shutdown(workers).await;
    Ok(())
}

async fn status(settings: Settings, id: &str) -> anyhow::Result<()> {
    let run_id: RunId = id.parse().with_context(|| format!("invalid run id '{id}'"))?;
    if settings.journal_dir.is_none() {
        bail!("status needs a journal: pass --journal-dir or set journal_dir");
    }
    let store = open_store(&settings).await?;
    match store.load(run_id).await? {
        Some(record) => print_json(&record.status()),
        None => bail!("run not found: {run_id}"),
    }
}

async fn resume(settings: Settings) -> anyhow::Result<()> {
    if settings.journal_dir.is_none() {
        bail!("resume needs a journal: pass --journal-dir or set journal_dir");
    }
    let store = open_store(&settings).await?;
    let app = builder(settings, store).await?.build()?;
    let service = app.service();

    let resumed = service.resume().await?;
    tracing::info!(runs = resumed, "resuming");
    let workers = app.start();

    loop {
        let counts = service.counts().await?;
        if counts.queued + counts.running + counts.waiting == 0 {
            print_json(&counts)?;
            break;
        }
        tokio::time::sleep(POLL).await;
    }

    app.shutdown(workers).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_parses_flags() {
        let cli = Cli::try_parse_from([
            "pressroom",
            "--workers",
            "3",
            "send",
            "--url",
            "https://example.com/a",
            "--email",
            "x@y.com",
            "--wait",
        ])
        .unwrap();
        assert_eq!(cli.workers, Some(3));
        assert!(matches!(cli.command, Commands::Send { wait: true, .. }));
    }
}
