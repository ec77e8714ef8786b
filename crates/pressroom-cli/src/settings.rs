//! Layered settings: config file -> `PRESSROOM__*` environment -> flags.

use std::path::{Path, PathBuf};

use anyhow::Context;
use config::{Config, Environment, File};
use pressroom_core::config::Settings;

const LOCAL_CONFIG_BASENAME: &str = "pressroom";

/// Flags that override configured values.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub journal_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub outbox_dir: Option<PathBuf>,
    pub workers: Option<usize>,
}

pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Settings> {
    let mut builder = Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("PRESSROOM")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let mut settings: Settings = builder
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("invalid configuration")?;

    if let Some(dir) = &overrides.journal_dir {
        settings.journal_dir = Some(dir.clone());
    }
    if let Some(dir) = &overrides.cache_dir {
        settings.cache_dir = Some(dir.clone());
    }
    if let Some(dir) = &overrides.outbox_dir {
        settings.outbox_dir = dir.clone();
    }
    if let Some(workers) = overrides.workers {
        settings.workers = workers;
    }
    Ok(settings)
}
