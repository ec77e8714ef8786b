//! Directory of renderer actors addressed by logical name.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::renderer::{self, RendererHandle, RendererPolicy};
use crate::ports::{ContentCache, RenderEngine};

struct Entry {
    handle: RendererHandle,
    join: JoinHandle<()>,
}

/// Resolves a logical name to the one actor with that name, spawning it on
/// first use.
///
/// Every caller asking for the same name talks to the same mailbox, so the
/// actor's session is shared by all pipeline runs in the process.
pub struct RendererDirectory {
    engine: Arc<dyn RenderEngine>,
    cache: Arc<dyn ContentCache>,
    policy: RendererPolicy,
    actors: Mutex<HashMap<String, Entry>>,
}

impl RendererDirectory {
    pub fn new(engine: Arc<dyn RenderEngine>, cache: Arc<dyn ContentCache>, policy: RendererPolicy) -> Self {
        Self {
            engine,
            cache,
            policy,
            actors: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &RendererPolicy {
        &self.policy
    }

    /// Handle to the actor named `name`.
    ///
    /// An actor whose task has ended is replaced by a fresh one.
    pub async fn get(&self, name: &str) -> RendererHandle {
        let mut actors = self.actors.lock().await;
        if let Some(entry) = actors.get(name) {
            if !entry.join.is_finished() {
                return entry.handle.clone();
            }
            tracing::warn!(actor = name, "renderer actor had stopped, respawning");
        }

        let (handle, join) = renderer::spawn(name, self.engine.clone(), self.cache.clone(), self.policy.clone());
        actors.insert(
            name.to_string(),
            Entry {
                handle: handle.clone(),
                join,
            },
        );
        handle
    }

    /// Names of the actors spawned so far.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actors.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Release the directory's handles and wait for the actors to stop.
    ///
    /// Actors still referenced by in-flight callers finish their mailbox
    /// first. Live sessions are closed on the way out.
    pub async fn shutdown(&self) {
        let entries: Vec<(String, Entry)> = self.actors.lock().await.drain().collect();
        for (name, entry) in entries {
            drop(entry.handle);
            if let Err(error) = entry.join.await {
                tracing::error!(actor = %name, %error, "renderer actor task failed");
            }
        }
    }
}
