//! FileContentCache - content cache on the local filesystem.
//!
//! Each entry is two files named after the SHA-256 of its key: `<hash>.bin`
//! holds the document and `<hash>.json` the key and expiry. Both are written
//! to a temporary file and renamed into place. The sidecar is renamed last,
//! so an entry only becomes visible once its document is on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::ports::{CacheError, Clock, ContentCache};

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    key: String,
    expires_at: DateTime<Utc>,
}

/// Cache directory shared by every process pointed at it.
pub struct FileContentCache {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileContentCache {
    /// Open (and create if needed) a cache directory.
    pub async fn open(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(unavailable)?;
        Ok(Self { dir, clock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stem(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", Self::stem(key)))
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::stem(key)))
    }

    async fn read_sidecar(path: &Path) -> Result<Option<Sidecar>, CacheError> {
        match fs::read(path).await {
            Ok(body) => match serde_json::from_slice(&body) {
                Ok(sidecar) => Ok(Some(sidecar)),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable cache entry");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(e)),
        }
    }

    /// Every readable sidecar in the directory with its path.
    async fn sidecars(&self) -> Result<Vec<(PathBuf, Sidecar)>, CacheError> {
        let mut found = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await.map_err(unavailable)?;
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(sidecar) = Self::read_sidecar(&path).await? {
                found.push((path, sidecar));
            }
        }
        Ok(found)
    }

    /// Remove expired entries. Failures are logged; the entry stays hidden.
    async fn prune(&self, now: DateTime<Utc>) -> Result<(), CacheError> {
        for (path, sidecar) in self.sidecars().await? {
            if sidecar.expires_at > now {
                continue;
            }
            for stale in [path.clone(), path.with_extension("bin")] {
                if let Err(error) = fs::remove_file(&stale).await {
                    if error.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %stale.display(), %error, "failed to remove expired cache entry");
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContentCache for FileContentCache {
    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| CacheError::Rejected {
            key: key.to_string(),
            reason: format!("ttl out of range: {e}"),
        })?;
        self.prune(now).await?;

        let sidecar = Sidecar {
            key: key.to_string(),
            expires_at: now + ttl,
        };
        let sidecar = serde_json::to_vec(&sidecar).map_err(unavailable)?;
        write_atomic(&self.document_path(key), &value).await?;
        write_atomic(&self.sidecar_path(key), &sidecar).await
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let Some(sidecar) = Self::read_sidecar(&self.sidecar_path(key)).await? else {
            return Ok(None);
        };
        if sidecar.key != key || sidecar.expires_at <= self.clock.now() {
            return Ok(None);
        }
        match fs::read(self.document_path(key)).await {
            Ok(body) => Ok(Some(Bytes::from(body))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .sidecars()
            .await?
            .into_iter()
            .filter(|(_, s)| s.expires_at > now && s.key.starts_with(prefix))
            .map(|(_, s)| s.key)
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn unavailable(error: impl std::fmt::Display) -> CacheError {
    CacheError::Unavailable(error.to_string())
}

async fn write_atomic(path: &Path, body: &[u8]) -> Result<(), CacheError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, body).await.map_err(unavailable)?;
    fs::rename(&tmp, path).await.map_err(unavailable)
}
