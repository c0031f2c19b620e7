//! Direct filesystem backend.
//!
//! Each named file is persisted as a real file under a dedicated
//! subdirectory of the host's public directory and served as plain static
//! content, so reads bypass the dispatch path entirely and native HTTP
//! caching applies. A JSON sidecar keeps the content type and modification
//! time the serving layer needs when regenerating.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{Result, SwError};

use super::{CachedFile, FileStore, is_valid_name};

/// Subdirectory of the public dir that holds generated files.
pub const FILES_SUBDIR: &str = "swmux_files";

#[derive(Debug, Serialize, Deserialize)]
struct SidecarMeta {
    content_type: String,
    last_modified: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
    public_base: String,
}

impl FsStore {
    /// `public_dir` is the directory served as static content and
    /// `public_url_path` its URL prefix; generated files land under
    /// `<public_dir>/swmux_files/`.
    pub fn new(public_dir: &Path, public_url_path: &str) -> Self {
        Self {
            root: public_dir.join(FILES_SUBDIR),
            public_base: format!(
                "{}/{}",
                public_url_path.trim_end_matches('/'),
                FILES_SUBDIR
            ),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn content_path(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_name(name) {
            return Err(SwError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn sidecar_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(format!("{name}.meta.json")))
    }

    async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|err| {
            SwError::Internal(format!(
                "failed to create generated file dir {:?}: {err}",
                self.root
            ))
        })
    }

    /// Atomic replace: write to a temp name, then rename over the target.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = self
            .root
            .join(format!(".tmp-{}", Uuid::new_v4().simple()));

        let mut file = tokio::fs::File::create(&tmp).await.map_err(|err| {
            SwError::Internal(format!("failed to create temp file {tmp:?}: {err}"))
        })?;
        file.write_all(bytes).await.map_err(|err| {
            SwError::Internal(format!("failed to write temp file {tmp:?}: {err}"))
        })?;
        file.flush().await.map_err(|err| {
            SwError::Internal(format!("failed to flush temp file {tmp:?}: {err}"))
        })?;
        drop(file);

        tokio::fs::rename(&tmp, path).await.map_err(|err| {
            SwError::Internal(format!(
                "failed to move generated file {tmp:?} -> {path:?}: {err}"
            ))
        })
    }
}

#[async_trait]
impl FileStore for FsStore {
    async fn put(&self, name: &str, file: &CachedFile) -> Result<()> {
        let content_path = self.content_path(name)?;
        let sidecar_path = self.sidecar_path(name)?;
        self.ensure_root().await?;

        let meta = SidecarMeta {
            content_type: file.content_type.clone(),
            last_modified: DateTime::<Utc>::from(file.last_modified),
        };
        let meta_bytes = serde_json::to_vec(&meta)?;

        self.write_atomic(&content_path, &file.content).await?;
        self.write_atomic(&sidecar_path, &meta_bytes).await
    }

    async fn get(&self, name: &str) -> Result<Option<CachedFile>> {
        let content_path = self.content_path(name)?;
        let sidecar_path = self.sidecar_path(name)?;

        let meta_bytes = match tokio::fs::read(&sidecar_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let meta: SidecarMeta = serde_json::from_slice(&meta_bytes)?;

        let content = match tokio::fs::read(&content_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(CachedFile {
            content,
            content_type: meta.content_type,
            last_modified: SystemTime::from(meta.last_modified),
        }))
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}", self.public_base, name)
    }
}

/// Capability probe deciding the backend at startup: attempt a real write in
/// `dir` and clean it up.
pub async fn probe_writable(dir: &Path) -> bool {
    if tokio::fs::create_dir_all(dir).await.is_err() {
        return false;
    }
    let probe = dir.join(format!(".swmux-probe-{}", Uuid::new_v4().simple()));
    match tokio::fs::write(&probe, b"probe").await {
        Ok(()) => {
            let _ = tokio::fs::remove_file(&probe).await;
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path(), "/static");

        let file = CachedFile {
            content: b"console.log(1)".to_vec(),
            content_type: "application/javascript".to_string(),
            last_modified: SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000),
        };
        store.put("app.js", &file).await.unwrap();

        let read = store.get("app.js").await.unwrap().unwrap();
        assert_eq!(read.content, file.content);
        assert_eq!(read.content_type, file.content_type);
        assert_eq!(read.last_modified, file.last_modified);
    }

    #[tokio::test]
    async fn get_of_unknown_name_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path(), "/static");
        assert!(store.get("missing.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_the_whole_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path(), "/static");

        let first = CachedFile {
            content: b"v1".to_vec(),
            content_type: "text/plain".to_string(),
            last_modified: SystemTime::now(),
        };
        let second = CachedFile {
            content: b"v2".to_vec(),
            content_type: "application/javascript".to_string(),
            last_modified: SystemTime::now(),
        };
        store.put("f.js", &first).await.unwrap();
        store.put("f.js", &second).await.unwrap();

        let read = store.get("f.js").await.unwrap().unwrap();
        assert_eq!(read.content, b"v2");
        assert_eq!(read.content_type, "application/javascript");
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path(), "/static");
        let file = CachedFile {
            content: Vec::new(),
            content_type: "text/plain".to_string(),
            last_modified: SystemTime::now(),
        };
        assert!(store.put("../escape", &file).await.is_err());
    }

    #[test]
    fn static_urls_join_base_and_name() {
        let store = FsStore::new(Path::new("/srv/public"), "/static/");
        assert_eq!(store.url("sw-registrar.js"), "/static/swmux_files/sw-registrar.js");
    }

    #[tokio::test]
    async fn probe_succeeds_in_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(probe_writable(dir.path()).await);
    }
}
