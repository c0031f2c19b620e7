//! Opaque cache-entry backend.
//!
//! Fallback for hosts where the public directory is not writable. Each file
//! is kept as a pair of `cacache` entries (content bytes plus a small JSON
//! meta record) with an absolute expiry far in the future, practically
//! forever. Reads are served through the dispatch endpoint's file-serve
//! action, which applies the conditional-request logic itself.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwError};
use crate::serve_file::{FILE_ACTION, FILE_PARAM};

use super::{CachedFile, FileStore, is_valid_name};

/// Entry lifetime: one year, refreshed on every regeneration.
const TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

const CONTENT_PREFIX: &str = "swmux_file:";
const META_PREFIX: &str = "swmux_file_meta:";

#[derive(Debug, Serialize, Deserialize)]
struct TransientMeta {
    content_type: String,
    last_modified_ms: i64,
    expires_at_ms: i64,
}

/// A thin typed wrapper over `cacache` for generated files.
#[derive(Clone, Debug)]
pub struct TransientStore {
    root: PathBuf,
    dispatch_path: String,
}

impl TransientStore {
    /// `cache_dir` is the cacache root; `dispatch_path` the fixed endpoint
    /// that serves reads back out.
    pub fn new(cache_dir: &Path, dispatch_path: impl Into<String>) -> Self {
        Self {
            root: cache_dir.to_path_buf(),
            dispatch_path: dispatch_path.into(),
        }
    }

    fn keys(name: &str) -> Result<(String, String)> {
        if !is_valid_name(name) {
            return Err(SwError::InvalidName(name.to_string()));
        }
        Ok((
            format!("{CONTENT_PREFIX}{name}"),
            format!("{META_PREFIX}{name}"),
        ))
    }

    async fn read_entry(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match cacache::read(&self.root, key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(err) => Err(SwError::Cache(format!("cacache read failed: {err}"))),
        }
    }
}

#[async_trait]
impl FileStore for TransientStore {
    async fn put(&self, name: &str, file: &CachedFile) -> Result<()> {
        let (content_key, meta_key) = Self::keys(name)?;

        let now = Utc::now();
        let meta = TransientMeta {
            content_type: file.content_type.clone(),
            last_modified_ms: DateTime::<Utc>::from(file.last_modified).timestamp_millis(),
            expires_at_ms: (now + chrono::Duration::seconds(TTL_SECONDS)).timestamp_millis(),
        };
        let meta_bytes = serde_json::to_vec(&meta)?;

        cacache::write(&self.root, &content_key, &file.content)
            .await
            .map_err(|err| SwError::Cache(format!("cacache write failed: {err}")))?;
        cacache::write(&self.root, &meta_key, &meta_bytes)
            .await
            .map_err(|err| SwError::Cache(format!("cacache meta write failed: {err}")))?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<CachedFile>> {
        let (content_key, meta_key) = Self::keys(name)?;

        let Some(meta_bytes) = self.read_entry(&meta_key).await? else {
            return Ok(None);
        };
        let meta: TransientMeta = serde_json::from_slice(&meta_bytes)?;

        if Utc::now().timestamp_millis() >= meta.expires_at_ms {
            return Ok(None);
        }

        let Some(content) = self.read_entry(&content_key).await? else {
            return Ok(None);
        };

        let last_modified = Utc
            .timestamp_millis_opt(meta.last_modified_ms)
            .single()
            .map(SystemTime::from)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        Ok(Some(CachedFile {
            content,
            content_type: meta.content_type,
            last_modified,
        }))
    }

    fn url(&self, name: &str) -> String {
        format!(
            "{}?action={}&{}={}",
            self.dispatch_path,
            FILE_ACTION,
            FILE_PARAM,
            urlencoding::encode(name)
        )
    }
}
