//! Generated-file cache with standard conditional-request semantics.
//!
//! Named files are produced by registered generator callbacks, persisted via
//! the selected [`FileStore`] backend, and served with `ETag` /
//! `Last-Modified` validation. Generators must be pure functions of the
//! registered producers: a concurrent first-miss regeneration may run twice,
//! and last write wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use httpdate::{fmt_http_date, parse_http_date};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::response::{CONTENT_TYPE, ServedResponse};
use crate::store::{CachedFile, FileStore};

/// Value of the `action` query parameter selecting the file-serve path on
/// the shared dispatch endpoint (transient backend only).
pub const FILE_ACTION: &str = "swmux_file";

/// Query parameter naming the file to serve.
pub const FILE_PARAM: &str = "swmux_file_name";

const MAX_AGE: Duration = Duration::from_secs(86_400);
const CACHE_CONTROL: &str = "max-age=86400, public";

/// Output of a generator callback. A missing `last_modified` is filled in
/// with the generation time.
#[derive(Debug)]
pub struct GeneratedFile {
    pub content: Vec<u8>,
    pub content_type: String,
    pub last_modified: Option<SystemTime>,
}

type FileGenerator = Box<dyn Fn() -> GeneratedFile + Send + Sync>;

/// Conditional request headers relevant to cache validation, as received
/// from the client.
#[derive(Debug, Default, Clone)]
pub struct ConditionalHeaders {
    pub if_modified_since: Option<String>,
    pub if_none_match: Option<String>,
}

impl ConditionalHeaders {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Registry of generator callbacks plus the persistence backend.
pub struct FileService {
    files: RwLock<HashMap<String, FileGenerator>>,
    store: Arc<dyn FileStore>,
}

impl FileService {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Registers a generator under `name`. Nothing is generated eagerly.
    pub fn add_file<G>(&self, name: impl Into<String>, generator: G)
    where
        G: Fn() -> GeneratedFile + Send + Sync + 'static,
    {
        self.files.write().insert(name.into(), Box::new(generator));
    }

    /// Invokes the generator for `name` and persists the result.
    ///
    /// An unregistered name is not an error: the caller gets `None` and
    /// treats it as "nothing to serve". A failed persist aborts this one
    /// regeneration; stale content is never reported as fresh.
    pub async fn regenerate(&self, name: &str) -> Result<Option<CachedFile>> {
        let generated = {
            let files = self.files.read();
            let Some(generator) = files.get(name) else {
                debug!(file = %name, "regenerate requested for unregistered file");
                return Ok(None);
            };
            generator()
        };

        let cached = CachedFile {
            content: generated.content,
            content_type: generated.content_type,
            last_modified: generated.last_modified.unwrap_or_else(SystemTime::now),
        };
        self.store.put(name, &cached).await?;
        Ok(Some(cached))
    }

    /// Serves `name`, regenerating on cache miss.
    ///
    /// Returns `None` when the file is unknown or generation fails; the
    /// request is dropped without a response rather than surfacing an error.
    pub async fn serve(
        &self,
        name: &str,
        conditional: &ConditionalHeaders,
    ) -> Option<ServedResponse> {
        let cached = match self.store.get(name).await {
            Ok(Some(file)) => Some(file),
            Ok(None) => None,
            Err(err) => {
                warn!(file = %name, error = %err, "cache read failed, regenerating");
                None
            }
        };
        let cached = match cached {
            Some(file) => file,
            None => match self.regenerate(name).await {
                Ok(Some(file)) => file,
                Ok(None) => return None,
                Err(err) => {
                    error!(file = %name, error = %err, "regeneration failed");
                    return None;
                }
            },
        };

        let last_modified = fmt_http_date(cached.last_modified);
        // HTTP dates carry second precision; validate at that resolution.
        let modified = parse_http_date(&last_modified).unwrap_or(cached.last_modified);
        let etag = etag_for(&last_modified);

        let modified_since_matches = conditional
            .if_modified_since
            .as_deref()
            .and_then(|value| parse_http_date(value).ok())
            .map(|since| modified <= since)
            .unwrap_or(false);
        let none_match_matches = conditional
            .if_none_match
            .as_deref()
            .map(|value| value.split(',').any(|t| t.trim() == etag))
            .unwrap_or(false);

        if modified_since_matches || none_match_matches {
            return Some(
                ServedResponse::not_modified()
                    .header("ETag", etag)
                    .header("Last-Modified", last_modified)
                    .header("Cache-Control", CACHE_CONTROL),
            );
        }

        let expires = fmt_http_date(SystemTime::now() + MAX_AGE);
        Some(
            ServedResponse::ok(cached.content)
                .header("Expires", expires)
                .header("Cache-Control", CACHE_CONTROL)
                .header("Last-Modified", last_modified)
                .header("ETag", etag)
                .header("Pragma", "cache")
                .header(CONTENT_TYPE, cached.content_type),
        )
    }

    /// Eagerly refreshes the named entries ahead of the next request.
    /// Results are discarded; this exists purely for the persistence side
    /// effect.
    pub async fn invalidate_files(&self, names: &[&str]) {
        for name in names {
            if let Err(err) = self.regenerate(name).await {
                error!(file = %name, error = %err, "invalidation regenerate failed");
            }
        }
    }

    /// Public URL of the named file, per the active backend.
    pub fn url(&self, name: &str) -> String {
        self.store.url(name)
    }

    /// Like [`FileService::url`], with `base` stripped when the URL lives
    /// under it, for hosts that embed URLs relative to their own root.
    pub fn relative_url(&self, name: &str, base: &str) -> String {
        let url = self.url(name);
        let base = base.trim_end_matches('/');
        match url.strip_prefix(base) {
            Some(rest) if rest.starts_with('/') || rest.starts_with('?') => rest.to_string(),
            _ => url,
        }
    }
}

impl std::fmt::Debug for FileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileService")
            .field("files", &self.files.read().len())
            .finish_non_exhaustive()
    }
}

/// ETag contract: a hash of the `Last-Modified` header value, quoted.
fn etag_for(last_modified_http: &str) -> String {
    let digest = Sha256::digest(last_modified_http.as_bytes());
    format!("\"{}\"", hex::encode(digest))
}
