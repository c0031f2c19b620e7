//! Persistence strategies for the generated-file cache.
//!
//! Two backends sit behind one interface so the regeneration and serving
//! logic stays backend-agnostic: a direct filesystem store serving real
//! static files, and a time-bounded opaque cache entry store for hosts where
//! direct writes to the public directory are not permitted. The strategy is
//! selected once at startup via [`fs::probe_writable`].

use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::Result;

mod fs;
mod transient;

pub use fs::{FsStore, probe_writable};
pub use transient::TransientStore;

/// A cached generated file as persisted by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    pub content: Vec<u8>,
    pub content_type: String,
    pub last_modified: SystemTime,
}

/// Storage strategy for named generated files.
///
/// `put` replaces the whole entry atomically from the caller's perspective;
/// concurrent writers may race, last write wins.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, name: &str, file: &CachedFile) -> Result<()>;

    async fn get(&self, name: &str) -> Result<Option<CachedFile>>;

    /// Externally reachable URL for the named file. For the filesystem
    /// backend this is a direct static URL; for the transient backend it
    /// points at the dispatch endpoint's file-serve action.
    fn url(&self, name: &str) -> String;
}

/// File names are single path segments; anything else would escape the
/// store's directory or its key namespace.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'_' | b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_are_single_segments() {
        assert!(is_valid_name("sw-registrar.js"));
        assert!(is_valid_name("foo_bar.min.js"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("..\\evil"));
        assert!(!is_valid_name("name with space"));
    }
}
