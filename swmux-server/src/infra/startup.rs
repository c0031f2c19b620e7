//! State construction and backend selection.

use std::sync::Arc;

use tracing::{info, warn};

use swmux_config::Config;
use swmux_core::{
    FileService, FileStore, FsStore, JsonFileSettings, SwManager, TransientStore, VirtualRouter,
    probe_writable,
};

use crate::infra::app_state::AppState;

/// Builds the application state, probing the public directory once to decide
/// the file persistence backend: real static files when the directory is
/// writable, transient cache entries served through the dispatch endpoint
/// otherwise.
pub async fn build_state(config: Arc<Config>) -> AppState {
    let fs_backend = probe_writable(&config.public_dir).await;
    let store: Arc<dyn FileStore> = if fs_backend {
        info!(
            dir = %config.public_dir.display(),
            "serving generated files as static files"
        );
        Arc::new(FsStore::new(&config.public_dir, &config.public_url_path))
    } else {
        warn!(
            dir = %config.public_dir.display(),
            "public directory not writable, falling back to transient cache entries"
        );
        Arc::new(TransientStore::new(
            &config.cache_dir,
            config.dispatch_path.clone(),
        ))
    };
    build_state_with_store(config, store, fs_backend)
}

/// Builds the application state around an explicit store. Tests use this to
/// pin a backend without relying on filesystem permissions.
pub fn build_state_with_store(
    config: Arc<Config>,
    store: Arc<dyn FileStore>,
    fs_backend: bool,
) -> AppState {
    let router = Arc::new(VirtualRouter::new(config.dispatch_path.clone()));
    let files = Arc::new(FileService::new(store));
    let settings = Arc::new(JsonFileSettings::new(config.settings_path()));
    let manager = SwManager::new(
        config.site_root.clone(),
        router.clone(),
        files.clone(),
        settings,
    );

    AppState {
        manager,
        router,
        files,
        config,
        fs_backend,
    }
}
