use std::{fmt, sync::Arc};

use swmux_config::Config;
use swmux_core::{FileService, SwManager, VirtualRouter};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SwManager>,
    pub router: Arc<VirtualRouter>,
    pub files: Arc<FileService>,
    pub config: Arc<Config>,
    /// True when generated files are persisted as real static files; the
    /// public directory gets a static mount in that case.
    pub fs_backend: bool,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn manager(&self) -> &Arc<SwManager> {
        &self.manager
    }
}
