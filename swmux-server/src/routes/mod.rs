use axum::{Router, routing::get};
use tower_http::services::ServeDir;

use crate::handlers::dispatch::dispatch_handler;
use crate::infra::app_state::AppState;

/// Assembles the application router: the fixed dispatch endpoint, a
/// liveness probe, and a static mount for generated files when the
/// filesystem backend is active.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route(&state.config.dispatch_path, get(dispatch_handler))
        .route("/healthz", get(healthz));

    if state.fs_backend {
        router = router.nest_service(
            &state.config.public_url_path,
            ServeDir::new(&state.config.public_dir),
        );
    }

    router.with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
