use std::sync::Arc;

use axum_test::{TestResponse, TestServer};
use tempfile::TempDir;

use swmux_config::Config;
use swmux_core::TransientStore;
use swmux_server::{AppState, build_state, build_state_with_store, routes};

// Code is used by test modules, but not in this scope
#[allow(unused)]
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub tempdir: TempDir,
}

#[allow(unused)]
pub fn test_config(tempdir: &TempDir) -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        site_root: "/".to_string(),
        dispatch_path: "/swmux/dispatch".to_string(),
        public_dir: tempdir.path().join("public"),
        public_url_path: "/static".to_string(),
        cache_dir: tempdir.path().join("cache"),
        data_dir: tempdir.path().join("data"),
        cors_allowed_origins: Vec::new(),
        demo_producer: false,
    }
}

/// App built through the startup probe; in a writable tempdir this selects
/// the filesystem backend.
#[allow(unused)]
pub async fn build_probed_app() -> TestApp {
    let tempdir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(&tempdir));
    let state = build_state(config).await;
    let server = TestServer::new(routes::create_router(state.clone())).unwrap();
    TestApp {
        server,
        state,
        tempdir,
    }
}

/// App pinned to the transient backend, where generated files are served
/// through the dispatch endpoint.
#[allow(unused)]
pub fn build_transient_app() -> TestApp {
    let tempdir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(&tempdir));
    let store = Arc::new(TransientStore::new(
        &config.cache_dir,
        config.dispatch_path.clone(),
    ));
    let state = build_state_with_store(config, store, false);
    let server = TestServer::new(routes::create_router(state.clone())).unwrap();
    TestApp {
        server,
        state,
        tempdir,
    }
}

/// Requests a URL minted by the core (dispatch path + encoded query),
/// re-adding each query parameter the way a browser would send it.
#[allow(unused)]
pub async fn get_minted_url(server: &TestServer, url: &str) -> TestResponse {
    let (path, query) = url.split_once('?').expect("minted URL has a query");
    let mut request = server.get(path);
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').expect("query pair");
        request = request.add_query_param(key, urlencoding::decode(value).unwrap().into_owned());
    }
    request.await
}
