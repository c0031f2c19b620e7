//! # swmux Server
//!
//! Serves collaboratively composed service workers.
//!
//! ## Overview
//!
//! Browsers allow one service worker per scope, so independent plugins
//! cannot each register their own. swmux composes one worker per scope out
//! of registered fragments and serves:
//!
//! - the per-scope worker scripts, through a single dispatch endpoint
//! - the registrar script that performs the browser-side registrations
//! - cached generated files, as static files or transient cache entries
//!   depending on what the host permits

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swmux_config::Config;
use swmux_core::StaticContent;
use swmux_server::{build_state, routes};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "swmux-server")]
#[command(about = "Collaborative service worker composition and serving")]
struct Cli {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(host) = args.host {
        config.server_host = host;
    }
    config
        .ensure_directories()
        .context("failed to prepare directories")?;

    let config = Arc::new(config);
    let state = build_state(config.clone()).await;

    if config.demo_producer {
        state
            .manager
            .sw("")
            .add_content(StaticContent::new("console.log('swmux demo producer')"));
        info!("demo producer registered at the default scope");
    }

    // Producers register during setup; snapshot the final scope set once,
    // refreshing the cached registrar if the set changed since last publish.
    state
        .manager
        .check_registrations()
        .await
        .context("failed to reconcile scope registrations")?;

    info!(registrar = %state.manager.registrar_url(), "registrar script ready");

    let app = routes::create_router(state).layer(TraceLayer::new_for_http());
    let app = match cors_layer(&config) {
        Some(cors) => app.layer(cors),
        None => app,
    };

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("invalid server host/port")?;
    info!("swmux server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind server address")?;
    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}

fn cors_layer(config: &Config) -> Option<CorsLayer> {
    if config.cors_allowed_origins.is_empty() {
        return None;
    }
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET]),
    )
}
