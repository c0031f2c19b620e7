//! # swmux Server
//!
//! HTTP server around `swmux-core`: one dispatch endpoint serving composed
//! service workers and cached generated files, plus a static mount when the
//! filesystem backend is active.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use infra::startup::{build_state, build_state_with_store};
