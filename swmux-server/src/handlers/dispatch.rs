//! The single fixed dispatch endpoint.
//!
//! Every virtual route and (on the transient backend) every cached file is
//! reachable through this one handler, selected by the `action` query
//! parameter. Requests that carry no recognizable action, an unknown route
//! key, or an unknown file name get an empty `200 OK`: this endpoint never
//! reveals which routes or files exist.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use swmux_core::{
    ConditionalHeaders, FILE_ACTION, FILE_PARAM, ROUTE_ACTION, ServedResponse,
};

use crate::infra::app_state::AppState;

pub async fn dispatch_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match params.get("action").map(String::as_str) {
        Some(ROUTE_ACTION) => match state.router.dispatch(&params) {
            Some(served) => into_axum_response(served),
            None => empty_ok(),
        },
        Some(FILE_ACTION) => {
            let Some(name) = params.get(FILE_PARAM) else {
                return empty_ok();
            };
            let conditional = conditional_from_headers(&headers);
            match state.files.serve(name, &conditional).await {
                Some(served) => into_axum_response(served),
                None => empty_ok(),
            }
        }
        _ => empty_ok(),
    }
}

/// The silent no-op contract: nothing to serve means an empty body with no
/// error status.
fn empty_ok() -> Response {
    StatusCode::OK.into_response()
}

fn conditional_from_headers(headers: &HeaderMap) -> ConditionalHeaders {
    ConditionalHeaders {
        if_modified_since: headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        if_none_match: headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// Writes the core's response out verbatim; nothing may be appended after
/// the body.
fn into_axum_response(served: ServedResponse) -> Response {
    let mut builder = Response::builder().status(served.status);
    for (name, value) in &served.headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(served.body)).unwrap_or_else(|err| {
        error!(error = %err, "failed to materialize dispatch response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}
