//! Virtual routing through a single fixed dispatch endpoint.
//!
//! The router never relies on host URL rewriting: every registered route is
//! reachable through one physical endpoint, selected by an `action` query
//! parameter and identified by a trigger parameter carrying the URL-encoded
//! route key. Callers register a route under a desired (possibly fabricated)
//! URL, and only its path component is kept as the key.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;
use url::Url;

use crate::response::ServedResponse;

/// Value of the `action` query parameter that selects this router on the
/// shared dispatch endpoint.
pub const ROUTE_ACTION: &str = "swmux_serve";

/// Query parameter carrying the URL-encoded route key.
pub const ROUTE_TRIGGER: &str = "swmux_route";

type RouteHandler = Box<dyn Fn(&[String]) -> Option<ServedResponse> + Send + Sync>;

struct RouteEntry {
    handler: RouteHandler,
    args: Vec<String>,
}

/// Maps virtual paths to handlers with bound arguments and mints the public
/// URLs that dispatch back to them.
pub struct VirtualRouter {
    dispatch_path: String,
    routes: RwLock<HashMap<String, RouteEntry>>,
}

impl VirtualRouter {
    /// `dispatch_path` is the relative URL of the fixed physical endpoint,
    /// e.g. `/swmux/dispatch`.
    pub fn new(dispatch_path: impl Into<String>) -> Self {
        Self {
            dispatch_path: dispatch_path.into(),
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `handler` with `args` bound at call time under the path
    /// component of `desired_url`, and returns the dispatchable public URL.
    ///
    /// Registering the same path twice silently replaces the prior route;
    /// last write wins.
    pub fn add_route<H>(&self, desired_url: &str, handler: H, args: Vec<String>) -> String
    where
        H: Fn(&[String]) -> Option<ServedResponse> + Send + Sync + 'static,
    {
        let route = route_key(desired_url);
        self.routes.write().insert(
            route.clone(),
            RouteEntry {
                handler: Box::new(handler),
                args,
            },
        );
        self.route_url(&route)
    }

    /// Public URL for a route or desired URL: the fixed endpoint plus the
    /// action selector and the URL-encoded trigger.
    pub fn route_url(&self, route_or_desired_url: &str) -> String {
        let route = route_key(route_or_desired_url);
        format!(
            "{}?action={}&{}={}",
            self.dispatch_path,
            ROUTE_ACTION,
            ROUTE_TRIGGER,
            urlencoding::encode(&route)
        )
    }

    /// Dispatches a request arriving at the fixed endpoint.
    ///
    /// Not every request through the endpoint is meant for this router, so a
    /// missing trigger is a no-op. An unknown route key is likewise silently
    /// dropped; nothing about the route table leaks to the caller.
    pub fn dispatch(&self, query: &HashMap<String, String>) -> Option<ServedResponse> {
        let trigger = query.get(ROUTE_TRIGGER)?;
        let routes = self.routes.read();
        let Some(entry) = routes.get(trigger.as_str()) else {
            debug!(route = %trigger, "dispatch for unregistered route");
            return None;
        };
        (entry.handler)(&entry.args)
    }
}

impl std::fmt::Debug for VirtualRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualRouter")
            .field("dispatch_path", &self.dispatch_path)
            .field("routes", &self.routes.read().len())
            .finish()
    }
}

/// Reduces a desired URL to its path component, discarding scheme, host,
/// query and fragment. Callers may pass fabricated URLs purely to obtain a
/// stable key.
fn route_key(desired_url: &str) -> String {
    match Url::parse(desired_url) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative (or fabricated) URLs fail absolute parsing; keep
        // everything ahead of the query/fragment.
        Err(_) => {
            let end = desired_url
                .find(['?', '#'])
                .unwrap_or(desired_url.len());
            desired_url[..end].to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn minted_url_round_trips_through_dispatch() {
        let router = VirtualRouter::new("/swmux/dispatch");
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(RwLock::new(Vec::new()));

        let url = {
            let calls = calls.clone();
            let seen = seen.clone();
            router.add_route(
                "swmux/sw/sw@/blog/",
                move |args| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    seen.write().extend(args.iter().cloned());
                    Some(ServedResponse::ok(b"ok".to_vec()))
                },
                vec!["/blog/".to_string()],
            )
        };

        // Pull the trigger value back out of the minted URL, decoded the way
        // a query-string parser would hand it to dispatch.
        let (_, qs) = url.split_once('?').unwrap();
        let mut params = HashMap::new();
        for pair in qs.split('&') {
            let (k, v) = pair.split_once('=').unwrap();
            params.insert(
                k.to_string(),
                urlencoding::decode(v).unwrap().into_owned(),
            );
        }
        assert_eq!(params.get("action").unwrap(), ROUTE_ACTION);

        let response = router.dispatch(&params).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.read().as_slice(), ["/blog/"]);
    }

    #[test]
    fn route_key_strips_query_host_and_scheme() {
        let router = VirtualRouter::new("/d");
        router.add_route(
            "https://example.org/virtual/path?x=1#frag",
            |_| Some(ServedResponse::ok(Vec::new())),
            Vec::new(),
        );

        let hit = router.dispatch(&query(&[(ROUTE_TRIGGER, "/virtual/path")]));
        assert!(hit.is_some());
    }

    #[test]
    fn missing_trigger_is_a_noop() {
        let router = VirtualRouter::new("/d");
        router.add_route("a/b", |_| Some(ServedResponse::ok(Vec::new())), Vec::new());

        assert!(router.dispatch(&query(&[("other", "x")])).is_none());
    }

    #[test]
    fn unknown_route_is_a_noop() {
        let router = VirtualRouter::new("/d");
        assert!(router.dispatch(&query(&[(ROUTE_TRIGGER, "a/b")])).is_none());
    }

    #[test]
    fn reregistering_a_route_replaces_it() {
        let router = VirtualRouter::new("/d");
        router.add_route(
            "a/b",
            |_| Some(ServedResponse::ok(b"first".to_vec())),
            Vec::new(),
        );
        router.add_route(
            "a/b",
            |_| Some(ServedResponse::ok(b"second".to_vec())),
            Vec::new(),
        );

        let response = router.dispatch(&query(&[(ROUTE_TRIGGER, "a/b")])).unwrap();
        assert_eq!(response.body, b"second");
    }

    #[test]
    fn bound_args_are_passed_exactly() {
        let router = VirtualRouter::new("/d");
        router.add_route(
            "echo",
            |args| {
                Some(ServedResponse::ok(args.join(",").into_bytes()))
            },
            vec!["one".into(), "two".into()],
        );

        let response = router.dispatch(&query(&[(ROUTE_TRIGGER, "echo")])).unwrap();
        assert_eq!(response.body, b"one,two");
    }
}
