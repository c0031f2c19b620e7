//! Scope registry: the shared manager composing service workers.
//!
//! Only one service worker per scope is allowed by the ServiceWorker API, so
//! the manager keys every composed worker by scope. Plugin code asks for the
//! scope's [`Combinator`] and appends content; the manager mints the worker's
//! URL through the virtual router, serves the rendered script with the
//! `Service-Worker-Allowed` header, and maintains the registrar script that
//! tells the browser which scopes to register.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info};

use crate::combinator::Combinator;
use crate::error::Result;
use crate::response::{CONTENT_TYPE, JAVASCRIPT, ServedResponse};
use crate::router::VirtualRouter;
use crate::serve_file::{FileService, GeneratedFile};
use crate::settings::SettingsStore;

/// Handle of the registrar script, for hosts that track script dependencies.
pub const REGISTRAR_HANDLE: &str = "swmux-registrar";

/// Name of the registrar script in the generated-file cache.
pub const REGISTRAR_FILE: &str = "sw-registrar.js";

/// Setting holding the scope set as of the last registrar publish.
const REGISTRATIONS_SETTING: &str = "swmux_registrations";

const REGISTRAR_TEMPLATE: &str = include_str!("assets/sw-registrar.js");
const ENABLED_TOKEN: &str = "$enabledSw";

const WORKER_PRELUDE: &str = include_str!("assets/sw-prelude.js");

#[derive(Debug, Serialize)]
struct Registration {
    scope: String,
    url: String,
}

/// The shared manager. Construct one per process (or per test) and hand it
/// around explicitly; there is no global instance.
pub struct SwManager {
    weak: Weak<SwManager>,
    default_scope: String,
    combinators: RwLock<BTreeMap<String, Arc<Combinator>>>,
    router: Arc<VirtualRouter>,
    files: Arc<FileService>,
    settings: Arc<dyn SettingsStore>,
}

impl SwManager {
    /// `default_scope` is the host application's canonical root path,
    /// substituted whenever a caller omits the scope.
    pub fn new(
        default_scope: impl Into<String>,
        router: Arc<VirtualRouter>,
        files: Arc<FileService>,
        settings: Arc<dyn SettingsStore>,
    ) -> Arc<Self> {
        let default_scope = default_scope.into();
        Arc::new_cyclic(|weak: &Weak<SwManager>| {
            let registrar_ref = weak.clone();
            files.add_file(REGISTRAR_FILE, move || match registrar_ref.upgrade() {
                Some(manager) => manager.sw_registrar(),
                None => GeneratedFile {
                    content: Vec::new(),
                    content_type: JAVASCRIPT.to_string(),
                    last_modified: None,
                },
            });

            Self {
                weak: weak.clone(),
                default_scope,
                combinators: RwLock::new(BTreeMap::new()),
                router,
                files,
                settings,
            }
        })
    }

    /// Selects the combinator for the service worker at `scope`, creating it
    /// on first use. An empty scope means the default scope. Repeated calls
    /// with the same scope return the same instance.
    pub fn sw(&self, scope: &str) -> Arc<Combinator> {
        let scope = self.scope_or_default(scope);
        if let Some(existing) = self.combinators.read().get(&scope) {
            return existing.clone();
        }

        let mut combinators = self.combinators.write();
        if let Some(existing) = combinators.get(&scope) {
            return existing.clone();
        }

        let virtual_url = format!("swmux/sw/sw@{scope}");
        let handler_ref = self.weak.clone();
        let real_url = self.router.add_route(
            &virtual_url,
            move |args| {
                let scope = args.first()?;
                handler_ref.upgrade()?.write_sw(scope)
            },
            vec![scope.clone()],
        );

        let combinator = Arc::new(Combinator::new(real_url));
        combinators.insert(scope, combinator.clone());
        combinator
    }

    /// The identifier client code uses to look up this worker's registration
    /// promise: the scope itself, which is already the unique key of the
    /// underlying registration API.
    pub fn sw_js_id(&self, scope: &str) -> String {
        self.scope_or_default(scope)
    }

    /// Public URL of the registrar script, for the host page to embed.
    pub fn registrar_url(&self) -> String {
        self.files.url(REGISTRAR_FILE)
    }

    /// Compares the current scope set against the snapshot persisted at the
    /// last publish. Run once per init cycle, after every producer has had
    /// its chance to register; on change the cached registrar is refreshed
    /// and the new set persisted.
    pub async fn check_registrations(&self) -> Result<()> {
        let last: Vec<String> = match self.settings.get(REGISTRATIONS_SETTING).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => Vec::new(),
        };
        let current: Vec<String> = self.combinators.read().keys().cloned().collect();

        if multiset_equal(&last, &current) {
            return Ok(());
        }

        info!(
            previous = last.len(),
            current = current.len(),
            "scope set changed, refreshing registrar"
        );
        self.files.invalidate_files(&[REGISTRAR_FILE]).await;
        self.settings
            .set(REGISTRATIONS_SETTING, serde_json::json!(current))
            .await
    }

    /// Renders the composed worker for `scope`: script headers, the shared
    /// prelude, then every registered fragment in order. `None` when the
    /// scope is unknown or a producer fails, in which case the request is
    /// dropped.
    pub fn write_sw(&self, scope: &str) -> Option<ServedResponse> {
        let combinator = self.combinators.read().get(scope).cloned()?;

        let mut body = Vec::from(WORKER_PRELUDE.as_bytes());
        if let Err(err) = combinator.render(&mut body) {
            error!(scope = %scope, error = %err, "service worker render failed");
            return None;
        }

        Some(
            ServedResponse::ok(body)
                .header(CONTENT_TYPE, JAVASCRIPT)
                .header("Service-Worker-Allowed", scope),
        )
    }

    /// Generates the registrar script: the static template with its
    /// substitution token replaced by the registration manifest, one entry
    /// per scope that actually has content.
    fn sw_registrar(&self) -> GeneratedFile {
        let manifest =
            serde_json::to_string(&self.registrations()).unwrap_or_else(|_| "[]".to_string());
        let content = REGISTRAR_TEMPLATE.replace(ENABLED_TOKEN, &manifest);
        GeneratedFile {
            content: content.into_bytes(),
            content_type: JAVASCRIPT.to_string(),
            last_modified: None,
        }
    }

    fn registrations(&self) -> Vec<Registration> {
        self.combinators
            .read()
            .iter()
            .filter(|(_, combinator)| combinator.has_content())
            .map(|(scope, combinator)| Registration {
                scope: scope.clone(),
                url: combinator.url().to_string(),
            })
            .collect()
    }

    fn scope_or_default(&self, scope: &str) -> String {
        if scope.is_empty() {
            self.default_scope.clone()
        } else {
            scope.to_string()
        }
    }
}

impl std::fmt::Debug for SwManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwManager")
            .field("default_scope", &self.default_scope)
            .field("scopes", &self.combinators.read().len())
            .finish_non_exhaustive()
    }
}

fn multiset_equal(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}
