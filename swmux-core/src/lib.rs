//! # swmux Core
//!
//! Core library for swmux, the collaborative service worker multiplexer.
//!
//! ## Overview
//!
//! Browsers allow only one service worker per scope, which makes it hard for
//! independent plugins to each ship their own worker behavior. `swmux-core`
//! solves this by composing one worker per scope out of many registered
//! fragments:
//!
//! - [`combinator`]: ordered aggregation of content producers for one scope
//! - [`manager`]: the scope registry, worker rendering, and the registrar
//!   script that performs browser-side registration
//! - [`router`]: virtual routes dispatched through a single fixed endpoint
//! - [`serve_file`]: generated-file cache with ETag/Last-Modified semantics
//! - [`store`]: filesystem and transient persistence backends
//! - [`settings`]: named persistent settings used for the publish snapshot
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use swmux_core::{
//!     FileService, MemorySettings, StaticContent, SwManager, TransientStore,
//!     VirtualRouter,
//! };
//!
//! let router = Arc::new(VirtualRouter::new("/swmux/dispatch"));
//! let store = Arc::new(TransientStore::new(
//!     std::path::Path::new("./cache"),
//!     "/swmux/dispatch",
//! ));
//! let files = Arc::new(FileService::new(store));
//! let settings = Arc::new(MemorySettings::new());
//! let manager = SwManager::new("/", router, files, settings);
//!
//! manager
//!     .sw("/blog/")
//!     .add_content(StaticContent::new("console.log('here is my plugin')"));
//! ```

pub mod combinator;
pub mod error;
pub mod manager;
pub mod response;
pub mod router;
pub mod serve_file;
pub mod settings;
pub mod store;

pub use combinator::{Combinator, ContentProducer, StaticContent};
pub use error::{Result, SwError};
pub use manager::{REGISTRAR_FILE, REGISTRAR_HANDLE, SwManager};
pub use response::{JAVASCRIPT, ServedResponse};
pub use router::{ROUTE_ACTION, ROUTE_TRIGGER, VirtualRouter};
pub use serve_file::{
    ConditionalHeaders, FILE_ACTION, FILE_PARAM, FileService, GeneratedFile,
};
pub use settings::{JsonFileSettings, MemorySettings, SettingsStore};
pub use store::{CachedFile, FileStore, FsStore, TransientStore, probe_writable};
