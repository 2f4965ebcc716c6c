//! Coracle Host - plugin runtime for the Coracle browser shell
//!
//! This library turns a directory of plugin bundles into running,
//! capability-scoped extensions:
//! - Registry: scan the plugins root, parse manifests, load scripts
//! - Bridge: inject a capability stub plus plugin scripts into a rendering
//!   surface and broker a typed message channel to host operations
//! - Host ports: the trait seams the window layer implements
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Page + plugin scripts               │
//! │        window.coracle  →  {action, payload}          │
//! └────────────────────┬────────────────────────────────┘
//!                      │ reserved channel
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Bridge session                       │
//! │   decode  │  dispatch  │  coracle:* event push       │
//! └────────────────────┬────────────────────────────────┘
//!                      │ host ports
//! ┌────────────────────▼────────────────────────────────┐
//! │   Navigator │ TabControl │ Storage │ Notifications   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Untrusted plugin code never receives a host object reference; every
//! capability crosses the channel as a message and is dispatched through
//! an explicit, closed action vocabulary.

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod registry;

pub use bridge::{BridgeSession, CHANNEL_NAME, EVENT_PREFIX, HostEvent, PluginAction};
pub use config::Config;
pub use error::{Error, Result};
pub use host::{
    HostPorts, InjectedScript, InjectionTime, MemoryStore, Navigator, NotificationSink,
    PluginStore, ScriptSurface, SqliteStore, StorageStore, TabControl,
};
pub use registry::{PluginCatalog, PluginManifest, PluginRecord};
