//! Host capability ports
//!
//! Everything privileged a plugin can reach goes through one of these
//! traits. The bridge never hands the script environment a host object;
//! it holds a [`HostPorts`] bundle and maps each decoded action onto
//! exactly one port call.

pub mod storage;
pub mod surface;

pub use storage::{MemoryStore, PluginStore, SqliteStore, StorageStore};
pub use surface::{InjectedScript, InjectionTime, ScriptSurface};

use std::sync::Arc;

/// Navigation in the surface's active tab
pub trait Navigator: Send + Sync {
    /// Resolve and load the URL in the active tab
    fn navigate(&self, url: &str);
}

/// Tab lifecycle operations
pub trait TabControl: Send + Sync {
    /// Open a new tab, optionally navigating it
    fn create_tab(&self, url: Option<&str>);

    /// Close the tab at `index`
    ///
    /// The bridge only calls this when more than one tab remains; see
    /// [`TabControl::tab_count`].
    fn close_tab(&self, index: usize);

    /// Bring the tab at `index` to the front
    fn switch_tab(&self, index: usize);

    /// Number of open tabs
    fn tab_count(&self) -> usize;
}

/// User-visible notification sink
pub trait NotificationSink: Send + Sync {
    /// Surface a notification to the user
    fn show(&self, message: &str);
}

/// Bundle of host ports handed to a bridge session
#[derive(Clone)]
pub struct HostPorts {
    /// Active-tab navigation
    pub navigator: Arc<dyn Navigator>,
    /// Tab lifecycle
    pub tabs: Arc<dyn TabControl>,
    /// Plugin-namespaced persistent storage
    pub storage: PluginStore,
    /// User notifications
    pub notifier: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for HostPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPorts").finish_non_exhaustive()
    }
}
