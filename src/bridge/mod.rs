//! Capability bridge between page scripts and host operations
//!
//! One [`BridgeSession`] per rendering surface. Installation registers the
//! reserved inbound channel, injects the capability stub and every plugin
//! script, then the session dispatches decoded actions onto the host ports
//! until the surface is torn down. A misbehaving message is skipped and
//! logged; nothing a plugin posts can terminate the session.

pub mod protocol;
pub mod stub;

pub use protocol::{
    CHANNEL_NAME, EVENT_PREFIX, HostEvent, InboundMessage, PluginAction, STORAGE_RESPONSE_EVENT,
};
pub use stub::{capability_stub, injection_plan};

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::host::{HostPorts, ScriptSurface};
use crate::registry::PluginCatalog;
use crate::Result;

/// Storage operations queued off the surface's execution context
///
/// A single worker drains the queue, so operations from one session keep
/// their dispatch order even though the I/O itself is asynchronous.
enum StorageOp {
    Get { key: String },
    Set { key: String, value: String },
}

struct SessionInner {
    surface: Weak<dyn ScriptSurface>,
    ports: HostPorts,
    storage_tx: mpsc::UnboundedSender<StorageOp>,
    closed: AtomicBool,
}

impl SessionInner {
    /// Push a host event into the page, dropping it if the session or
    /// surface is gone or the detail cannot be serialized
    fn push_event<T: serde::Serialize>(&self, event: &str, detail: &T) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(event, "session closed, dropping event");
            return;
        }
        let Some(surface) = self.surface.upgrade() else {
            tracing::debug!(event, "surface gone, dropping event");
            return;
        };
        match HostEvent::new(event, detail) {
            Ok(host_event) => surface.dispatch_event(&host_event.name, &host_event.detail_json),
            Err(e) => {
                tracing::warn!(event, error = %e, "failed to serialize event, dropping");
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(surface) = self.surface.upgrade() {
            surface.unregister_channel(CHANNEL_NAME);
        }
        tracing::debug!("bridge session closed");
    }
}

/// Live binding between one rendering surface and the plugin capability
/// infrastructure
///
/// Dropping the session tears it down: the channel is unregistered and
/// in-flight storage replies are discarded instead of touching a dead
/// surface.
pub struct BridgeSession {
    inner: Arc<SessionInner>,
}

impl BridgeSession {
    /// Install the bridge on a surface
    ///
    /// Registers the [`CHANNEL_NAME`] inbound channel, then injects the
    /// capability stub followed by every plugin script in catalog order
    /// (see [`stub::injection_plan`] for the ordering contract). Must be
    /// called within a tokio runtime; storage I/O runs on a spawned
    /// worker so inbound dispatch never blocks the surface's context.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface already has a registered channel
    pub fn install(
        surface: &Arc<dyn ScriptSurface>,
        ports: HostPorts,
        catalog: &PluginCatalog,
    ) -> Result<Self> {
        surface.register_channel(CHANNEL_NAME)?;

        for script in injection_plan(catalog) {
            surface.inject(script);
        }

        let (storage_tx, storage_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            surface: Arc::downgrade(surface),
            ports,
            storage_tx,
            closed: AtomicBool::new(false),
        });

        tokio::spawn(storage_worker(
            storage_rx,
            inner.ports.storage.clone(),
            Arc::downgrade(&inner),
        ));

        tracing::info!(plugins = catalog.len(), "bridge session installed");
        Ok(Self { inner })
    }

    /// Handle one inbound message from the surface's channel
    ///
    /// Called on the surface's execution context; never blocks on I/O and
    /// never fails. Messages from a single script are dispatched in the
    /// order this method is called.
    pub fn handle_message(&self, raw: Value) {
        let message: InboundMessage = match serde_json::from_value(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "malformed plugin message envelope, ignoring");
                return;
            }
        };

        match PluginAction::decode(&message) {
            PluginAction::Navigate { url } => {
                tracing::debug!(%url, "plugin navigation");
                self.inner.ports.navigator.navigate(&url);
            }
            PluginAction::NewTab { url } => {
                self.inner.ports.tabs.create_tab(url.as_deref());
            }
            PluginAction::CloseTab { index } => {
                // The last remaining tab is never closed
                if self.inner.ports.tabs.tab_count() > 1 {
                    self.inner.ports.tabs.close_tab(index);
                } else {
                    tracing::debug!(index, "refusing to close last tab");
                }
            }
            PluginAction::GetStorage { key } => {
                self.queue_storage(StorageOp::Get { key });
            }
            PluginAction::SetStorage { key, value } => {
                self.queue_storage(StorageOp::Set { key, value });
            }
            PluginAction::ShowNotification { message } => {
                self.inner.ports.notifier.show(&message);
            }
            PluginAction::Malformed { action } => {
                tracing::warn!(action, "malformed payload for plugin action, ignoring");
            }
            PluginAction::Unrecognized { action } => {
                tracing::warn!(action, "unrecognized plugin action, ignoring");
            }
        }
    }

    /// Push a host-namespaced event into the script environment
    ///
    /// Serialization failures drop the event with a log line; they are
    /// never propagated.
    pub fn notify<T: serde::Serialize>(&self, event: &str, detail: &T) {
        self.inner.push_event(event, detail);
    }

    /// Tear the session down explicitly
    ///
    /// Equivalent to dropping the session; idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether the session has been torn down
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn queue_storage(&self, op: StorageOp) {
        if self.inner.storage_tx.send(op).is_err() {
            tracing::warn!("storage worker gone, dropping storage operation");
        }
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl std::fmt::Debug for BridgeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSession")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Drain queued storage operations in order
///
/// Holds only a weak session reference: replies that complete after
/// teardown detect the dead session and discard their result.
async fn storage_worker(
    mut rx: mpsc::UnboundedReceiver<StorageOp>,
    store: crate::host::PluginStore,
    session: Weak<SessionInner>,
) {
    while let Some(op) = rx.recv().await {
        match op {
            StorageOp::Set { key, value } => {
                if let Err(e) = store.set(&key, &value).await {
                    tracing::warn!(key, error = %e, "plugin storage write failed");
                }
            }
            StorageOp::Get { key } => {
                let value = match store.get(&key).await {
                    Ok(value) => value.unwrap_or_default(),
                    Err(e) => {
                        tracing::warn!(key, error = %e, "plugin storage read failed");
                        String::new()
                    }
                };
                let Some(inner) = session.upgrade() else {
                    tracing::debug!(key, "session torn down, discarding storage reply");
                    continue;
                };
                inner.push_event(STORAGE_RESPONSE_EVENT, &json!({ "key": key, "value": value }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{
        InjectedScript, InjectionTime, MemoryStore, Navigator, NotificationSink, PluginStore,
        StorageStore, TabControl,
    };
    use crate::registry::{PluginManifest, PluginRecord};
    use crate::{Error, Result};
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeSurface {
        injected: Mutex<Vec<InjectedScript>>,
        events: Mutex<Vec<(String, String)>>,
        channels: Mutex<Vec<String>>,
    }

    impl FakeSurface {
        fn events(&self) -> Vec<(String, String)> {
            self.events.lock().unwrap().clone()
        }

        async fn wait_for_event(&self, name: &str) -> Option<(String, String)> {
            for _ in 0..200 {
                if let Some(event) = self
                    .events()
                    .into_iter()
                    .find(|(n, _)| n == name)
                {
                    return Some(event);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            None
        }
    }

    impl ScriptSurface for FakeSurface {
        fn inject(&self, script: InjectedScript) {
            self.injected.lock().unwrap().push(script);
        }

        fn register_channel(&self, name: &str) -> Result<()> {
            let mut channels = self.channels.lock().unwrap();
            if channels.iter().any(|c| c == name) {
                return Err(Error::Bridge(format!("channel already registered: {name}")));
            }
            channels.push(name.to_string());
            Ok(())
        }

        fn unregister_channel(&self, name: &str) {
            self.channels.lock().unwrap().retain(|c| c != name);
        }

        fn dispatch_event(&self, name: &str, detail_json: &str) {
            self.events
                .lock()
                .unwrap()
                .push((name.to_string(), detail_json.to_string()));
        }
    }

    #[derive(Default)]
    struct FakeHost {
        navigations: Mutex<Vec<String>>,
        created: Mutex<Vec<Option<String>>>,
        closed: Mutex<Vec<usize>>,
        notifications: Mutex<Vec<String>>,
        tabs: Mutex<usize>,
    }

    impl Navigator for FakeHost {
        fn navigate(&self, url: &str) {
            self.navigations.lock().unwrap().push(url.to_string());
        }
    }

    impl TabControl for FakeHost {
        fn create_tab(&self, url: Option<&str>) {
            *self.tabs.lock().unwrap() += 1;
            self.created.lock().unwrap().push(url.map(ToString::to_string));
        }

        fn close_tab(&self, index: usize) {
            *self.tabs.lock().unwrap() -= 1;
            self.closed.lock().unwrap().push(index);
        }

        fn switch_tab(&self, _index: usize) {}

        fn tab_count(&self) -> usize {
            *self.tabs.lock().unwrap()
        }
    }

    impl NotificationSink for FakeHost {
        fn show(&self, message: &str) {
            self.notifications.lock().unwrap().push(message.to_string());
        }
    }

    struct Fixture {
        surface: Arc<FakeSurface>,
        host: Arc<FakeHost>,
        session: BridgeSession,
    }

    fn fixture_with_store(store: Arc<dyn StorageStore>, tabs: usize) -> Fixture {
        let surface = Arc::new(FakeSurface::default());
        let host = Arc::new(FakeHost::default());
        *host.tabs.lock().unwrap() = tabs;

        let ports = HostPorts {
            navigator: Arc::clone(&host) as Arc<dyn Navigator>,
            tabs: Arc::clone(&host) as Arc<dyn TabControl>,
            storage: PluginStore::new(store),
            notifier: Arc::clone(&host) as Arc<dyn NotificationSink>,
        };

        let dyn_surface: Arc<dyn ScriptSurface> = Arc::clone(&surface) as Arc<dyn ScriptSurface>;
        let catalog = PluginCatalog::from_records(vec![PluginRecord {
            id: Uuid::new_v4(),
            manifest: serde_json::from_str::<PluginManifest>(
                r#"{"name":"p","version":"1","main":"plugin.js"}"#,
            )
            .unwrap(),
            path: std::path::PathBuf::from("/plugins/p"),
            script: Some("// plugin".to_string()),
        }]);

        let session = BridgeSession::install(&dyn_surface, ports, &catalog).unwrap();
        Fixture {
            surface,
            host,
            session,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_store(Arc::new(MemoryStore::new()), 2)
    }

    fn msg(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn install_registers_channel_and_injects_in_order() {
        let f = fixture();
        assert_eq!(
            f.surface.channels.lock().unwrap().as_slice(),
            &[CHANNEL_NAME.to_string()]
        );

        let injected = f.surface.injected.lock().unwrap();
        assert_eq!(injected.len(), 2);
        assert_eq!(injected[0].time, InjectionTime::DocumentStart);
        assert!(injected[0].source.contains("window.coracle"));
        assert_eq!(injected[1].source, "// plugin");
        drop(injected);

        // A second session on the same surface is rejected
        let ports = HostPorts {
            navigator: Arc::clone(&f.host) as Arc<dyn Navigator>,
            tabs: Arc::clone(&f.host) as Arc<dyn TabControl>,
            storage: PluginStore::new(Arc::new(MemoryStore::new())),
            notifier: Arc::clone(&f.host) as Arc<dyn NotificationSink>,
        };
        let dyn_surface: Arc<dyn ScriptSurface> = Arc::clone(&f.surface) as Arc<dyn ScriptSurface>;
        assert!(
            BridgeSession::install(&dyn_surface, ports, &PluginCatalog::default()).is_err()
        );
    }

    #[tokio::test]
    async fn navigate_and_notify_dispatch_to_ports() {
        let f = fixture();
        f.session
            .handle_message(msg(r#"{"action":"navigate","payload":"https://example.com"}"#));
        f.session
            .handle_message(msg(r#"{"action":"showNotification","payload":"hi"}"#));

        assert_eq!(
            f.host.navigations.lock().unwrap().as_slice(),
            &["https://example.com".to_string()]
        );
        assert_eq!(f.host.notifications.lock().unwrap().as_slice(), &["hi".to_string()]);
    }

    #[tokio::test]
    async fn new_tab_with_and_without_url() {
        let f = fixture();
        f.session
            .handle_message(msg(r#"{"action":"newTab","payload":"https://example.com"}"#));
        f.session.handle_message(msg(r#"{"action":"newTab","payload":null}"#));

        let created = f.host.created.lock().unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].as_deref(), Some("https://example.com"));
        assert!(created[1].is_none());
    }

    #[tokio::test]
    async fn storage_set_then_get_round_trips() {
        let f = fixture();
        f.session.handle_message(msg(
            r#"{"action":"setStorage","payload":{"key":"k","value":"v"}}"#,
        ));
        f.session
            .handle_message(msg(r#"{"action":"getStorage","payload":"k"}"#));

        let (name, detail) = f
            .surface
            .wait_for_event("coracle:storageResponse")
            .await
            .expect("storage response event");
        assert_eq!(name, "coracle:storageResponse");
        assert_eq!(detail, r#"{"key":"k","value":"v"}"#);
    }

    #[tokio::test]
    async fn get_of_unset_key_replies_empty_string() {
        let f = fixture();
        f.session
            .handle_message(msg(r#"{"action":"getStorage","payload":"never-set"}"#));

        let (_, detail) = f
            .surface
            .wait_for_event("coracle:storageResponse")
            .await
            .expect("storage response event");
        assert_eq!(detail, r#"{"key":"never-set","value":""}"#);
    }

    #[tokio::test]
    async fn last_tab_is_never_closed() {
        let f = fixture_with_store(Arc::new(MemoryStore::new()), 1);
        f.session.handle_message(msg(r#"{"action":"closeTab","payload":0}"#));
        assert!(f.host.closed.lock().unwrap().is_empty());

        // With two tabs the close goes through
        let f = fixture_with_store(Arc::new(MemoryStore::new()), 2);
        f.session.handle_message(msg(r#"{"action":"closeTab","payload":0}"#));
        assert_eq!(f.host.closed.lock().unwrap().as_slice(), &[0]);
    }

    #[tokio::test]
    async fn unknown_action_has_no_side_effect_and_bridge_survives() {
        let f = fixture();
        f.session
            .handle_message(msg(r#"{"action":"formatDisk","payload":"/"}"#));
        f.session.handle_message(msg(r#"{"action":"navigate","payload":7}"#));
        f.session.handle_message(msg(r#"{"nonsense":true}"#));

        assert!(f.host.navigations.lock().unwrap().is_empty());
        assert!(f.host.created.lock().unwrap().is_empty());
        assert!(f.host.notifications.lock().unwrap().is_empty());

        // Subsequent well-formed messages still dispatch
        f.session
            .handle_message(msg(r#"{"action":"navigate","payload":"https://ok.example"}"#));
        assert_eq!(f.host.navigations.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notify_pushes_namespaced_event() {
        let f = fixture();
        f.session.notify("pageLoad", &json!({"url": "https://example.com"}));

        let events = f.surface.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "coracle:pageLoad");
        assert_eq!(events[0].1, r#"{"url":"https://example.com"}"#);
    }

    #[tokio::test]
    async fn close_unregisters_channel_and_drops_events() {
        let f = fixture();
        f.session.close();
        assert!(f.session.is_closed());
        assert!(f.surface.channels.lock().unwrap().is_empty());

        f.session.notify("pageLoad", &json!({}));
        assert!(f.surface.events().is_empty());
    }

    /// Store whose reads stall long enough for the session to be torn
    /// down underneath them
    struct SlowStore {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl StorageStore for SlowStore {
        async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.inner.get(namespace, key).await
        }

        async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
            self.inner.set(namespace, key, value).await
        }
    }

    #[tokio::test]
    async fn in_flight_storage_reply_discarded_after_teardown() {
        let f = fixture_with_store(
            Arc::new(SlowStore {
                inner: MemoryStore::new(),
            }),
            2,
        );
        f.session
            .handle_message(msg(r#"{"action":"getStorage","payload":"k"}"#));

        let surface = Arc::clone(&f.surface);
        drop(f.session);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(surface.events().is_empty());
    }
}
