//! Rendering-surface abstraction
//!
//! The window layer owns the actual webview; the bridge only needs script
//! injection, event dispatch, and channel registration. Implementations
//! must run injected scripts in registration order within the same
//! injection time, which is what lets the bridge guarantee the capability
//! stub exists before any plugin code executes.

use crate::Result;

/// When an injected script runs relative to page content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionTime {
    /// Before any page content has loaded
    DocumentStart,
    /// After the document has finished parsing
    DocumentEnd,
}

/// A script queued for injection into the page
#[derive(Debug, Clone)]
pub struct InjectedScript {
    /// JavaScript source text
    pub source: String,
    /// Injection timing
    pub time: InjectionTime,
}

impl InjectedScript {
    /// Script injected before page content runs
    #[must_use]
    pub fn at_document_start(source: String) -> Self {
        Self {
            source,
            time: InjectionTime::DocumentStart,
        }
    }
}

/// One rendering surface as seen by the capability bridge
///
/// Contract for implementations:
///
/// - Scripts injected with the same [`InjectionTime`] execute in the order
///   they were passed to [`ScriptSurface::inject`].
/// - [`ScriptSurface::dispatch_event`] evaluates in the page context and
///   must tolerate a page that never registered a listener.
/// - At most one message channel is registered per surface; messages
///   posted by page scripts on that channel reach the bridge's handler.
pub trait ScriptSurface: Send + Sync {
    /// Queue a script for injection
    fn inject(&self, script: InjectedScript);

    /// Register the inbound message channel under the given reserved name
    ///
    /// # Errors
    ///
    /// Returns an error if a channel is already registered on this surface
    fn register_channel(&self, name: &str) -> Result<()>;

    /// Unregister the inbound message channel
    fn unregister_channel(&self, name: &str);

    /// Dispatch a named event with a JSON detail payload into the page
    fn dispatch_event(&self, name: &str, detail_json: &str);
}
