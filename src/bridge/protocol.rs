//! Script-to-host message protocol
//!
//! Inbound messages are `{"action": <string>, "payload": <any>}` posted on
//! the reserved channel. The action vocabulary is closed: each action is a
//! typed enum variant, and anything else decodes to
//! [`PluginAction::Unrecognized`] so the bridge can skip it uniformly
//! instead of crashing on forward-incompatible input.

use serde::Deserialize;
use serde_json::Value;

/// Reserved inbound channel name; page scripts post here and nowhere else
pub const CHANNEL_NAME: &str = "coraclePlugin";

/// Reserved prefix for host-dispatched events, keeping them out of the
/// page's own event namespace
pub const EVENT_PREFIX: &str = "coracle:";

/// Event name for asynchronous storage replies
pub const STORAGE_RESPONSE_EVENT: &str = "storageResponse";

/// Raw inbound message envelope
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Action name
    pub action: String,
    /// Action-specific payload
    #[serde(default)]
    pub payload: Value,
}

/// A decoded plugin action
///
/// One variant per host operation a plugin may request. Payload shapes are
/// fixed per action; a known action with the wrong payload shape decodes
/// to [`PluginAction::Malformed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginAction {
    /// Load a URL in the active tab
    Navigate { url: String },
    /// Open a new tab, optionally navigating it
    NewTab { url: Option<String> },
    /// Close the tab at the given index
    CloseTab { index: usize },
    /// Read a plugin storage key; replied via `storageResponse`
    GetStorage { key: String },
    /// Write a plugin storage key
    SetStorage { key: String, value: String },
    /// Show a user-visible notification
    ShowNotification { message: String },
    /// Known action with an unusable payload; skipped per message
    Malformed { action: String },
    /// Unknown action name; skipped per message
    Unrecognized { action: String },
}

impl PluginAction {
    /// Decode an inbound envelope into an action
    ///
    /// Never fails: protocol errors become the `Malformed` or
    /// `Unrecognized` variants for uniform skip-and-log handling.
    #[must_use]
    pub fn decode(message: &InboundMessage) -> Self {
        let payload = &message.payload;
        let decoded = match message.action.as_str() {
            "navigate" => payload.as_str().map(|url| Self::Navigate {
                url: url.to_string(),
            }),
            "newTab" => Some(Self::NewTab {
                // Null or absent payload means a blank tab
                url: payload.as_str().map(ToString::to_string),
            }),
            "closeTab" => payload
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(|index| Self::CloseTab { index }),
            "getStorage" => payload.as_str().map(|key| Self::GetStorage {
                key: key.to_string(),
            }),
            "setStorage" => {
                let key = payload.get("key").and_then(Value::as_str);
                let value = payload.get("value").and_then(Value::as_str);
                match (key, value) {
                    (Some(key), Some(value)) => Some(Self::SetStorage {
                        key: key.to_string(),
                        value: value.to_string(),
                    }),
                    _ => None,
                }
            }
            "showNotification" => payload.as_str().map(|message| Self::ShowNotification {
                message: message.to_string(),
            }),
            _ => {
                return Self::Unrecognized {
                    action: message.action.clone(),
                };
            }
        };

        decoded.unwrap_or_else(|| Self::Malformed {
            action: message.action.clone(),
        })
    }
}

/// An event pushed from the host into the script environment
#[derive(Debug, Clone)]
pub struct HostEvent {
    /// Fully namespaced event name (e.g. `coracle:storageResponse`)
    pub name: String,
    /// JSON-serialized detail payload
    pub detail_json: String,
}

impl HostEvent {
    /// Build a namespaced event from a serializable detail value
    ///
    /// # Errors
    ///
    /// Returns the serialization error; callers drop the event and log.
    pub fn new<T: serde::Serialize>(event: &str, detail: &T) -> serde_json::Result<Self> {
        Ok(Self {
            name: format!("{EVENT_PREFIX}{event}"),
            detail_json: serde_json::to_string(detail)?,
        })
    }
}
