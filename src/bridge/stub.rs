//! Capability stub and script injection plan
//!
//! The stub is the only API surface plugin code sees: a `window.coracle`
//! object whose calls serialize into `{action, payload}` messages on the
//! reserved channel. The injection plan pins the ordering contract: the
//! stub goes in at document-start, plugin scripts at document-end, so the
//! stub exists before any plugin code can run regardless of page timing.

use super::protocol::CHANNEL_NAME;
use crate::host::{InjectedScript, InjectionTime};
use crate::registry::PluginCatalog;

/// JavaScript source for the capability stub
#[must_use]
pub fn capability_stub() -> String {
    format!(
        r#"(function () {{
    'use strict';
    function post(message) {{
        window.webkit.messageHandlers.{CHANNEL_NAME}.postMessage(message);
    }}
    window.coracle = {{
        navigate: function (url) {{
            post({{ action: 'navigate', payload: url }});
        }},
        newTab: function (url) {{
            post({{ action: 'newTab', payload: url === undefined ? null : url }});
        }},
        closeTab: function (index) {{
            post({{ action: 'closeTab', payload: index }});
        }},
        storage: {{
            get: function (key) {{
                post({{ action: 'getStorage', payload: key }});
            }},
            set: function (key, value) {{
                post({{ action: 'setStorage', payload: {{ key: key, value: value }} }});
            }}
        }},
        notify: function (message) {{
            post({{ action: 'showNotification', payload: message }});
        }}
    }};
}})();
"#
    )
}

/// Build the ordered injection plan for a catalog
///
/// Position 0 is always the capability stub at
/// [`InjectionTime::DocumentStart`]; plugin scripts follow in catalog
/// order at [`InjectionTime::DocumentEnd`]. Records without a loadable
/// script are cataloged but never injected.
#[must_use]
pub fn injection_plan(catalog: &PluginCatalog) -> Vec<InjectedScript> {
    let mut plan = vec![InjectedScript::at_document_start(capability_stub())];

    for record in catalog.records() {
        let Some(script) = &record.script else {
            tracing::debug!(plugin = %record.manifest.name, "no script, skipping injection");
            continue;
        };
        plan.push(InjectedScript {
            source: script.clone(),
            time: InjectionTime::DocumentEnd,
        });
    }

    tracing::debug!(scripts = plan.len(), "built injection plan");
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PluginManifest, PluginRecord};
    use uuid::Uuid;

    fn record(name: &str, script: Option<&str>) -> PluginRecord {
        PluginRecord {
            id: Uuid::new_v4(),
            manifest: serde_json::from_str::<PluginManifest>(&format!(
                r#"{{"name":"{name}","version":"1","main":"plugin.js"}}"#
            ))
            .unwrap(),
            path: std::path::PathBuf::from(format!("/plugins/{name}")),
            script: script.map(ToString::to_string),
        }
    }

    fn catalog_of(records: Vec<PluginRecord>) -> PluginCatalog {
        PluginCatalog::from_records(records)
    }

    #[test]
    fn stub_mentions_channel_and_actions() {
        let stub = capability_stub();
        assert!(stub.contains(CHANNEL_NAME));
        for action in [
            "navigate",
            "newTab",
            "closeTab",
            "getStorage",
            "setStorage",
            "showNotification",
        ] {
            assert!(stub.contains(action), "stub missing action {action}");
        }
    }

    #[test]
    fn stub_comes_first_then_catalog_order() {
        let catalog = catalog_of(vec![
            record("first", Some("// first")),
            record("second", Some("// second")),
        ]);

        let plan = injection_plan(&catalog);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].time, InjectionTime::DocumentStart);
        assert!(plan[0].source.contains("window.coracle"));
        assert_eq!(plan[1].source, "// first");
        assert_eq!(plan[2].source, "// second");
        assert_eq!(plan[1].time, InjectionTime::DocumentEnd);
    }

    #[test]
    fn scriptless_records_not_injected() {
        let catalog = catalog_of(vec![
            record("ghost", None),
            record("real", Some("// real")),
        ]);

        let plan = injection_plan(&catalog);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].source, "// real");
    }

    #[test]
    fn empty_catalog_still_gets_stub() {
        let catalog = catalog_of(vec![]);
        let plan = injection_plan(&catalog);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].time, InjectionTime::DocumentStart);
    }
}
