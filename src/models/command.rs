//! Messages exchanged with the browser side.
//!
//! Inbound tab events and outbound presentation commands are closed enums
//! tagged on a `type` field, matching the JSON the extension shim speaks.

use serde::{Deserialize, Serialize};

pub type TabId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TabLoadStatus {
    Loading,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TabEvent {
    /// A tab's URL or load status changed.
    TabUpdated {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        status: Option<TabLoadStatus>,
    },
    /// The user switched to a different tab.
    TabActivated {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    TabRemoved { tab_id: TabId },
}

impl TabEvent {
    pub fn tab_id(&self) -> TabId {
        match self {
            TabEvent::TabUpdated { tab_id, .. }
            | TabEvent::TabActivated { tab_id, .. }
            | TabEvent::TabRemoved { tab_id } => *tab_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PresentationCommand {
    ShowBlockView,
    NavigateTo { url: String },
    /// `duration_seconds` is informational; the host clears the penalty with
    /// an explicit `StopVisualPenalty`.
    StartVisualPenalty { duration_seconds: u64 },
    StopVisualPenalty,
}

impl PresentationCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PresentationCommand::ShowBlockView => "showBlockView",
            PresentationCommand::NavigateTo { .. } => "navigateTo",
            PresentationCommand::StartVisualPenalty { .. } => "startVisualPenalty",
            PresentationCommand::StopVisualPenalty => "stopVisualPenalty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tab_updated_parses_from_shim_json() {
        let event: TabEvent = serde_json::from_value(json!({
            "type": "tabUpdated",
            "tabId": 7,
            "url": "https://www.youtube.com/watch?v=abc",
            "status": "complete"
        }))
        .unwrap();

        assert_eq!(
            event,
            TabEvent::TabUpdated {
                tab_id: 7,
                url: Some("https://www.youtube.com/watch?v=abc".into()),
                status: Some(TabLoadStatus::Complete),
            }
        );
        assert_eq!(event.tab_id(), 7);
    }

    #[test]
    fn missing_optional_fields_default_to_none() {
        let event: TabEvent =
            serde_json::from_value(json!({ "type": "tabUpdated", "tabId": 3 })).unwrap();
        assert_eq!(
            event,
            TabEvent::TabUpdated {
                tab_id: 3,
                url: None,
                status: None
            }
        );
    }

    #[test]
    fn penalty_command_serializes_camel_case() {
        let value =
            serde_json::to_value(PresentationCommand::StartVisualPenalty { duration_seconds: 90 })
                .unwrap();
        assert_eq!(
            value,
            json!({ "type": "startVisualPenalty", "durationSeconds": 90 })
        );
    }
}
