use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Short,
    Long,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Short => "Short",
            SessionKind::Long => "Long",
        }
    }
}

/// Emitted when a viewing session runs out: how long to block the tab, and
/// how long to keep the visual penalty up afterwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BreakDecision {
    pub completed: SessionKind,
    pub break_seconds: u64,
    pub penalty_seconds: u64,
}
