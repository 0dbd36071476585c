//! Boundary to the browser: message types, framing, and the `TabHost` seam
//! through which the enforcer reaches the presentation layer.

pub mod codec;
pub mod native;

pub use native::{spawn_writer, NativeHost};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::enforcer::EnforceError;
use crate::models::{PresentationCommand, TabEvent, TabId};
use crate::storage::Counters;
use crate::tracking::TrackingSnapshot;

/// Whatever can check on tabs and deliver presentation commands to them.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn tab_exists(&self, tab_id: TabId) -> bool;

    /// Fire-and-forget delivery; no acknowledgement is awaited.
    async fn send(&self, tab_id: TabId, command: PresentationCommand)
        -> Result<(), EnforceError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    /// Popup asks for the counters and tracking status.
    GetStatus,
    Ping,
}

/// Anything the extension shim can send us.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HostMessage {
    Tab(TabEvent),
    Control(ControlMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostReply {
    Command {
        tab_id: TabId,
        command: PresentationCommand,
    },
    Status {
        counters: Counters,
        tracking: TrackingSnapshot,
    },
    Pong,
    Error {
        message: String,
    },
}
