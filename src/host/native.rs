use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::{io::AsyncWrite, sync::mpsc, task::JoinHandle};

use crate::enforcer::EnforceError;
use crate::models::{PresentationCommand, TabEvent, TabId};

use super::{codec::write_message, HostReply, TabHost};

/// `TabHost` over the native messaging pipe.
///
/// Tab existence is learned from the events the shim forwards: a tab is known
/// once it has been updated or activated, and forgotten when it is removed.
/// Outbound replies go through a channel drained by a single writer task.
#[derive(Debug, Clone)]
pub struct NativeHost {
    open_tabs: Arc<Mutex<HashSet<TabId>>>,
    outbound: mpsc::UnboundedSender<HostReply>,
}

impl NativeHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostReply>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let host = Self {
            open_tabs: Arc::new(Mutex::new(HashSet::new())),
            outbound,
        };
        (host, rx)
    }

    pub fn observe(&self, event: &TabEvent) {
        let mut tabs = self
            .open_tabs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match event {
            TabEvent::TabUpdated { tab_id, .. } | TabEvent::TabActivated { tab_id, .. } => {
                tabs.insert(*tab_id);
            }
            TabEvent::TabRemoved { tab_id } => {
                tabs.remove(tab_id);
            }
        }
    }

    pub fn reply(&self, reply: HostReply) -> Result<()> {
        self.outbound
            .send(reply)
            .map_err(|_| anyhow!("native messaging writer has shut down"))
    }

    fn is_open(&self, tab_id: TabId) -> bool {
        self.open_tabs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&tab_id)
    }
}

#[async_trait]
impl TabHost for NativeHost {
    async fn tab_exists(&self, tab_id: TabId) -> bool {
        self.is_open(tab_id)
    }

    async fn send(
        &self,
        tab_id: TabId,
        command: PresentationCommand,
    ) -> Result<(), EnforceError> {
        if !self.is_open(tab_id) {
            return Err(EnforceError::TabNotFound(tab_id));
        }

        let name = command.name();
        self.outbound
            .send(HostReply::Command { tab_id, command })
            .map_err(|_| EnforceError::MessagingFailure {
                tab_id,
                command: name,
                reason: "native messaging writer has shut down".into(),
            })
    }
}

/// Drain replies into `writer` until every `NativeHost` clone is dropped.
pub fn spawn_writer<W>(
    mut writer: W,
    mut replies: mpsc::UnboundedReceiver<HostReply>,
) -> JoinHandle<Result<()>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(reply) = replies.recv().await {
            write_message(&mut writer, &reply).await?;
        }
        Ok(())
    })
}
