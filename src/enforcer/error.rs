use thiserror::Error;

use crate::models::TabId;

/// Ways a break enforcement can go wrong. None of them are retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnforceError {
    /// Tab closed before or during the sequence.
    #[error("tab {0} no longer exists")]
    TabNotFound(TabId),

    /// The command never reached the presentation layer.
    #[error("failed to deliver {command} to tab {tab_id}: {reason}")]
    MessagingFailure {
        tab_id: TabId,
        command: &'static str,
        reason: String,
    },

    #[error("counter store failed: {0}")]
    Storage(String),
}

impl EnforceError {
    pub fn storage(err: anyhow::Error) -> Self {
        EnforceError::Storage(format!("{err:#}"))
    }
}
