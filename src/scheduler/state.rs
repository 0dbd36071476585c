use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SessionKind;
use crate::utils::time::minutes_between;

/// The viewing session currently counting down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub id: Uuid,
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    /// Randomly drawn target length.
    pub duration_minutes: f64,
}

impl ActiveSession {
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> f64 {
        minutes_between(self.started_at, now)
    }

    pub fn is_complete(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_minutes(now) >= self.duration_minutes
    }
}

/// Session-pattern bookkeeping. Lives for the lifetime of the process and is
/// never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    /// Completed short sessions since the last long session.
    pub session_count: u32,
    pub is_in_long_session: bool,
    /// Start and target duration travel together, so they are set or unset
    /// as a pair.
    pub current: Option<ActiveSession>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_active_session(&self) -> bool {
        self.current.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSnapshot {
    pub session_count: u32,
    pub is_in_long_session: bool,
    pub session_kind: Option<SessionKind>,
    pub elapsed_minutes: Option<f64>,
    pub duration_minutes: Option<f64>,
}

impl SchedulerSnapshot {
    pub fn capture(state: &SchedulerState, now: DateTime<Utc>) -> Self {
        Self {
            session_count: state.session_count,
            is_in_long_session: state.is_in_long_session,
            session_kind: state.current.as_ref().map(|session| session.kind),
            elapsed_minutes: state
                .current
                .as_ref()
                .map(|session| session.elapsed_minutes(now)),
            duration_minutes: state.current.as_ref().map(|session| session.duration_minutes),
        }
    }
}
