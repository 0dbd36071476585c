use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TabId;
use crate::scheduler::SchedulerSnapshot;
use crate::utils::time::minutes_between;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackingStatus {
    #[default]
    Idle,
    Tracking,
}

/// Which tab is being watched and since when the current tick span began.
///
/// `status == Tracking`, `tab_id.is_some()` and `tick_anchor.is_some()` always
/// hold together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingState {
    pub status: TrackingStatus,
    pub tab_id: Option<TabId>,
    pub tick_anchor: Option<DateTime<Utc>>,
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.status == TrackingStatus::Tracking
    }

    pub fn is_tracking_tab(&self, tab_id: TabId) -> bool {
        self.is_tracking() && self.tab_id == Some(tab_id)
    }

    pub fn begin(&mut self, tab_id: TabId, now: DateTime<Utc>) {
        *self = Self {
            status: TrackingStatus::Tracking,
            tab_id: Some(tab_id),
            tick_anchor: Some(now),
        };
    }

    /// Minutes since the tick anchor, if tracking.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> Option<f64> {
        self.tick_anchor
            .map(|anchor| minutes_between(anchor, now))
    }

    pub fn reset_anchor(&mut self, now: DateTime<Utc>) {
        if self.is_tracking() {
            self.tick_anchor = Some(now);
        }
    }

    /// Return to idle, handing back the unreported minutes.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<f64> {
        let elapsed = self.elapsed_minutes(now);
        *self = Self::default();
        elapsed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    pub status: TrackingStatus,
    pub tab_id: Option<TabId>,
    pub scheduler: SchedulerSnapshot,
}
