use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::models::SessionKind;

/// Length range and follow-up break for one kind of session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRange {
    pub min_minutes: u32,
    pub max_minutes: u32,
    pub break_seconds: u64,
}

/// Fixed session cadence: a run of short sessions followed by one long one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionPattern {
    pub short: SessionRange,
    pub long: SessionRange,
    /// Completed short sessions needed before the next session is long.
    pub short_sessions_before_long: u32,
    /// Grayscale penalty after every break, regardless of session kind.
    pub penalty_seconds: u64,
}

impl Default for SessionPattern {
    fn default() -> Self {
        Self {
            short: SessionRange {
                min_minutes: 10,
                max_minutes: 15,
                break_seconds: 30,
            },
            long: SessionRange {
                min_minutes: 30,
                max_minutes: 35,
                break_seconds: 120,
            },
            short_sessions_before_long: 2,
            penalty_seconds: 90,
        }
    }
}

impl SessionPattern {
    pub fn range(&self, kind: SessionKind) -> &SessionRange {
        match kind {
            SessionKind::Short => &self.short,
            SessionKind::Long => &self.long,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in [SessionKind::Short, SessionKind::Long] {
            let range = self.range(kind);
            if range.min_minutes == 0 {
                bail!("{} session minimum must be at least one minute", kind.as_str());
            }
            if range.min_minutes > range.max_minutes {
                bail!(
                    "{} session range is inverted ({} > {})",
                    kind.as_str(),
                    range.min_minutes,
                    range.max_minutes
                );
            }
        }
        if self.short_sessions_before_long == 0 {
            bail!("short_sessions_before_long must be greater than zero");
        }
        Ok(())
    }
}
