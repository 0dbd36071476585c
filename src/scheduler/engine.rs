//! Session pattern engine.
//!
//! Decides the length of each viewing session and, when one runs out, the
//! break and penalty that follow. Pure state machine: the caller supplies
//! `now` and owns the timing loop.
//!
//! ```text
//! Short -> Short -> ... (short_sessions_before_long) -> Long -> Short -> ...
//! ```

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use uuid::Uuid;

use crate::models::{BreakDecision, SessionKind};
use crate::utils::logging::SESSION;

use super::{ActiveSession, SchedulerSnapshot, SchedulerState, SessionPattern};

const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug)]
pub struct SessionScheduler {
    pattern: SessionPattern,
    state: SchedulerState,
    rng: StdRng,
}

impl SessionScheduler {
    pub fn new(pattern: SessionPattern) -> Self {
        Self::with_rng(pattern, StdRng::from_entropy())
    }

    pub fn with_rng(pattern: SessionPattern, rng: StdRng) -> Self {
        Self {
            pattern,
            state: SchedulerState::new(),
            rng,
        }
    }

    pub fn pattern(&self) -> &SessionPattern {
        &self.pattern
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Replace the whole bookkeeping state, e.g. to resume from a known point.
    pub fn restore(&mut self, state: SchedulerState) {
        self.state = state;
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SchedulerSnapshot {
        SchedulerSnapshot::capture(&self.state, now)
    }

    /// Begin the next session unless one is already running.
    ///
    /// Returns `true` when a new session was started.
    pub fn start_new_session(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.has_active_session() {
            return false;
        }

        let kind = if !self.state.is_in_long_session
            && self.state.session_count >= self.pattern.short_sessions_before_long
        {
            self.state.is_in_long_session = true;
            self.state.session_count = 0;
            SessionKind::Long
        } else {
            SessionKind::Short
        };

        let range = *self.pattern.range(kind);
        let minutes = self.rng.gen_range(range.min_minutes..=range.max_minutes);

        self.state.current = Some(ActiveSession {
            id: Uuid::new_v4(),
            kind,
            started_at: now,
            duration_minutes: f64::from(minutes),
        });

        match kind {
            SessionKind::Long => {
                log_info!(target: SESSION, "Starting long session ({} minutes)", minutes);
            }
            SessionKind::Short => {
                log_info!(
                    target: SESSION,
                    "Starting short session ({} minutes), session count {}/{}",
                    minutes,
                    self.state.session_count + 1,
                    self.pattern.short_sessions_before_long
                );
            }
        }

        true
    }

    /// Check the running session against `now`.
    ///
    /// When it has run its course, returns the break to enforce and has
    /// already started the following session. No-op before any session exists.
    pub fn check_session_threshold(&mut self, now: DateTime<Utc>) -> Option<BreakDecision> {
        let session = self.state.current.as_ref()?;
        if !session.is_complete(now) {
            return None;
        }

        let completed = session.kind;
        let decision = BreakDecision {
            completed,
            break_seconds: self.pattern.range(completed).break_seconds,
            penalty_seconds: self.pattern.penalty_seconds,
        };

        match completed {
            SessionKind::Short => {
                self.state.session_count += 1;
                log_info!(
                    target: SESSION,
                    "Short session complete, count {}",
                    self.state.session_count
                );
            }
            SessionKind::Long => {
                self.state.is_in_long_session = false;
                self.state.session_count = 0;
                log_info!(target: SESSION, "Long session complete, back to short sessions");
            }
        }

        self.state.current = None;
        self.start_new_session(now);

        Some(decision)
    }
}
