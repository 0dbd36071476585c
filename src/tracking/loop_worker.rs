use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::enforcer::Enforcer;
use crate::models::TabId;
use crate::scheduler::SessionScheduler;
use crate::storage::CounterStore;
use crate::utils::logging::TRACKING;
use crate::utils::Clock;

use super::TrackingState;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Everything a tick touches, shared with the owning controller.
#[derive(Clone)]
pub(super) struct TickContext {
    pub state: Arc<Mutex<TrackingState>>,
    pub scheduler: Arc<Mutex<SessionScheduler>>,
    pub store: Arc<dyn CounterStore>,
    pub enforcer: Enforcer,
    pub clock: Arc<dyn Clock>,
}

pub(super) async fn tracking_loop(
    ctx: TickContext,
    tab_id: TabId,
    period: Duration,
    cancel_token: CancellationToken,
) {
    // First tick one full period after tracking starts.
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = ctx.tick(tab_id).await {
                    log_error!(target: TRACKING, "tracking tick failed for tab {}: {err:#}", tab_id);
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!(target: TRACKING, "tracking loop for tab {} shutting down", tab_id);
                break;
            }
        }
    }
}

impl TickContext {
    /// Report usage since the last tick, then check whether the session is
    /// over. A storage failure skips the rest of this tick; the unreported
    /// span carries over to the next one.
    pub async fn tick(&self, tab_id: TabId) -> Result<()> {
        let now = self.clock.now();

        let elapsed = {
            let state = self.state.lock().await;
            if !state.is_tracking_tab(tab_id) {
                return Ok(());
            }
            state.elapsed_minutes(now).unwrap_or(0.0)
        };

        {
            let scheduler = self.scheduler.lock().await;
            let snapshot = scheduler.snapshot(now);
            log_info!(
                target: TRACKING,
                "Session progress: {:.2} min since last tick, session {:.2}/{} min ({})",
                elapsed,
                snapshot.elapsed_minutes.unwrap_or(0.0),
                snapshot.duration_minutes.unwrap_or(0.0),
                snapshot.session_kind.map(|kind| kind.as_str()).unwrap_or("none")
            );
        }

        self.store
            .accumulate(elapsed)
            .await
            .context("failed to record usage time")?;

        self.state.lock().await.reset_anchor(now);

        let decision = self.scheduler.lock().await.check_session_threshold(now);
        if let Some(decision) = decision {
            self.enforcer.spawn(tab_id, decision);
        }

        Ok(())
    }
}
