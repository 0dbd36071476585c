use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{sync::Mutex, task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::classifier::PageClassifier;
use crate::enforcer::Enforcer;
use crate::models::TabId;
use crate::scheduler::{SchedulerSnapshot, SchedulerState, SessionScheduler};
use crate::storage::{CounterStore, MIN_ACCUMULATE_MINUTES};
use crate::utils::logging::{SESSION, TRACKING};
use crate::utils::Clock;

use super::loop_worker::{tracking_loop, TickContext};
use super::{TrackingSnapshot, TrackingState};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the tracking state and the periodic tick task for the watched tab.
///
/// Scheduler state outlives any single tracking period: stopping and
/// starting again keeps the short-session count and the running session.
#[derive(Clone)]
pub struct TrackingController {
    ctx: TickContext,
    classifier: PageClassifier,
    ticker: Arc<Mutex<Option<Ticker>>>,
    tick_interval: Duration,
}

impl TrackingController {
    pub fn new(
        scheduler: SessionScheduler,
        store: Arc<dyn CounterStore>,
        enforcer: Enforcer,
        classifier: PageClassifier,
        clock: Arc<dyn Clock>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            ctx: TickContext {
                state: Arc::new(Mutex::new(TrackingState::new())),
                scheduler: Arc::new(Mutex::new(scheduler)),
                store,
                enforcer,
                clock,
            },
            classifier,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval,
        }
    }

    pub async fn current_tab(&self) -> Option<TabId> {
        let state = self.ctx.state.lock().await;
        if state.is_tracking() {
            state.tab_id
        } else {
            None
        }
    }

    #[cfg(test)]
    pub async fn scheduler_state(&self) -> SchedulerState {
        self.ctx.scheduler.lock().await.state().clone()
    }

    pub async fn snapshot(&self) -> TrackingSnapshot {
        let now = self.ctx.clock.now();
        let (status, tab_id) = {
            let state = self.ctx.state.lock().await;
            (state.status, state.tab_id)
        };
        let scheduler: SchedulerSnapshot = self.ctx.scheduler.lock().await.snapshot(now);
        TrackingSnapshot {
            status,
            tab_id,
            scheduler,
        }
    }

    /// Begin tracking `tab_id`. Already tracking it is a no-op; tracking a
    /// different tab stops that one first.
    pub async fn start(&self, tab_id: TabId) -> Result<()> {
        match self.current_tab().await {
            Some(current) if current == tab_id => return Ok(()),
            Some(_) => {
                // The old tab is idle even when its flush fails.
                if let Err(err) = self.stop().await {
                    log_error!(target: TRACKING, "Switching to tab {}: {err:#}", tab_id);
                }
            }
            None => {}
        }

        let now = self.ctx.clock.now();
        self.ctx.state.lock().await.begin(tab_id, now);

        {
            let mut scheduler = self.ctx.scheduler.lock().await;
            if scheduler.start_new_session(now) {
                let snapshot = scheduler.snapshot(now);
                log_info!(
                    target: SESSION,
                    "Started {} session of {} minutes (short sessions so far: {})",
                    snapshot
                        .session_kind
                        .map(|kind| kind.as_str())
                        .unwrap_or("unknown"),
                    snapshot.duration_minutes.unwrap_or(0.0),
                    snapshot.session_count
                );
            }
        }

        log_info!(target: TRACKING, "Started tracking tab {}", tab_id);
        self.spawn_ticker(tab_id).await;
        Ok(())
    }

    /// Stop tracking, flushing any unreported time. Break sequences already
    /// running keep going.
    pub async fn stop(&self) -> Result<()> {
        let tab_id = match self.current_tab().await {
            Some(tab_id) => tab_id,
            None => return Ok(()),
        };

        self.cancel_ticker().await;

        let now = self.ctx.clock.now();
        let unreported = self.ctx.state.lock().await.finish(now).unwrap_or(0.0);
        self.classifier.forget_last_video();

        log_info!(target: TRACKING, "Stopped tracking tab {}", tab_id);

        if unreported > MIN_ACCUMULATE_MINUTES {
            self.ctx
                .store
                .accumulate(unreported)
                .await
                .context("failed to flush usage time on stop")?;
        }
        Ok(())
    }

    async fn spawn_ticker(&self, tab_id: TabId) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.cancel_token.cancel();
            previous.handle.abort();
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tracking_loop(
            self.ctx.clone(),
            tab_id,
            self.tick_interval,
            cancel_token.clone(),
        ));

        *ticker_guard = Some(Ticker {
            handle,
            cancel_token,
        });
    }

    async fn cancel_ticker(&self) {
        let ticker = self.ticker.lock().await.take();
        if let Some(ticker) = ticker {
            ticker.cancel_token.cancel();
            if let Err(err) = ticker.handle.await {
                if !err.is_cancelled() {
                    log_error!(target: TRACKING, "tracking loop ended abnormally: {}", err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcer::EnforcerConfig;
    use crate::host::{HostReply, NativeHost};
    use crate::models::{PresentationCommand, SessionKind, TabEvent};
    use crate::scheduler::{SessionPattern, SessionRange};
    use crate::storage::{CounterKey, MemoryCounterStore};
    use crate::tracking::TrackingStatus;
    use crate::utils::MonotonicClock;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rand::{rngs::StdRng, SeedableRng};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn one_minute_pattern() -> SessionPattern {
        SessionPattern {
            short: SessionRange {
                min_minutes: 1,
                max_minutes: 1,
                break_seconds: 30,
            },
            long: SessionRange {
                min_minutes: 30,
                max_minutes: 30,
                break_seconds: 120,
            },
            short_sessions_before_long: 2,
            penalty_seconds: 90,
        }
    }

    struct Fixture {
        controller: TrackingController,
        store: MemoryCounterStore,
        host: NativeHost,
        replies: UnboundedReceiver<HostReply>,
    }

    async fn fixture(pattern: SessionPattern) -> Fixture {
        let store = MemoryCounterStore::new();
        store
            .initialize_on(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
            .await
            .unwrap();
        let (host, replies) = NativeHost::new();
        let classifier = PageClassifier::new();
        let enforcer = Enforcer::new(
            Arc::new(host.clone()),
            Arc::new(store.clone()),
            classifier.clone(),
            EnforcerConfig::default(),
        );
        let clock = MonotonicClock::starting_at(Utc.with_ymd_and_hms(2026, 10, 19, 20, 0, 0).unwrap());
        let controller = TrackingController::new(
            SessionScheduler::with_rng(pattern, StdRng::seed_from_u64(7)),
            Arc::new(store.clone()),
            enforcer,
            classifier,
            Arc::new(clock),
            DEFAULT_TICK_INTERVAL,
        );
        Fixture {
            controller,
            store,
            host,
            replies,
        }
    }

    async fn daily_usage(store: &MemoryCounterStore) -> f64 {
        store.get(CounterKey::TotalDailyUsage).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_accumulate_usage() {
        let fx = fixture(SessionPattern::default()).await;
        fx.controller.start(1).await.unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(daily_usage(&fx.store).await, 0.5);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(daily_usage(&fx.store).await, 1.0);
        assert_eq!(
            fx.store.get(CounterKey::ContinuousUsage).await.unwrap(),
            1.0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_flushes_partial_span() {
        let fx = fixture(SessionPattern::default()).await;
        fx.controller.start(1).await.unwrap();

        tokio::time::sleep(Duration::from_secs(45)).await;
        fx.controller.stop().await.unwrap();

        // 30s from the tick, 15s from the flush.
        assert_eq!(daily_usage(&fx.store).await, 0.75);
        assert_eq!(fx.controller.current_tab().await, None);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(daily_usage(&fx.store).await, 0.75);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_skips_tiny_spans() {
        let fx = fixture(SessionPattern::default()).await;
        fx.controller.start(1).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        fx.controller.stop().await.unwrap();

        assert_eq!(daily_usage(&fx.store).await, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_same_tab_keeps_session() {
        let fx = fixture(SessionPattern::default()).await;
        fx.controller.start(1).await.unwrap();
        let first = fx.controller.scheduler_state().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        fx.controller.start(1).await.unwrap();

        assert_eq!(fx.controller.scheduler_state().await, first);
        assert_eq!(fx.controller.current_tab().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn switching_tabs_stops_previous() {
        let fx = fixture(SessionPattern::default()).await;
        fx.controller.start(1).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;

        fx.controller.start(2).await.unwrap();

        let snapshot = fx.controller.snapshot().await;
        assert_eq!(snapshot.status, TrackingStatus::Tracking);
        assert_eq!(snapshot.tab_id, Some(2));
        assert_eq!(daily_usage(&fx.store).await, 0.33);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_tabs_survives_failed_flush() {
        let fx = fixture(SessionPattern::default()).await;
        fx.controller.start(1).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;

        fx.store.set_failing(true);
        fx.controller.start(2).await.unwrap();
        assert_eq!(fx.controller.current_tab().await, Some(2));

        fx.store.set_failing(false);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(daily_usage(&fx.store).await, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn session_survives_stop() {
        let fx = fixture(SessionPattern::default()).await;
        fx.controller.start(1).await.unwrap();
        let started = fx.controller.scheduler_state().await;
        assert!(started.has_active_session());

        fx.controller.stop().await.unwrap();
        fx.controller.start(1).await.unwrap();

        assert_eq!(fx.controller.scheduler_state().await, started);
    }

    #[tokio::test(start_paused = true)]
    async fn storage_failure_carries_span_forward() {
        let fx = fixture(SessionPattern::default()).await;
        fx.controller.start(1).await.unwrap();

        fx.store.set_failing(true);
        tokio::time::sleep(Duration::from_secs(31)).await;
        fx.store.set_failing(false);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(daily_usage(&fx.store).await, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_session_starts_break() {
        let mut fx = fixture(one_minute_pattern()).await;
        fx.host.observe(&TabEvent::TabActivated {
            tab_id: 4,
            url: Some("https://www.youtube.com/watch?v=abc".into()),
        });
        fx.controller.start(4).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;

        let reply = fx.replies.recv().await.unwrap();
        assert_eq!(
            reply,
            HostReply::Command {
                tab_id: 4,
                command: PresentationCommand::ShowBlockView
            }
        );

        let state = fx.controller.scheduler_state().await;
        assert_eq!(state.session_count, 1);
        assert_eq!(
            state.current.as_ref().map(|session| session.kind),
            Some(SessionKind::Short)
        );
    }
}
