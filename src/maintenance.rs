use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use tokio::{
    task::JoinHandle,
    time::{Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::storage::CounterStore;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// The first midnight strictly after `now` in `now`'s time zone.
///
/// Falls back to 24 hours from `now` when local midnight does not exist.
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or_else(|| now.date_naive());
    tomorrow
        .and_time(NaiveTime::MIN)
        .and_local_timezone(now.timezone())
        .earliest()
        .unwrap_or_else(|| now.clone() + chrono::Duration::days(1))
}

pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    (next_midnight(now) - now.clone())
        .to_std()
        .unwrap_or(DAY)
}

/// Reset stale counters at the next local midnight and every 24 hours after.
pub fn spawn_daily_reset(
    store: Arc<dyn CounterStore>,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    let first = until_next_midnight(&Local::now());
    spawn_reset_loop(store, first, DAY, cancel_token)
}

fn spawn_reset_loop(
    store: Arc<dyn CounterStore>,
    first: Duration,
    period: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        log_info!("Daily reset scheduled in {} minutes", first.as_secs() / 60);
        let mut ticker = tokio::time::interval_at(Instant::now() + first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = store.initialize().await {
                        log_error!("Daily reset failed: {err:#}");
                    }
                }
                _ = cancel_token.cancelled() => break,
            }
        }
    })
}
