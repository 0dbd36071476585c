use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};

/// Source of wall-clock timestamps for session and usage bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock derived from tokio's monotonic clock.
///
/// Advances together with `tokio::time`, so a paused test runtime drives
/// session elapsed time and timer sleeps from the same source.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    base_wall: DateTime<Utc>,
    base_instant: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(base_wall: DateTime<Utc>) -> Self {
        Self {
            base_wall,
            base_instant: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.base_instant.elapsed();
        let elapsed = ChronoDuration::from_std(elapsed).unwrap_or(ChronoDuration::zero());
        self.base_wall + elapsed
    }
}

/// Fractional minutes from `from` to `to`. Negative if `to` precedes `from`.
pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Calendar-day label stored as `lastResetDate`, e.g. `Mon Oct 19 2026`.
pub fn date_label(date: NaiveDate) -> String {
    date.format("%a %b %d %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn minutes_between_is_fractional() {
        let start = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let end = start + ChronoDuration::seconds(90);
        assert_eq!(minutes_between(start, end), 1.5);
        assert_eq!(minutes_between(end, start), -1.5);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_hundredths(1.234), 1.23);
        assert_eq!(round_hundredths(1.235_1), 1.24);
        assert_eq!(round_hundredths(0.5), 0.5);
    }

    #[test]
    fn date_label_matches_browser_format() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 5).unwrap();
        assert_eq!(date_label(date), "Mon Oct 05 2026");
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_tokio_time() {
        let base = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let clock = MonotonicClock::starting_at(base);
        tokio::time::advance(std::time::Duration::from_secs(120)).await;
        assert_eq!(clock.now(), base + ChronoDuration::minutes(2));
    }
}
