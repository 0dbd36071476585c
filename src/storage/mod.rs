//! Persisted usage counters.
//!
//! Three counters (minutes) plus the date of the last daily reset. The
//! accumulation and reset rules live on the `CounterStore` trait as default
//! methods; backends only provide raw load/save/get/set.

mod database;
mod memory;
mod migrations;
mod sqlite;

pub use database::Database;
pub use memory::MemoryCounterStore;
pub use sqlite::SqliteCounterStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::utils::time::{date_label, round_hundredths};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Accumulations at or below this many minutes are treated as noise.
pub const MIN_ACCUMULATE_MINUTES: f64 = 0.1;

pub const LAST_RESET_DATE_KEY: &str = "lastResetDate";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CounterKey {
    TotalDailyUsage,
    ContinuousUsage,
    TotalBlockTime,
}

impl CounterKey {
    pub const ALL: [CounterKey; 3] = [
        CounterKey::TotalDailyUsage,
        CounterKey::ContinuousUsage,
        CounterKey::TotalBlockTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKey::TotalDailyUsage => "totalDailyUsage",
            CounterKey::ContinuousUsage => "continuousUsage",
            CounterKey::TotalBlockTime => "totalBlockTime",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == value)
    }
}

/// Full persisted shape, also sent to the popup as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub total_daily_usage: f64,
    pub continuous_usage: f64,
    pub total_block_time: f64,
    pub last_reset_date: String,
}

impl Counters {
    pub fn fresh(today: NaiveDate) -> Self {
        Self {
            total_daily_usage: 0.0,
            continuous_usage: 0.0,
            total_block_time: 0.0,
            last_reset_date: date_label(today),
        }
    }

    pub fn value(&self, key: CounterKey) -> f64 {
        match key {
            CounterKey::TotalDailyUsage => self.total_daily_usage,
            CounterKey::ContinuousUsage => self.continuous_usage,
            CounterKey::TotalBlockTime => self.total_block_time,
        }
    }

    pub fn set_value(&mut self, key: CounterKey, value: f64) {
        match key {
            CounterKey::TotalDailyUsage => self.total_daily_usage = value,
            CounterKey::ContinuousUsage => self.continuous_usage = value,
            CounterKey::TotalBlockTime => self.total_block_time = value,
        }
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Everything stored, or `None` if nothing has been written yet.
    async fn load(&self) -> Result<Option<Counters>>;

    async fn save(&self, counters: &Counters) -> Result<()>;

    /// Missing counters read as zero.
    async fn get(&self, key: CounterKey) -> Result<f64>;

    async fn set(&self, key: CounterKey, value: f64) -> Result<()>;

    /// Reset to defaults when the stored date is not today.
    async fn initialize(&self) -> Result<()> {
        self.initialize_on(Local::now().date_naive()).await
    }

    async fn initialize_on(&self, today: NaiveDate) -> Result<()> {
        let today_label = date_label(today);
        match self.load().await? {
            Some(counters) if counters.last_reset_date == today_label => Ok(()),
            Some(counters) => {
                log_info!(
                    "New day ({}), resetting counters last reset on {}",
                    today_label,
                    counters.last_reset_date
                );
                self.save(&Counters::fresh(today)).await
            }
            None => self.save(&Counters::fresh(today)).await,
        }
    }

    /// Add viewing time to the daily and continuous counters.
    async fn accumulate(&self, minutes: f64) -> Result<()> {
        if minutes.is_nan() || minutes <= MIN_ACCUMULATE_MINUTES {
            return Ok(());
        }

        let total_daily = self.get(CounterKey::TotalDailyUsage).await?;
        let continuous = self.get(CounterKey::ContinuousUsage).await?;

        let new_total = round_hundredths(total_daily + minutes);
        let new_continuous = round_hundredths(continuous + minutes);

        if new_total.floor() > total_daily.floor() {
            log_info!("Total usage updated: {} minutes", new_total);
        }

        self.set(CounterKey::TotalDailyUsage, new_total).await?;
        self.set(CounterKey::ContinuousUsage, new_continuous).await
    }

    async fn add_block_time(&self, minutes: f64) -> Result<()> {
        if minutes.is_nan() || minutes <= 0.0 {
            return Ok(());
        }
        let current = self.get(CounterKey::TotalBlockTime).await?;
        self.set(CounterKey::TotalBlockTime, round_hundredths(current + minutes))
            .await
    }

    async fn snapshot(&self) -> Result<Counters> {
        Ok(self
            .load()
            .await?
            .unwrap_or_else(|| Counters::fresh(Local::now().date_naive())))
    }
}
