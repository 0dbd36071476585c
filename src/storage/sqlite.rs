use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;

use crate::utils::time::date_label;

use super::{CounterKey, CounterStore, Counters, Database, LAST_RESET_DATE_KEY};

/// Counters kept in the local SQLite file as key/value rows.
#[derive(Clone)]
pub struct SqliteCounterStore {
    db: Database,
}

impl SqliteCounterStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn parse_minutes(key: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .with_context(|| format!("counter {key} holds non-numeric value '{raw}'"))
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn load(&self) -> Result<Option<Counters>> {
        let rows = self.db.read_counters().await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut counters = Counters {
            total_daily_usage: 0.0,
            continuous_usage: 0.0,
            total_block_time: 0.0,
            last_reset_date: rows.get(LAST_RESET_DATE_KEY).cloned().unwrap_or_default(),
        };
        for key in CounterKey::ALL {
            if let Some(raw) = rows.get(key.as_str()) {
                counters.set_value(key, parse_minutes(key.as_str(), raw)?);
            }
        }

        Ok(Some(counters))
    }

    async fn save(&self, counters: &Counters) -> Result<()> {
        let mut entries: Vec<(String, String)> = CounterKey::ALL
            .into_iter()
            .map(|key| (key.as_str().to_string(), counters.value(key).to_string()))
            .collect();
        entries.push((
            LAST_RESET_DATE_KEY.to_string(),
            counters.last_reset_date.clone(),
        ));
        self.db.write_counters(entries).await
    }

    async fn get(&self, key: CounterKey) -> Result<f64> {
        match self.db.read_counter(key.as_str()).await? {
            Some(raw) => parse_minutes(key.as_str(), &raw),
            None => Ok(0.0),
        }
    }

    async fn set(&self, key: CounterKey, value: f64) -> Result<()> {
        let mut entries = vec![(key.as_str().to_string(), value.to_string())];
        if self.db.read_counter(LAST_RESET_DATE_KEY).await?.is_none() {
            entries.push((
                LAST_RESET_DATE_KEY.to_string(),
                date_label(Local::now().date_naive()),
            ));
        }
        self.db.write_counters(entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[tokio::test]
    async fn empty_database_loads_nothing() {
        let store = SqliteCounterStore::new(Database::open_in_memory().unwrap());
        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(store.get(CounterKey::ContinuousUsage).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn counters_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("breakwatch.sqlite3");

        {
            let store = SqliteCounterStore::new(Database::open(path.clone()).unwrap());
            store.initialize_on(day(19)).await.unwrap();
            store.accumulate(1.25).await.unwrap();
            store.add_block_time(0.5).await.unwrap();
            assert_eq!(store.database().path(), Some(path.as_path()));
        }

        let reopened = SqliteCounterStore::new(Database::open(path).unwrap());
        let counters = reopened.load().await.unwrap().unwrap();
        assert_eq!(
            counters,
            Counters {
                total_daily_usage: 1.25,
                continuous_usage: 1.25,
                total_block_time: 0.5,
                last_reset_date: "Mon Oct 19 2026".into(),
            }
        );
    }

    #[tokio::test]
    async fn new_day_resets_stored_counters() {
        let store = SqliteCounterStore::new(Database::open_in_memory().unwrap());
        store.initialize_on(day(18)).await.unwrap();
        store.accumulate(12.0).await.unwrap();

        store.initialize_on(day(19)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(Counters::fresh(day(19))));
    }

    #[tokio::test]
    async fn set_on_empty_store_stamps_reset_date() {
        let store = SqliteCounterStore::new(Database::open_in_memory().unwrap());
        store.set(CounterKey::TotalBlockTime, 3.0).await.unwrap();

        let counters = store.load().await.unwrap().unwrap();
        assert_eq!(counters.total_block_time, 3.0);
        assert!(!counters.last_reset_date.is_empty());
    }
}
