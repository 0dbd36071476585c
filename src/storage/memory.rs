use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Local;

use super::{CounterKey, CounterStore, Counters};

/// Process-local counter store. Used for `--ephemeral` runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    data: Arc<Mutex<Option<Counters>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read and write fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("counter store unavailable");
        }
        Ok(())
    }

    fn with_data<T>(&self, f: impl FnOnce(&mut Option<Counters>) -> T) -> T {
        let mut guard = self
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn load(&self) -> Result<Option<Counters>> {
        self.check()?;
        Ok(self.with_data(|data| data.clone()))
    }

    async fn save(&self, counters: &Counters) -> Result<()> {
        self.check()?;
        self.with_data(|data| *data = Some(counters.clone()));
        Ok(())
    }

    async fn get(&self, key: CounterKey) -> Result<f64> {
        self.check()?;
        Ok(self.with_data(|data| data.as_ref().map(|c| c.value(key)).unwrap_or(0.0)))
    }

    async fn set(&self, key: CounterKey, value: f64) -> Result<()> {
        self.check()?;
        self.with_data(|data| {
            data.get_or_insert_with(|| Counters::fresh(Local::now().date_naive()))
                .set_value(key, value)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_store_rejects_everything() {
        let store = MemoryCounterStore::new();
        store.set_failing(true);
        assert!(store.accumulate(1.0).await.is_err());
        assert!(store.load().await.is_err());

        store.set_failing(false);
        store.accumulate(1.0).await.unwrap();
        assert_eq!(store.get(CounterKey::TotalDailyUsage).await.unwrap(), 1.0);
    }
}
