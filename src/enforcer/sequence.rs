use std::sync::Arc;

use tokio::{task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classifier::PageClassifier;
use crate::host::TabHost;
use crate::models::{BreakDecision, PresentationCommand, TabId};
use crate::storage::CounterStore;
use crate::utils::logging::{BLOCK, PENALTY};

use super::EnforceError;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const DEFAULT_FALLBACK_URL: &str = "https://youtube.com";
pub const DEFAULT_PAGE_LOAD_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EnforcerConfig {
    /// Wait between navigating back and starting the penalty.
    pub page_load_grace: Duration,
    /// Where to send the tab when no video URL was remembered.
    pub fallback_url: String,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            page_load_grace: DEFAULT_PAGE_LOAD_GRACE,
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementOutcome {
    /// Every step ran. Individual non-essential deliveries may have failed.
    Completed,
    Aborted(EnforceError),
    /// The enforcer was shut down mid-sequence.
    Cancelled,
}

enum Halt {
    Cancelled,
    Failed(EnforceError),
}

/// Runs break sequences: block view, wait, navigate back, penalty, clear.
///
/// Each sequence is its own task. Stopping the tracking loop does not touch
/// it; only `shutdown` cancels sequences in flight.
#[derive(Clone)]
pub struct Enforcer {
    host: Arc<dyn TabHost>,
    store: Arc<dyn CounterStore>,
    classifier: PageClassifier,
    config: EnforcerConfig,
    shutdown: CancellationToken,
}

impl Enforcer {
    pub fn new(
        host: Arc<dyn TabHost>,
        store: Arc<dyn CounterStore>,
        classifier: PageClassifier,
        config: EnforcerConfig,
    ) -> Self {
        Self {
            host,
            store,
            classifier,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn spawn(&self, tab_id: TabId, decision: BreakDecision) -> JoinHandle<EnforcementOutcome> {
        let enforcer = self.clone();
        tokio::spawn(async move { enforcer.run(tab_id, decision).await })
    }

    /// Cancel every sequence still waiting at a suspension point.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn run(&self, tab_id: TabId, decision: BreakDecision) -> EnforcementOutcome {
        let run_id = Uuid::new_v4();
        let cancel = self.shutdown.child_token();
        let return_url = self
            .classifier
            .last_video_url()
            .unwrap_or_else(|| self.config.fallback_url.clone());

        log_info!(
            target: BLOCK,
            "[{}] Enforcing {}s break on tab {} after {} session, returning to {}",
            run_id,
            decision.break_seconds,
            tab_id,
            decision.completed.as_str(),
            return_url
        );

        match self
            .execute(run_id, tab_id, decision, return_url, &cancel)
            .await
        {
            Ok(()) => {
                log_info!(target: BLOCK, "[{}] Break sequence finished", run_id);
                EnforcementOutcome::Completed
            }
            Err(Halt::Cancelled) => {
                log_info!(target: BLOCK, "[{}] Break sequence cancelled", run_id);
                EnforcementOutcome::Cancelled
            }
            Err(Halt::Failed(err)) => {
                log_warn!(target: BLOCK, "[{}] Error during block sequence: {}", run_id, err);
                EnforcementOutcome::Aborted(err)
            }
        }
    }

    async fn execute(
        &self,
        run_id: Uuid,
        tab_id: TabId,
        decision: BreakDecision,
        return_url: String,
        cancel: &CancellationToken,
    ) -> Result<(), Halt> {
        if !self.host.tab_exists(tab_id).await {
            return Err(Halt::Failed(EnforceError::TabNotFound(tab_id)));
        }

        // Without the block view there is no break to enforce.
        self.host
            .send(tab_id, PresentationCommand::ShowBlockView)
            .await
            .map_err(Halt::Failed)?;
        log_info!(target: BLOCK, "[{}] Block page shown", run_id);

        pause(Duration::from_secs(decision.break_seconds), cancel).await?;
        log_info!(target: BLOCK, "[{}] Block duration completed", run_id);
        self.record_block_time(run_id, decision.break_seconds).await;

        self.deliver(run_id, tab_id, PresentationCommand::NavigateTo { url: return_url })
            .await?;

        pause(self.config.page_load_grace, cancel).await?;

        self.deliver(
            run_id,
            tab_id,
            PresentationCommand::StartVisualPenalty {
                duration_seconds: decision.penalty_seconds,
            },
        )
        .await?;
        log_info!(
            target: PENALTY,
            "[{}] Visual penalty on for {}s",
            run_id,
            decision.penalty_seconds
        );

        pause(Duration::from_secs(decision.penalty_seconds), cancel).await?;

        self.deliver(run_id, tab_id, PresentationCommand::StopVisualPenalty)
            .await?;
        log_info!(target: PENALTY, "[{}] Visual penalty cleared", run_id);

        Ok(())
    }

    /// Send a non-essential command. A closed tab ends the sequence; any other
    /// delivery failure is logged and the sequence carries on.
    async fn deliver(
        &self,
        run_id: Uuid,
        tab_id: TabId,
        command: PresentationCommand,
    ) -> Result<(), Halt> {
        match self.host.send(tab_id, command).await {
            Ok(()) => Ok(()),
            Err(err @ EnforceError::TabNotFound(_)) => Err(Halt::Failed(err)),
            Err(err) => {
                log_warn!(target: BLOCK, "[{}] {}", run_id, err);
                Ok(())
            }
        }
    }

    async fn record_block_time(&self, run_id: Uuid, break_seconds: u64) {
        let minutes = break_seconds as f64 / 60.0;
        if let Err(err) = self.store.add_block_time(minutes).await {
            log_warn!(target: BLOCK, "[{}] {}", run_id, EnforceError::storage(err));
        }
    }
}

async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), Halt> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(Halt::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionKind;
    use crate::storage::{CounterKey, MemoryCounterStore};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Script {
        open: HashSet<TabId>,
        sent: Vec<(u64, PresentationCommand)>,
        undeliverable: HashSet<&'static str>,
        close_after: Option<usize>,
    }

    struct ScriptedHost {
        origin: Instant,
        script: Mutex<Script>,
    }

    impl ScriptedHost {
        fn with_open_tab(tab_id: TabId) -> Arc<Self> {
            let mut script = Script::default();
            script.open.insert(tab_id);
            Arc::new(Self {
                origin: Instant::now(),
                script: Mutex::new(script),
            })
        }

        fn edit(&self, f: impl FnOnce(&mut Script)) {
            f(&mut self.script.lock().unwrap());
        }

        fn sent(&self) -> Vec<(u64, PresentationCommand)> {
            self.script.lock().unwrap().sent.clone()
        }
    }

    #[async_trait]
    impl TabHost for ScriptedHost {
        async fn tab_exists(&self, tab_id: TabId) -> bool {
            self.script.lock().unwrap().open.contains(&tab_id)
        }

        async fn send(
            &self,
            tab_id: TabId,
            command: PresentationCommand,
        ) -> Result<(), EnforceError> {
            let mut script = self.script.lock().unwrap();
            if !script.open.contains(&tab_id) {
                return Err(EnforceError::TabNotFound(tab_id));
            }
            if script.undeliverable.contains(command.name()) {
                return Err(EnforceError::MessagingFailure {
                    tab_id,
                    command: command.name(),
                    reason: "no receiver".into(),
                });
            }
            let at = self.origin.elapsed().as_secs();
            script.sent.push((at, command));
            if script.close_after == Some(script.sent.len()) {
                script.open.remove(&tab_id);
            }
            Ok(())
        }
    }

    fn short_break() -> BreakDecision {
        BreakDecision {
            completed: SessionKind::Short,
            break_seconds: 30,
            penalty_seconds: 90,
        }
    }

    fn enforcer(host: Arc<ScriptedHost>, store: MemoryCounterStore) -> (Enforcer, PageClassifier) {
        let classifier = PageClassifier::new();
        let enforcer = Enforcer::new(
            host,
            Arc::new(store),
            classifier.clone(),
            EnforcerConfig::default(),
        );
        (enforcer, classifier)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_steps_in_order_with_waits() {
        let host = ScriptedHost::with_open_tab(4);
        let store = MemoryCounterStore::new();
        let (enforcer, classifier) = enforcer(host.clone(), store.clone());
        classifier.is_target_page(Some("https://www.youtube.com/watch?v=abc"));

        let outcome = enforcer.run(4, short_break()).await;

        assert_eq!(outcome, EnforcementOutcome::Completed);
        assert_eq!(
            host.sent(),
            vec![
                (0, PresentationCommand::ShowBlockView),
                (
                    30,
                    PresentationCommand::NavigateTo {
                        url: "https://www.youtube.com/watch?v=abc".into()
                    }
                ),
                (
                    32,
                    PresentationCommand::StartVisualPenalty {
                        duration_seconds: 90
                    }
                ),
                (122, PresentationCommand::StopVisualPenalty),
            ]
        );
        assert_eq!(store.get(CounterKey::TotalBlockTime).await.unwrap(), 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_when_no_video_was_seen() {
        let host = ScriptedHost::with_open_tab(1);
        let (enforcer, _) = enforcer(host.clone(), MemoryCounterStore::new());

        enforcer.run(1, short_break()).await;

        assert!(host.sent().contains(&(
            30,
            PresentationCommand::NavigateTo {
                url: DEFAULT_FALLBACK_URL.into()
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_tab_aborts_before_any_command() {
        let host = ScriptedHost::with_open_tab(1);
        let (enforcer, _) = enforcer(host.clone(), MemoryCounterStore::new());

        let outcome = enforcer.run(2, short_break()).await;

        assert_eq!(
            outcome,
            EnforcementOutcome::Aborted(EnforceError::TabNotFound(2))
        );
        assert!(host.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn block_view_failure_aborts() {
        let host = ScriptedHost::with_open_tab(1);
        host.edit(|s| {
            s.undeliverable.insert("showBlockView");
        });
        let store = MemoryCounterStore::new();
        let (enforcer, _) = enforcer(host.clone(), store.clone());

        let outcome = enforcer.run(1, short_break()).await;

        assert!(matches!(
            outcome,
            EnforcementOutcome::Aborted(EnforceError::MessagingFailure { .. })
        ));
        assert!(host.sent().is_empty());
        assert_eq!(store.get(CounterKey::TotalBlockTime).await.unwrap(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn penalty_delivery_failure_is_skipped() {
        let host = ScriptedHost::with_open_tab(1);
        host.edit(|s| {
            s.undeliverable.insert("startVisualPenalty");
        });
        let (enforcer, _) = enforcer(host.clone(), MemoryCounterStore::new());

        let outcome = enforcer.run(1, short_break()).await;

        assert_eq!(outcome, EnforcementOutcome::Completed);
        let names: Vec<_> = host.sent().iter().map(|(_, c)| c.name()).collect();
        assert_eq!(names, vec!["showBlockView", "navigateTo", "stopVisualPenalty"]);
    }

    #[tokio::test(start_paused = true)]
    async fn tab_closed_mid_break_ends_sequence() {
        let host = ScriptedHost::with_open_tab(1);
        host.edit(|s| s.close_after = Some(1));
        let (enforcer, _) = enforcer(host.clone(), MemoryCounterStore::new());

        let outcome = enforcer.run(1, short_break()).await;

        assert_eq!(
            outcome,
            EnforcementOutcome::Aborted(EnforceError::TabNotFound(1))
        );
        assert_eq!(host.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn storage_failure_does_not_stop_the_break() {
        let host = ScriptedHost::with_open_tab(1);
        let store = MemoryCounterStore::new();
        store.set_failing(true);
        let (enforcer, _) = enforcer(host.clone(), store);

        assert_eq!(
            enforcer.run(1, short_break()).await,
            EnforcementOutcome::Completed
        );
        assert_eq!(host.sent().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_waiting_sequence() {
        let host = ScriptedHost::with_open_tab(1);
        let (enforcer, _) = enforcer(host.clone(), MemoryCounterStore::new());

        let handle = enforcer.spawn(1, short_break());
        tokio::time::sleep(Duration::from_secs(10)).await;
        enforcer.shutdown();

        assert_eq!(handle.await.unwrap(), EnforcementOutcome::Cancelled);
        assert_eq!(host.sent().len(), 1);
    }
}
