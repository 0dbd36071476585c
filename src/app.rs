use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::classifier::PageClassifier;
use crate::cli::Cli;
use crate::dispatcher::{DebounceTimer, EventDispatcher};
use crate::enforcer::Enforcer;
use crate::host::{
    codec::read_frame, spawn_writer, ControlMessage, HostMessage, HostReply, NativeHost,
};
use crate::maintenance;
use crate::scheduler::SessionScheduler;
use crate::settings::{Settings, SettingsStore, DATA_DIR_ENV};
use crate::storage::{CounterStore, Database, MemoryCounterStore, SqliteCounterStore};
use crate::tracking::TrackingController;
use crate::utils::{Clock, SystemClock};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Everything wired together for one browser connection.
pub struct App {
    store: Arc<dyn CounterStore>,
    host: NativeHost,
    enforcer: Enforcer,
    tracking: TrackingController,
    dispatcher: EventDispatcher,
    maintenance_cancel: CancellationToken,
    maintenance: JoinHandle<()>,
}

impl App {
    pub async fn start(
        settings: &Settings,
        store: Arc<dyn CounterStore>,
        host: NativeHost,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if let Err(err) = store.initialize().await {
            log_error!("Failed to initialize counters: {err:#}");
        }
        let maintenance_cancel = CancellationToken::new();
        let maintenance =
            maintenance::spawn_daily_reset(store.clone(), maintenance_cancel.clone());

        let classifier = PageClassifier::new();
        let enforcer = Enforcer::new(
            Arc::new(host.clone()),
            store.clone(),
            classifier.clone(),
            settings.enforcer_config(),
        );
        let tracking = TrackingController::new(
            SessionScheduler::new(settings.session_pattern),
            store.clone(),
            enforcer.clone(),
            classifier.clone(),
            clock,
            settings.tick_interval(),
        );
        let dispatcher = EventDispatcher::new(
            tracking.clone(),
            classifier,
            DebounceTimer::new(settings.debounce_window()),
        );

        Self {
            store,
            host,
            enforcer,
            tracking,
            dispatcher,
            maintenance_cancel,
            maintenance,
        }
    }

    /// Process messages until the browser closes the pipe.
    pub async fn serve<R>(&self, reader: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        while let Some(body) = read_frame(reader).await? {
            match serde_json::from_slice::<HostMessage>(&body) {
                Ok(message) => self.handle(message).await,
                Err(err) => {
                    log_warn!("Ignoring unrecognised message: {}", err);
                    self.reply(HostReply::Error {
                        message: format!("unrecognised message: {err}"),
                    });
                }
            }
        }
        log_info!("Browser closed the connection");
        Ok(())
    }

    pub async fn handle(&self, message: HostMessage) {
        match message {
            HostMessage::Tab(event) => {
                self.host.observe(&event);
                self.dispatcher.handle(&event).await;
            }
            HostMessage::Control(ControlMessage::Ping) => self.reply(HostReply::Pong),
            HostMessage::Control(ControlMessage::GetStatus) => {
                let reply = match self.store.snapshot().await {
                    Ok(counters) => HostReply::Status {
                        counters,
                        tracking: self.tracking.snapshot().await,
                    },
                    Err(err) => HostReply::Error {
                        message: format!("failed to read counters: {err:#}"),
                    },
                };
                self.reply(reply);
            }
        }
    }

    fn reply(&self, reply: HostReply) {
        if let Err(err) = self.host.reply(reply) {
            log_warn!("Dropping reply: {err:#}");
        }
    }

    /// Flush tracked time and stop every background task.
    pub async fn shutdown(self) {
        self.dispatcher.cancel_pending();
        if let Err(err) = self.tracking.stop().await {
            log_error!("Failed to stop tracking on shutdown: {err:#}");
        }
        self.enforcer.shutdown();
        self.maintenance_cancel.cancel();
        if let Err(err) = self.maintenance.await {
            log_error!("Maintenance task ended abnormally: {}", err);
        }
    }
}

fn open_store(
    cli: &Cli,
    settings: &Settings,
    data_dir: &Path,
) -> Result<Arc<dyn CounterStore>> {
    if cli.ephemeral {
        log_info!("Ephemeral mode, counters are kept in memory");
        return Ok(Arc::new(MemoryCounterStore::new()));
    }
    let db_path = settings.database_path(data_dir);
    let database = Database::open(db_path.clone())
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    log_info!("Counters stored in {}", db_path.display());
    Ok(Arc::new(SqliteCounterStore::new(database)))
}

fn load_settings(cli: &Cli, data_dir: &Path) -> Result<Settings> {
    let store = SettingsStore::new(cli.settings_path(data_dir))?;
    if !cli.ephemeral {
        if let Err(err) = store.persist_if_missing() {
            log_warn!("Could not write default settings: {err:#}");
        }
    }
    let settings = store
        .settings()
        .with_env_overrides(|key| std::env::var(key).ok());
    settings
        .validate()
        .with_context(|| format!("invalid settings in {}", store.path().display()))?;
    Ok(settings)
}

pub async fn run(cli: Cli) -> Result<()> {
    if let Some(origin) = &cli.caller_origin {
        log_info!("Launched by {}", origin);
    }

    let data_dir = cli.resolve_data_dir(std::env::var(DATA_DIR_ENV).ok())?;
    let settings = load_settings(&cli, &data_dir)?;
    let store = open_store(&cli, &settings, &data_dir)?;

    let (host, replies) = NativeHost::new();
    let writer = spawn_writer(tokio::io::stdout(), replies);
    let app = App::start(&settings, store, host, Arc::new(SystemClock)).await;

    let mut stdin = tokio::io::stdin();
    let served = app.serve(&mut stdin).await;
    app.shutdown().await;

    // The writer finishes once the last `NativeHost` clone is gone.
    writer
        .await
        .context("native messaging writer panicked")?
        .context("failed to write to the browser")?;
    served
}

/// Serve over arbitrary pipes. Used by the integration tests.
pub async fn serve_with<R, W>(
    settings: &Settings,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    mut reader: R,
    writer: W,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (host, replies) = NativeHost::new();
    let writer = spawn_writer(writer, replies);
    let app = App::start(settings, store, host, clock).await;
    let served = app.serve(&mut reader).await;
    app.shutdown().await;
    writer.await.context("native messaging writer panicked")??;
    served
}
