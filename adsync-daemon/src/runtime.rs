use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use adsync_accounts::AccountBackend;
use adsync_core::{ConfigError, DaemonSettings, SyncConfig};
use adsync_directory::MembershipSource;
use adsync_sync::{pipeline, CycleSummary, Reconciler, SyncError};

use crate::error::{io_err, DaemonError};
use crate::lock::InstanceLock;
use crate::paths::{MIN_SYNC_INTERVAL, ROTATION_INTERVAL};
use crate::signals::Trigger;

/// Re-reads and validates the config file on reload.
pub type ConfigLoader = Arc<dyn Fn() -> Result<SyncConfig, ConfigError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// Sending half of the three trigger channels. Each channel holds at most one
/// pending trigger; firing while one is pending is a no-op.
#[derive(Debug, Clone)]
pub struct Triggers {
    sync: mpsc::Sender<()>,
    reload: mpsc::Sender<()>,
    terminate: mpsc::Sender<()>,
}

#[derive(Debug)]
pub struct TriggerReceivers {
    sync: mpsc::Receiver<()>,
    reload: mpsc::Receiver<()>,
    terminate: mpsc::Receiver<()>,
}

impl Triggers {
    pub fn channel() -> (Triggers, TriggerReceivers) {
        let (sync_tx, sync_rx) = mpsc::channel(1);
        let (reload_tx, reload_rx) = mpsc::channel(1);
        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        (
            Triggers {
                sync: sync_tx,
                reload: reload_tx,
                terminate: terminate_tx,
            },
            TriggerReceivers {
                sync: sync_rx,
                reload: reload_rx,
                terminate: terminate_rx,
            },
        )
    }

    /// Queue `trigger`. Returns false when it was coalesced with a pending
    /// one or the control loop is gone.
    pub fn fire(&self, trigger: Trigger) -> bool {
        let sender = match trigger {
            Trigger::Sync => &self.sync,
            Trigger::Reload => &self.reload,
            Trigger::Terminate => &self.terminate,
        };
        match sender.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                tracing::debug!(trigger = trigger.as_str(), "trigger already pending");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// The work the control loop drives. Runs on the blocking pool.
pub trait Reconcile: Send + 'static {
    fn reconcile(&mut self) -> Result<CycleSummary, SyncError>;

    fn reload(&mut self, config: Arc<SyncConfig>);
}

impl<D, B> Reconcile for Reconciler<D, B>
where
    D: MembershipSource + 'static,
    B: AccountBackend + 'static,
{
    fn reconcile(&mut self) -> Result<CycleSummary, SyncError> {
        self.run()
    }

    fn reload(&mut self, config: Arc<SyncConfig>) {
        self.replace_config(config);
    }
}

struct DaemonContext {
    config: Arc<SyncConfig>,
    receivers: TriggerReceivers,
    interval_tx: watch::Sender<Duration>,
    loader: ConfigLoader,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Load the config, start the runtime and block until the daemon exits.
pub fn start_blocking(config_path: &Path) -> Result<(), DaemonError> {
    let config = SyncConfig::load_at(config_path)?;
    crate::logging::init_tracing(&config.daemon);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config_path.to_path_buf(), config))
}

/// Run the daemon with an already validated config.
pub async fn run(config_path: PathBuf, config: SyncConfig) -> Result<(), DaemonError> {
    let config = Arc::new(config);
    let lock = InstanceLock::acquire(&config.daemon.pid_file)?;
    tracing::info!(
        pid = lock.pid(),
        config = %config_path.display(),
        interval_secs = config.daemon.sync_interval_secs,
        dry_run = config.dry_run,
        "adsyncd starting"
    );

    let mut engine = pipeline::build(Arc::clone(&config));
    let engine = tokio::task::spawn_blocking(move || engine.prepare().map(|()| engine))
        .await
        .map_err(|err| DaemonError::Join(format!("prepare: {err}")))??;

    let loader: ConfigLoader = Arc::new(move || SyncConfig::load_at(&config_path));
    serve(engine, config, loader, true).await?;

    lock.release()?;
    tracing::info!("adsyncd stopped");
    Ok(())
}

/// Spawn the auxiliary tasks and the control loop and wait for all of them.
async fn serve<R: Reconcile>(
    engine: R,
    config: Arc<SyncConfig>,
    loader: ConfigLoader,
    listen_for_signals: bool,
) -> Result<(), DaemonError> {
    let (triggers, receivers) = Triggers::channel();
    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let (interval_tx, interval_rx) = watch::channel(sync_interval(&config.daemon));

    let timer_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let triggers = triggers.clone();
        let sync_on_start = config.daemon.sync_on_start;
        tokio::spawn(async move {
            let result = timer_task(triggers, interval_rx, sync_on_start, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let triggers = triggers.clone();
        tokio::spawn(async move {
            let result = if listen_for_signals {
                signal_task(triggers, shutdown_rx).await
            } else {
                wait_for_shutdown(shutdown_rx).await
            };
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let settings = config.daemon.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(settings, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let control_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let ctx = DaemonContext {
            config,
            receivers,
            interval_tx,
            loader,
        };
        tokio::spawn(async move {
            let result = control_loop(engine, ctx, shutdown_rx).await.map(|_| ());
            let _ = shutdown.send(());
            result
        })
    };
    drop(triggers);

    let (timer_result, signal_result, rotation_result, control_result) =
        tokio::join!(timer_handle, signal_handle, rotation_handle, control_handle);

    handle_join("control_loop", control_result)?;
    handle_join("timer", timer_result)?;
    handle_join("signal_handler", signal_result)?;
    handle_join("log_rotation", rotation_result)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Wait for triggers and handle one at a time. Terminate wins over pending
/// reload and sync triggers; reload wins over sync.
async fn control_loop<R: Reconcile>(
    mut engine: R,
    mut ctx: DaemonContext,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<R, DaemonError> {
    loop {
        tokio::select! {
            biased;
            _ = ctx.receivers.terminate.recv() => {
                tracing::info!("terminate requested");
                break;
            }
            _ = shutdown_rx.recv() => break,
            message = ctx.receivers.reload.recv() => {
                if message.is_none() {
                    break;
                }
                reload(&mut engine, &mut ctx);
            }
            message = ctx.receivers.sync.recv() => {
                if message.is_none() {
                    break;
                }
                engine = run_cycle(engine).await?;
            }
        }
    }
    Ok(engine)
}

async fn run_cycle<R: Reconcile>(mut engine: R) -> Result<R, DaemonError> {
    let (engine, result) = tokio::task::spawn_blocking(move || {
        let result = engine.reconcile();
        (engine, result)
    })
    .await
    .map_err(|err| DaemonError::Join(format!("sync cycle: {err}")))?;

    match result {
        Ok(summary) => tracing::info!(
            created = summary.created.len(),
            repaired = summary.repaired.len(),
            removed = summary.removed.len(),
            directory_members = summary.directory_members,
            duration_ms = summary.duration_ms,
            "sync cycle complete"
        ),
        Err(err) => tracing::error!(
            operation = err.operation(),
            user = err.user().unwrap_or("-"),
            error = %err,
            "sync cycle failed"
        ),
    }
    Ok(engine)
}

fn reload<R: Reconcile>(engine: &mut R, ctx: &mut DaemonContext) {
    let config = match (ctx.loader)() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            tracing::warn!(error = %err, "reload failed; keeping current configuration");
            return;
        }
    };

    if config.daemon.pid_file != ctx.config.daemon.pid_file
        || config.daemon.log_file != ctx.config.daemon.log_file
    {
        tracing::warn!("pid_file and log_file changes take effect after a restart");
    }

    let interval = sync_interval(&config.daemon);
    engine.reload(Arc::clone(&config));
    ctx.config = config;
    ctx.interval_tx.send_if_modified(|current| {
        if *current == interval {
            return false;
        }
        *current = interval;
        true
    });
    tracing::info!(interval_secs = interval.as_secs(), "configuration reloaded");
}

/// Emit a sync trigger every interval. A new interval restarts the schedule.
async fn timer_task(
    triggers: Triggers,
    mut interval_rx: watch::Receiver<Duration>,
    sync_on_start: bool,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut immediate = sync_on_start;
    loop {
        let period = (*interval_rx.borrow_and_update()).max(MIN_SYNC_INTERVAL);
        let start = if immediate {
            Instant::now()
        } else {
            Instant::now() + period
        };
        immediate = false;

        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    break;
                }
                _ = ticker.tick() => {
                    triggers.fire(Trigger::Sync);
                }
            }
        }
    }
}

async fn signal_task(
    triggers: Triggers,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1()).map_err(|e| io_err("SIGUSR1", e))?;
    let mut usr2 = signal(SignalKind::user_defined2()).map_err(|e| io_err("SIGUSR2", e))?;
    let mut term = signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM", e))?;
    let mut int = signal(SignalKind::interrupt()).map_err(|e| io_err("SIGINT", e))?;

    loop {
        let (name, trigger, received) = tokio::select! {
            _ = shutdown_rx.recv() => break,
            r = usr1.recv() => ("SIGUSR1", Trigger::Sync, r),
            r = usr2.recv() => ("SIGUSR2", Trigger::Reload, r),
            r = term.recv() => ("SIGTERM", Trigger::Terminate, r),
            r = int.recv() => ("SIGINT", Trigger::Terminate, r),
        };
        if received.is_none() {
            return Err(DaemonError::ChannelClosed(name));
        }
        tracing::info!(signal = name, trigger = trigger.as_str(), "signal received");
        triggers.fire(trigger);
    }
    Ok(())
}

async fn log_rotation_task(
    settings: DaemonSettings,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let Some(log_file) = settings.log_file else {
        return wait_for_shutdown(shutdown_rx).await;
    };

    let mut interval = tokio::time::interval(ROTATION_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let path = log_file.clone();
                let (max_bytes, max_files) = (settings.log_max_bytes, settings.log_max_files);
                tokio::task::spawn_blocking(move || {
                    crate::log_rotation::rotate_log(&path, max_bytes, max_files);
                })
                .await
                .ok();
            }
        }
    }
    Ok(())
}

async fn wait_for_shutdown(mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), DaemonError> {
    let _ = shutdown_rx.recv().await;
    Ok(())
}

fn sync_interval(settings: &DaemonSettings) -> Duration {
    Duration::from_secs(settings.sync_interval_secs).max(MIN_SYNC_INTERVAL)
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join(format!("{task}: {err}"))),
    }
}
