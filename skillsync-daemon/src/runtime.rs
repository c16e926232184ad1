use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

use skillsync_core::config::LogFormat;
use skillsync_core::{Config, SyncEvent};
use skillsync_sync::SkillSync;

use crate::error::{io_err, DaemonError};
use crate::paths::{skillsync_root, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Handles kept in the status payload's `handles` list.
const RECENT_HANDLES: usize = 50;

/// Counters plus the most recently synced handles, newest first. Timestamps
/// are Unix seconds.
#[derive(Debug, Default)]
struct SyncStats {
    processed: u64,
    failed: u64,
    last_sync_at_unix: u64,
    recent: VecDeque<(String, u64)>,
}

impl SyncStats {
    fn record_success(&mut self, handle: &str, at: u64) {
        self.processed += 1;
        self.last_sync_at_unix = self.last_sync_at_unix.max(at);
        self.recent.retain(|(seen, _)| seen != handle);
        self.recent.push_front((handle.to_string(), at));
        self.recent.truncate(RECENT_HANDLES);
    }
}

type SharedStats = Arc<RwLock<SyncStats>>;

/// Deployment facts the socket server filters on and reports.
#[derive(Debug, Clone)]
struct Intake {
    topic: String,
    group_id: String,
    transport_url: String,
    transport_tls: bool,
    started_at_unix: u64,
}

struct SyncJob {
    event: SyncEvent,
    source: &'static str,
    respond_to: oneshot::Sender<Result<SyncSummary, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub handle: String,
    pub source: String,
    pub created: usize,
    pub updated: usize,
    pub duration_ms: u64,
}

/// Load config from `home` and the environment, then run the daemon on a
/// fresh runtime, blocking until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    let config = Config::load_at(home, |key| std::env::var(key).ok())?;
    init_tracing(&config);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config))
}

/// Run the daemon against the HTTP collaborators described by `config`.
pub async fn run(home: PathBuf, config: Config) -> Result<(), DaemonError> {
    let sync = SkillSync::from_config(&config)?;
    run_with(home, config, sync).await
}

/// Run the daemon with an already wired [`SkillSync`].
pub async fn run_with(home: PathBuf, config: Config, sync: SkillSync) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let intake = Intake {
        topic: config.transport.topic.clone(),
        group_id: config.transport.group_id.clone(),
        transport_url: config.transport.url.clone(),
        transport_tls: config.transport.tls_enabled(),
        started_at_unix: unix_seconds_now(),
    };
    tracing::info!(
        topic = %intake.topic,
        group_id = %intake.group_id,
        tls = intake.transport_tls,
        skill_provider = %sync.skill_provider_name(),
        "skillsync daemon starting",
    );

    let stats: SharedStats = Arc::new(RwLock::new(SyncStats::default()));
    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let stats = stats.clone();
        tokio::spawn(async move {
            let result = sync_processor_task(sync, stats, sync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let stats = stats.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                intake,
                stats,
                sync_tx,
                shutdown.clone(),
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (processor_result, socket_result, signal_result) =
        tokio::join!(processor_handle, socket_handle, signal_handle);

    handle_join("sync_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("skillsync daemon stopped");
    Ok(())
}

/// Events are processed one at a time, in arrival order.
async fn sync_processor_task(
    sync: SkillSync,
    stats: SharedStats,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let outcome = process_job(&sync, &stats, &job.event, job.source).await;
                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn process_job(
    sync: &SkillSync,
    stats: &SharedStats,
    event: &SyncEvent,
    source: &'static str,
) -> Result<SyncSummary, String> {
    match sync.process(event).await {
        Ok(report) => {
            stats
                .write()
                .await
                .record_success(&report.handle, unix_seconds_now());
            Ok(SyncSummary {
                created: report.created(),
                updated: report.updated(),
                handle: report.handle,
                source: source.to_string(),
                duration_ms: report.duration_ms,
            })
        }
        Err(err) => {
            stats.write().await.failed += 1;
            Err(err.to_string())
        }
    }
}

async fn socket_server_task(
    home: PathBuf,
    intake: Intake,
    stats: SharedStats,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening for sync events");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let intake = intake.clone();
                let stats = stats.clone();
                let sync_tx = sync_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, home, intake, stats, sync_tx, shutdown_tx).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    intake: Intake,
    stats: SharedStats,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            "status" => DaemonResponse::ok(build_status_payload(&home, &intake, &stats).await),
            "sync" => match accept_event(request.event, &intake.topic) {
                Ok(event) => match enqueue_sync(&sync_tx, event, "socket").await {
                    Ok(summary) => DaemonResponse::ok(json!(summary)),
                    Err(DaemonError::Protocol(message)) => DaemonResponse::error(message),
                    Err(err) => DaemonResponse::error(err.to_string()),
                },
                Err(message) => {
                    tracing::warn!(reason = %message, "rejected sync request");
                    DaemonResponse::error(message)
                }
            },
            "stop" => DaemonResponse::ok(json!({ "stopping": true })),
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            let _ = shutdown_tx.send(());
            break;
        }
    }

    Ok(())
}

/// Decode and validate an inbound event and check it belongs to the
/// subscribed topic.
fn accept_event(raw: Option<Value>, topic: &str) -> Result<SyncEvent, String> {
    let raw = raw.ok_or_else(|| "sync requires an \"event\" object".to_string())?;
    let event = SyncEvent::from_value(raw).map_err(|err| format!("invalid sync event: {err}"))?;
    if event.topic != topic {
        return Err(format!(
            "ignoring event on topic '{}' (subscribed to '{topic}')",
            event.topic
        ));
    }
    Ok(event)
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    event: SyncEvent,
    source: &'static str,
) -> Result<SyncSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            event,
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

async fn build_status_payload(home: &Path, intake: &Intake, stats: &SharedStats) -> Value {
    let (processed, failed, last_sync_at_unix, handles) = {
        let guard = stats.read().await;
        let handles: Vec<Value> = guard
            .recent
            .iter()
            .map(|(handle, at)| json!({ "handle": handle, "last_sync_at_unix": at }))
            .collect();
        (guard.processed, guard.failed, guard.last_sync_at_unix, handles)
    };

    json!({
        "running": true,
        "started_at_unix": intake.started_at_unix,
        "processed": processed,
        "failed": failed,
        "last_sync_at_unix": last_sync_at_unix,
        "handles": handles,
        "topic": intake.topic,
        "group_id": intake.group_id,
        "transport_url": intake.transport_url,
        "transport_tls": intake.transport_tls,
        "socket": socket_path(home).display().to_string(),
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = skillsync_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_string(response)?;
    payload.push('\n');
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global stderr subscriber. `RUST_LOG` wins over `LOG_LEVEL`;
/// a second call is a no-op.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = match config.log_format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
