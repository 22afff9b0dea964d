//! Worker transport (C4): owns the host child process, performs the
//! handshake once, serializes requests, demultiplexes responses by request
//! id, forwards notifications, and hands `format` results to the caller
//! through a [`SharedResponseBuffer`].
//!
//! Grounded in the same shape as this workspace's other child-process JSON
//! transports: a writer channel, a pending-request table keyed by request
//! id, a dedicated reader task, and a `valid` flag that a fatal
//! notification or child exit flips so the facade knows to restart.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

use fmt_protocol::codec::tokio_io::{write_frame, AsyncFrameReader};
use fmt_protocol::envelope::{Command as WireCommand, Envelope, EnvelopeType};
use fmt_protocol::payload::{ErrorNotification, ErrorSeverity, LogLevel, LogNotification};

use crate::defaults;
use crate::error::ClientError;
use crate::host_resolve::resolve_host_binary;
use crate::shared_buffer::SharedResponseBuffer;

pub(crate) enum PendingResolver {
    Oneshot(oneshot::Sender<Result<Envelope, ClientError>>),
    SharedBuffer(Arc<SharedResponseBuffer>),
}

pub(crate) struct PendingEntry {
    pub(crate) resolver: PendingResolver,
}

pub(crate) type PendingTable = Arc<std::sync::Mutex<HashMap<String, PendingEntry>>>;

/// The worker's execution context for one host child process. A fresh
/// `Worker` is created every time the facade (re)spawns the host; once
/// `valid()` goes false the facade must discard it and spawn another.
pub struct Worker {
    outbound: mpsc::UnboundedSender<Envelope>,
    pending: PendingTable,
    next_id: AtomicU64,
    valid: Arc<AtomicBool>,
    initialized: AtomicBool,
    child: Arc<AsyncMutex<Child>>,
    pub session_id: String,
    pub host_binary_path: PathBuf,
}

impl Worker {
    /// Spawns the host binary and wires up the reader/writer/child-exit
    /// tasks. Does not perform the handshake; call [`Worker::initialize`]
    /// once immediately after.
    pub async fn spawn(session_id: String) -> Result<Self, ClientError> {
        let path = resolve_host_binary()?;
        let mut child = spawn_with_retry(&path).await?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Envelope>();
        let pending: PendingTable = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let valid = Arc::new(AtomicBool::new(true));

        tokio::spawn(writer_task(stdin, outbound_rx));
        tokio::spawn(reader_task(stdout, pending.clone(), valid.clone()));
        tokio::spawn(stderr_task(stderr));

        Ok(Worker {
            outbound: outbound_tx,
            pending,
            next_id: AtomicU64::new(1),
            valid,
            initialized: AtomicBool::new(false),
            child: Arc::new(AsyncMutex::new(child)),
            session_id,
            host_binary_path: path,
        })
    }

    pub fn valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Whether `initialize` has already succeeded on this child process.
    /// The handshake is performed exactly once per spawn (§4.4).
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    fn fresh_request_id(&self) -> String {
        format!("r{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Issues a request and awaits its response via a oneshot channel,
    /// rejecting on the supplied timeout. Used for `initialize`, `ping`,
    /// and `shutdown`: all internal, worker-driven exchanges that never
    /// touch the per-call shared buffer.
    pub async fn call(
        &self,
        command: WireCommand,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<Envelope, ClientError> {
        let request_id = self.fresh_request_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut table = self.pending.lock().unwrap();
            table.insert(
                request_id.clone(),
                PendingEntry {
                    resolver: PendingResolver::Oneshot(tx),
                },
            );
        }

        let envelope = Envelope::request(request_id.clone(), command, payload);
        if self.outbound.send(envelope).is_err() {
            self.pending.lock().unwrap().remove(&request_id);
            return Err(ClientError::TransportUnavailable);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::TransportUnavailable),
            Err(_) => {
                self.pending.lock().unwrap().remove(&request_id);
                Err(ClientError::RequestTimeout {
                    command: command.as_str(),
                    timeout,
                })
            }
        }
    }

    /// Performs the handshake exactly once per child process.
    pub async fn initialize(
        &self,
        payload: serde_json::Value,
    ) -> Result<Envelope, ClientError> {
        self.call(WireCommand::Initialize, payload, defaults::handshake_timeout())
            .await
            .map_err(|err| match err {
                ClientError::RequestTimeout { timeout, .. } => ClientError::HandshakeTimeout(timeout),
                other => other,
            })
    }

    /// Issues a `format` request whose response is delivered into `buffer`
    /// instead of returned directly, matching the worker-to-caller
    /// shared-buffer contract in §4.4.
    pub fn post_format(
        &self,
        payload: serde_json::Value,
        buffer: Arc<SharedResponseBuffer>,
    ) -> Result<(), ClientError> {
        let request_id = self.fresh_request_id();
        {
            let mut table = self.pending.lock().unwrap();
            table.insert(
                request_id.clone(),
                PendingEntry {
                    resolver: PendingResolver::SharedBuffer(buffer),
                },
            );
        }
        let envelope = Envelope::request(request_id, WireCommand::Format, payload);
        self.outbound
            .send(envelope)
            .map_err(|_| ClientError::TransportUnavailable)
    }

    /// Best-effort graceful shutdown: posts `shutdown`, closes stdin, waits
    /// briefly for exit, then force-kills.
    pub async fn shutdown(&self) {
        let _ = self
            .call(
                WireCommand::Shutdown,
                serde_json::to_value(fmt_protocol::payload::ShutdownRequest::default())
                    .expect("payload serializes"),
                Duration::from_secs(2),
            )
            .await;

        let mut child = self.child.lock().await;
        if let Some(stdin) = child.stdin.take() {
            drop(stdin);
        }

        let exited = tokio::time::timeout(Duration::from_millis(1500), child.wait()).await;
        if exited.is_err() {
            let _ = child.start_kill();
        }
    }
}

async fn spawn_with_retry(path: &PathBuf) -> Result<Child, ClientError> {
    const MAX_ATTEMPTS: u32 = 4;
    const ETXTBSY: i32 = 26;

    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = TokioCommand::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        match result {
            Ok(child) => return Ok(child),
            Err(err) if err.raw_os_error() == Some(ETXTBSY) && attempt < MAX_ATTEMPTS => {
                let backoff = Duration::from_millis(50 * (1 << attempt));
                tokio::time::sleep(backoff).await;
                continue;
            }
            Err(err) => {
                return Err(ClientError::Spawn {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }
}

async fn writer_task(
    mut stdin: tokio::process::ChildStdin,
    mut outbound_rx: mpsc::UnboundedReceiver<Envelope>,
) {
    while let Some(envelope) = outbound_rx.recv().await {
        if write_frame(&mut stdin, &envelope).await.is_err() {
            break;
        }
    }
    let _ = stdin.shutdown().await;
}

async fn stderr_task(stderr: tokio::process::ChildStderr) {
    use tokio::io::AsyncBufReadExt;
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "fmt_host::stderr", "{line}");
    }
}

async fn reader_task(
    stdout: tokio::process::ChildStdout,
    pending: PendingTable,
    valid: Arc<AtomicBool>,
) {
    let mut reader = AsyncFrameReader::new(stdout);
    loop {
        match reader.read_frame().await {
            Ok(Some(envelope)) => handle_incoming(envelope, &pending, &valid),
            Ok(None) => {
                reject_all_pending(&pending, ClientError::ChildExited { code: None, signal: None });
                valid.store(false, Ordering::Release);
                break;
            }
            Err(err) => {
                reject_all_pending(&pending, ClientError::Protocol(err));
                valid.store(false, Ordering::Release);
                break;
            }
        }
    }
}

pub(crate) fn handle_incoming(envelope: Envelope, pending: &PendingTable, valid: &Arc<AtomicBool>) {
    match envelope.envelope_type {
        EnvelopeType::Response => {
            let request_id = match &envelope.request_id {
                Some(id) => id.clone(),
                None => return,
            };
            let entry = pending.lock().unwrap().remove(&request_id);
            if let Some(entry) = entry {
                resolve_entry(entry, envelope);
            }
        }
        EnvelopeType::Notification => match envelope.command {
            WireCommand::Log => {
                if let Ok(log) = serde_json::from_value::<LogNotification>(envelope.payload) {
                    forward_log(log);
                }
            }
            WireCommand::Error => {
                if let Ok(notification) =
                    serde_json::from_value::<ErrorNotification>(envelope.payload)
                {
                    tracing::warn!(
                        severity = ?notification.severity,
                        message = %notification.message,
                        "host error notification"
                    );
                    if matches!(notification.severity, ErrorSeverity::Fatal) {
                        reject_all_pending(
                            pending,
                            ClientError::FatalNotification(notification.message),
                        );
                        valid.store(false, Ordering::Release);
                    }
                }
            }
            _ => {}
        },
        EnvelopeType::Request => {
            tracing::warn!("unexpected request envelope from host, ignoring");
        }
    }
}

fn resolve_entry(entry: PendingEntry, envelope: Envelope) {
    match entry.resolver {
        PendingResolver::Oneshot(tx) => {
            let _ = tx.send(Ok(envelope));
        }
        PendingResolver::SharedBuffer(buffer) => {
            deliver_format_response(&buffer, envelope);
        }
    }
}

fn deliver_format_response(buffer: &SharedResponseBuffer, envelope: Envelope) {
    use fmt_protocol::payload::{BufferedResult, FormatResponse};
    use crate::shared_buffer::{STATUS_ERROR, STATUS_OK};

    let parsed: Result<FormatResponse, _> = serde_json::from_value(envelope.payload);
    let (status, result) = match parsed {
        Ok(response) if response.ok => (
            STATUS_OK,
            BufferedResult::Ok {
                formatted: response.formatted.unwrap_or_default(),
                diagnostics: response.diagnostics,
                metrics: response.metrics,
            },
        ),
        Ok(response) => (
            STATUS_ERROR,
            BufferedResult::Error {
                message: response.message,
                error_code: response.error_code,
            },
        ),
        Err(err) => (
            STATUS_ERROR,
            BufferedResult::Error {
                message: Some(format!("malformed format response: {err}")),
                error_code: None,
            },
        ),
    };

    let bytes = serde_json::to_vec(&result).expect("BufferedResult always serializes");
    buffer.deliver(status, bytes);
}

fn forward_log(log: LogNotification) {
    match log.level {
        LogLevel::Debug => tracing::debug!(trace_token = ?log.trace_token, "{}", log.message),
        LogLevel::Info => tracing::info!(trace_token = ?log.trace_token, "{}", log.message),
        LogLevel::Warn => tracing::warn!(trace_token = ?log.trace_token, "{}", log.message),
        LogLevel::Error => tracing::error!(trace_token = ?log.trace_token, "{}", log.message),
    }
}

pub(crate) fn reject_all_pending(pending: &PendingTable, make_error: ClientError) {
    let entries: Vec<PendingEntry> = {
        let mut table = pending.lock().unwrap();
        table.drain().map(|(_, entry)| entry).collect()
    };
    for entry in entries {
        match entry.resolver {
            PendingResolver::Oneshot(tx) => {
                let _ = tx.send(Err(clone_client_error(&make_error)));
            }
            PendingResolver::SharedBuffer(buffer) => {
                let bytes = serde_json::to_vec(&fmt_protocol::payload::BufferedResult::Error {
                    message: Some(make_error.to_string()),
                    error_code: None,
                })
                .expect("BufferedResult always serializes");
                buffer.deliver(crate::shared_buffer::STATUS_ERROR, bytes);
            }
        }
    }
}

/// `ClientError` wraps `std::io::Error`/`ProtocolError` which are not
/// `Clone`; when rejecting several pending requests at once we only have
/// one message worth re-describing, so this renders it into an equivalent
/// standalone variant instead of cloning the original.
fn clone_client_error(err: &ClientError) -> ClientError {
    match err {
        ClientError::ChildExited { code, signal } => ClientError::ChildExited {
            code: *code,
            signal: *signal,
        },
        other => ClientError::FatalNotification(other.to_string()),
    }
}
