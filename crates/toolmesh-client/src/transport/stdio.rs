//! Subprocess pipe transport: newline-delimited JSON-RPC over a child's stdin/stdout.
//!
//! One worker task owns both pipe ends and serves a FIFO mailbox, so at most one
//! request is in flight at a time. Callers that give up waiting leave their
//! request behind; the worker skips it if it has not been sent yet, and any late
//! response that arrives afterwards is discarded by id.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::Transport;
use crate::error::{AgentError, AgentResult};
use toolmesh_core::{JsonRpcRequest, JsonRpcResponse, DEFAULT_TIMEOUT_SECS};

/// How long a child gets to exit on its own after its stdin closes
const CLOSE_GRACE: Duration = Duration::from_secs(2);
const MAILBOX_DEPTH: usize = 64;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type PipeReply = oneshot::Sender<AgentResult<Option<JsonRpcResponse>>>;

struct PipeRequest {
    /// `None` for notifications
    id: Option<u64>,
    frame: Vec<u8>,
    reply: PipeReply,
}

struct PipeHandle {
    sender: mpsc::Sender<PipeRequest>,
    worker: JoinHandle<()>,
    child: Option<Child>,
}

pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    timeout: Duration,
    label: String,
    handle: Mutex<Option<PipeHandle>>,
    alive: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl StdioTransport {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        let command = command.into();
        let label = std::iter::once(command.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            command,
            args,
            env: BTreeMap::new(),
            cwd: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            label,
            handle: Mutex::new(None),
            alive: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Wrap an already-connected pair of streams. The transport starts open and
    /// `open()` cannot re-establish it once closed.
    pub fn from_streams<R, W>(reader: R, writer: W, timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let handle = spawn_worker(
            Box::new(reader),
            Box::new(writer),
            timeout,
            alive.clone(),
            None,
        );
        Self {
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            timeout,
            label: "in-memory pipe".to_string(),
            handle: Mutex::new(Some(handle)),
            alive,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn submit(
        &self,
        method: &str,
        id: Option<u64>,
        message: &JsonRpcRequest,
    ) -> AgentResult<Option<JsonRpcResponse>> {
        let mut frame = serde_json::to_vec(message)
            .map_err(|e| AgentError::Protocol(format!("failed to encode '{}': {}", method, e)))?;
        frame.push(b'\n');

        let sender = {
            let guard = self.handle.lock().await;
            match guard.as_ref() {
                Some(handle) if self.alive.load(Ordering::SeqCst) => handle.sender.clone(),
                _ => {
                    return Err(AgentError::Transport(format!(
                        "pipe to '{}' is closed",
                        self.label
                    )))
                }
            }
        };

        let (reply, response) = oneshot::channel();
        sender
            .send(PipeRequest { id, frame, reply })
            .await
            .map_err(|_| AgentError::Transport("pipe worker has stopped".to_string()))?;

        match timeout(self.timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AgentError::Transport(
                "pipe worker dropped the request".to_string(),
            )),
            Err(_) => Err(AgentError::Transport(format!(
                "'{}' to '{}' timed out after {:?}",
                method, self.label, self.timeout
            ))),
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn open(&self) -> AgentResult<()> {
        let mut guard = self.handle.lock().await;
        if guard.is_some() && self.alive.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.command.is_empty() {
            return Err(AgentError::Connection(format!(
                "'{}' cannot be reopened",
                self.label
            )));
        }
        if let Some(stale) = guard.take() {
            shutdown_pipe(stale, &self.label).await;
        }

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| {
            AgentError::Connection(format!("failed to spawn '{}': {}", self.label, e))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Connection("child stdin is not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Connection("child stdout is not piped".to_string()))?;

        info!(command = %self.label, pid = ?child.id(), "Spawned agent process");
        self.alive.store(true, Ordering::SeqCst);
        *guard = Some(spawn_worker(
            Box::new(stdout),
            Box::new(stdin),
            self.timeout,
            self.alive.clone(),
            Some(child),
        ));
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> AgentResult<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = JsonRpcRequest::new(id, method, params);
        self.submit(method, Some(id), &message)
            .await?
            .ok_or_else(|| AgentError::Protocol(format!("no response to '{}'", method)))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> AgentResult<()> {
        let message = JsonRpcRequest::notification(method, params);
        self.submit(method, None, &message).await.map(|_| ())
    }

    async fn close(&self) {
        let handle = self.handle.lock().await.take();
        self.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = handle {
            shutdown_pipe(handle, &self.label).await;
        }
    }

    fn is_open(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn process_id(&self) -> Option<u32> {
        self.handle
            .lock()
            .await
            .as_ref()
            .and_then(|h| h.child.as_ref())
            .and_then(Child::id)
    }
}

fn spawn_worker(
    reader: BoxedReader,
    writer: BoxedWriter,
    timeout: Duration,
    alive: Arc<AtomicBool>,
    child: Option<Child>,
) -> PipeHandle {
    let (sender, mailbox) = mpsc::channel(MAILBOX_DEPTH);
    let worker = PipeWorker {
        lines: BufReader::new(reader).lines(),
        writer,
        timeout,
        alive,
        mailbox,
    };
    PipeHandle {
        sender,
        worker: tokio::spawn(worker.run()),
        child,
    }
}

/// Stop the worker (dropping the child's stdin), then give the child a grace period
/// before killing it
async fn shutdown_pipe(handle: PipeHandle, label: &str) {
    let PipeHandle {
        sender,
        worker,
        child,
    } = handle;
    drop(sender);
    worker.abort();
    let _ = worker.await;

    let Some(mut child) = child else {
        return;
    };
    match timeout(CLOSE_GRACE, child.wait()).await {
        Ok(Ok(status)) => debug!(command = %label, "Agent process exited: {}", status),
        Ok(Err(e)) => warn!(command = %label, "Failed to wait for agent process: {}", e),
        Err(_) => {
            warn!(
                command = %label,
                "Agent process did not exit within {:?}; killing", CLOSE_GRACE
            );
            if let Err(e) = child.kill().await {
                warn!(command = %label, "Failed to kill agent process: {}", e);
            }
        }
    }
}

struct PipeWorker {
    lines: Lines<BufReader<BoxedReader>>,
    writer: BoxedWriter,
    timeout: Duration,
    alive: Arc<AtomicBool>,
    mailbox: mpsc::Receiver<PipeRequest>,
}

impl PipeWorker {
    async fn run(mut self) {
        while let Some(request) = self.mailbox.recv().await {
            if request.reply.is_closed() {
                debug!("Skipping request {:?}: caller stopped waiting", request.id);
                continue;
            }

            let result = if self.alive.load(Ordering::SeqCst) {
                self.exchange(request.id, &request.frame).await
            } else {
                Err(AgentError::Transport("agent pipe is closed".to_string()))
            };
            let _ = request.reply.send(result);
        }
        debug!("Pipe worker stopped");
    }

    async fn exchange(
        &mut self,
        id: Option<u64>,
        frame: &[u8],
    ) -> AgentResult<Option<JsonRpcResponse>> {
        if let Err(e) = self.write(frame).await {
            self.alive.store(false, Ordering::SeqCst);
            return Err(AgentError::Transport(format!("write to agent failed: {}", e)));
        }

        let Some(expected) = id else {
            return Ok(None);
        };

        let deadline = Instant::now() + self.timeout;
        loop {
            let line = match timeout_at(deadline, self.lines.next_line()).await {
                Err(_) => {
                    return Err(AgentError::Transport(format!(
                        "no response to request {} within {:?}",
                        expected, self.timeout
                    )))
                }
                Ok(Err(e)) => {
                    self.alive.store(false, Ordering::SeqCst);
                    return Err(AgentError::Transport(format!(
                        "read from agent failed: {}",
                        e
                    )));
                }
                Ok(Ok(None)) => {
                    self.alive.store(false, Ordering::SeqCst);
                    return Err(AgentError::Transport("agent closed its output".to_string()));
                }
                Ok(Ok(Some(line))) => line,
            };

            let value = match serde_json::from_str::<Value>(line.trim()) {
                Ok(value @ Value::Object(_)) => value,
                _ => {
                    debug!("Skipping non-JSON line from agent: {}", line);
                    continue;
                }
            };

            match value.get("id") {
                None | Some(Value::Null) => {
                    debug!("Skipping agent message without id");
                    continue;
                }
                Some(got) if got.as_u64() == Some(expected) => {}
                Some(got) => {
                    debug!(
                        "Discarding late response for id {} while waiting for {}",
                        got, expected
                    );
                    continue;
                }
            }

            return serde_json::from_value(value)
                .map(Some)
                .map_err(|e| AgentError::Protocol(format!("malformed response: {}", e)));
        }
    }

    async fn write(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(frame).await?;
        self.writer.flush().await
    }
}
