//! Language server child process
//!
//! Spawns the server with piped stdio and hands the pipes out once as a
//! [`StdioTransport`]. Stderr is always drained so a chatty server never
//! blocks on a full pipe.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::io::transport::{StdioTransport, Transport};

/// How to stop the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Force,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Language server is not running")]
    NotRunning,

    #[error("Language server already running with PID {0}")]
    AlreadyRunning(u32),

    #[error("Language server {0} pipe unavailable")]
    PipeUnavailable(&'static str),
}

type StderrSink = Box<dyn Fn(String) + Send + Sync>;

pub struct ServerProcess {
    command: String,
    args: Vec<String>,
    working_directory: Option<PathBuf>,
    pid: Option<u32>,
    /// Set by the wait task once the child exits on its own
    exited: Arc<AtomicBool>,
    transport: Option<StdioTransport>,
    stderr_sink: Option<StderrSink>,
    stderr_task: Option<JoinHandle<()>>,
    wait_task: Option<JoinHandle<()>>,
}

impl ServerProcess {
    pub fn new(command: String, args: Vec<String>, working_directory: Option<PathBuf>) -> Self {
        Self {
            command,
            args,
            working_directory,
            pid: None,
            exited: Arc::new(AtomicBool::new(false)),
            transport: None,
            stderr_sink: None,
            stderr_task: None,
            wait_task: None,
        }
    }

    /// Route each non-empty stderr line to `sink`; must precede [`ServerProcess::spawn`]
    pub fn on_stderr_line<F>(&mut self, sink: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.stderr_sink = Some(Box::new(sink));
    }

    /// PID of the server while it is alive
    pub fn pid(&self) -> Option<u32> {
        self.pid.filter(|_| !self.exited.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.pid().is_some()
    }

    pub fn spawn(&mut self) -> Result<(), ProcessError> {
        if let Some(pid) = self.pid() {
            return Err(ProcessError::AlreadyRunning(pid));
        }

        info!("Spawning language server: {} {:?}", self.command, self.args);

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or(ProcessError::PipeUnavailable("stdin"))?;
        let stdout = child.stdout.take().ok_or(ProcessError::PipeUnavailable("stdout"))?;
        let stderr = child.stderr.take().ok_or(ProcessError::PipeUnavailable("stderr"))?;

        let pid = child.id();
        info!("Language server PID: {:?}", pid);
        self.pid = pid;
        self.exited.store(false, Ordering::Release);
        self.transport = Some(StdioTransport::new(stdin, stdout));
        self.stderr_task = Some(self.drain_stderr(stderr));
        self.wait_task = Some(self.watch_exit(child));
        Ok(())
    }

    /// Take the stdio transport; only the first call after a spawn succeeds
    pub fn take_transport(&mut self) -> Result<StdioTransport, ProcessError> {
        self.transport.take().ok_or(ProcessError::NotRunning)
    }

    pub async fn stop(&mut self, mode: StopMode) -> Result<(), ProcessError> {
        let pid = self.pid().ok_or(ProcessError::NotRunning)?;
        info!("Stopping language server PID {} ({:?})", pid, mode);

        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("Closing stdio transport of PID {} failed: {}", pid, e);
            }
        }

        #[cfg(unix)]
        {
            let signal = match mode {
                StopMode::Graceful => libc::SIGTERM,
                StopMode::Force => libc::SIGKILL,
            };
            send_signal(pid, signal);
        }
        #[cfg(not(unix))]
        {
            // kill_on_drop takes over once the wait task goes away
            if let Some(task) = self.wait_task.take() {
                task.abort();
            }
        }

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        self.pid = None;
        Ok(())
    }

    /// Synchronous SIGKILL for `Drop` paths
    pub fn kill_now(&mut self) {
        let Some(pid) = self.pid() else {
            return;
        };
        info!("Killing language server PID {}", pid);

        #[cfg(unix)]
        send_signal(pid, libc::SIGKILL);

        for task in [self.stderr_task.take(), self.wait_task.take()].into_iter().flatten() {
            task.abort();
        }
        self.pid = None;
    }

    fn drain_stderr(&mut self, stderr: ChildStderr) -> JoinHandle<()> {
        let sink = self.stderr_sink.take();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim_end().is_empty() => {}
                    Ok(Some(line)) => match &sink {
                        Some(sink) => sink(line.trim_end().to_string()),
                        None => trace!("server stderr: {}", line),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read server stderr: {}", e);
                        break;
                    }
                }
            }
            trace!("Server stderr closed");
        })
    }

    fn watch_exit(&self, mut child: Child) -> JoinHandle<()> {
        let exited = Arc::clone(&self.exited);
        let pid = self.pid;
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!("Language server PID {:?} exited: {}", pid, status),
                Err(e) => error!("Waiting on language server PID {:?} failed: {}", pid, e),
            }
            exited.store(true, Ordering::Release);
        })
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) {
    // SAFETY: kill(2) has no memory-safety preconditions
    if unsafe { libc::kill(pid as libc::pid_t, signal) } == 0 {
        trace!("Sent signal {} to PID {}", signal, pid);
    }
}
