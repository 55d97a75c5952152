//! Process transport for the Inkscape shell.
//!
//! Owns one shell process instance: a writer loop draining the request queue
//! into the child's stdin, plus one reader task per output stream converting
//! blocking reads into channel sends. Lines are classified by the protocol
//! module before they reach a channel, so consumers only ever see prompt
//! signals, result chunks and surfaced diagnostics.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::pool::PooledBuffer;
use crate::protocol::{classify_stderr, classify_stdout, StderrSignal, StdoutSignal};

/// Flag appended to the arguments to start Inkscape in interactive mode.
pub(crate) const SHELL_MODE_FLAG: &str = "--shell";

/// Errors internal to the supervise loop.
#[derive(thiserror::Error, Debug)]
pub(crate) enum TransportError {
    #[error("failed to spawn inkscape: {0}")]
    Spawn(std::io::Error),

    #[error("inkscape stdin not available")]
    NoStdin,

    #[error("inkscape stdout not available")]
    NoStdout,

    #[error("inkscape stderr not available")]
    NoStderr,

    #[error("inkscape exited: {0}")]
    Exited(std::process::ExitStatus),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One shell-process instance plus the channels it feeds.
///
/// The transport is owned by the supervise task; when that task stops
/// permanently the transport drops with it, closing the output channels so
/// pending waiters fail instead of hanging.
pub(crate) struct ShellTransport {
    /// Single-permit session limiter; the permit is minted on first prompt.
    pub limiter: Arc<Semaphore>,
    /// Set once the first prompt has been observed for this session.
    pub ready_seen: Arc<AtomicBool>,
    pub output_tx: mpsc::Sender<StdoutSignal>,
    pub diag_tx: mpsc::Sender<String>,
    pub suppress_warning: bool,
    pub verbose: bool,
}

impl ShellTransport {
    /// Spawn the shell process and run it until cancellation, queue shutdown
    /// or process exit.
    ///
    /// Returns `Ok(())` on a clean, final stop (cancellation or queue
    /// closed); an unexpected exit is returned as an error so the supervise
    /// loop can decide whether to respawn.
    pub(crate) async fn run_once(
        &self,
        cancel: &CancellationToken,
        command_path: &Path,
        extra_args: &[String],
        requests: &mut mpsc::Receiver<PooledBuffer>,
    ) -> Result<(), TransportError> {
        let mut args = vec![SHELL_MODE_FLAG.to_owned()];
        args.extend_from_slice(extra_args);

        let mut child = Command::new(command_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(TransportError::Spawn)?;

        let mut stdin = child.stdin.take().ok_or(TransportError::NoStdin)?;
        let stdout = child.stdout.take().ok_or(TransportError::NoStdout)?;
        let stderr = child.stderr.take().ok_or(TransportError::NoStderr)?;

        self.spawn_stdout_reader(stdout);
        self.spawn_stderr_reader(stderr);

        tracing::debug!(path = %command_path.display(), "inkscape shell started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                request = requests.recv() => {
                    let Some(buffer) = request else { break };

                    if self.verbose {
                        tracing::debug!(
                            command = %String::from_utf8_lossy(&buffer).trim_end(),
                            "write command"
                        );
                    }

                    if let Err(err) = self.write_request(&mut stdin, &buffer).await {
                        let _ = self.diag_tx.send(err.to_string()).await;
                    }
                    // buffer drops here and goes back to the pool
                }
                status = child.wait() => {
                    return Err(TransportError::Exited(status?));
                }
            }
        }

        // Closing stdin tells the shell to exit; wait so the child is reaped.
        drop(stdin);
        let status = child.wait().await?;
        tracing::debug!(%status, "inkscape shell stopped");
        Ok(())
    }

    async fn write_request(
        &self,
        stdin: &mut tokio::process::ChildStdin,
        buffer: &[u8],
    ) -> std::io::Result<()> {
        stdin.write_all(buffer).await?;
        stdin.flush().await
    }

    /// Forward classified stdout lines until EOF.
    ///
    /// Each line arrives as an owned `String`, never a view into the child's
    /// stream buffer, so chunks stay valid under concurrent consumption.
    fn spawn_stdout_reader(&self, stdout: ChildStdout) {
        let tx = self.output_tx.clone();
        let limiter = Arc::clone(&self.limiter);
        let ready_seen = Arc::clone(&self.ready_seen);
        let verbose = self.verbose;

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match classify_stdout(&line) {
                    StdoutSignal::Noise => {
                        tracing::trace!(%line, "discarding shell chatter");
                    }
                    StdoutSignal::Ready => {
                        if ready_seen.swap(true, Ordering::SeqCst) {
                            if tx.send(StdoutSignal::Ready).await.is_err() {
                                break;
                            }
                        } else {
                            // First prompt of the session: mint the single
                            // limiter permit instead of delivering the signal.
                            limiter.add_permits(1);
                            tracing::debug!("first prompt observed, accepting commands");
                        }
                    }
                    StdoutSignal::Chunk(chunk) => {
                        if verbose {
                            tracing::debug!(%chunk, "stdout chunk");
                        }
                        if tx.send(StdoutSignal::Chunk(chunk)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Forward surfaced stderr lines until EOF.
    fn spawn_stderr_reader(&self, stderr: ChildStderr) {
        let tx = self.diag_tx.clone();
        let suppress_warning = self.suppress_warning;

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match classify_stderr(&line, suppress_warning) {
                    StderrSignal::Suppressed => {
                        tracing::trace!(%line, "suppressing stderr line");
                    }
                    StderrSignal::Diagnostic(text) => {
                        if tx.send(text).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
}
