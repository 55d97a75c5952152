//! Command broker for a supervised Inkscape shell session.
//!
//! The shell mode is a single-threaded line-oriented REPL with no request
//! identifiers in its output, so there is no way to correlate a reply with a
//! caller once two commands are in flight. The broker therefore serializes
//! all callers through a single-permit limiter: exactly one command may be
//! written and awaiting its terminating prompt at any time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::actions;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::pool::{BufferPool, PooledBuffer};
use crate::protocol::StdoutSignal;
use crate::retry::{Backoff, RespawnState, RetryPolicy};
use crate::transport::ShellTransport;

/// Idle buffers kept by the command serialization pool.
const POOL_MAX_IDLE: usize = 5;

/// Seed capacity of each pooled buffer.
const POOL_BUFFER_CAPACITY: usize = 1024 * 1024;

/// How long `close` waits for an in-flight command before giving up on the
/// graceful quit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Grace period for the writer loop to flush the quit command.
const QUIT_FLUSH_DELAY: Duration = Duration::from_millis(50);

/// Handles consumed by `run` when the background session starts.
struct RunHandles {
    request_rx: mpsc::Receiver<PooledBuffer>,
    output_tx: mpsc::Sender<StdoutSignal>,
    diag_tx: mpsc::Sender<String>,
}

/// Output-side receivers, consumed by whichever caller holds the permit.
///
/// Single-producer/single-consumer by construction: the reader tasks are the
/// only senders and the permit holder is the only receiver, so the async
/// mutex here is uncontended in practice.
struct ResponseChannels {
    output: mpsc::Receiver<StdoutSignal>,
    diag: mpsc::Receiver<String>,
}

impl ResponseChannels {
    /// Discard signals left over from a previous (e.g. canceled) command.
    fn drain(&mut self) {
        while self.output.try_recv().is_ok() {}
        while self.diag.try_recv().is_ok() {}
    }
}

/// Supervised Inkscape shell session.
///
/// Created with [`Proxy::new`], started with [`Proxy::run`], torn down with
/// [`Proxy::close`]. All command methods are safe to call concurrently; they
/// serialize through the session's single in-flight slot.
pub struct Proxy {
    config: ProxyConfig,
    cancel: CancellationToken,
    limiter: Arc<Semaphore>,
    ready_seen: Arc<AtomicBool>,
    pool: BufferPool,
    request_tx: mpsc::Sender<PooledBuffer>,
    run_handles: Mutex<Option<RunHandles>>,
    channels: tokio::sync::Mutex<ResponseChannels>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl Default for Proxy {
    fn default() -> Self {
        Self::new(ProxyConfig::default())
    }
}

impl Proxy {
    /// Create a session from an immutable configuration snapshot.
    #[must_use]
    pub fn new(config: ProxyConfig) -> Self {
        let depth = config.queue_depth.max(1);
        let (request_tx, request_rx) = mpsc::channel(depth);
        let (output_tx, output_rx) = mpsc::channel(depth);
        let (diag_tx, diag_rx) = mpsc::channel(depth);

        Self {
            config,
            cancel: CancellationToken::new(),
            // The single permit is minted by the transport once the first
            // prompt is observed.
            limiter: Arc::new(Semaphore::new(0)),
            ready_seen: Arc::new(AtomicBool::new(false)),
            pool: BufferPool::new(POOL_MAX_IDLE, POOL_BUFFER_CAPACITY),
            request_tx,
            run_handles: Mutex::new(Some(RunHandles {
                request_rx,
                output_tx,
                diag_tx,
            })),
            channels: tokio::sync::Mutex::new(ResponseChannels {
                output: output_rx,
                diag: diag_rx,
            }),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Resolve the executable and start the supervised shell in the
    /// background; returns once startup has been kicked off.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// `CommandNotAvailable` if the executable cannot be located,
    /// `AlreadyRunning` on a second call, `CommandNotReady` after `close`.
    pub fn run<S: AsRef<str>>(&self, extra_args: &[S]) -> Result<(), ProxyError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProxyError::CommandNotReady);
        }

        let command_path =
            lookup_path(&self.config.command_name).ok_or(ProxyError::CommandNotAvailable)?;

        let handles = {
            let mut slot = self
                .run_handles
                .lock()
                .map_err(|_| ProxyError::AlreadyRunning)?;
            slot.take().ok_or(ProxyError::AlreadyRunning)?
        };

        let transport = ShellTransport {
            limiter: Arc::clone(&self.limiter),
            ready_seen: Arc::clone(&self.ready_seen),
            output_tx: handles.output_tx,
            diag_tx: handles.diag_tx,
            suppress_warning: self.config.suppress_warning,
            verbose: self.config.verbose,
        };
        let mut requests = handles.request_rx;

        let policy = RetryPolicy {
            max_attempts: self.config.max_retry.max(1),
            ..RetryPolicy::default()
        };
        let cancel = self.cancel.clone();
        let limiter = Arc::clone(&self.limiter);
        let extra: Vec<String> = extra_args.iter().map(|s| s.as_ref().to_owned()).collect();

        self.started.store(true, Ordering::SeqCst);
        tracing::debug!(path = %command_path.display(), "starting inkscape shell session");

        tokio::spawn(async move {
            let mut backoff = Backoff::new(policy);
            loop {
                backoff.transition(RespawnState::Running);
                match transport
                    .run_once(&cancel, &command_path, &extra, &mut requests)
                    .await
                {
                    Ok(()) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "inkscape shell exited unexpectedly");
                        let Some(delay) = backoff.next_delay() else {
                            tracing::error!(
                                attempts = policy.max_attempts,
                                "respawn budget exhausted, session is terminal"
                            );
                            break;
                        };
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
            // Terminal stop: closing the limiter fails future acquisitions,
            // and dropping the transport closes the output channels so a
            // pending wait fails instead of hanging.
            limiter.close();
        });

        Ok(())
    }

    /// Send shell actions and wait for the terminating prompt.
    ///
    /// Actions are joined with `;` into one newline-terminated command.
    /// Returns the accumulated result bytes.
    ///
    /// # Errors
    ///
    /// `CommandNotReady` if the session is not running or its respawn budget
    /// is spent, `Inkscape` for a diagnostic surfaced while the command was
    /// in flight.
    pub async fn raw_commands<S: AsRef<str>>(&self, actions: &[S]) -> Result<Vec<u8>, ProxyError> {
        self.raw_commands_with_cancel(&CancellationToken::new(), actions)
            .await
    }

    /// Like [`raw_commands`](Self::raw_commands), bounded by a cancellation
    /// scope.
    ///
    /// On cancellation the call returns `ExecCanceled` immediately; the
    /// in-flight slot is still released, so the session stays usable.
    ///
    /// # Errors
    ///
    /// See [`raw_commands`](Self::raw_commands), plus `ExecCanceled`.
    pub async fn raw_commands_with_cancel<S: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        actions: &[S],
    ) -> Result<Vec<u8>, ProxyError> {
        if self.closed.load(Ordering::SeqCst) || !self.started.load(Ordering::SeqCst) {
            return Err(ProxyError::CommandNotReady);
        }

        self.send_raw(cancel, actions).await
    }

    /// Convert an SVG file to PDF via `file-open`, `export-filename`,
    /// `export-do`, `file-close`.
    ///
    /// # Errors
    ///
    /// See [`raw_commands`](Self::raw_commands).
    pub async fn svg2pdf(&self, svg_in: &str, pdf_out: &str) -> Result<(), ProxyError> {
        self.svg2pdf_with_cancel(&CancellationToken::new(), svg_in, pdf_out)
            .await
    }

    /// Like [`svg2pdf`](Self::svg2pdf), bounded by a cancellation scope.
    ///
    /// # Errors
    ///
    /// See [`raw_commands_with_cancel`](Self::raw_commands_with_cancel).
    pub async fn svg2pdf_with_cancel(
        &self,
        cancel: &CancellationToken,
        svg_in: &str,
        pdf_out: &str,
    ) -> Result<(), ProxyError> {
        let result = self
            .raw_commands_with_cancel(
                cancel,
                &[
                    actions::file_open(svg_in),
                    actions::export_filename(pdf_out),
                    actions::export_do(),
                    actions::file_close(),
                ],
            )
            .await?;

        tracing::debug!(
            result = %String::from_utf8_lossy(&result),
            svg = svg_in,
            pdf = pdf_out,
            "svg2pdf finished"
        );
        Ok(())
    }

    /// Shut the session down.
    ///
    /// Sends a best-effort `quit` command, cancels the governing scope and
    /// closes the limiter. Idempotent; commands issued afterwards fail with
    /// `CommandNotReady` instead of hanging.
    ///
    /// # Errors
    ///
    /// Currently infallible; the signature leaves room for teardown errors.
    pub async fn close(&self) -> Result<(), ProxyError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Best-effort graceful quit. The cancellation path below also closes
        // stdin, so losing the race here still shuts the shell down.
        if self.started.load(Ordering::SeqCst) {
            let acquired = tokio::time::timeout(
                SHUTDOWN_TIMEOUT,
                Arc::clone(&self.limiter).acquire_owned(),
            )
            .await;

            if let Ok(Ok(permit)) = acquired {
                let mut buffer = self.pool.get();
                buffer.extend_from_slice(actions::quit().as_bytes());
                buffer.push(b'\n');
                if self.request_tx.send(buffer).await.is_ok() {
                    tokio::time::sleep(QUIT_FLUSH_DELAY).await;
                }
                drop(permit);
            } else {
                tracing::debug!("skipping graceful quit, session busy or not ready");
            }
        }

        self.cancel.cancel();
        self.limiter.close();
        Ok(())
    }

    async fn send_raw<S: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        actions: &[S],
    ) -> Result<Vec<u8>, ProxyError> {
        // Acquire the single in-flight slot. The permit is a guard, so every
        // exit path below hands the slot back to the session.
        let _permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProxyError::ExecCanceled),
            acquired = Arc::clone(&self.limiter).acquire_owned() => {
                acquired.map_err(|_| ProxyError::CommandNotReady)?
            }
        };

        // Uncontended: only the permit holder touches the receivers.
        let mut channels = self.channels.lock().await;
        channels.drain();
        let ResponseChannels { output: output_rx, diag: diag_rx } = &mut *channels;

        let mut buffer = self.pool.get();
        let joined = actions
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(";");
        buffer.extend_from_slice(joined.as_bytes());
        if !buffer.ends_with(b"\n") {
            buffer.push(b'\n');
        }

        self.request_tx
            .send(buffer)
            .await
            .map_err(|_| ProxyError::CommandNotReady)?;

        let mut output = Vec::new();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ProxyError::ExecCanceled),
                diag = diag_rx.recv() => {
                    let Some(text) = diag else {
                        return Err(ProxyError::CommandNotReady);
                    };
                    // Short-circuit on the first surfaced diagnostic; partial
                    // output for this command is discarded.
                    return Err(ProxyError::Inkscape(text));
                }
                signal = output_rx.recv() => {
                    match signal {
                        Some(StdoutSignal::Ready) => return Ok(output),
                        Some(StdoutSignal::Chunk(chunk)) => {
                            if !output.is_empty() {
                                output.push(b'\n');
                            }
                            output.extend_from_slice(chunk.as_bytes());
                        }
                        Some(StdoutSignal::Noise) => {}
                        None => return Err(ProxyError::CommandNotReady),
                    }
                }
            }
        }
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Resolve an executable name against `PATH`, or verify an explicit path.
fn lookup_path(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(command))
        .find(|full| is_executable(full))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_path_missing_binary() {
        assert!(lookup_path("inkscape-proxy-test-no-such-binary").is_none());
    }

    #[test]
    fn test_lookup_path_resolves_on_path() {
        // `sh` exists on every unix PATH.
        #[cfg(unix)]
        assert!(lookup_path("sh").is_some());
    }

    #[test]
    fn test_lookup_path_explicit_missing_path() {
        assert!(lookup_path("/no/such/dir/inkscape").is_none());
    }

    #[tokio::test]
    async fn test_run_fails_fast_for_missing_executable() {
        let proxy = Proxy::new(ProxyConfig::new().command_name("inkscape-proxy-test-no-such-binary"));
        let err = proxy.run::<&str>(&[]).unwrap_err();
        assert!(matches!(err, ProxyError::CommandNotAvailable));
    }

    #[tokio::test]
    async fn test_raw_commands_before_run_fails() {
        let proxy = Proxy::default();
        let err = proxy.raw_commands(&["select-all"]).await.unwrap_err();
        assert!(matches!(err, ProxyError::CommandNotReady));
    }

    #[tokio::test]
    async fn test_close_before_run_is_idempotent() {
        let proxy = Proxy::default();
        assert!(proxy.close().await.is_ok());
        assert!(proxy.close().await.is_ok());

        let err = proxy.raw_commands(&["select-all"]).await.unwrap_err();
        assert!(matches!(err, ProxyError::CommandNotReady));
    }

    #[tokio::test]
    async fn test_run_after_close_fails() {
        let proxy = Proxy::default();
        proxy.close().await.unwrap();
        let err = proxy.run::<&str>(&[]).unwrap_err();
        assert!(matches!(err, ProxyError::CommandNotReady));
    }
}
