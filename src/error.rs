//! Public error type for the proxy.

/// Errors returned by [`Proxy`](crate::Proxy) operations.
#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    /// The Inkscape executable could not be located.
    #[error("inkscape not available")]
    CommandNotAvailable,

    /// The session is not started, closed, or its respawn budget is spent.
    #[error("inkscape not ready")]
    CommandNotReady,

    /// The caller's cancellation scope expired while a command was in flight.
    #[error("command execution canceled")]
    ExecCanceled,

    /// `run` was called on a session that is already running.
    #[error("proxy already running")]
    AlreadyRunning,

    /// Diagnostic text Inkscape emitted for the in-flight command.
    #[error("inkscape: {0}")]
    Inkscape(String),

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
