//! Line classification for the Inkscape shell protocol.
//!
//! The shell mode has no framing and no request identifiers. The only
//! structure is textual: a line consisting of exactly `>` means the shell is
//! idle and ready for the next command, a banner line is printed once at
//! startup, and stderr carries free-text diagnostics. Everything else on
//! stdout is result payload for whichever command is currently in flight.

/// The line Inkscape prints when it is ready for the next command.
pub const PROMPT_SENTINEL: &str = ">";

/// Banner substring printed once at startup, before the first prompt.
pub const SHELL_MODE_BANNER: &str = "Inkscape interactive shell mode";

/// Marker identifying suppressible stderr lines.
pub const WARNING_MARKER: &str = "WARNING";

/// Classified stdout line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdoutSignal {
    /// Prompt sentinel: the in-flight command (or startup) is complete.
    Ready,
    /// Startup banner or blank chatter; never surfaced to callers.
    Noise,
    /// Result payload for the in-flight command.
    Chunk(String),
}

/// Classified stderr line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StderrSignal {
    /// Blank line or suppressed warning; dropped.
    Suppressed,
    /// Diagnostic text surfaced as the error for the in-flight command.
    Diagnostic(String),
}

/// Classify a raw stdout line.
///
/// Lines are trimmed of surrounding whitespace first; only a line that is
/// exactly the prompt sentinel terminates a command, a `>` embedded in other
/// text is payload.
#[must_use]
pub fn classify_stdout(line: &str) -> StdoutSignal {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return StdoutSignal::Noise;
    }
    if trimmed == PROMPT_SENTINEL {
        return StdoutSignal::Ready;
    }
    if trimmed.contains(SHELL_MODE_BANNER) {
        return StdoutSignal::Noise;
    }

    StdoutSignal::Chunk(trimmed.to_owned())
}

/// Classify a raw stderr line, honoring warning suppression.
#[must_use]
pub fn classify_stderr(line: &str, suppress_warning: bool) -> StderrSignal {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return StderrSignal::Suppressed;
    }
    if suppress_warning && trimmed.contains(WARNING_MARKER) {
        return StderrSignal::Suppressed;
    }

    StderrSignal::Diagnostic(trimmed.to_owned())
}
