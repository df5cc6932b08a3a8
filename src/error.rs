//! Error taxonomy for the automation surface.
//!
//! One enum covers every failure mode a caller can observe: an unrecognized
//! key name, a bounded wait that expired, an ambiguous or missing click
//! target, use of a session after `close`, and the two kinds of I/O failure
//! (spawn, write). Messages are written to be read by a human debugging a
//! failing test, not just matched on by kind.

use crate::screen::Projection;

/// Errors surfaced by [`crate::Session`] operations.
#[derive(Debug, thiserror::Error)]
pub enum VtError {
    /// `press` was given a name outside the closed [`crate::key::Key`] enumeration.
    #[error("invalid key name(s): {offenders:?} (valid keys: {valid})")]
    InvalidKey {
        /// The unrecognized names, in the order they were given.
        offenders: Vec<String>,
        /// The full sorted set of valid key names, comma-joined.
        valid: String,
    },

    /// A bounded wait (`text`, `wait_for_text`, `wait_idle`, `wait_for_data`,
    /// `click`) expired before its condition was met.
    #[error("timeout waiting for {operation} after {timeout_ms}ms{snapshot}")]
    Timeout {
        /// Name of the operation that timed out (for example `"wait_for_text"`).
        operation: &'static str,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
        /// The projected screen at the moment of failure, formatted for
        /// inclusion in the message (empty string when not applicable).
        snapshot: SnapshotSuffix,
    },

    /// `click` matched more than one location and `first` was not set.
    #[error("found {count} matches for {pattern:?}; pass {{ first: true }} or use a more specific pattern")]
    AmbiguousClick {
        /// Number of matches found.
        count: usize,
        /// The pattern that was searched for, as given by the caller.
        pattern: String,
    },

    /// `click` never found its pattern before timing out.
    #[error("pattern {pattern:?} not found within {timeout_ms}ms")]
    ClickNotFound {
        /// The pattern that was searched for.
        pattern: String,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The operation was invoked after `close()` (explicit or via child exit).
    #[error("session is closed")]
    ClosedSession,

    /// Spawning the child process or initializing the emulator failed.
    #[error("failed to launch session: {reason}")]
    LaunchFailure {
        /// Underlying reason reported by the PTY factory or emulator.
        reason: String,
    },

    /// A PTY write failed (for example, the child already closed its stdin).
    #[error("write to pty failed: {reason}")]
    WriteFailure {
        /// Underlying I/O reason.
        reason: String,
    },
}

/// Wraps an optional screen projection so [`VtError::Timeout`]'s `Display`
/// impl can append `"; screen was:\n<snapshot>"` only when one is present.
#[derive(Debug)]
pub struct SnapshotSuffix(pub Option<Projection>);

impl std::fmt::Display for SnapshotSuffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(projection) => write!(f, "; screen was:{}", projection.0),
            None => Ok(()),
        }
    }
}

impl VtError {
    /// Build an [`VtError::InvalidKey`] from the offending names and the
    /// closed set of valid names, sorting the latter as spec'd.
    #[must_use]
    pub fn invalid_key(offenders: Vec<String>, mut valid_names: Vec<String>) -> Self {
        valid_names.sort_unstable();
        Self::InvalidKey {
            offenders,
            valid: valid_names.join(", "),
        }
    }

    /// Build a [`VtError::Timeout`] with no snapshot attached.
    #[must_use]
    pub fn timeout(operation: &'static str, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation,
            timeout_ms,
            snapshot: SnapshotSuffix(None),
        }
    }

    /// Build a [`VtError::Timeout`] that embeds the current projection, used
    /// by `text`/`wait_for_text` per spec.
    #[must_use]
    pub fn timeout_with_snapshot(operation: &'static str, timeout_ms: u64, projection: Projection) -> Self {
        Self::Timeout {
            operation,
            timeout_ms,
            snapshot: SnapshotSuffix(Some(projection)),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VtError>;
