//! The orchestrator: couples the PTY byte stream, the emulator's cell grid,
//! and the caller's sequence of wait/act requests into one deterministic,
//! idle-tracked automation surface.
//!
//! Grounded in `src/runtime/manager.rs`'s `TmuxRuntimeManager` (one struct
//! owning the PTY handle, the terminal model, and forwarding writes/resizes
//! through to both) and `src/runtime/attach.rs`'s background-reader-thread
//! wiring, generalized from tmux-attach sessions to directly-spawned child
//! processes per spec.md §3/§4.5.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::emulator::{AlacrittyEmulator, Emulator};
use crate::error::{Result, VtError};
use crate::grid::Grid;
use crate::idle::IdleTracker;
use crate::key::{self, Chord};
use crate::pattern::{self, Pattern};
use crate::pty::{PortablePty, PtyHandle, SpawnParams};
use crate::screen::{self, Projection, TextOptions};

/// Launch configuration for [`Session::launch`]. Construct with
/// `LaunchOptions::new(command)` and builder-style setters, or
/// `Default::default()` plus manual field assignment.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Executable to run.
    pub command: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Initial column count. Default 80.
    pub cols: u16,
    /// Initial row count. Default 24.
    pub rows: u16,
    /// Working directory; `None` inherits the parent's.
    pub cwd: Option<PathBuf>,
    /// Environment variables merged over the inherited environment, with
    /// `TERM=xterm-truecolor` and `COLORTERM=truecolor` forced on top.
    pub env: HashMap<String, String>,
}

impl LaunchOptions {
    /// Start building launch options for `command` with no arguments and
    /// spec-default geometry (80x24).
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cols: 80,
            rows: 24,
            cwd: None,
            env: HashMap::new(),
        }
    }

    /// Set the argument list.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the initial geometry.
    #[must_use]
    pub fn size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Merge one environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn resolved_env(&self) -> HashMap<String, String> {
        let mut env = self.env.clone();
        env.insert("TERM".to_string(), "xterm-truecolor".to_string());
        env.insert("COLORTERM".to_string(), "truecolor".to_string());
        env
    }
}

/// Time budget for the implicit "await quiescence" step at the end of
/// `type`/`press`/`click_at`/`scroll_up`/`scroll_down`. These operations
/// never fail on idle-not-settling (spec.md §4.5 lists only `ClosedSession`
/// as an error for `type`); this bound just keeps them from blocking
/// forever if the child never goes quiet.
const ACTION_QUIESCE_BUDGET: Duration = Duration::from_millis(2000);

/// Inter-character pacing used by `type`, mimicking real typing.
const TYPE_PACING: Duration = Duration::from_millis(1);

/// Default timeout for the helper constructor's first-data/first-quiescence
/// wait. Not specified by spec.md; chosen generously so a slow-starting
/// child (a shell sourcing profile scripts) doesn't spuriously fail launch.
const LAUNCH_READY_TIMEOUT: Duration = Duration::from_millis(5000);

const DEFAULT_TEXT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_WAIT_FOR_TEXT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_WAIT_IDLE_TIMEOUT_MS: u64 = 500;
const DEFAULT_WAIT_FOR_DATA_TIMEOUT_MS: u64 = 5000;
const DEFAULT_CLICK_TIMEOUT_MS: u64 = 5000;
const TEXT_POLL_INTERVAL_MS: u64 = 15;

struct Geometry {
    cols: AtomicU16,
    rows: AtomicU16,
}

/// One driven child process: owns the PTY, the emulator, the idle tracker,
/// and the public API in spec.md §4.5.
pub struct Session {
    pty: Arc<dyn PtyHandle>,
    emulator: Arc<Mutex<dyn Emulator>>,
    idle: Arc<IdleTracker>,
    geometry: Arc<Geometry>,
    closed: Arc<AtomicBool>,
}

impl Session {
    /// Spawn `options.command` inside a new PTY, wire up the emulator and
    /// idle tracker, and wait for the child's first byte of output and the
    /// first quiescence after it before returning — so callers never race
    /// a freshly-launched child's startup banner.
    ///
    /// # Errors
    /// Returns [`VtError::LaunchFailure`] if spawning the PTY fails.
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let env = options.resolved_env();
        let params = SpawnParams {
            command: &options.command,
            args: &options.args,
            cols: options.cols,
            rows: options.rows,
            cwd: options.cwd.as_deref(),
            env: &env,
        };

        let pty: Arc<dyn PtyHandle> = Arc::new(
            PortablePty::spawn(&params).map_err(|reason| VtError::LaunchFailure { reason })?,
        );
        let emulator: Arc<Mutex<dyn Emulator>> = Arc::new(Mutex::new(AlacrittyEmulator::new(
            usize::from(options.cols),
            usize::from(options.rows),
        )));
        let idle = Arc::new(IdleTracker::new());
        let closed = Arc::new(AtomicBool::new(false));

        let emulator_for_callback = Arc::clone(&emulator);
        let idle_for_callback = Arc::clone(&idle);
        let closed_for_callback = Arc::clone(&closed);
        pty.on_data(Box::new(move |chunk: &[u8]| {
            if closed_for_callback.load(Ordering::Acquire) {
                return;
            }
            if let Ok(mut emulator) = emulator_for_callback.lock() {
                emulator.feed(chunk);
            }
            idle_for_callback.notify();
        }));

        let session = Self {
            pty,
            emulator,
            idle,
            geometry: Arc::new(Geometry {
                cols: AtomicU16::new(options.cols),
                rows: AtomicU16::new(options.rows),
            }),
            closed,
        };

        let idle_for_wait = Arc::clone(&session.idle);
        smol::unblock(move || idle_for_wait.await_first_data(LAUNCH_READY_TIMEOUT)).await;
        let idle_for_wait = Arc::clone(&session.idle);
        smol::unblock(move || idle_for_wait.await_quiescent(LAUNCH_READY_TIMEOUT)).await;

        Ok(session)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(VtError::ClosedSession)
        } else {
            Ok(())
        }
    }

    fn snapshot(&self) -> Grid {
        self.emulator
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .snapshot()
    }

    async fn quiesce_briefly(&self) {
        let idle = Arc::clone(&self.idle);
        let _ = smol::unblock(move || idle.await_quiescent(ACTION_QUIESCE_BUDGET)).await;
    }

    fn raw_write(&self, bytes: &[u8]) -> Result<()> {
        self.pty
            .write(bytes)
            .map_err(|reason| VtError::WriteFailure { reason })
    }

    /// Type `text` one code point at a time with ~1ms inter-character
    /// pacing, then wait for quiescence.
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if the session is closed, or
    /// [`VtError::WriteFailure`] if a write fails.
    pub async fn r#type(&self, text: &str) -> Result<()> {
        self.ensure_open()?;
        let chars: Vec<char> = text.chars().collect();
        for (i, c) in chars.iter().enumerate() {
            let mut buf = [0u8; 4];
            self.raw_write(c.encode_utf8(&mut buf).as_bytes())?;
            if i + 1 < chars.len() {
                smol::Timer::after(TYPE_PACING).await;
            }
        }
        self.quiesce_briefly().await;
        Ok(())
    }

    /// Press a key chord, given as modifier/main-key name tokens (e.g.
    /// `&["ctrl", "c"]`), then wait for quiescence.
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed, [`VtError::InvalidKey`]
    /// if any token is unrecognized, or [`VtError::WriteFailure`].
    pub async fn press(&self, keys: &[&str]) -> Result<()> {
        self.ensure_open()?;
        let chord = Chord::parse(keys)?;
        let bytes = key::encode(&chord);
        self.raw_write(&bytes)?;
        self.quiesce_briefly().await;
        Ok(())
    }

    /// Write `bytes` directly, with no pacing and no quiescence wait.
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed, or
    /// [`VtError::WriteFailure`].
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.raw_write(bytes)
    }

    /// Project the current (or next-satisfying) screen as text.
    ///
    /// If `options.immediate`, returns the current projection immediately.
    /// Otherwise polls: repeatedly waits briefly for quiescence then
    /// projects, returning the first projection whose `wait_for` predicate
    /// holds (default: trimmed text non-empty). On overall timeout, the
    /// predicate is evaluated once more against a fresh projection before
    /// failing.
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed, or
    /// [`VtError::Timeout`] (carrying the last projection) if the predicate
    /// never holds within `options.timeout_ms`.
    pub async fn text(&self, options: &TextOptions) -> Result<Projection> {
        self.ensure_open()?;

        if options.immediate {
            return Ok(screen::render(&self.snapshot(), options));
        }

        let timeout_ms = if options.timeout_ms == 0 {
            DEFAULT_TEXT_TIMEOUT_MS
        } else {
            options.timeout_ms
        };
        let deadline = std::time::Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            let idle = Arc::clone(&self.idle);
            let poll = Duration::from_millis(TEXT_POLL_INTERVAL_MS);
            let _ = smol::unblock(move || idle.await_quiescent(poll)).await;

            let projection = screen::render(&self.snapshot(), options);
            if screen::wait_for_satisfied(options, &projection) {
                return Ok(projection);
            }
            if std::time::Instant::now() >= deadline {
                let final_projection = screen::render(&self.snapshot(), options);
                if screen::wait_for_satisfied(options, &final_projection) {
                    return Ok(final_projection);
                }
                return Err(VtError::timeout_with_snapshot("text", timeout_ms, final_projection));
            }
        }
    }

    /// Sugar over `text` whose `wait_for` predicate is "pattern matches
    /// the projected text".
    ///
    /// # Errors
    /// Same as [`Session::text`].
    pub async fn wait_for_text(&self, pattern: Pattern, timeout_ms: Option<u64>) -> Result<Projection> {
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_WAIT_FOR_TEXT_TIMEOUT_MS);
        let mut options = TextOptions::new();
        options.timeout_ms = timeout_ms;
        options.wait_for = Some(Box::new(move |text: &str| pattern_matches_text(&pattern, text)));
        self.text(&options).await
    }

    /// Wait for the PTY stream to go quiescent.
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed, or
    /// [`VtError::Timeout`] if quiescence is not observed within `timeout_ms`.
    pub async fn wait_idle(&self, timeout_ms: Option<u64>) -> Result<()> {
        self.ensure_open()?;
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_WAIT_IDLE_TIMEOUT_MS);
        let idle = Arc::clone(&self.idle);
        let resolved = smol::unblock(move || idle.await_quiescent(Duration::from_millis(timeout_ms))).await;
        if resolved {
            Ok(())
        } else {
            Err(VtError::timeout("wait_idle", timeout_ms))
        }
    }

    /// Wait for the first byte of PTY output ever (no-op success if one has
    /// already arrived).
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed, or
    /// [`VtError::Timeout`] if no byte arrives within `timeout_ms`.
    pub async fn wait_for_data(&self, timeout_ms: Option<u64>) -> Result<()> {
        self.ensure_open()?;
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_WAIT_FOR_DATA_TIMEOUT_MS);
        let idle = Arc::clone(&self.idle);
        let resolved = smol::unblock(move || idle.await_first_data(Duration::from_millis(timeout_ms))).await;
        if resolved {
            Ok(())
        } else {
            Err(VtError::timeout("wait_for_data", timeout_ms))
        }
    }

    /// Find `pattern` on the current screen and click it.
    ///
    /// Polls until exactly one match is found (then clicks it) or the
    /// pattern is first found to be ambiguous. If `first` is true, an
    /// ambiguous match clicks the line-major-first occurrence instead of
    /// failing.
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed,
    /// [`VtError::AmbiguousClick`] if more than one match exists and
    /// `first` is false, or [`VtError::ClickNotFound`] on timeout.
    pub async fn click(&self, pattern: &Pattern, first: bool, timeout_ms: Option<u64>) -> Result<()> {
        self.ensure_open()?;
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_CLICK_TIMEOUT_MS);
        let deadline = std::time::Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            let idle = Arc::clone(&self.idle);
            let poll = Duration::from_millis(TEXT_POLL_INTERVAL_MS);
            let _ = smol::unblock(move || idle.await_quiescent(poll)).await;

            let lines = screen::raw_lines(&self.snapshot());
            let matches = pattern::find_all(&lines, pattern);

            match matches.len() {
                0 => {
                    if std::time::Instant::now() >= deadline {
                        return Err(VtError::ClickNotFound {
                            pattern: pattern.describe(),
                            timeout_ms,
                        });
                    }
                }
                1 => {
                    let m = &matches[0];
                    return self.click_at(m.col, m.row).await;
                }
                count => {
                    if first {
                        let m = &matches[0];
                        return self.click_at(m.col, m.row).await;
                    }
                    return Err(VtError::AmbiguousClick {
                        count,
                        pattern: pattern.describe(),
                    });
                }
            }
        }
    }

    /// Emit an SGR left-click press+release at 0-based cell `(x, y)`.
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed, or
    /// [`VtError::WriteFailure`].
    pub async fn click_at(&self, x: usize, y: usize) -> Result<()> {
        self.ensure_open()?;
        self.raw_write(&key::click_sequence(x, y))?;
        self.quiesce_briefly().await;
        Ok(())
    }

    async fn scroll(&self, lines: usize, x: Option<usize>, y: Option<usize>, up: bool) -> Result<()> {
        self.ensure_open()?;
        let cols = usize::from(self.geometry.cols.load(Ordering::Acquire));
        let rows = usize::from(self.geometry.rows.load(Ordering::Acquire));
        let x = x.unwrap_or(cols / 2);
        let y = y.unwrap_or(rows / 2);
        for _ in 0..lines {
            self.raw_write(&key::scroll_sequence(x, y, up))?;
        }
        self.quiesce_briefly().await;
        Ok(())
    }

    /// Scroll up `lines` times at `(x, y)` (defaults to viewport center).
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed, or
    /// [`VtError::WriteFailure`].
    pub async fn scroll_up(&self, lines: usize, x: Option<usize>, y: Option<usize>) -> Result<()> {
        self.scroll(lines, x, y, true).await
    }

    /// Scroll down `lines` times at `(x, y)` (defaults to viewport center).
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed, or
    /// [`VtError::WriteFailure`].
    pub async fn scroll_down(&self, lines: usize, x: Option<usize>, y: Option<usize>) -> Result<()> {
        self.scroll(lines, x, y, false).await
    }

    /// Send `keys` via `send_raw`, then capture `frame_count` immediate
    /// projections spaced `interval_ms` apart, to observe transient renders
    /// the debounce would otherwise hide. Waits for quiescence after the
    /// last frame.
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed,
    /// [`VtError::InvalidKey`] if a key token is unrecognized, or
    /// [`VtError::WriteFailure`].
    pub async fn capture_frames(
        &self,
        keys: &[&str],
        frame_count: usize,
        interval_ms: u64,
    ) -> Result<Vec<Projection>> {
        self.ensure_open()?;
        let chord = Chord::parse(keys)?;
        self.raw_write(&key::encode(&chord))?;

        let mut frames = Vec::with_capacity(frame_count);
        let immediate_options = TextOptions { immediate: true, ..TextOptions::new() };
        for i in 0..frame_count {
            frames.push(screen::render(&self.snapshot(), &immediate_options));
            if i + 1 < frame_count {
                smol::Timer::after(Duration::from_millis(interval_ms)).await;
            }
        }
        self.quiesce_briefly().await;
        Ok(frames)
    }

    /// Resize the session's geometry, emulator, and PTY atomically. Does
    /// not wait for quiescence; the child's own SIGWINCH-driven repaint
    /// will be observed by subsequent operations.
    ///
    /// # Errors
    /// Returns [`VtError::ClosedSession`] if closed, or a write/resize
    /// failure surfaced as [`VtError::WriteFailure`].
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        self.ensure_open()?;
        self.geometry.cols.store(cols, Ordering::Release);
        self.geometry.rows.store(rows, Ordering::Release);
        self.emulator
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .resize(usize::from(cols), usize::from(rows));
        self.pty
            .resize(cols, rows)
            .map_err(|reason| VtError::WriteFailure { reason })
    }

    /// Idempotently release the child process and emulator resources, in
    /// that order. Also cancels the idle debounce, so any task blocked in
    /// `wait_idle`/`wait_for_data`/`text`'s polling loop on this session
    /// wakes and fails rather than waiting out its own timeout. Subsequent
    /// calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.idle.close();
        let _ = self.pty.kill();
        self.emulator
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .destroy();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn pattern_matches_text(pattern: &Pattern, text: &str) -> bool {
    match pattern {
        Pattern::Literal(needle) => text.contains(needle.as_str()),
        Pattern::Regex(re) => re.is_match(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(command: &str, args: &[&str]) -> LaunchOptions {
        LaunchOptions::new(command).args(args.iter().map(|s| (*s).to_string())).size(40, 10)
    }

    #[test]
    fn echo_snapshot_round_trips_trimmed() {
        smol::block_on(async {
            let session = Session::launch(options("echo", &["hello world"])).await.expect("launch");
            let mut opts = TextOptions::new();
            opts.trim_end = true;
            let projection = session.text(&opts).await.expect("text");
            assert_eq!(projection.0, "\nhello world");
            session.close();
        });
    }

    #[test]
    fn cat_echoes_typed_line_twice() {
        smol::block_on(async {
            let session = Session::launch(options("cat", &[])).await.expect("launch");
            session.r#type("hello").await.expect("type");
            session.press(&["enter"]).await.expect("press enter");
            let projection = session
                .wait_for_text(Pattern::literal("hello"), None)
                .await
                .expect("wait_for_text");
            let occurrences = projection.0.matches("hello").count();
            assert_eq!(occurrences, 2);
            session.press(&["ctrl", "c"]).await.expect("press ctrl+c");
            session.close();
        });
    }

    #[test]
    fn click_on_ambiguous_pattern_fails_without_first() {
        smol::block_on(async {
            let session = Session::launch(options("bash", &["--norc", "--noprofile"]))
                .await
                .expect("launch");
            session.r#type("echo \"aaa bbb aaa\"").await.expect("type");
            session.press(&["enter"]).await.expect("press enter");
            session
                .wait_for_text(Pattern::literal("aaa bbb aaa"), None)
                .await
                .expect("wait_for_text");

            let err = session.click(&Pattern::literal("aaa"), false, None).await.unwrap_err();
            match err {
                VtError::AmbiguousClick { count, .. } => assert_eq!(count, 2),
                other => panic!("unexpected error: {other:?}"),
            }

            session.click(&Pattern::literal("aaa"), true, None).await.expect("click first");
            session.close();
        });
    }

    #[test]
    fn operations_fail_after_close() {
        smol::block_on(async {
            let session = Session::launch(options("cat", &[])).await.expect("launch");
            session.close();
            session.close(); // idempotent

            let err = session.r#type("x").await.unwrap_err();
            assert!(matches!(err, VtError::ClosedSession));
        });
    }
}
