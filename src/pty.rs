//! The PTY-factory inbound dependency (spec.md §6): `write`, `resize`,
//! `kill`, and an `on_data` sink that must buffer any output read before a
//! callback is registered and flush it on registration.
//!
//! [`PortablePty`] is the concrete implementation, grounded in
//! `toy1/src/pty/mod.rs::try_spawn_session` and `src/runtime/attach.rs`'s
//! `AttachedViewer::spawn`: `portable_pty::native_pty_system()`, a
//! background reader thread, and `Arc<Mutex<_>>`-shared writer/master/killer
//! handles.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};

/// The PTY interface [`crate::session::Session`] drives. Exists so the
/// Session core does not hard-depend on `portable-pty` specifically —
/// spec.md places the PTY-spawn primitive out of scope as an external
/// collaborator, specified only at this boundary.
pub trait PtyHandle: Send {
    /// Queue `bytes` to the child's stdin. Non-blocking.
    ///
    /// # Errors
    /// Returns a description of the underlying I/O failure.
    fn write(&self, bytes: &[u8]) -> Result<(), String>;

    /// Propagate a `SIGWINCH`-equivalent resize to the child.
    ///
    /// # Errors
    /// Returns a description of the underlying I/O failure.
    fn resize(&self, cols: u16, rows: u16) -> Result<(), String>;

    /// Terminate the child and release file descriptors.
    ///
    /// # Errors
    /// Returns a description of the underlying I/O failure.
    fn kill(&self) -> Result<(), String>;

    /// Register the sink that receives every chunk read from the child's
    /// output, in order. Any data read before this call is buffered and
    /// flushed to `callback` immediately upon registration, so no early
    /// output is lost.
    fn on_data(&self, callback: Box<dyn FnMut(&[u8]) + Send>);
}

/// Parameters accepted by [`PortablePty::spawn`], already resolved by
/// [`crate::session::Session`] from a `LaunchOptions` (env merged, `TERM`/
/// `COLORTERM` forced).
pub struct SpawnParams<'a> {
    /// Executable to run.
    pub command: &'a str,
    /// Arguments, in order.
    pub args: &'a [String],
    /// Initial column count.
    pub cols: u16,
    /// Initial row count.
    pub rows: u16,
    /// Working directory; `None` inherits the parent's.
    pub cwd: Option<&'a std::path::Path>,
    /// Fully-resolved environment to pass to the child.
    pub env: &'a HashMap<String, String>,
}

struct Inner {
    buffer: Vec<u8>,
    callback: Option<Box<dyn FnMut(&[u8]) + Send>>,
}

/// [`PtyHandle`] backed by `portable-pty`'s native backend.
pub struct PortablePty {
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    killer: Mutex<Box<dyn portable_pty::ChildKiller + Send + Sync>>,
    inner: Arc<Mutex<Inner>>,
    _reader: JoinHandle<()>,
}

impl PortablePty {
    /// Spawn `command` inside a new PTY sized to `(params.cols, params.rows)`.
    ///
    /// # Errors
    /// Returns a description of whichever `portable-pty` step failed
    /// (`openpty`, `spawn_command`, taking the writer/reader).
    pub fn spawn(params: &SpawnParams<'_>) -> Result<Self, String> {
        let pty_system = native_pty_system();
        let size = PtySize {
            rows: params.rows,
            cols: params.cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        let pair = pty_system.openpty(size).map_err(|e| format!("openpty: {e}"))?;

        let mut cmd = CommandBuilder::new(params.command);
        cmd.args(params.args);
        if let Some(cwd) = params.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in params.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| format!("spawn: {e}"))?;
        let killer = child.clone_killer();
        drop(pair.slave);

        let writer = pair.master.take_writer().map_err(|e| format!("writer: {e}"))?;
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| format!("reader: {e}"))?;

        let inner = Arc::new(Mutex::new(Inner {
            buffer: Vec::new(),
            callback: None,
        }));
        let inner_clone = Arc::clone(&inner);

        let reader_thread = thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut inner = inner_clone.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                        if let Some(callback) = inner.callback.as_mut() {
                            callback(&buf[..n]);
                        } else {
                            inner.buffer.extend_from_slice(&buf[..n]);
                        }
                    }
                }
            }
        });

        Ok(Self {
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            killer: Mutex::new(killer),
            inner,
            _reader: reader_thread,
        })
    }
}

impl PtyHandle for PortablePty {
    fn write(&self, bytes: &[u8]) -> Result<(), String> {
        let mut writer = self.writer.lock().map_err(|_| "writer lock poisoned".to_string())?;
        writer.write_all(bytes).map_err(|e| e.to_string())?;
        writer.flush().map_err(|e| format!("flush: {e}"))
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<(), String> {
        let master = self.master.lock().map_err(|_| "master lock poisoned".to_string())?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| e.to_string())
    }

    fn kill(&self) -> Result<(), String> {
        let mut killer = self.killer.lock().map_err(|_| "killer lock poisoned".to_string())?;
        killer.kill().map_err(|e| e.to_string())
    }

    fn on_data(&self, mut callback: Box<dyn FnMut(&[u8]) + Send>) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !inner.buffer.is_empty() {
            let buffered = std::mem::take(&mut inner.buffer);
            callback(&buffered);
        }
        inner.callback = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn echo_output_reaches_callback() {
        let env = HashMap::new();
        let params = SpawnParams {
            command: "echo",
            args: &["hello from pty".to_string()],
            cols: 40,
            rows: 10,
            cwd: None,
            env: &env,
        };
        let pty = PortablePty::spawn(&params).expect("spawn echo");

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        pty.on_data(Box::new(move |chunk| {
            let _ = tx.send(chunk.to_vec());
        }));

        let mut collected = Vec::new();
        while let Ok(chunk) = rx.recv_timeout(std::time::Duration::from_millis(500)) {
            collected.extend(chunk);
            if String::from_utf8_lossy(&collected).contains("hello from pty") {
                break;
            }
        }
        assert!(String::from_utf8_lossy(&collected).contains("hello from pty"));
    }

    #[test]
    fn data_before_callback_registration_is_buffered_then_flushed() {
        let env = HashMap::new();
        let params = SpawnParams {
            command: "echo",
            args: &["buffered".to_string()],
            cols: 40,
            rows: 10,
            cwd: None,
            env: &env,
        };
        let pty = PortablePty::spawn(&params).expect("spawn echo");
        // Give the reader thread time to read the child's (short) output
        // into the pre-registration buffer before we register a callback.
        std::thread::sleep(std::time::Duration::from_millis(200));

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        pty.on_data(Box::new(move |chunk| {
            let _ = tx.send(chunk.to_vec());
        }));

        let chunk = rx.recv_timeout(std::time::Duration::from_secs(1)).expect("buffered flush");
        assert!(String::from_utf8_lossy(&chunk).contains("buffered"));
    }
}
