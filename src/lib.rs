//! A driver for terminal UIs under test: spawn a process in a real PTY,
//! feed its output through an in-process terminal emulator, and assert
//! against / act on the resulting screen.

pub mod emulator;
pub mod error;
pub mod grid;
pub mod idle;
pub mod key;
pub mod logging;
pub mod pattern;
pub mod pty;
pub mod screen;
pub mod session;

pub use emulator::{AlacrittyEmulator, Emulator};
pub use error::{Result, VtError};
pub use grid::{Color, Grid, Line, Span, StyleFlags};
pub use key::{Chord, Key, Modifier};
pub use pattern::{Match, Pattern};
pub use pty::{PortablePty, PtyHandle};
pub use screen::{Projection, StyleFilter, TextOptions};
pub use session::{LaunchOptions, Session};

/// Current crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
