//! Symbolic keys, chords, and the byte-level encoder that turns them into
//! what a terminal expects to read on its stdin.
//!
//! Grounded in `toy1/src/pty/mod.rs::key_event_to_bytes`/`mouse_event_to_bytes`,
//! generalized from iocraft's concrete `KeyEvent`/`MouseEventKind` (a
//! rendering-framework type, out of scope here) to this crate's own closed
//! `Key` enumeration and an explicit modifier set, and extended with the
//! CSI-u encoding spec.md §4.1 rule 2 requires.

use crate::error::VtError;

/// A modifier that can be combined with a main key in a [`Chord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// Control.
    Ctrl,
    /// Alt / Meta-as-Alt on most terminals.
    Alt,
    /// Shift.
    Shift,
    /// Meta (distinct from Alt on terminals that report it separately).
    Meta,
}

/// A single main key: letters, digits, printable punctuation, and the
/// closed set of named specials. Unknown names are rejected at the boundary
/// (see [`Key::parse`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// `a`-`z`.
    Letter(char),
    /// `0`-`9`.
    Digit(char),
    /// Printable ASCII punctuation, taken verbatim.
    Punctuation(char),
    /// Enter / Return.
    Enter,
    /// Escape.
    Escape,
    /// Tab.
    Tab,
    /// Space.
    Space,
    /// Backspace.
    Backspace,
    /// Delete (forward-delete).
    Delete,
    /// Insert.
    Insert,
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Home.
    Home,
    /// End.
    End,
    /// Page Up.
    PageUp,
    /// Page Down.
    PageDown,
    /// Clear.
    Clear,
    /// Linefeed.
    Linefeed,
    /// F1-F12.
    Function(u8),
}

impl Key {
    /// Parse a key name as accepted by `press`. Case-insensitive; `enter`
    /// and `return` are aliases, as are `esc` and `escape`.
    ///
    /// # Errors
    /// Returns `None` when `name` is not in the closed key enumeration; the
    /// caller (`Chord::parse`) is responsible for turning that into an
    /// [`VtError::InvalidKey`] naming every offender at once.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.chars().count() == 1 {
            let c = lower.chars().next()?;
            if c.is_ascii_lowercase() {
                return Some(Self::Letter(c));
            }
            if c.is_ascii_digit() {
                return Some(Self::Digit(c));
            }
            if c.is_ascii_punctuation() {
                return Some(Self::Punctuation(c));
            }
        }
        Some(match lower.as_str() {
            "enter" | "return" => Self::Enter,
            "esc" | "escape" => Self::Escape,
            "tab" => Self::Tab,
            "space" => Self::Space,
            "backspace" => Self::Backspace,
            "delete" => Self::Delete,
            "insert" => Self::Insert,
            "up" => Self::Up,
            "down" => Self::Down,
            "left" => Self::Left,
            "right" => Self::Right,
            "home" => Self::Home,
            "end" => Self::End,
            "pageup" => Self::PageUp,
            "pagedown" => Self::PageDown,
            "clear" => Self::Clear,
            "linefeed" => Self::Linefeed,
            "f1" => Self::Function(1),
            "f2" => Self::Function(2),
            "f3" => Self::Function(3),
            "f4" => Self::Function(4),
            "f5" => Self::Function(5),
            "f6" => Self::Function(6),
            "f7" => Self::Function(7),
            "f8" => Self::Function(8),
            "f9" => Self::Function(9),
            "f10" => Self::Function(10),
            "f11" => Self::Function(11),
            "f12" => Self::Function(12),
            "ctrl" | "alt" | "shift" | "meta" => return None,
            _ => return None,
        })
    }

    /// The full sorted set of valid main-key names, for
    /// [`VtError::InvalidKey`]'s diagnostic message.
    #[must_use]
    pub fn valid_names() -> Vec<String> {
        let statics = [
            "enter", "return", "esc", "escape", "tab", "space", "backspace", "delete", "insert",
            "up", "down", "left", "right", "home", "end", "pageup", "pagedown", "clear",
            "linefeed", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
        ];
        let mut names: Vec<String> = statics.iter().map(|s| (*s).to_string()).collect();
        names.extend(('a'..='z').map(String::from));
        names.extend(('0'..='9').map(String::from));
        names
    }
}

/// A chord: a set of modifiers plus an ordered sequence of main keys (at
/// most one of which is semantically "the" key being pressed; spec.md §9
/// preserves the established behavior of encoding every main key present).
#[derive(Debug, Clone, Default)]
pub struct Chord {
    /// Modifiers present in this chord.
    pub modifiers: Vec<Modifier>,
    /// Main keys, in input order.
    pub keys: Vec<Key>,
}

impl Chord {
    /// True if `m` is present.
    #[must_use]
    pub fn has(&self, m: Modifier) -> bool {
        self.modifiers.contains(&m)
    }

    /// Parse a chord from raw name tokens (as given to `press`), where each
    /// token is either a modifier name or a main-key name. All unrecognized
    /// tokens are collected and reported together.
    ///
    /// # Errors
    /// Returns [`VtError::InvalidKey`] naming every unrecognized token.
    pub fn parse(tokens: &[&str]) -> Result<Self, VtError> {
        let mut chord = Self::default();
        let mut offenders = Vec::new();

        for token in tokens {
            let lower = token.to_ascii_lowercase();
            match lower.as_str() {
                "ctrl" | "control" => chord.modifiers.push(Modifier::Ctrl),
                "alt" | "option" => chord.modifiers.push(Modifier::Alt),
                "shift" => chord.modifiers.push(Modifier::Shift),
                "meta" | "cmd" | "super" => chord.modifiers.push(Modifier::Meta),
                _ => match Key::parse(token) {
                    Some(key) => chord.keys.push(key),
                    None => offenders.push((*token).to_string()),
                },
            }
        }

        if offenders.is_empty() {
            Ok(chord)
        } else {
            Err(VtError::invalid_key(offenders, Key::valid_names()))
        }
    }
}

const ESC: u8 = 0x1b;

fn csi_u_keycode(key: Key) -> Option<u32> {
    match key {
        Key::Enter => Some(13),
        Key::Tab => Some(9),
        Key::Backspace => Some(127),
        Key::Escape => Some(27),
        _ => None,
    }
}

fn fixed_sequence(key: Key) -> Option<&'static [u8]> {
    Some(match key {
        Key::Enter => b"\r",
        Key::Tab => b"\t",
        Key::Space => b" ",
        Key::Backspace => b"\x7f",
        Key::Delete => b"\x1b[3~",
        Key::Insert => b"\x1b[2~",
        Key::Up => b"\x1b[A",
        Key::Down => b"\x1b[B",
        Key::Right => b"\x1b[C",
        Key::Left => b"\x1b[D",
        Key::Home => b"\x1b[H",
        Key::End => b"\x1b[F",
        Key::PageUp => b"\x1b[5~",
        Key::PageDown => b"\x1b[6~",
        Key::Clear => b"\x1b[E",
        Key::Linefeed => b"\n",
        Key::Escape => b"\x1b",
        Key::Function(1) => b"\x1bOP",
        Key::Function(2) => b"\x1bOQ",
        Key::Function(3) => b"\x1bOR",
        Key::Function(4) => b"\x1bOS",
        Key::Function(5) => b"\x1b[15~",
        Key::Function(6) => b"\x1b[17~",
        Key::Function(7) => b"\x1b[18~",
        Key::Function(8) => b"\x1b[19~",
        Key::Function(9) => b"\x1b[20~",
        Key::Function(10) => b"\x1b[21~",
        Key::Function(11) => b"\x1b[23~",
        Key::Function(12) => b"\x1b[24~",
        _ => return None,
    })
}

fn single_char(key: Key) -> Option<char> {
    match key {
        Key::Letter(c) | Key::Digit(c) | Key::Punctuation(c) => Some(c),
        _ => None,
    }
}

/// Encode one main key under `modifiers` per spec.md §4.1's rule ladder.
fn encode_one(key: Key, modifiers: &[Modifier]) -> Vec<u8> {
    let ctrl = modifiers.contains(&Modifier::Ctrl);
    let alt = modifiers.contains(&Modifier::Alt);
    let shift = modifiers.contains(&Modifier::Shift);

    // Rule 1: ctrl + single letter a-z -> C0 control byte. Non-letter chars
    // with ctrl emit the raw char (shift/alt ignored in this branch).
    if ctrl {
        if let Key::Letter(c) = key {
            return vec![(c as u8) - b'a' + 1];
        }
        if let Some(c) = single_char(key) {
            return vec![c as u8];
        }
    }

    // Rule 2: any modifier + {enter, tab, backspace, escape} -> CSI-u.
    if (ctrl || alt || shift)
        && let Some(keycode) = csi_u_keycode(key)
    {
        let modifier = 1 + u32::from(shift) + 2 * u32::from(alt) + 4 * u32::from(ctrl);
        return format!("\x1b[{keycode};{modifier}u").into_bytes();
    }

    // Rule 3: fixed escape sequence.
    if let Some(seq) = fixed_sequence(key) {
        let mut out = Vec::with_capacity(seq.len() + 1);
        if alt {
            out.push(ESC);
        }
        out.extend_from_slice(seq);
        return out;
    }

    // Rule 4: single character, uppercased under shift.
    if let Some(c) = single_char(key) {
        let c = if shift { c.to_ascii_uppercase() } else { c };
        let mut buf = [0u8; 4];
        let encoded = c.encode_utf8(&mut buf).as_bytes().to_vec();
        return if alt {
            let mut out = vec![ESC];
            out.extend_from_slice(&encoded);
            out
        } else {
            encoded
        };
    }

    // Rule 5: last-resort passthrough (unreachable for the closed Key
    // enumeration, kept for completeness per spec.md rule 5).
    Vec::new()
}

/// Pure function from a chord to the byte string a terminal expects.
///
/// A chord with multiple main keys emits their encodings concatenated in
/// input order, each under the full modifier set (spec.md §9's preserved
/// open question). A chord with only modifiers produces the empty string.
#[must_use]
pub fn encode(chord: &Chord) -> Vec<u8> {
    let mut out = Vec::new();
    for &key in &chord.keys {
        out.extend(encode_one(key, &chord.modifiers));
    }
    out
}

/// SGR mouse button codes, before shift/alt/ctrl bit additions are applied
/// by the caller if ever needed. Only click/scroll are exposed at the
/// `Session` level per spec.md.
mod mouse {
    pub const LEFT_PRESS: u32 = 0;
    pub const WHEEL_UP: u32 = 64;
    pub const WHEEL_DOWN: u32 = 65;
}

fn sgr_event(button: u32, x: usize, y: usize, release: bool) -> Vec<u8> {
    let suffix = if release { 'm' } else { 'M' };
    format!("\x1b[<{button};{};{}{suffix}", x + 1, y + 1).into_bytes()
}

/// Encode a left-button click at 0-based cell `(x, y)` as an SGR press
/// followed by an SGR release.
#[must_use]
pub fn click_sequence(x: usize, y: usize) -> Vec<u8> {
    let mut out = sgr_event(mouse::LEFT_PRESS, x, y, false);
    out.extend(sgr_event(mouse::LEFT_PRESS, x, y, true));
    out
}

/// Encode one scroll-wheel tick at 0-based cell `(x, y)`.
#[must_use]
pub fn scroll_sequence(x: usize, y: usize, up: bool) -> Vec<u8> {
    let button = if up { mouse::WHEEL_UP } else { mouse::WHEEL_DOWN };
    sgr_event(button, x, y, false)
}
