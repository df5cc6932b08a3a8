//! The terminal-emulator inbound dependency (spec.md §6): a `feed` sink, a
//! `snapshot` that yields a [`Grid`], `resize`, and `destroy`.
//!
//! [`AlacrittyEmulator`] is the concrete implementation, grounded in
//! `toy1/src/pty/mod.rs`'s `snapshot_from_term` (palette resolution,
//! selection/cursor color swap, wide-char spacer skip) and
//! `src/runtime/attach.rs`'s `Term`/`Processor` setup.

use alacritty_terminal::event::{Event as AlacrittyEvent, EventListener};
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::term::cell::Flags;
use alacritty_terminal::term::{Config as TermConfig, Term};
use alacritty_terminal::vte::ansi;

use crate::grid::{Color, Grid, Line, Span, StyleFlags};

/// The emulator interface the [`crate::session::Session`] drives. Exists so
/// the Session core does not hard-depend on `alacritty_terminal`
/// specifically — spec.md places the emulator library out of scope as an
/// external collaborator, specified only at this boundary.
pub trait Emulator: Send {
    /// Feed a chunk of PTY output into the emulator, in arrival order.
    fn feed(&mut self, bytes: &[u8]);

    /// Take a styled snapshot of the current viewport.
    fn snapshot(&self) -> Grid;

    /// Resize the emulator's viewport.
    fn resize(&mut self, cols: usize, rows: usize);

    /// Release any resources held by the emulator. Idempotent.
    fn destroy(&mut self);
}

#[derive(Clone, Copy)]
struct TermDimensions {
    cols: usize,
    rows: usize,
}

impl Dimensions for TermDimensions {
    fn total_lines(&self) -> usize {
        self.rows
    }

    fn screen_lines(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.cols
    }
}

#[derive(Clone, Copy)]
struct NullListener;

impl EventListener for NullListener {
    fn send_event(&self, _event: AlacrittyEvent) {}
}

/// Default foreground/background used when a cell references a logical
/// color (`Foreground`/`Background`/...) the terminal hasn't overridden.
#[derive(Clone, Copy)]
struct Defaults {
    fg: ansi::Rgb,
    bg: ansi::Rgb,
}

const DEFAULTS: Defaults = Defaults {
    fg: ansi::Rgb { r: 0xd0, g: 0xd0, b: 0xd0 },
    bg: ansi::Rgb { r: 0, g: 0, b: 0 },
};

/// [`Emulator`] backed by `alacritty_terminal`.
pub struct AlacrittyEmulator {
    term: Term<NullListener>,
    parser: ansi::Processor,
    destroyed: bool,
}

impl AlacrittyEmulator {
    /// Create an emulator sized to `(cols, rows)`.
    #[must_use]
    pub fn new(cols: usize, rows: usize) -> Self {
        let dims = TermDimensions {
            cols: cols.max(1),
            rows: rows.max(1),
        };
        Self {
            term: Term::new(TermConfig::default(), &dims, NullListener),
            parser: ansi::Processor::new(),
            destroyed: false,
        }
    }
}

fn resolve_indexed(idx: u8, term_colors: &alacritty_terminal::term::color::Colors) -> ansi::Rgb {
    term_colors[usize::from(idx)].unwrap_or_else(|| xterm_256_fallback(idx))
}

fn xterm_256_fallback(idx: u8) -> ansi::Rgb {
    match idx {
        n @ 16..=231 => {
            let i = n - 16;
            const STEPS: [u8; 6] = [0, 95, 135, 175, 215, 255];
            ansi::Rgb {
                r: STEPS[usize::from(i / 36)],
                g: STEPS[usize::from((i % 36) / 6)],
                b: STEPS[usize::from(i % 6)],
            }
        }
        n @ 232..=255 => {
            let v = 8 + (n - 232) * 10;
            ansi::Rgb { r: v, g: v, b: v }
        }
        _ => DEFAULTS.fg,
    }
}

fn resolve_named(named: ansi::NamedColor, term_colors: &alacritty_terminal::term::color::Colors) -> ansi::Rgb {
    term_colors[named].unwrap_or_else(|| match named {
        ansi::NamedColor::Foreground | ansi::NamedColor::BrightForeground => DEFAULTS.fg,
        ansi::NamedColor::Background => DEFAULTS.bg,
        _ => DEFAULTS.fg,
    })
}

fn resolve_color(color: ansi::Color, term_colors: &alacritty_terminal::term::color::Colors) -> Color {
    let rgb = match color {
        ansi::Color::Spec(rgb) => rgb,
        ansi::Color::Indexed(idx) => resolve_indexed(idx, term_colors),
        ansi::Color::Named(named) => resolve_named(named, term_colors),
    };
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

impl Emulator for AlacrittyEmulator {
    fn feed(&mut self, bytes: &[u8]) {
        if self.destroyed {
            return;
        }
        self.parser.advance(&mut self.term, bytes);
    }

    fn snapshot(&self) -> Grid {
        let rows = self.term.screen_lines();
        let cols = self.term.columns();

        let renderable = self.term.renderable_content();
        let selection = renderable.selection;
        let cursor = renderable.cursor;
        let term_colors = renderable.colors;

        // One run-length-encoded span per row; cells are collapsed into
        // the current span when style/color are unchanged.
        let mut rows_chars: Vec<Vec<(char, StyleFlags, Color, Color)>> =
            vec![Vec::with_capacity(cols); rows];

        for indexed in renderable.display_iter {
            let line_i32 = indexed.point.line.0;
            if line_i32 < 0 {
                continue;
            }
            let Ok(row) = usize::try_from(line_i32) else { continue };
            if row >= rows {
                continue;
            }
            let col = indexed.point.column.0;
            if col >= cols {
                continue;
            }
            if indexed
                .cell
                .flags
                .intersects(Flags::WIDE_CHAR_SPACER | Flags::LEADING_WIDE_CHAR_SPACER)
            {
                continue;
            }

            let mut fg = resolve_color(indexed.cell.fg, term_colors);
            let mut bg = resolve_color(indexed.cell.bg, term_colors);

            let mut flags = StyleFlags::empty();
            if indexed.cell.flags.intersects(Flags::BOLD | Flags::DIM_BOLD) {
                flags |= StyleFlags::BOLD;
            }
            if indexed.cell.flags.contains(Flags::ITALIC) {
                flags |= StyleFlags::ITALIC;
            }
            if indexed.cell.flags.intersects(Flags::ALL_UNDERLINES) {
                flags |= StyleFlags::UNDERLINE;
            }

            if indexed.cell.flags.contains(Flags::INVERSE) {
                std::mem::swap(&mut fg, &mut bg);
            }

            let in_selection = selection
                .map(|range| range.contains_cell(&indexed, cursor.point, cursor.shape))
                .unwrap_or(false);
            if in_selection {
                std::mem::swap(&mut fg, &mut bg);
            }

            let is_cursor_cell = cursor.shape != ansi::CursorShape::Hidden && indexed.point == cursor.point;
            if is_cursor_cell {
                std::mem::swap(&mut fg, &mut bg);
            }

            let ch = if indexed.cell.flags.contains(Flags::HIDDEN) {
                ' '
            } else {
                let c = indexed.cell.c;
                if c == '\0' { ' ' } else { c }
            };

            // Fill any gap left by a skipped wide-char spacer column.
            while rows_chars[row].len() < col {
                rows_chars[row].push((' ', StyleFlags::empty(), Color::Rgb(DEFAULTS.fg.r, DEFAULTS.fg.g, DEFAULTS.fg.b), Color::Rgb(DEFAULTS.bg.r, DEFAULTS.bg.g, DEFAULTS.bg.b)));
            }
            rows_chars[row].push((ch, flags, fg, bg));
        }

        let lines = rows_chars
            .into_iter()
            .map(|mut cells| {
                while cells.len() < cols {
                    cells.push((' ', StyleFlags::empty(), Color::Rgb(DEFAULTS.fg.r, DEFAULTS.fg.g, DEFAULTS.fg.b), Color::Rgb(DEFAULTS.bg.r, DEFAULTS.bg.g, DEFAULTS.bg.b)));
                }
                Line { spans: collapse_spans(&cells) }
            })
            .collect();

        Grid { cols, rows, lines }
    }

    fn resize(&mut self, cols: usize, rows: usize) {
        let dims = TermDimensions { cols: cols.max(1), rows: rows.max(1) };
        self.term.resize(dims);
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }
}

/// Collapse a row of per-cell `(char, flags, fg, bg)` tuples into
/// run-length-encoded spans of identical style.
fn collapse_spans(cells: &[(char, StyleFlags, Color, Color)]) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    for &(ch, flags, fg, bg) in cells {
        if let Some(last) = spans.last_mut()
            && last.flags == flags
            && last.fg == fg
            && last.bg == bg
        {
            last.text.push(ch);
            last.width += 1;
            continue;
        }
        spans.push(Span {
            text: ch.to_string(),
            width: 1,
            flags,
            fg,
            bg,
        });
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_and_snapshot_plain_text() {
        let mut emu = AlacrittyEmulator::new(20, 3);
        emu.feed(b"hello");
        let grid = emu.snapshot();
        assert_eq!(grid.cols, 20);
        assert_eq!(grid.rows, 3);
        assert_eq!(grid.lines[0].raw_text().trim_end(), "hello");
    }

    #[test]
    fn resize_updates_grid_dimensions() {
        let mut emu = AlacrittyEmulator::new(10, 5);
        emu.resize(30, 10);
        let grid = emu.snapshot();
        assert_eq!(grid.cols, 30);
        assert_eq!(grid.rows, 10);
    }

    #[test]
    fn feed_after_destroy_is_a_no_op() {
        let mut emu = AlacrittyEmulator::new(10, 3);
        emu.destroy();
        emu.feed(b"hello");
        let grid = emu.snapshot();
        assert_eq!(grid.lines[0].raw_text().trim_end(), "");
    }
}
