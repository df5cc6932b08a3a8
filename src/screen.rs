//! Pure projection from a [`Grid`] snapshot to text suitable for assertions.
//!
//! Grounded in `toy1/src/pty/mod.rs::snapshot_from_term`'s cell-to-text
//! collapsing (`PtyManager::screen_lines`), generalized to carry the style
//! filter and whitespace cleanup spec.md requires.

use crate::grid::{Grid, StylePredicate};

/// Style filter for [`TextOptions::only`]. Every predicate present must hold
/// for a span's text to be kept; spans that fail the filter are blanked out
/// (replaced with spaces) rather than removed, so column layout survives.
#[derive(Debug, Clone, Default)]
pub struct StyleFilter {
    /// Require bold (or not).
    pub bold: Option<bool>,
    /// Require italic (or not).
    pub italic: Option<bool>,
    /// Require underline (or not).
    pub underline: Option<bool>,
    /// Require the rendered foreground equal exactly this string.
    pub foreground: Option<String>,
    /// Require the rendered background equal exactly this string.
    pub background: Option<String>,
}

impl StyleFilter {
    fn predicate(&self) -> StylePredicate<'_> {
        StylePredicate {
            bold: self.bold,
            italic: self.italic,
            underline: self.underline,
            foreground: self.foreground.as_deref(),
            background: self.background.as_deref(),
        }
    }
}

/// Options controlling how a grid is turned into text and, for the
/// `Session::text` polling loop, when a projection is considered
/// satisfactory. See spec.md §3 / §4.5.
#[derive(Default)]
pub struct TextOptions {
    /// Style filter; `None` means every span's text is kept verbatim.
    pub only: Option<StyleFilter>,
    /// Predicate the projected text must satisfy before `text()` returns.
    /// Defaults to "trimmed text is non-empty".
    pub wait_for: Option<Box<dyn Fn(&str) -> bool + Send>>,
    /// Overall timeout for the polling loop, in milliseconds. Defaults to 1000.
    pub timeout_ms: u64,
    /// Drop trailing all-empty lines.
    pub trim_end: bool,
    /// Skip the quiescence wait and project immediately.
    pub immediate: bool,
    /// Whether to render the cursor position into the projection (reserved
    /// for future cursor-aware assertions; the projector does not currently
    /// mark the cursor cell specially beyond what the emulator already
    /// swapped into fg/bg).
    pub show_cursor: bool,
}

impl std::fmt::Debug for TextOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextOptions")
            .field("only", &self.only)
            .field("wait_for", &self.wait_for.as_ref().map(|_| "<fn>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("trim_end", &self.trim_end)
            .field("immediate", &self.immediate)
            .field("show_cursor", &self.show_cursor)
            .finish()
    }
}

impl TextOptions {
    /// The default `wait_for` predicate: trimmed text is non-empty.
    #[must_use]
    pub fn default_wait_for(text: &str) -> bool {
        !text.trim().is_empty()
    }

    fn satisfied(&self, text: &str) -> bool {
        match &self.wait_for {
            Some(predicate) => predicate(text),
            None => Self::default_wait_for(text),
        }
    }
}

impl Clone for TextOptions {
    fn clone(&self) -> Self {
        Self {
            only: self.only.clone(),
            wait_for: None,
            timeout_ms: self.timeout_ms,
            trim_end: self.trim_end,
            immediate: self.immediate,
            show_cursor: self.show_cursor,
        }
    }
}

const DEFAULT_TEXT_TIMEOUT_MS: u64 = 1000;

impl TextOptions {
    /// Construct options with spec-default `timeout_ms` (1000ms) and every
    /// other field at its default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout_ms: DEFAULT_TEXT_TIMEOUT_MS,
            ..Self::default()
        }
    }
}

/// A projected screen: lines joined by `\n`, with a mandatory leading
/// newline (spec.md §4.2 step 4 — this makes the output diff nicely against
/// an indented literal block in a test).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection(pub String);

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Projection {
    /// Whether the default `wait_for` predicate is satisfied.
    #[must_use]
    pub fn is_non_empty(&self) -> bool {
        TextOptions::default_wait_for(&self.0)
    }
}

/// Project a grid snapshot into text per `options`, applying the style
/// filter (if any), right-trimming each line, and optionally dropping
/// trailing empty lines.
#[must_use]
pub fn project(grid: &Grid, only: Option<&StyleFilter>) -> Vec<String> {
    let predicate = only.map(StyleFilter::predicate);

    grid.lines
        .iter()
        .map(|line| {
            let mut out = String::new();
            for span in &line.spans {
                match &predicate {
                    None => out.push_str(&span.text),
                    Some(pred) if pred.matches(span) => out.push_str(&span.text),
                    Some(_) => {
                        for _ in 0..span.width {
                            out.push(' ');
                        }
                    }
                }
            }
            out.trim_end().to_string()
        })
        .collect()
}

/// Full pipeline: project, optionally drop trailing blank lines, join with
/// `\n`, and prepend the mandatory leading newline.
#[must_use]
pub fn render(grid: &Grid, options: &TextOptions) -> Projection {
    let mut lines = project(grid, options.only.as_ref());

    if options.trim_end {
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
    }

    let mut out = String::from("\n");
    out.push_str(&lines.join("\n"));
    Projection(out)
}

/// Raw per-line text (no style filter, no trimming) for [`crate::pattern`].
#[must_use]
pub fn raw_lines(grid: &Grid) -> Vec<String> {
    grid.lines.iter().map(super::grid::Line::raw_text).collect()
}

pub(crate) fn wait_for_satisfied(options: &TextOptions, projection: &Projection) -> bool {
    options.satisfied(&projection.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Color, Line, Span, StyleFlags};

    fn span(text: &str, flags: StyleFlags, fg: Color) -> Span {
        Span {
            text: text.to_string(),
            width: text.chars().count(),
            flags,
            fg,
            bg: Color::Rgb(0, 0, 0),
        }
    }

    fn two_line_grid() -> Grid {
        Grid {
            cols: 8,
            rows: 2,
            lines: vec![
                Line {
                    spans: vec![
                        span("hi", StyleFlags::BOLD, Color::Rgb(255, 0, 0)),
                        span("  there", StyleFlags::empty(), Color::Rgb(0, 0, 0)),
                    ],
                },
                Line {
                    spans: vec![span("        ", StyleFlags::empty(), Color::Rgb(0, 0, 0))],
                },
            ],
        }
    }

    #[test]
    fn render_adds_leading_newline_and_joins() {
        let grid = two_line_grid();
        let projection = render(&grid, &TextOptions::new());
        assert_eq!(projection.0, "\nhi  there\n");
    }

    #[test]
    fn trim_end_drops_trailing_blank_lines() {
        let grid = two_line_grid();
        let mut options = TextOptions::new();
        options.trim_end = true;
        let projection = render(&grid, &options);
        assert_eq!(projection.0, "\nhi  there");
    }

    #[test]
    fn style_filter_preserves_width_via_blanking() {
        let grid = two_line_grid();
        let filter = StyleFilter {
            bold: Some(true),
            ..StyleFilter::default()
        };
        let lines = project(&grid, Some(&filter));
        // "hi" survives (bold); "  there" is blanked to 7 spaces, then right-trimmed away.
        assert_eq!(lines[0], "hi");
    }

    #[test]
    fn raw_lines_ignore_style_and_do_not_trim() {
        let grid = two_line_grid();
        let lines = raw_lines(&grid);
        assert_eq!(lines[0], "hi  there");
        assert_eq!(lines[1], "        ");
    }

    #[test]
    fn default_wait_for_rejects_blank_text() {
        assert!(!TextOptions::default_wait_for("   \n  "));
        assert!(TextOptions::default_wait_for("  x "));
    }
}
