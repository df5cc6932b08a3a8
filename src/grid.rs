//! The emulator-agnostic cell grid that [`crate::screen`] and
//! [`crate::pattern`] operate on.
//!
//! This is a pure data model: nothing in this module touches a PTY or an
//! emulator crate. An [`crate::emulator::Emulator`] implementation is
//! responsible for mapping its own internal representation onto a [`Grid`]
//! once per [`crate::emulator::Emulator::snapshot`] call.

use bitflags::bitflags;

bitflags! {
    /// Style attributes carried by a single cell or span.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StyleFlags: u8 {
        /// Bold / increased intensity.
        const BOLD = 1 << 0;
        /// Italic.
        const ITALIC = 1 << 1;
        /// Underline (any variant).
        const UNDERLINE = 1 << 2;
    }
}

/// A terminal color, either from the 256-color indexed palette or a 24-bit
/// RGB triple.
///
/// Per spec: indexed colors render as their decimal number, RGB colors
/// render as a lowercase `#rrggbb` hex string. The two forms are never
/// normalized against each other — see `SPEC_FULL.md` §4.2/§9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// A palette index 0-255.
    Indexed(u8),
    /// A resolved 24-bit RGB color.
    Rgb(u8, u8, u8),
}

impl Color {
    /// Render this color the way the projector's `only` predicates and a
    /// caller's `TextOptions` literal comparisons see it.
    #[must_use]
    pub fn rendered(self) -> String {
        match self {
            Self::Indexed(idx) => idx.to_string(),
            Self::Rgb(r, g, b) => format!("#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

/// A run of adjacent cells sharing identical style attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// The text contents of the span (one `char` per display column,
    /// except that wide glyphs still occupy their trailing spacer column
    /// as a single space so `width == text.chars().count()` always holds
    /// here; wide-glyph width bookkeeping is the emulator's job).
    pub text: String,
    /// Number of terminal columns this span occupies.
    pub width: usize,
    /// Style flags shared by every cell in the span.
    pub flags: StyleFlags,
    /// Foreground color shared by every cell in the span.
    pub fg: Color,
    /// Background color shared by every cell in the span.
    pub bg: Color,
}

/// One row of the grid, as an ordered sequence of spans whose widths sum to
/// the grid's column count.
#[derive(Debug, Clone, Default)]
pub struct Line {
    /// Spans in left-to-right order.
    pub spans: Vec<Span>,
}

impl Line {
    /// Concatenate every span's text, regardless of style.
    #[must_use]
    pub fn raw_text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

/// A full snapshot of the emulator's visible viewport.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    /// Number of columns (matches the session's current geometry).
    pub cols: usize,
    /// Number of rows (matches the session's current geometry).
    pub rows: usize,
    /// Lines top-to-bottom.
    pub lines: Vec<Line>,
}

/// A predicate over a single span's style, used by [`crate::screen::StyleFilter`].
pub struct StylePredicate<'a> {
    /// Require the span be bold (or not).
    pub bold: Option<bool>,
    /// Require the span be italic (or not).
    pub italic: Option<bool>,
    /// Require the span be underlined (or not).
    pub underline: Option<bool>,
    /// Require the span's rendered foreground equal this exact string.
    pub foreground: Option<&'a str>,
    /// Require the span's rendered background equal this exact string.
    pub background: Option<&'a str>,
}

impl StylePredicate<'_> {
    /// True if every predicate present holds for `span`.
    #[must_use]
    pub fn matches(&self, span: &Span) -> bool {
        if let Some(want) = self.bold
            && want != span.flags.contains(StyleFlags::BOLD)
        {
            return false;
        }
        if let Some(want) = self.italic
            && want != span.flags.contains(StyleFlags::ITALIC)
        {
            return false;
        }
        if let Some(want) = self.underline
            && want != span.flags.contains(StyleFlags::UNDERLINE)
        {
            return false;
        }
        if let Some(want) = self.foreground
            && want != span.fg.rendered()
        {
            return false;
        }
        if let Some(want) = self.background
            && want != span.bg.rendered()
        {
            return false;
        }
        true
    }
}
