//! Viewport renderer
//!
//! Draws the placeholder grid and positions the cursor with raw VT escape
//! sequences. Every refresh is a full clear-and-redraw, assembled in memory
//! and written in one go so the terminal never shows a half-drawn frame.

use std::io::Write;

use tracing::trace;
use unicode_width::UnicodeWidthChar;

use crate::core::cursor::Cursor;
use crate::core::terminal::{Geometry, Result, TerminalError};

/// `ESC [ 2 J`: erase the whole screen
pub const CLEAR_SCREEN: &[u8] = b"\x1b[2J";
/// `ESC [ H`: cursor to row 1, column 1
pub const CURSOR_HOME: &[u8] = b"\x1b[H";
/// Marker drawn on rows that hold no text
pub const ROW_MARKER: u8 = b'~';
/// Output post-processing is off in raw mode, so rows end with an explicit CR LF
pub const ROW_SEPARATOR: &[u8] = b"\r\n";

/// `ESC [ row ; col H` with 1-based coordinates.
fn cursor_to(frame: &mut Vec<u8>, cursor: Cursor) {
    // Writing into a Vec cannot fail
    let _ = write!(frame, "\x1b[{};{}H", u32::from(cursor.y) + 1, u32::from(cursor.x) + 1);
}

/// Cut `text` to at most `cols` display columns.
pub fn truncate_to_width(text: &str, cols: usize) -> &str {
    let mut width = 0;
    for (idx, ch) in text.char_indices() {
        let w = ch.width().unwrap_or(0);
        if width + w > cols {
            return &text[..idx];
        }
        width += w;
    }
    text
}

/// The banner line: control characters dropped, truncated to fit, then
/// centered with leading spaces. The result is always a single row.
pub fn banner_line(banner: &str, cols: u16) -> String {
    let cols = usize::from(cols);
    let printable: String = banner.chars().filter(|c| !c.is_control()).collect();
    let text = truncate_to_width(&printable, cols);
    let width: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    let margin = (cols - width) / 2;

    let mut line = String::with_capacity(margin + text.len());
    line.extend(std::iter::repeat(' ').take(margin));
    line.push_str(text);
    line
}

/// Row that carries the banner instead of a marker.
pub fn banner_row(geometry: Geometry) -> u16 {
    geometry.rows / 3
}

/// Build one complete frame.
///
/// With `draw_rows` false only the clear, home and cursor sequences are
/// emitted; that is the teardown frame.
pub fn render_frame(geometry: Geometry, cursor: Cursor, draw_rows: bool, banner: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(usize::from(geometry.rows) * 4 + usize::from(geometry.cols) + 32);
    frame.extend_from_slice(CLEAR_SCREEN);
    frame.extend_from_slice(CURSOR_HOME);

    if draw_rows {
        let banner_at = banner_row(geometry);
        for row in 0..geometry.rows {
            if row == banner_at && !banner.is_empty() {
                frame.extend_from_slice(banner_line(banner, geometry.cols).as_bytes());
            } else {
                frame.push(ROW_MARKER);
            }
            if row < geometry.last_row() {
                frame.extend_from_slice(ROW_SEPARATOR);
            }
        }
    }

    cursor_to(&mut frame, cursor);
    frame.extend_from_slice(CURSOR_HOME);
    frame
}

/// Frame written on the way out: clean screen, no placeholder rows.
pub fn teardown_frame(cursor: Cursor) -> Vec<u8> {
    let mut frame = Vec::with_capacity(32);
    frame.extend_from_slice(CLEAR_SCREEN);
    frame.extend_from_slice(CURSOR_HOME);
    cursor_to(&mut frame, cursor);
    frame.extend_from_slice(CURSOR_HOME);
    frame
}

/// Writes frames to the terminal output.
pub struct Renderer<W: Write> {
    out: W,
    banner: String,
    frames: u64,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, banner: impl Into<String>) -> Self {
        Self {
            out,
            banner: banner.into(),
            frames: 0,
        }
    }

    pub fn render(&mut self, geometry: Geometry, cursor: Cursor, draw_rows: bool) -> Result<()> {
        let frame = if draw_rows {
            render_frame(geometry, cursor, true, &self.banner)
        } else {
            teardown_frame(cursor)
        };

        self.out.write_all(&frame).map_err(TerminalError::Output)?;
        self.out.flush().map_err(TerminalError::Output)?;

        self.frames += 1;
        trace!(frame = self.frames, bytes = frame.len(), draw_rows, "rendered");
        Ok(())
    }

    /// Number of frames written so far.
    #[allow(dead_code)]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[allow(dead_code)]
    pub fn writer(&self) -> &W {
        &self.out
    }
}
