//! Terminal stand-in for the LED matrix.
//!
//! Each frame is printed as one line: the glyph marker (if any) followed by
//! the text, padded to the display width according to the frame alignment.

use std::io::Write;

use ticker_engine::{Alignment, Frame, GlyphKind, Renderer};
use tracing::warn;

/// Columns of the emulated display.
pub const DEFAULT_WIDTH: usize = 32;

pub struct TerminalRenderer<W> {
    out: W,
    width: usize,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout(), DEFAULT_WIDTH)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, width: usize) -> Self {
        Self { out, width }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&self, frame: &Frame) -> String {
        let marker = match frame.icon.as_ref().map(|icon| icon.glyph.kind) {
            Some(GlyphKind::Heart) => "♥ ",
            Some(GlyphKind::Brand) => "▣ ",
            None => "",
        };
        let text = pad(&frame.text, self.width, frame.alignment);
        format!("{marker}{text}")
    }
}

fn pad(text: &str, width: usize, alignment: Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let room = width - len;
    let (left, right) = match alignment {
        Alignment::Left => (0, room),
        Alignment::Center => (room / 2, room - room / 2),
        Alignment::Right => (room, 0),
    };
    format!("{}{text}{}", " ".repeat(left), " ".repeat(right))
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, frame: &Frame) {
        let line = self.line(frame);
        let written = writeln!(self.out, "{}", line.trim_end()).and_then(|_| self.out.flush());
        if let Err(e) = written {
            warn!(error = %e, "Failed to write frame");
        }
    }
}
