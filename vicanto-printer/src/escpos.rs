//! ESC/POS command builder
//!
//! Chainable builder over a raw byte buffer. Text is kept as UTF-8
//! until [`EscPosBuilder::build`] re-encodes it for the printer.

use crate::encoding::{convert_to_cp1252, pad_text, text_width};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;

/// Horizontal justification (ESC a n)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left = 0,
    Center = 1,
    Right = 2,
}

/// Character magnification (GS ! n)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSize {
    Normal = 0x00,
    DoubleHeight = 0x01,
    Double = 0x11,
}

pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// `width` is characters per line: 32 on 58mm paper, 48 on 80mm
    pub fn new(width: usize) -> Self {
        let mut builder = Self {
            buf: Vec::with_capacity(1024),
            width,
        };
        builder.cmd(&[ESC, b'@']);
        builder
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn cmd(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn text(&mut self, s: &str) -> &mut Self {
        self.cmd(s.as_bytes())
    }

    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s).newline()
    }

    pub fn newline(&mut self) -> &mut Self {
        self.cmd(b"\n")
    }

    /// ESC d n
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.cmd(&[ESC, b'd', lines])
    }

    pub fn align(&mut self, align: Align) -> &mut Self {
        self.cmd(&[ESC, b'a', align as u8])
    }

    /// ESC E n
    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.cmd(&[ESC, b'E', u8::from(on)])
    }

    pub fn size(&mut self, size: TextSize) -> &mut Self {
        self.cmd(&[GS, b'!', size as u8])
    }

    /// Full-width rule of `ch`
    pub fn rule(&mut self, ch: char) -> &mut Self {
        let rule: String = std::iter::repeat_n(ch, self.width).collect();
        self.line(&rule)
    }

    /// Label left, value right on one line
    ///
    /// A label too long for the line is cut so the value stays on the
    /// right edge; a value wider than the paper is printed after a space.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let rw = text_width(right);
        if rw >= self.width {
            let joined = format!("{left} {right}");
            return self.line(&joined);
        }
        let label = pad_text(left, self.width - rw, false);
        self.text(&label).line(right)
    }

    /// GS V 0
    pub fn cut(&mut self) -> &mut Self {
        self.cmd(&[GS, b'V', 0x00])
    }

    /// GS V 66 n: feed `lines` then full cut, printer handles the
    /// cutter-to-head offset
    pub fn cut_feed(&mut self, lines: u8) -> &mut Self {
        self.cmd(&[GS, b'V', 66, lines])
    }

    /// Bytes ready for the printer, text in Windows-1252
    pub fn build(self) -> Vec<u8> {
        convert_to_cp1252(&self.buf)
    }

    /// Bytes as built, text still UTF-8
    pub fn build_raw(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(48)
    }
}
