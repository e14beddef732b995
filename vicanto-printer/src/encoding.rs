//! Windows-1252 encoding utilities for European thermal printers
//!
//! Receipt printers sold in Italy ship with the WPC1252 code table, which
//! covers accented Latin letters and the Euro sign in a single byte.
//! This module provides utilities for:
//! - Calculating printed column widths
//! - Truncating/padding strings to a column width
//! - Converting UTF-8 to Windows-1252 while preserving ESC/POS commands

use tracing::instrument;

/// ESC t 16 - Select character code table WPC1252
const SELECT_CP1252: [u8; 3] = [0x1B, 0x74, 16];

/// Byte printed for characters outside the code table
const REPLACEMENT: u8 = b'?';

/// Get the printed width of a string in columns
///
/// Every character maps to exactly one byte in Windows-1252 (unmappable
/// characters are replaced by `?`), so width equals the character count.
pub fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// Truncate a string to fit within a column width
pub fn truncate_text(s: &str, max_width: usize) -> String {
    s.chars().take(max_width).collect()
}

/// Pad a string to a specific column width
///
/// If the string is longer than the width, it will be truncated.
pub fn pad_text(s: &str, width: usize, align_right: bool) -> String {
    let current_width = text_width(s);
    if current_width >= width {
        return truncate_text(s, width);
    }
    let spaces = width - current_width;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to Windows-1252
///
/// ASCII bytes (0x00-0x7F) are kept exactly as is, which protects ESC/POS
/// commands from being corrupted. Only bytes >= 0x80 are treated as UTF-8
/// sequences and re-encoded.
///
/// The WPC1252 code table is selected at the start and again after every
/// INIT command (ESC @), which resets the printer to its factory table.
#[instrument(skip(bytes))]
pub fn convert_to_cp1252(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len() + SELECT_CP1252.len());
    result.extend_from_slice(&SELECT_CP1252);

    let mut buffer = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b == 0x1B && i + 1 < bytes.len() && bytes[i + 1] == 0x40 {
            flush_buffer(&mut buffer, &mut result);
            result.extend_from_slice(&[0x1B, 0x40]);
            result.extend_from_slice(&SELECT_CP1252);
            i += 2;
            continue;
        }

        if b < 128 {
            flush_buffer(&mut buffer, &mut result);
            result.push(b);
        } else {
            buffer.push(b);
        }
        i += 1;
    }

    flush_buffer(&mut buffer, &mut result);
    result
}

/// Flush the non-ASCII buffer, converting UTF-8 to Windows-1252
fn flush_buffer(buffer: &mut Vec<u8>, result: &mut Vec<u8>) {
    if buffer.is_empty() {
        return;
    }

    let s = String::from_utf8_lossy(buffer);
    let mut tmp = [0u8; 4];
    for c in s.chars() {
        let (encoded, _, had_errors) = encoding_rs::WINDOWS_1252.encode(c.encode_utf8(&mut tmp));
        if had_errors || encoded.len() != 1 {
            result.push(REPLACEMENT);
        } else {
            result.extend_from_slice(&encoded);
        }
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("hello"), 5);
        assert_eq!(text_width("€4.50"), 5);
        assert_eq!(text_width("Caffè"), 5);
    }

    #[test]
    fn test_truncate_and_pad() {
        assert_eq!(truncate_text("hello world", 5), "hello");
        assert_eq!(pad_text("hi", 5, false), "hi   ");
        assert_eq!(pad_text("hi", 5, true), "   hi");
        assert_eq!(pad_text("Pistacchio", 5, false), "Pista");
    }

    #[test]
    fn test_euro_and_accents_are_single_bytes() {
        let out = convert_to_cp1252("€ è".as_bytes());
        assert_eq!(&out[..3], &SELECT_CP1252);
        assert_eq!(&out[3..], &[0x80, b' ', 0xE8]);
    }

    #[test]
    fn test_commands_are_preserved() {
        let input = [0x1B, 0x45, 0x01, b'A', 0x1B, 0x45, 0x00];
        let out = convert_to_cp1252(&input);
        assert_eq!(&out[3..], &input);
    }

    #[test]
    fn test_code_table_reselected_after_init() {
        let out = convert_to_cp1252(&[0x1B, 0x40, b'x']);
        assert_eq!(out, vec![0x1B, 0x74, 16, 0x1B, 0x40, 0x1B, 0x74, 16, b'x']);
    }

    #[test]
    fn test_unmappable_character_is_replaced() {
        let out = convert_to_cp1252("你".as_bytes());
        assert_eq!(&out[3..], &[REPLACEMENT]);
    }
}
