//! Visual-column math for byte-oriented text display.
//!
//! The viewer works on raw bytes with single-byte code tables, so every byte
//! occupies one display column except `\t`, which expands to the next tab
//! stop. All functions here are pure; the column origin is the start of the
//! displayed row.

/// Default tab stop width; the effective value comes from `ViewerConfig`.
pub const TAB_WIDTH: usize = 8;

/// Number of columns a tab consumes when it starts at `col`.
#[inline]
pub fn tab_advance(col: usize, tab_width: usize) -> usize {
    tab_width - (col % tab_width)
}

/// Bytes that bind a search match into a word: alphanumerics and `_`.
#[inline]
pub fn is_word_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Expanded display width of `bytes`, starting at column 0.
pub fn display_len(bytes: &[u8], tab_width: usize) -> usize {
    let mut col = 0;
    for &b in bytes {
        col += if b == b'\t' {
            tab_advance(col, tab_width)
        } else {
            1
        };
    }
    col
}

/// Display column at which the byte at `idx` starts.
///
/// `idx == bytes.len()` yields the column just past the last byte.
pub fn col_of_byte(bytes: &[u8], idx: usize, tab_width: usize) -> usize {
    debug_assert!(idx <= bytes.len());
    display_len(&bytes[..idx.min(bytes.len())], tab_width)
}

/// Index of the byte whose display span covers `col`.
///
/// Columns past the end of the expanded row map to `bytes.len()`, which lets
/// hit-testing clamp a click beyond the line end to the line end.
pub fn byte_at_col(bytes: &[u8], col: usize, tab_width: usize) -> usize {
    let mut cur = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let w = if b == b'\t' {
            tab_advance(cur, tab_width)
        } else {
            1
        };
        if col < cur + w {
            return i;
        }
        cur += w;
    }
    bytes.len()
}

/// Length in bytes of the longest prefix whose expanded width fits `width`.
///
/// Used to cut wrap fragments. Always consumes at least one byte from a
/// non-empty slice so fragmentation makes progress even when a single tab
/// overflows a narrow view.
pub fn split_at_width(bytes: &[u8], width: usize, tab_width: usize) -> usize {
    let mut col = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let w = if b == b'\t' {
            tab_advance(col, tab_width)
        } else {
            1
        };
        if col + w > width {
            return i.max(1);
        }
        col += w;
    }
    bytes.len()
}
