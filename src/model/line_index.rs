//! Line-boundary discovery over the sliding window.
//!
//! Everything here is restartable: given any byte offset the indexer finds
//! the surrounding line boundaries by bounded scans through `WindowBuffer`,
//! so results do not depend on what happens to be resident. A "line" in
//! wrap mode is one displayed row; rows produced by wrapping carry a
//! synthesized boundary that is explicitly distinct from a true EOL —
//! offset arithmetic alone cannot tell the two apart at a wrap join, the
//! tag can.

use crate::config::{EolRules, ViewerConfig};
use crate::error::{ReadError, ViewError};
use crate::model::window::WindowBuffer;
use crate::primitives::display;

/// What terminates a displayed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// A real terminator from the configured EOL rule set.
    Eol,
    /// Synthesized break: wrap at the display width, or a ceiling cut in
    /// forced text mode. The byte stream continues without a gap.
    Wrap,
    /// The file ended without a terminator.
    EndOfFile,
}

/// One displayed row.
///
/// `end` excludes the EOL bytes; `next_begin` is where the following row
/// starts (`end + eol_len` after a true EOL, exactly `end` after a wrap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRecord {
    pub begin: u64,
    pub end: u64,
    pub next_begin: u64,
    /// Tab-expanded column count of the row's own bytes.
    pub display_len: u32,
    pub boundary: BoundaryKind,
}

impl LineRecord {
    /// Whether `offset` belongs to this row. The EOL bytes belong to the
    /// row they terminate; the shared offset at a wrap join belongs to the
    /// *lower* row (callers apply the drawing asymmetry on top of this).
    pub fn contains(&self, offset: u64) -> bool {
        if self.boundary == BoundaryKind::EndOfFile {
            self.begin <= offset && offset <= self.end
        } else {
            self.begin <= offset && offset < self.next_begin
        }
    }
}

/// Result of a directional EOL scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EolScan {
    /// `at` is the first byte of the terminator, `next` the offset just
    /// past it (the begin of the following line).
    Found { at: u64, next: u64 },
    NoBoundary,
}

/// Find the first terminator at or after `from`, looking no further than
/// `max`. A CRLF pair whose CR sits at `max - 1` is still recognized — the
/// scan reads one byte of lookahead rather than guessing.
pub fn find_next_eol(
    win: &mut WindowBuffer,
    eol: &EolRules,
    from: u64,
    max: u64,
) -> Result<EolScan, ReadError> {
    let max = max.min(win.file_size());
    if from >= max {
        return Ok(EolScan::NoBoundary);
    }
    let span = (max - from) as usize;
    let chunk = win.ensure(from, span + 1)?;
    let scan_len = span.min(chunk.len());

    let mut i = 0;
    while i < scan_len {
        let b = chunk[i];
        if b == 0 && eol.nul {
            return Ok(EolScan::Found { at: from + i as u64, next: from + i as u64 + 1 });
        }
        if b == b'\r' {
            if eol.crlf && chunk.get(i + 1) == Some(&b'\n') {
                return Ok(EolScan::Found { at: from + i as u64, next: from + i as u64 + 2 });
            }
            if eol.cr {
                return Ok(EolScan::Found { at: from + i as u64, next: from + i as u64 + 1 });
            }
        }
        if b == b'\n' && eol.lf {
            return Ok(EolScan::Found { at: from + i as u64, next: from + i as u64 + 1 });
        }
        i += 1;
    }
    Ok(EolScan::NoBoundary)
}

/// Find the last terminator that ends at or before `from`, starting no
/// earlier than `min`. `Found::next` is the begin of the line containing
/// `from`.
pub fn find_previous_eol(
    win: &mut WindowBuffer,
    eol: &EolRules,
    from: u64,
    min: u64,
) -> Result<EolScan, ReadError> {
    let from = from.min(win.file_size());
    if from == 0 || from <= min {
        return Ok(EolScan::NoBoundary);
    }
    // One extra byte below `min` so a CRLF pair straddling `min` is seen
    // as the pair it is.
    let pre = u64::from(min > 0);
    let lo = min - pre;
    let chunk = win.ensure(lo, (from - lo) as usize)?;
    let len = chunk.len();

    let mut j = len;
    while j > pre as usize {
        j -= 1;
        let b = chunk[j];
        let at = lo + j as u64;
        if b == b'\n' {
            if eol.crlf && j > 0 && chunk[j - 1] == b'\r' {
                return Ok(EolScan::Found { at: at - 1, next: at + 1 });
            }
            if eol.lf {
                return Ok(EolScan::Found { at, next: at + 1 });
            }
        } else if b == b'\r' {
            // A pair would need the LF at `at + 1`; anything at or past
            // `from` terminates past our range, so only the lone-CR rule
            // can apply here (the in-range LF case was visited first).
            if eol.cr {
                return Ok(EolScan::Found { at, next: at + 1 });
            }
        } else if b == 0 && eol.nul {
            return Ok(EolScan::Found { at, next: at + 1 });
        }
    }
    Ok(EolScan::NoBoundary)
}

/// Produce the displayed row starting at `begin`.
///
/// `wrap_width` is `Some(columns)` in wrap mode. Returns `Ok(None)` at end
/// of file. A line longer than the ceiling with wrap off is a `LongLine`
/// error unless `force_text` is set, in which case the ceiling cut behaves
/// exactly like a wrap break.
pub fn next_record(
    win: &mut WindowBuffer,
    cfg: &ViewerConfig,
    begin: u64,
    wrap_width: Option<usize>,
    force_text: bool,
) -> Result<Option<LineRecord>, ViewError> {
    let size = win.file_size();
    if begin >= size {
        return Ok(None);
    }
    let max = size.min(begin + cfg.max_line_len);
    let (line_end, next_begin, boundary) = match find_next_eol(win, &cfg.eol, begin, max)? {
        EolScan::Found { at, next } => (at, next, BoundaryKind::Eol),
        EolScan::NoBoundary => {
            if max == size {
                (size, size, BoundaryKind::EndOfFile)
            } else if wrap_width.is_some() || force_text {
                (max, max, BoundaryKind::Wrap)
            } else {
                return Err(ViewError::LongLine { begin });
            }
        }
    };

    if let Some(w) = wrap_width {
        let w = w.max(1);
        let bytes = win.ensure(begin, (line_end - begin) as usize)?;
        if display::display_len(bytes, cfg.tab_width) > w {
            let cut = display::split_at_width(bytes, w, cfg.tab_width);
            // cut == len happens only when a single byte overflows the
            // width (a tab on a narrow view); the row then stands as is.
            if cut < bytes.len() {
                let display_len = display::display_len(&bytes[..cut], cfg.tab_width) as u32;
                let frag_end = begin + cut as u64;
                return Ok(Some(LineRecord {
                    begin,
                    end: frag_end,
                    next_begin: frag_end,
                    display_len,
                    boundary: BoundaryKind::Wrap,
                }));
            }
        }
    }

    let bytes = win.ensure(begin, (line_end - begin) as usize)?;
    let display_len = display::display_len(bytes, cfg.tab_width) as u32;
    Ok(Some(LineRecord {
        begin,
        end: line_end,
        next_begin,
        display_len,
        boundary,
    }))
}

/// Snap an arbitrary offset (scrollbar thumb, restored position) to the
/// begin of the row containing it.
pub fn find_begin(
    win: &mut WindowBuffer,
    cfg: &ViewerConfig,
    seek: u64,
    wrap_width: Option<usize>,
    force_text: bool,
) -> Result<u64, ViewError> {
    let seek = seek.min(win.file_size());
    if seek == 0 {
        return Ok(0);
    }
    let line_begin = line_begin_near(win, cfg, seek, wrap_width, force_text)?;
    // Walk the line's rows to the one containing `seek` — one step for a
    // plain line, several across wrap fragments or forced ceiling cuts.
    let mut begin = line_begin;
    loop {
        let rec = match next_record(win, cfg, begin, wrap_width, force_text)? {
            Some(rec) => rec,
            None => return Ok(begin),
        };
        if rec.contains(seek) || rec.next_begin > seek {
            return Ok(rec.begin);
        }
        debug_assert!(rec.next_begin > begin, "row walk must advance");
        begin = rec.next_begin;
    }
}

/// The displayed row immediately above `top`, or `None` when `top` is the
/// start of the file. `top` must itself be a row begin.
pub fn record_ending_at(
    win: &mut WindowBuffer,
    cfg: &ViewerConfig,
    top: u64,
    wrap_width: Option<usize>,
    force_text: bool,
) -> Result<Option<LineRecord>, ViewError> {
    if top == 0 {
        return Ok(None);
    }
    let top = top.min(win.file_size());
    let eol = &cfg.eol;

    // Does an EOL end exactly at `top`? If so the previous line's content
    // stops before it; otherwise `top` sits on a synthesized break and the
    // content runs right up to it.
    let mut prev_end = top;
    if let Some(b) = win.byte_at(top - 1)? {
        if b == b'\n' {
            if eol.crlf && top >= 2 && win.byte_at(top - 2)? == Some(b'\r') {
                prev_end = top - 2;
            } else if eol.lf {
                prev_end = top - 1;
            }
        } else if (b == b'\r' && eol.cr) || (b == 0 && eol.nul) {
            prev_end = top - 1;
        }
    }

    // Walk the previous line's rows to the one ending at `top` — the last
    // wrap fragment in wrap mode, the whole line otherwise.
    let line_begin = line_begin_near(win, cfg, prev_end, wrap_width, force_text)?;
    let mut begin = line_begin;
    loop {
        let rec = match next_record(win, cfg, begin, wrap_width, force_text)? {
            Some(rec) => rec,
            None => return Ok(None),
        };
        if rec.next_begin >= top {
            return Ok(Some(rec));
        }
        debug_assert!(rec.next_begin > begin, "row walk must advance");
        begin = rec.next_begin;
    }
}

/// Byte length of the row immediately above `top`; scrolling up one visual
/// row moves the top by exactly this much.
pub fn zero_line_size(
    win: &mut WindowBuffer,
    cfg: &ViewerConfig,
    top: u64,
    wrap_width: Option<usize>,
    force_text: bool,
) -> Result<u64, ViewError> {
    Ok(record_ending_at(win, cfg, top, wrap_width, force_text)?
        .map(|rec| top - rec.begin)
        .unwrap_or(0))
}

/// Begin of the logical line containing `pos` (ceiling-bounded backward
/// scan; a scan that comes up empty inside the ceiling synthesizes a begin
/// at the scan floor when wrap or forced text allows it).
fn line_begin_near(
    win: &mut WindowBuffer,
    cfg: &ViewerConfig,
    pos: u64,
    wrap_width: Option<usize>,
    force_text: bool,
) -> Result<u64, ViewError> {
    let scan_min = pos.saturating_sub(cfg.max_line_len);
    match find_previous_eol(win, &cfg.eol, pos, scan_min)? {
        EolScan::Found { next, .. } => Ok(next),
        EolScan::NoBoundary => {
            if scan_min == 0 {
                Ok(0)
            } else if wrap_width.is_some() || force_text {
                Ok(scan_min)
            } else {
                Err(ViewError::LongLine { begin: scan_min })
            }
        }
    }
}
