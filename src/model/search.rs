//! Bidirectional search over the windowed file.
//!
//! Literal patterns scan ceiling-sized chunks with a `len - 1` overlap so a
//! hit straddling a chunk edge is never lost. Regex patterns are evaluated
//! one line at a time and never span a line boundary; while such a search
//! runs, NUL is treated as a terminator and over-ceiling lines are cut, so
//! binary runs cannot stall the scan or trigger mode-switch prompts.
//!
//! Cancellation is cooperative: the engine polls a token at every chunk or
//! line, which bounds the latency of a cancel to one ceiling's worth of
//! I/O. An interrupted or unsuccessful search leaves the cursor where it
//! started.

use crate::config::{EolRules, ViewerConfig};
use crate::error::{PatternError, ReadError};
use crate::model::line_index::{find_next_eol, find_previous_eol, EolScan};
use crate::model::window::WindowBuffer;
use crate::primitives::display::is_word_byte;
use regex::bytes::{Regex, RegexBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    /// Raw bytes, matched anywhere (also used for hex-entered patterns).
    Literal(Vec<u8>),
    /// Regex source, evaluated per line.
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub pattern: PatternKind,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

/// Parse hex notation like `"0D 0A 00"` or `"0d0a00"` into literal bytes.
/// Separators (spaces, commas) are ignored; the digit count must be even.
pub fn parse_hex_pattern(text: &str) -> Result<Vec<u8>, PatternError> {
    let mut nibbles = Vec::new();
    for c in text.chars() {
        if c.is_whitespace() || c == ',' {
            continue;
        }
        let v = c.to_digit(16).ok_or_else(|| PatternError {
            pattern: text.to_string(),
            message: format!("'{c}' is not a hex digit"),
        })?;
        nibbles.push(v as u8);
    }
    if nibbles.is_empty() || nibbles.len() % 2 != 0 {
        return Err(PatternError {
            pattern: text.to_string(),
            message: "hex pattern needs an even, non-zero number of digits".to_string(),
        });
    }
    Ok(nibbles.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
}

impl SearchRequest {
    pub fn compile(&self) -> Result<CompiledSearch, PatternError> {
        let kind = match &self.pattern {
            PatternKind::Literal(bytes) => {
                if bytes.is_empty() {
                    return Err(PatternError {
                        pattern: String::new(),
                        message: "empty pattern".to_string(),
                    });
                }
                CompiledKind::Literal {
                    needle: bytes.clone(),
                    case_sensitive: self.case_sensitive,
                }
            }
            PatternKind::Pattern(src) => {
                let re = RegexBuilder::new(src)
                    .case_insensitive(!self.case_sensitive)
                    .unicode(false)
                    .multi_line(false)
                    .build()
                    .map_err(|e| PatternError {
                        pattern: src.clone(),
                        message: e.to_string(),
                    })?;
                CompiledKind::Pattern(re)
            }
        };
        Ok(CompiledSearch {
            kind,
            whole_word: self.whole_word,
        })
    }
}

#[derive(Debug)]
pub struct CompiledSearch {
    kind: CompiledKind,
    whole_word: bool,
}

#[derive(Debug)]
enum CompiledKind {
    Literal { needle: Vec<u8>, case_sensitive: bool },
    Pattern(Regex),
}

/// Shared flag the caller flips to abort a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found { start: u64, end: u64 },
    NotFound,
    /// The cancel token fired; distinct from `NotFound` so the shell does
    /// not report "no match" for a search the user aborted.
    Interrupted,
    /// The pattern matched zero bytes; selecting nothing is useless, the
    /// shell tells the user instead.
    EmptyMatch,
}

/// Search cursor plus the run loop.
///
/// The cursor is an exclusive frontier: a forward search finds matches
/// starting at or after it, a backward search finds matches ending at or
/// before it. A hit moves the cursor to the match's far edge for the
/// direction searched, which makes repeating a direction advance past the
/// hit while reversing direction re-finds it first.
#[derive(Debug, Default)]
pub struct SearchEngine {
    cursor: u64,
}

impl SearchEngine {
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn set_cursor(&mut self, offset: u64) {
        self.cursor = offset;
    }

    pub fn run(
        &mut self,
        search: &CompiledSearch,
        direction: Direction,
        win: &mut WindowBuffer,
        cfg: &ViewerConfig,
        cancel: &CancelToken,
    ) -> Result<SearchOutcome, ReadError> {
        let from = self.cursor.min(win.file_size());
        let outcome = match (&search.kind, direction) {
            (CompiledKind::Literal { needle, case_sensitive }, Direction::Forward) => {
                literal_forward(needle, *case_sensitive, search.whole_word, win, cfg, cancel, from)?
            }
            (CompiledKind::Literal { needle, case_sensitive }, Direction::Backward) => {
                literal_backward(needle, *case_sensitive, search.whole_word, win, cfg, cancel, from)?
            }
            (CompiledKind::Pattern(re), Direction::Forward) => {
                pattern_forward(re, search.whole_word, win, cfg, cancel, from)?
            }
            (CompiledKind::Pattern(re), Direction::Backward) => {
                pattern_backward(re, search.whole_word, win, cfg, cancel, from)?
            }
        };
        if let SearchOutcome::Found { start, end } = outcome {
            self.cursor = match direction {
                Direction::Forward => end,
                Direction::Backward => start,
            };
            tracing::debug!(start, end, "search hit");
        }
        Ok(outcome)
    }
}

fn bytes_match(hay: &[u8], needle: &[u8], case_sensitive: bool) -> bool {
    if case_sensitive {
        hay == needle
    } else {
        hay.eq_ignore_ascii_case(needle)
    }
}

fn scan_forward(hay: &[u8], needle: &[u8], from: usize, case_sensitive: bool) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - needle.len())
        .find(|&i| bytes_match(&hay[i..i + needle.len()], needle, case_sensitive))
}

/// Rightmost occurrence fully inside `hay[..limit]`.
fn scan_backward(hay: &[u8], needle: &[u8], limit: usize, case_sensitive: bool) -> Option<usize> {
    let limit = limit.min(hay.len());
    if needle.len() > limit {
        return None;
    }
    (0..=limit - needle.len())
        .rev()
        .find(|&i| bytes_match(&hay[i..i + needle.len()], needle, case_sensitive))
}

/// Whole-word test against the bytes adjacent to `[start, end)` in the
/// file. A neighbor past either file edge passes; the bytes are fetched
/// through the window so a match at a chunk edge is judged by file
/// content.
fn neighbors_reject(win: &mut WindowBuffer, start: u64, end: u64) -> Result<bool, ReadError> {
    if start > 0 {
        if let Some(b) = win.byte_at(start - 1)? {
            if is_word_byte(b) {
                return Ok(true);
            }
        }
    }
    if let Some(b) = win.byte_at(end)? {
        if is_word_byte(b) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn literal_forward(
    needle: &[u8],
    case_sensitive: bool,
    whole_word: bool,
    win: &mut WindowBuffer,
    cfg: &ViewerConfig,
    cancel: &CancelToken,
    from: u64,
) -> Result<SearchOutcome, ReadError> {
    let chunk_len = cfg.max_line_len as usize;
    let n = needle.len();
    let mut pos = from;
    loop {
        if cancel.is_cancelled() {
            return Ok(SearchOutcome::Interrupted);
        }
        // Owned copy: the whole-word probe below may move the window.
        let chunk = win.ensure(pos, chunk_len)?.to_vec();
        if chunk.len() < n {
            return Ok(SearchOutcome::NotFound);
        }
        let mut start_at = 0;
        while let Some(i) = scan_forward(&chunk, needle, start_at, case_sensitive) {
            let (s, e) = (pos + i as u64, pos + (i + n) as u64);
            if whole_word && neighbors_reject(win, s, e)? {
                start_at = i + 1;
                continue;
            }
            return Ok(SearchOutcome::Found { start: s, end: e });
        }
        // Step so a match straddling the chunk edge stays findable.
        pos += (chunk.len() - (n - 1)) as u64;
    }
}

fn literal_backward(
    needle: &[u8],
    case_sensitive: bool,
    whole_word: bool,
    win: &mut WindowBuffer,
    cfg: &ViewerConfig,
    cancel: &CancelToken,
    from: u64,
) -> Result<SearchOutcome, ReadError> {
    let chunk_len = cfg.max_line_len;
    let n = needle.len();
    let mut pos = from; // exclusive end of the searched region
    loop {
        if cancel.is_cancelled() {
            return Ok(SearchOutcome::Interrupted);
        }
        if pos < n as u64 {
            return Ok(SearchOutcome::NotFound);
        }
        let lo = pos.saturating_sub(chunk_len);
        let chunk = win.ensure(lo, (pos - lo) as usize)?.to_vec();
        let mut limit = chunk.len();
        while let Some(i) = scan_backward(&chunk, needle, limit, case_sensitive) {
            let (s, e) = (lo + i as u64, lo + (i + n) as u64);
            if whole_word && neighbors_reject(win, s, e)? {
                // Pull the window to just before the rejected match's end;
                // earlier overlapping matches stay reachable.
                limit = i + n - 1;
                continue;
            }
            return Ok(SearchOutcome::Found { start: s, end: e });
        }
        if lo == 0 {
            return Ok(SearchOutcome::NotFound);
        }
        // Keep n-1 bytes of overlap below the chunk edge.
        pos = lo + (n - 1) as u64;
    }
}

fn pattern_forward(
    re: &Regex,
    whole_word: bool,
    win: &mut WindowBuffer,
    cfg: &ViewerConfig,
    cancel: &CancelToken,
    from: u64,
) -> Result<SearchOutcome, ReadError> {
    let eol = search_eol_rules(&cfg.eol);
    let ceiling = cfg.max_line_len;

    let mut line_begin = match find_previous_eol(win, &eol, from, from.saturating_sub(ceiling))? {
        EolScan::Found { next, .. } => next,
        EolScan::NoBoundary => from.saturating_sub(ceiling),
    };
    loop {
        if cancel.is_cancelled() {
            return Ok(SearchOutcome::Interrupted);
        }
        let size = win.file_size();
        if line_begin >= size {
            return Ok(SearchOutcome::NotFound);
        }
        let max = size.min(line_begin + ceiling);
        let (line_end, next_begin) = match find_next_eol(win, &eol, line_begin, max)? {
            EolScan::Found { at, next } => (at, next),
            EolScan::NoBoundary => (max, max),
        };
        if line_begin < line_end {
            let line = win.ensure(line_begin, (line_end - line_begin) as usize)?.to_vec();
            let mut start_in_line = if from > line_begin {
                ((from - line_begin) as usize).min(line.len())
            } else {
                0
            };
            while let Some(m) = re.find_at(&line, start_in_line) {
                if whole_word && line_neighbors_reject(&line, m.start(), m.end()) {
                    start_in_line = m.start() + 1;
                    if start_in_line > line.len() {
                        break;
                    }
                    continue;
                }
                if m.start() == m.end() {
                    return Ok(SearchOutcome::EmptyMatch);
                }
                return Ok(SearchOutcome::Found {
                    start: line_begin + m.start() as u64,
                    end: line_begin + m.end() as u64,
                });
            }
        }
        line_begin = next_begin.max(line_begin + 1);
    }
}

fn pattern_backward(
    re: &Regex,
    whole_word: bool,
    win: &mut WindowBuffer,
    cfg: &ViewerConfig,
    cancel: &CancelToken,
    from: u64,
) -> Result<SearchOutcome, ReadError> {
    let eol = search_eol_rules(&cfg.eol);
    let ceiling = cfg.max_line_len;

    let mut line_end = match find_next_eol(win, &eol, from, from + ceiling)? {
        EolScan::Found { at, .. } => at,
        EolScan::NoBoundary => from.min(win.file_size()),
    };
    loop {
        if cancel.is_cancelled() {
            return Ok(SearchOutcome::Interrupted);
        }
        if line_end == 0 {
            return Ok(SearchOutcome::NotFound);
        }
        let scan_min = line_end.saturating_sub(ceiling);
        let (line_begin, prev_end) = match find_previous_eol(win, &eol, line_end, scan_min)? {
            EolScan::Found { at, next } => (next, at),
            EolScan::NoBoundary => (scan_min, scan_min),
        };
        if line_begin < line_end {
            let line = win.ensure(line_begin, (line_end - line_begin) as usize)?.to_vec();
            // Matches must end at or before the cursor on the cursor's own
            // line; earlier lines search in full.
            let mut limit = if from < line_end {
                (from.saturating_sub(line_begin)) as usize
            } else {
                line.len()
            };
            while let Some((s, e)) = last_match_within(re, &line, limit) {
                if whole_word && line_neighbors_reject(&line, s, e) {
                    if e <= 1 {
                        break;
                    }
                    limit = e - 1;
                    continue;
                }
                if s == e {
                    return Ok(SearchOutcome::EmptyMatch);
                }
                return Ok(SearchOutcome::Found {
                    start: line_begin + s as u64,
                    end: line_begin + e as u64,
                });
            }
        }
        debug_assert!(prev_end < line_end, "backward line walk must retreat");
        line_end = prev_end;
    }
}

/// Regex search works on lines, so binary data must still break into
/// lines: force the NUL rule on for the duration of the search.
fn search_eol_rules(eol: &EolRules) -> EolRules {
    EolRules { nul: true, ..*eol }
}

/// Rightmost match inside `line[..limit]`.
fn last_match_within(re: &Regex, line: &[u8], limit: usize) -> Option<(usize, usize)> {
    let limit = limit.min(line.len());
    re.find_iter(&line[..limit])
        .last()
        .map(|m| (m.start(), m.end()))
}

/// Whole-word probe bounded to the line: a match flush against the line
/// edge has an EOL for a neighbor, which can never be a word byte.
fn line_neighbors_reject(line: &[u8], start: usize, end: usize) -> bool {
    (start > 0 && is_word_byte(line[start - 1]))
        || (end < line.len() && is_word_byte(line[end]))
}
