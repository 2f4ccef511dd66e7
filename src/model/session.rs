//! One open file in the viewer: the session owns the window, the indexers'
//! state, the selection, and the search cursor, and coordinates them when
//! the mode, wrap flag, encoding, or the file itself changes.
//!
//! There are no process-wide globals; two viewer windows are simply two
//! sessions. Everything runs on the caller's thread and the caller must
//! not re-enter a session while one of its operations is in flight.

use crate::config::ViewerConfig;
use crate::error::{ReadError, ViewError};
use crate::model::byte_source::ByteSource;
use crate::model::hex::{self, HexRecord};
use crate::model::line_index::{
    find_begin, next_record, record_ending_at, zero_line_size, BoundaryKind, LineRecord,
};
use crate::model::search::{
    CancelToken, CompiledSearch, Direction, SearchEngine, SearchOutcome,
};
use crate::model::selection::{Growth, Selection};
use crate::model::window::WindowBuffer;
use crate::primitives::display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Text,
    Hex,
}

/// How many leading bytes are inspected to pick the initial mode.
const DETECT_LEN: usize = 10_000;

/// Longest seed handed to the find dialog from the selection.
const FIND_SEED_LEN: usize = 200;

/// Cached text-mode viewport rows.
struct Layout {
    top: u64,
    width: usize,
    height: usize,
    rows: Vec<LineRecord>,
}

pub struct ViewerSession {
    cfg: ViewerConfig,
    win: WindowBuffer,
    mode: ViewMode,
    wrap: bool,
    force_text: bool,
    code_table: Option<Box<[u8; 256]>>,
    /// Offset of the first visible row; always a row begin (text) — hex
    /// aligns on use.
    top: u64,
    /// Horizontal scroll in columns; display state the shell reads back.
    left_col: usize,
    /// Width of the last built layout, used when wrap math is needed
    /// outside `visible_lines`.
    view_width: usize,
    layout: Option<Layout>,
    selection: Selection,
    search: SearchEngine,
    /// Sticky column for repeated line-wise selection extension.
    sticky_col: Option<usize>,
}

impl ViewerSession {
    /// Open with automatic text/hex detection on the file head.
    pub fn open(source: Box<dyn ByteSource>, cfg: ViewerConfig) -> Result<Self, ReadError> {
        let cfg = cfg.normalized();
        let mut win = WindowBuffer::new(source, cfg.window_capacity)?;
        let head = win.ensure(0, DETECT_LEN.min(cfg.window_capacity / 2))?;
        let mode = detect_mode(head);
        tracing::debug!(?mode, size = win.file_size(), "session opened");
        Ok(Self::assemble(cfg, win, mode))
    }

    /// Open in an explicitly chosen mode, skipping detection.
    pub fn open_with_mode(
        source: Box<dyn ByteSource>,
        cfg: ViewerConfig,
        mode: ViewMode,
    ) -> Result<Self, ReadError> {
        let cfg = cfg.normalized();
        let win = WindowBuffer::new(source, cfg.window_capacity)?;
        Ok(Self::assemble(cfg, win, mode))
    }

    fn assemble(cfg: ViewerConfig, win: WindowBuffer, mode: ViewMode) -> Self {
        Self {
            cfg,
            win,
            mode,
            wrap: false,
            force_text: false,
            code_table: None,
            top: 0,
            left_col: 0,
            view_width: 80,
            layout: None,
            selection: Selection::default(),
            search: SearchEngine::default(),
            sticky_col: None,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn file_size(&self) -> u64 {
        self.win.file_size()
    }

    pub fn top_offset(&self) -> u64 {
        self.top
    }

    pub fn left_col(&self) -> usize {
        self.left_col
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.cfg
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn search_cursor(&self) -> u64 {
        self.search.cursor()
    }

    /// The shell sets the cursor from the view position before a fresh
    /// search (e.g. top of view forward, bottom of view backward).
    pub fn set_search_cursor(&mut self, offset: u64) {
        self.search.set_cursor(offset.min(self.file_size()));
    }

    fn wrap_width(&self) -> Option<usize> {
        self.wrap.then_some(self.view_width)
    }

    /// Switch between text and hex, preserving the file position (not the
    /// screen row) and resetting horizontal scroll.
    pub fn set_mode(&mut self, mode: ViewMode) -> Result<(), ViewError> {
        if mode == self.mode {
            return Ok(());
        }
        self.mode = mode;
        self.left_col = 0;
        self.layout = None;
        let wrap_width = self.wrap_width();
        self.top = match mode {
            ViewMode::Hex => hex::align(self.top),
            ViewMode::Text => {
                find_begin(&mut self.win, &self.cfg, self.top, wrap_width, self.force_text)?
            }
        };
        Ok(())
    }

    pub fn set_wrap(&mut self, wrap: bool) -> Result<(), ViewError> {
        if wrap == self.wrap {
            return Ok(());
        }
        self.wrap = wrap;
        self.left_col = 0;
        self.layout = None;
        if self.mode == ViewMode::Text {
            let wrap_width = self.wrap_width();
            self.top =
                find_begin(&mut self.win, &self.cfg, self.top, wrap_width, self.force_text)?;
        }
        Ok(())
    }

    /// The answer to a `LongLine` error: the user insists on text mode, so
    /// ceiling cuts become wrap-like breaks from here on.
    pub fn force_text_mode(&mut self, force: bool) {
        if self.force_text != force {
            self.force_text = force;
            self.layout = None;
        }
    }

    /// Swap the display code table. Contents come from the shell's code
    /// page store; `None` shows bytes untranslated.
    pub fn set_code_table(&mut self, table: Option<[u8; 256]>) {
        self.code_table = table.map(Box::new);
        self.layout = None;
    }

    pub fn set_left_col(&mut self, col: usize) {
        // Wrap mode has no horizontal scroll by construction.
        self.left_col = if self.wrap { 0 } else { col };
    }

    /// Build (or reuse) the text rows visible from the current top.
    pub fn visible_lines(&mut self, height: usize, width: usize) -> Result<&[LineRecord], ViewError> {
        let reusable = self
            .layout
            .as_ref()
            .is_some_and(|l| l.top == self.top && l.width == width && l.height == height);
        if !reusable {
            self.view_width = width;
            let wrap_width = self.wrap_width();
            let mut rows = Vec::with_capacity(height);
            let mut begin = self.top;
            while rows.len() < height {
                match next_record(&mut self.win, &self.cfg, begin, wrap_width, self.force_text)? {
                    Some(rec) => {
                        begin = rec.next_begin;
                        rows.push(rec);
                    }
                    None => break,
                }
            }
            self.layout = Some(Layout {
                top: self.top,
                width,
                height,
                rows,
            });
        }
        Ok(&self.layout.as_ref().unwrap().rows)
    }

    /// The hex rows visible from the current top. Pure arithmetic; row
    /// bytes are fetched separately via [`ViewerSession::read_span`].
    pub fn visible_records(&self, height: usize) -> Vec<HexRecord> {
        hex::visible_records(self.top, height, self.win.file_size())
    }

    /// Hex offset-column width for the current file.
    pub fn hex_offset_digits(&self) -> usize {
        hex::offset_digits(self.win.file_size())
    }

    /// Raw bytes of `[start, end)` for rendering or extraction.
    pub fn read_span(&mut self, start: u64, end: u64) -> Result<Vec<u8>, ReadError> {
        self.win.read_range(start, end)
    }

    /// Bytes of one text row (EOL excluded).
    pub fn line_bytes(&mut self, rec: &LineRecord) -> Result<Vec<u8>, ReadError> {
        self.win.read_range(rec.begin, rec.end)
    }

    /// Apply the session's code table for display.
    pub fn decode_for_display(&self, bytes: &mut [u8]) {
        if let Some(table) = &self.code_table {
            for b in bytes.iter_mut() {
                *b = table[*b as usize];
            }
        }
    }

    /// File offset under viewport coordinates, for hit-testing pointer
    /// input. Columns are logical (the shell adds its horizontal scroll).
    /// `None` when the row is past the end of the content.
    pub fn offset_at(&mut self, row: usize, col: usize) -> Result<Option<u64>, ReadError> {
        match self.mode {
            ViewMode::Hex => {
                let begin = hex::align(self.top) + hex::BYTES_PER_ROW * row as u64;
                if begin >= self.win.file_size() {
                    return Ok(None);
                }
                let max_col = (self.win.file_size() - begin - 1).min(15) as usize;
                Ok(Some(begin + col.min(max_col) as u64))
            }
            ViewMode::Text => {
                let Some(layout) = self.layout.as_ref() else {
                    return Ok(None);
                };
                let Some(rec) = layout.rows.get(row).copied() else {
                    return Ok(None);
                };
                let bytes = self.win.read_range(rec.begin, rec.end)?;
                let idx = display::byte_at_col(&bytes, col, self.cfg.tab_width);
                Ok(Some(rec.begin + idx as u64))
            }
        }
    }

    /// Viewport coordinates of a file offset, or `None` when not visible.
    ///
    /// At a wrap join one offset belongs to two rows; `growth` picks the
    /// one a selection edge should display on: a forward-growing selection
    /// ends at the end of the upper fragment, a backward-growing one at
    /// the start of the lower.
    pub fn coord_at(
        &mut self,
        offset: u64,
        growth: Growth,
    ) -> Result<Option<(usize, usize)>, ReadError> {
        match self.mode {
            ViewMode::Hex => {
                let top_row = hex::row_of(hex::align(self.top));
                let row = hex::row_of(offset);
                if row < top_row {
                    return Ok(None);
                }
                Ok(Some(((row - top_row) as usize, hex::col_of(offset))))
            }
            ViewMode::Text => {
                let Some(layout) = self.layout.as_ref() else {
                    return Ok(None);
                };
                for (i, rec) in layout.rows.iter().enumerate() {
                    let at_join = rec.boundary == BoundaryKind::Wrap && offset == rec.next_begin;
                    if at_join && growth == Growth::Forward {
                        // Drawn at the end of the upper fragment.
                        return Ok(Some((i, rec.display_len as usize)));
                    }
                    if rec.contains(offset)
                        || (rec.boundary == BoundaryKind::EndOfFile && offset == rec.end)
                    {
                        let bytes = self.win.read_range(rec.begin, rec.end)?;
                        let idx = ((offset - rec.begin) as usize).min(bytes.len());
                        let col = display::col_of_byte(&bytes, idx, self.cfg.tab_width);
                        return Ok(Some((i, col)));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Scroll down `n` visual rows.
    pub fn scroll_down(&mut self, n: usize) -> Result<(), ViewError> {
        match self.mode {
            ViewMode::Hex => {
                let size = self.win.file_size();
                let last_top = hex::align(size.saturating_sub(1));
                self.top = (hex::align(self.top) + hex::BYTES_PER_ROW * n as u64).min(last_top);
            }
            ViewMode::Text => {
                let wrap_width = self.wrap_width();
                for _ in 0..n {
                    let rec = next_record(
                        &mut self.win,
                        &self.cfg,
                        self.top,
                        wrap_width,
                        self.force_text,
                    )?;
                    match rec {
                        Some(r) if r.next_begin < self.win.file_size() => self.top = r.next_begin,
                        _ => break,
                    }
                }
            }
        }
        self.layout = None;
        Ok(())
    }

    /// Scroll up `n` visual rows, moving by exactly one row's bytes each
    /// step.
    pub fn scroll_up(&mut self, n: usize) -> Result<(), ViewError> {
        match self.mode {
            ViewMode::Hex => {
                self.top = hex::align(self.top).saturating_sub(hex::BYTES_PER_ROW * n as u64);
            }
            ViewMode::Text => {
                let wrap_width = self.wrap_width();
                for _ in 0..n {
                    let step = zero_line_size(
                        &mut self.win,
                        &self.cfg,
                        self.top,
                        wrap_width,
                        self.force_text,
                    )?;
                    if step == 0 {
                        break;
                    }
                    self.top -= step;
                }
            }
        }
        self.layout = None;
        Ok(())
    }

    /// Jump to an arbitrary offset (scrollbar thumb), snapping to a row
    /// begin.
    pub fn scroll_to(&mut self, seek: u64) -> Result<(), ViewError> {
        let wrap_width = self.wrap_width();
        self.top = match self.mode {
            ViewMode::Hex => hex::align(seek.min(self.win.file_size())),
            ViewMode::Text => {
                find_begin(&mut self.win, &self.cfg, seek, wrap_width, self.force_text)?
            }
        };
        self.layout = None;
        Ok(())
    }

    /// React to an external "the file changed" notification: re-query the
    /// size, clamp every offset the session holds, and snap the top back
    /// to a clean boundary.
    pub fn file_changed(&mut self) -> Result<(), ViewError> {
        let size = self.win.refresh_size()?;
        self.win.invalidate();
        if self.top > size {
            self.top = size;
        }
        let wrap_width = self.wrap_width();
        self.top = match self.mode {
            ViewMode::Hex => hex::align(self.top.min(size.saturating_sub(1))),
            ViewMode::Text => {
                find_begin(&mut self.win, &self.cfg, self.top, wrap_width, self.force_text)?
            }
        };
        // A top that ended up at EOF would show nothing; back it onto the
        // last remaining row.
        if self.mode == ViewMode::Text && self.top >= size && size > 0 {
            if let Some(rec) =
                record_ending_at(&mut self.win, &self.cfg, size, wrap_width, self.force_text)?
            {
                self.top = rec.begin;
            } else {
                self.top = 0;
            }
        }
        self.selection.clamp_to(size);
        self.search.set_cursor(self.search.cursor().min(size));
        self.layout = None;
        Ok(())
    }

    /// Run a compiled search from the current cursor. A hit becomes the
    /// selection; any other outcome leaves selection and cursor untouched.
    pub fn search(
        &mut self,
        search: &CompiledSearch,
        direction: Direction,
        cancel: &CancelToken,
    ) -> Result<SearchOutcome, ReadError> {
        let outcome = self.search.run(search, direction, &mut self.win, &self.cfg, cancel)?;
        if let SearchOutcome::Found { start, end } = outcome {
            self.selection.set_range(start, end);
        }
        Ok(outcome)
    }

    /// Selection bytes for the clipboard, or `None` (empty / too large).
    pub fn selection_bytes(&mut self) -> Result<Option<Vec<u8>>, ReadError> {
        self.selection.materialize(&mut self.win)
    }

    /// Short selection prefix used to pre-fill the find dialog.
    pub fn find_text_seed(&mut self) -> Result<Option<Vec<u8>>, ReadError> {
        let Some((start, end)) = self.selection.span() else {
            return Ok(None);
        };
        let end = end.min(start + FIND_SEED_LEN as u64);
        self.win.read_range(start, end).map(Some)
    }

    // Selection driving. Click/drag offsets come from `offset_at`.

    pub fn click(&mut self, offset: u64) {
        self.selection.set_from_click(offset.min(self.file_size()));
        self.sticky_col = None;
    }

    pub fn drag_to(&mut self, offset: u64) {
        self.selection.extend_to(offset.min(self.file_size()));
        self.sticky_col = None;
    }

    pub fn finish_selection(&mut self) {
        self.selection.finish();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.sticky_col = None;
    }

    /// Extend the selection by one character.
    pub fn extend_by_char(&mut self, direction: Direction) -> Result<(), ViewError> {
        let active = self.active_or_top();
        let target = match direction {
            Direction::Forward => (active + 1).min(self.file_size()),
            Direction::Backward => active.saturating_sub(1),
        };
        self.selection.extend_to(target);
        self.sticky_col = None;
        Ok(())
    }

    /// Extend the selection one visual row up or down, keeping the column.
    ///
    /// The active end's current row honors the wrap-join asymmetry: a
    /// forward-growing selection ending on a join extends from the upper
    /// fragment, a backward-growing one from the lower.
    pub fn extend_by_line(&mut self, direction: Direction) -> Result<(), ViewError> {
        let active = self.active_or_top();
        let rec = self.displayed_row_of(active)?;
        let col = match self.sticky_col {
            Some(c) => c,
            None => {
                let c = self.col_in_row(&rec, active)?;
                self.sticky_col = Some(c);
                c
            }
        };

        let wrap_width = self.wrap_width();
        let target = match direction {
            Direction::Forward => next_record(
                &mut self.win,
                &self.cfg,
                rec.next_begin,
                wrap_width,
                self.force_text,
            )?,
            Direction::Backward => record_ending_at(
                &mut self.win,
                &self.cfg,
                rec.begin,
                wrap_width,
                self.force_text,
            )?,
        };
        let new_active = match target {
            Some(t) => {
                let bytes = self.win.read_range(t.begin, t.end)?;
                t.begin + display::byte_at_col(&bytes, col, self.cfg.tab_width) as u64
            }
            // Past the edge: file start or file end.
            None => match direction {
                Direction::Forward => self.file_size(),
                Direction::Backward => 0,
            },
        };
        self.selection.extend_to(new_active);
        Ok(())
    }

    /// Extend to the begin or end of the active end's displayed row.
    pub fn extend_to_line_edge(&mut self, direction: Direction) -> Result<(), ViewError> {
        let active = self.active_or_top();
        let rec = self.displayed_row_of(active)?;
        let target = match direction {
            Direction::Backward => rec.begin,
            Direction::Forward => rec.end,
        };
        self.selection.extend_to(target);
        self.sticky_col = None;
        Ok(())
    }

    /// Extend to the start or end of the file.
    pub fn extend_to_file_edge(&mut self, direction: Direction) {
        let target = match direction {
            Direction::Backward => 0,
            Direction::Forward => self.file_size(),
        };
        self.selection.extend_to(target);
        self.sticky_col = None;
    }

    fn active_or_top(&mut self) -> u64 {
        match self.selection.active() {
            Some(a) => a,
            None => {
                self.selection.set_from_click(self.top);
                self.top
            }
        }
    }

    /// The row that displays the selection's active end, resolving the
    /// wrap-join ambiguity by growth direction.
    fn displayed_row_of(&mut self, offset: u64) -> Result<LineRecord, ViewError> {
        let wrap_width = self.wrap_width();
        let begin = find_begin(&mut self.win, &self.cfg, offset, wrap_width, self.force_text)?;
        let mut at = begin;
        let lower = loop {
            match next_record(&mut self.win, &self.cfg, at, wrap_width, self.force_text)? {
                Some(rec) => {
                    if rec.contains(offset)
                        || (rec.boundary == BoundaryKind::EndOfFile && offset == rec.end)
                    {
                        break rec;
                    }
                    at = rec.next_begin;
                }
                None => {
                    // Offset at EOF with a trailing EOL: an empty virtual
                    // row at the end of the file.
                    break LineRecord {
                        begin: offset,
                        end: offset,
                        next_begin: offset,
                        display_len: 0,
                        boundary: BoundaryKind::EndOfFile,
                    };
                }
            }
        };
        // A forward-growing end sitting exactly on a row begin may really
        // be the end of the row above, if that boundary is a synthesized
        // break (wrap or ceiling cut) rather than a true EOL.
        if self.selection.growth() == Growth::Forward && offset > 0 && lower.begin == offset {
            if let Some(above) =
                record_ending_at(&mut self.win, &self.cfg, offset, wrap_width, self.force_text)?
            {
                if above.boundary == BoundaryKind::Wrap && above.next_begin == offset {
                    return Ok(above);
                }
            }
        }
        Ok(lower)
    }

    fn col_in_row(&mut self, rec: &LineRecord, offset: u64) -> Result<usize, ViewError> {
        let bytes = self.win.read_range(rec.begin, rec.end)?;
        let idx = (offset.saturating_sub(rec.begin) as usize).min(bytes.len());
        Ok(display::col_of_byte(&bytes, idx, self.cfg.tab_width))
    }
}

/// Pick text or hex from the head of a newly opened file: NUL bytes or a
/// high density of non-whitespace control bytes mean binary.
pub fn detect_mode(head: &[u8]) -> ViewMode {
    if head.is_empty() {
        return ViewMode::Text;
    }
    let mut control = 0usize;
    for &b in head {
        if b == 0 {
            return ViewMode::Hex;
        }
        if b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c) {
            control += 1;
        }
    }
    if control * 10 > head.len() {
        ViewMode::Hex
    } else {
        ViewMode::Text
    }
}
