//! Selection state for one viewer session.
//!
//! A selection is an anchor and an active end, both file offsets. The
//! active end is whichever end the last click or extension touched; there
//! is no ordering requirement between the two — a right-to-left drag keeps
//! anchor > active, and consumers order with `span()` when they need to.

use crate::error::ReadError;
use crate::model::window::WindowBuffer;

/// Selections over this many bytes are not materialized into memory;
/// the shell asks the user first.
pub const MAX_MATERIALIZED_SELECTION: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPhase {
    /// No selection exists.
    #[default]
    None,
    /// A span exists and is not being changed.
    Fixed,
    /// Shift-modified navigation or a drag is moving the active end.
    Extending,
}

/// Which way the selection grows, derived from anchor and active end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Selection {
    anchor: Option<u64>,
    active: Option<u64>,
    phase: SelectionPhase,
}

impl Selection {
    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn anchor(&self) -> Option<u64> {
        self.anchor
    }

    /// The end the next extension will move.
    pub fn active(&self) -> Option<u64> {
        self.active
    }

    /// `true` when nothing is selected (unset, or a collapsed span).
    pub fn is_empty(&self) -> bool {
        match (self.anchor, self.active) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Ordered `(start, end)` of a non-empty selection.
    pub fn span(&self) -> Option<(u64, u64)> {
        match (self.anchor, self.active) {
            (Some(a), Some(b)) if a != b => Some((a.min(b), a.max(b))),
            _ => None,
        }
    }

    pub fn len(&self) -> u64 {
        self.span().map(|(s, e)| e - s).unwrap_or(0)
    }

    pub fn growth(&self) -> Growth {
        match (self.anchor, self.active) {
            (Some(a), Some(b)) if b < a => Growth::Backward,
            _ => Growth::Forward,
        }
    }

    pub fn clear(&mut self) {
        *self = Selection::default();
    }

    /// A fresh click collapses any existing selection to the click offset,
    /// whatever direction it was dragged in.
    pub fn set_from_click(&mut self, offset: u64) {
        self.anchor = Some(offset);
        self.active = Some(offset);
        self.phase = SelectionPhase::Extending;
    }

    /// Move the active end; the anchor stays pinned. Starts a selection at
    /// `offset` if none exists.
    pub fn extend_to(&mut self, offset: u64) {
        if self.anchor.is_none() {
            self.anchor = Some(offset);
        }
        self.active = Some(offset);
        self.phase = SelectionPhase::Extending;
    }

    /// Extension finished (mouse up, shift released).
    pub fn finish(&mut self) {
        self.phase = if self.anchor.is_some() {
            SelectionPhase::Fixed
        } else {
            SelectionPhase::None
        };
    }

    /// Install a complete span, e.g. a search hit. The active end is the
    /// span end so a following shift-extension grows from there.
    pub fn set_range(&mut self, start: u64, end: u64) {
        self.anchor = Some(start);
        self.active = Some(end);
        self.phase = SelectionPhase::Fixed;
    }

    /// Keep both ends inside `[0, file_size]` after the file changed.
    pub fn clamp_to(&mut self, file_size: u64) {
        if let Some(a) = self.anchor.as_mut() {
            *a = (*a).min(file_size);
        }
        if let Some(b) = self.active.as_mut() {
            *b = (*b).min(file_size);
        }
    }

    /// Materialize the selected bytes for the clipboard or a seeded search.
    ///
    /// `None` when the selection is empty or larger than
    /// [`MAX_MATERIALIZED_SELECTION`]; the caller distinguishes the two via
    /// [`Selection::len`].
    pub fn materialize(&self, win: &mut WindowBuffer) -> Result<Option<Vec<u8>>, ReadError> {
        let Some((start, end)) = self.span() else {
            return Ok(None);
        };
        if end - start > MAX_MATERIALIZED_SELECTION {
            tracing::warn!(len = end - start, "selection too large to materialize");
            return Ok(None);
        }
        win.read_range(start, end).map(Some)
    }
}
