//! Streaming file-viewer engine.
//!
//! `longview` turns byte ranges of files far larger than memory into
//! displayable text lines or hex rows, holding only one bounded window of
//! the file at a time. It answers the viewer questions a file-manager
//! shell asks: which rows are visible from this offset, which offset is
//! under the pointer, where is the next match, what is selected — and it
//! reports I/O failures as abandonable operations instead of guessing.
//!
//! Rendering, dialogs, clipboard transport, and retry prompting belong to
//! the embedding shell; the engine's surface is offsets, rows, and typed
//! outcomes.

pub mod config;
pub mod error;
pub mod model;
pub mod primitives;

pub use config::{EolRules, ViewerConfig};
pub use error::{PatternError, ReadError, ViewError};
pub use model::byte_source::{ByteSource, FileSource, SliceSource};
pub use model::hex::HexRecord;
pub use model::line_index::{BoundaryKind, LineRecord};
pub use model::search::{
    parse_hex_pattern, CancelToken, CompiledSearch, Direction, PatternKind, SearchOutcome,
    SearchRequest,
};
pub use model::selection::{Growth, Selection, SelectionPhase};
pub use model::session::{detect_mode, ViewMode, ViewerSession};
