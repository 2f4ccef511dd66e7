//! Error types for the viewer engine.
//!
//! Two classes exist: a failed read of the underlying file (`ReadError`) is
//! fatal for the operation that hit it — the caller abandons the operation
//! and decides whether to retry or close. Everything the caller can act on
//! with policy (a line too long for text mode, an invalid search pattern)
//! is a typed value, not a panic and not a stringly error.

use std::fmt;
use std::io;

/// A read of the viewed file failed.
///
/// Engine state that was valid before the failed operation is left intact,
/// so the caller may retry the whole operation after surfacing the error.
#[derive(Debug)]
pub struct ReadError {
    /// File offset the engine tried to read.
    pub offset: u64,
    /// Number of bytes the engine asked for.
    pub wanted: usize,
    pub source: io::Error,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed reading {} bytes at offset {}: {}",
            self.wanted, self.offset, self.source
        )
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Errors surfaced by view construction and navigation.
#[derive(Debug)]
pub enum ViewError {
    /// Fatal I/O failure; abandon the operation.
    Read(ReadError),
    /// A line starting at `begin` exceeds the text-mode ceiling with wrap
    /// off and text mode not forced. The caller chooses: switch to hex or
    /// force text mode and retry.
    LongLine { begin: u64 },
}

impl From<ReadError> for ViewError {
    fn from(e: ReadError) -> Self {
        ViewError::Read(e)
    }
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::Read(e) => e.fmt(f),
            ViewError::LongLine { begin } => {
                write!(f, "line starting at offset {begin} exceeds the text-mode ceiling")
            }
        }
    }
}

impl std::error::Error for ViewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewError::Read(e) => Some(e),
            ViewError::LongLine { .. } => None,
        }
    }
}

/// A search pattern failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid search pattern {:?}: {}", self.pattern, self.message)
    }
}

impl std::error::Error for PatternError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_reports_offset_and_source() {
        let e = ReadError {
            offset: 4096,
            wanted: 16,
            source: io::Error::new(io::ErrorKind::Other, "device gone"),
        };
        let msg = e.to_string();
        assert!(msg.contains("4096"), "got: {msg}");
        assert!(msg.contains("device gone"), "got: {msg}");
    }

    #[test]
    fn long_line_is_not_chained_to_io() {
        use std::error::Error;
        let e = ViewError::LongLine { begin: 7 };
        assert!(e.source().is_none());
    }
}
