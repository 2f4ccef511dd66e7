//! Engine configuration.
//!
//! All fields are read-only inputs from the embedding shell; the shell owns
//! persistence. Defaults match the sizes the viewer was tuned with: a
//! 60 000-byte window so the longest text line plus lookahead fits without
//! excessive I/O, and a 10 000-byte ceiling on what is ever materialized as
//! a single text line.

use serde::{Deserialize, Serialize};

/// Which byte sequences terminate a line.
///
/// Each rule is independent; CRLF (when enabled) consumes the pair as one
/// terminator and takes precedence over the single-byte CR/LF rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EolRules {
    #[serde(default = "default_true")]
    pub cr: bool,
    #[serde(default = "default_true")]
    pub lf: bool,
    #[serde(default = "default_true")]
    pub crlf: bool,
    /// Treat NUL as a terminator. Off by default; search forces it on while
    /// a pattern search runs so binary runs cannot stall line scanning.
    #[serde(default = "default_false")]
    pub nul: bool,
}

impl Default for EolRules {
    fn default() -> Self {
        Self {
            cr: true,
            lf: true,
            crlf: true,
            nul: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub eol: EolRules,

    /// Number of columns per tab stop.
    #[serde(default = "default_tab_width")]
    pub tab_width: usize,

    /// Longest line the engine materializes in text mode. A longer line
    /// (with wrap off) asks the caller to leave text mode. Also the chunk
    /// size used by search.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: u64,

    /// Capacity of the sliding window over the file.
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_tab_width() -> usize {
    8
}

fn default_max_line_len() -> u64 {
    10_000
}

fn default_window_capacity() -> usize {
    60_000
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            eol: EolRules::default(),
            tab_width: default_tab_width(),
            max_line_len: default_max_line_len(),
            window_capacity: default_window_capacity(),
        }
    }
}

impl ViewerConfig {
    /// Clamp mutually dependent fields to safe values.
    ///
    /// The window must hold a full ceiling-length line plus one byte of
    /// lookahead on both sides of a request, so the ceiling may use at most
    /// half the window. Shell-provided configs go through here once at
    /// session open.
    pub fn normalized(mut self) -> Self {
        if self.window_capacity < 4096 {
            tracing::warn!(
                capacity = self.window_capacity,
                "window capacity too small, raising to 4096"
            );
            self.window_capacity = 4096;
        }
        let ceiling_cap = (self.window_capacity / 2) as u64;
        if self.max_line_len > ceiling_cap {
            tracing::warn!(
                ceiling = self.max_line_len,
                clamped = ceiling_cap,
                "line ceiling larger than half the window, clamping"
            );
            self.max_line_len = ceiling_cap;
        }
        if self.max_line_len == 0 {
            self.max_line_len = default_max_line_len().min(ceiling_cap);
        }
        if self.tab_width == 0 {
            self.tab_width = default_tab_width();
        }
        self
    }
}
