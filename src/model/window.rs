//! The bounded sliding window that all reading goes through.
//!
//! One viewer session holds exactly one window over its file. Whatever the
//! indexers and the search need, they `ensure` a range here; on a miss the
//! window re-centers around the request and refills in a single read. The
//! window is deliberately dumb: no read-ahead thread, no multi-extent cache
//! — the re-centering bias is what amortizes sequential scans.

use crate::error::ReadError;
use crate::model::byte_source::{read_full, ByteSource};

/// Fraction of the capacity kept *before* a missed offset after a refill:
/// backward scans re-use the window a few times before the next miss, while
/// the remaining 5/6 serves the (more common) forward direction.
const BACK_FRACTION: usize = 6;

pub struct WindowBuffer {
    source: Box<dyn ByteSource>,
    /// Resident bytes; `buf[0]` is file offset `start`.
    buf: Vec<u8>,
    start: u64,
    capacity: usize,
    file_size: u64,
}

impl WindowBuffer {
    pub fn new(mut source: Box<dyn ByteSource>, capacity: usize) -> Result<Self, ReadError> {
        let file_size = source.size().map_err(|e| ReadError {
            offset: 0,
            wanted: 0,
            source: e,
        })?;
        Ok(Self {
            source,
            buf: Vec::new(),
            start: 0,
            capacity,
            file_size,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// File offset of the first resident byte (diagnostics and tests).
    pub fn window_start(&self) -> u64 {
        self.start
    }

    pub fn resident_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop all cached bytes; next `ensure` refills.
    pub fn invalidate(&mut self) {
        self.buf.clear();
        self.start = 0;
    }

    /// Re-query the source size after an external change notification.
    /// Shrinks the resident range if the file got shorter under us.
    pub fn refresh_size(&mut self) -> Result<u64, ReadError> {
        let new_size = self.source.size().map_err(|e| ReadError {
            offset: 0,
            wanted: 0,
            source: e,
        })?;
        if new_size != self.file_size {
            tracing::debug!(old = self.file_size, new = new_size, "file size changed");
            if new_size < self.file_size {
                if self.start >= new_size {
                    self.invalidate();
                } else {
                    let keep = (new_size - self.start) as usize;
                    if keep < self.buf.len() {
                        self.buf.truncate(keep);
                    }
                }
            }
            self.file_size = new_size;
        }
        Ok(new_size)
    }

    /// Make `[offset, offset+len)` resident and return the slice.
    ///
    /// The returned slice is shorter than `len` only when the range runs
    /// past end of file. A failed refill leaves the previously resident
    /// bytes and the cached size untouched.
    pub fn ensure(&mut self, offset: u64, len: usize) -> Result<&[u8], ReadError> {
        if offset >= self.file_size {
            return Ok(&[]);
        }
        let want = (len as u64).min(self.file_size - offset) as usize;
        // The config normalizer caps the line ceiling at half the capacity,
        // so any in-bounds request must fit the post-refill forward span.
        debug_assert!(
            want <= self.capacity - self.capacity / BACK_FRACTION,
            "ensure({len}) exceeds window capacity {}",
            self.capacity
        );

        if offset < self.start
            || offset + want as u64 > self.start + self.buf.len() as u64
        {
            self.refill(offset)?;
        }

        let lo = (offset - self.start) as usize;
        let hi = (lo + want).min(self.buf.len());
        Ok(&self.buf[lo.min(self.buf.len())..hi])
    }

    /// Single byte at `offset`; `None` at or past end of file.
    pub fn byte_at(&mut self, offset: u64) -> Result<Option<u8>, ReadError> {
        if offset >= self.file_size {
            return Ok(None);
        }
        let b = self.ensure(offset, 1)?.first().copied();
        Ok(b)
    }

    /// Copy an arbitrary `[start, end)` range out through the window in
    /// window-sized steps. Used for selection extraction and for handing
    /// line bytes to the renderer.
    pub fn read_range(&mut self, start: u64, end: u64) -> Result<Vec<u8>, ReadError> {
        let end = end.min(self.file_size);
        if start >= end {
            return Ok(Vec::new());
        }
        let step = self.capacity / 2;
        let mut out = Vec::with_capacity((end - start) as usize);
        let mut pos = start;
        while pos < end {
            let len = step.min((end - pos) as usize);
            let chunk = self.ensure(pos, len)?;
            if chunk.is_empty() {
                break; // file shrank mid-copy; return what we have
            }
            out.extend_from_slice(chunk);
            pos += chunk.len() as u64;
        }
        Ok(out)
    }

    fn refill(&mut self, offset: u64) -> Result<(), ReadError> {
        let new_start = offset.saturating_sub((self.capacity / BACK_FRACTION) as u64);
        let to_read = (self.capacity as u64).min(self.file_size - new_start) as usize;

        // Read into a fresh buffer and commit only on success, so a fatal
        // error cannot clobber still-valid cached state.
        let mut fresh = vec![0u8; to_read];
        let got = read_full(self.source.as_mut(), new_start, &mut fresh).map_err(|e| ReadError {
            offset: new_start,
            wanted: to_read,
            source: e,
        })?;
        fresh.truncate(got);

        if got < to_read {
            // The file is shorter than the size we last saw.
            let new_size = new_start + got as u64;
            tracing::warn!(
                expected = self.file_size,
                actual = new_size,
                "file shrank during read, shrinking view"
            );
            self.file_size = new_size;
        }
        tracing::trace!(start = new_start, len = got, "window refilled");
        self.start = new_start;
        self.buf = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::byte_source::SliceSource;
    use std::io;

    fn window_over(bytes: &[u8], capacity: usize) -> WindowBuffer {
        WindowBuffer::new(Box::new(SliceSource::new(bytes.to_vec())), capacity).unwrap()
    }

    #[test]
    fn ensure_returns_requested_slice() {
        let data: Vec<u8> = (0..=255).cycle().take(4000).collect();
        let mut win = window_over(&data, 600);
        let got = win.ensure(1000, 50).unwrap();
        assert_eq!(got, &data[1000..1050]);
    }

    #[test]
    fn refill_centers_one_sixth_back() {
        let data = vec![7u8; 4000];
        let mut win = window_over(&data, 600);
        win.ensure(1000, 50).unwrap();
        assert_eq!(win.window_start(), 1000 - 100);
        assert_eq!(win.resident_len(), 600);
    }

    #[test]
    fn backward_steps_stay_resident_after_one_refill() {
        let data = vec![1u8; 10_000];
        let mut win = window_over(&data, 600);
        win.ensure(5000, 10).unwrap();
        let start = win.window_start();
        // Up to 1/6 of the capacity before the missed offset is resident.
        win.ensure(4950, 50).unwrap();
        assert_eq!(win.window_start(), start, "no second refill expected");
    }

    #[test]
    fn short_slice_at_eof() {
        let mut win = window_over(b"0123456789", 600);
        assert_eq!(win.ensure(8, 50).unwrap(), b"89");
        assert_eq!(win.ensure(10, 5).unwrap(), b"");
        assert_eq!(win.ensure(999, 5).unwrap(), b"");
    }

    #[test]
    fn byte_at_and_eof() {
        let mut win = window_over(b"abc", 600);
        assert_eq!(win.byte_at(0).unwrap(), Some(b'a'));
        assert_eq!(win.byte_at(2).unwrap(), Some(b'c'));
        assert_eq!(win.byte_at(3).unwrap(), None);
    }

    #[test]
    fn read_range_crosses_window_refills() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let mut win = window_over(&data, 600);
        let got = win.read_range(100, 19_900).unwrap();
        assert_eq!(got, &data[100..19_900]);
    }

    /// Source that fails every read after the first successful one.
    struct BreakAfterFirst {
        inner: SliceSource,
        reads: usize,
    }

    impl ByteSource for BreakAfterFirst {
        fn size(&mut self) -> io::Result<u64> {
            self.inner.size()
        }
        fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            if self.reads > 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk on fire"));
            }
            self.reads += 1;
            self.inner.read_at(offset, buf)
        }
    }

    #[test]
    fn failed_refill_preserves_resident_bytes() {
        let src = BreakAfterFirst {
            inner: SliceSource::new(vec![9u8; 4000]),
            reads: 0,
        };
        let mut win = WindowBuffer::new(Box::new(src), 600).unwrap();
        win.ensure(0, 100).unwrap();
        let (start, len) = (win.window_start(), win.resident_len());

        let err = win.ensure(2000, 100).unwrap_err();
        assert_eq!(err.offset, 2000 - 100); // re-centered start
        assert_eq!(win.window_start(), start);
        assert_eq!(win.resident_len(), len);
        // The still-resident range keeps serving hits.
        assert_eq!(win.ensure(0, 100).unwrap().len(), 100);
    }

    /// Source whose advertised size and real content disagree, as happens
    /// when the file is truncated while we view it.
    struct Truncated {
        bytes: Vec<u8>,
        advertised: u64,
    }

    impl ByteSource for Truncated {
        fn size(&mut self) -> io::Result<u64> {
            Ok(self.advertised)
        }
        fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            if offset >= self.bytes.len() as u64 {
                return Ok(0);
            }
            let start = offset as usize;
            let n = buf.len().min(self.bytes.len() - start);
            buf[..n].copy_from_slice(&self.bytes[start..start + n]);
            Ok(n)
        }
    }

    #[test]
    fn early_eof_shrinks_cached_size() {
        let src = Truncated {
            bytes: vec![5; 300],
            advertised: 1000,
        };
        let mut win = WindowBuffer::new(Box::new(src), 600).unwrap();
        let got = win.ensure(280, 50).unwrap();
        assert_eq!(got.len(), 20, "only 20 bytes really exist past 280");
        assert_eq!(win.file_size(), 300, "size shrunk to what the read proved");
    }

    /// Source backed by shared storage a test can truncate from outside.
    #[derive(Clone)]
    struct Shared(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl ByteSource for Shared {
        fn size(&mut self) -> io::Result<u64> {
            Ok(self.0.lock().unwrap().len() as u64)
        }
        fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            let bytes = self.0.lock().unwrap();
            if offset >= bytes.len() as u64 {
                return Ok(0);
            }
            let start = offset as usize;
            let n = buf.len().min(bytes.len() - start);
            buf[..n].copy_from_slice(&bytes[start..start + n]);
            Ok(n)
        }
    }

    #[test]
    fn refresh_size_truncates_resident_tail() {
        let shared = Shared(std::sync::Arc::new(std::sync::Mutex::new(vec![5u8; 1000])));
        let mut win = WindowBuffer::new(Box::new(shared.clone()), 600).unwrap();
        win.ensure(0, 100).unwrap();
        assert_eq!(win.resident_len(), 600);

        shared.0.lock().unwrap().truncate(250);
        assert_eq!(win.refresh_size().unwrap(), 250);
        assert_eq!(win.resident_len(), 250);
        assert_eq!(win.ensure(200, 40).unwrap().len(), 40);
        assert_eq!(win.ensure(240, 40).unwrap().len(), 10);
    }

    #[test]
    fn refresh_size_drops_window_entirely_past_new_end() {
        let shared = Shared(std::sync::Arc::new(std::sync::Mutex::new(vec![5u8; 5000])));
        let mut win = WindowBuffer::new(Box::new(shared.clone()), 600).unwrap();
        win.ensure(4000, 100).unwrap();
        assert!(win.window_start() > 100);

        shared.0.lock().unwrap().truncate(100);
        assert_eq!(win.refresh_size().unwrap(), 100);
        assert_eq!(win.resident_len(), 0);
        assert_eq!(win.ensure(0, 50).unwrap().len(), 50);
    }
}
