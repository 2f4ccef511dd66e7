//! Where the viewed bytes come from.
//!
//! The engine never touches the filesystem directly; it reads byte ranges
//! through this trait. The production implementation wraps a file opened by
//! the shell's safe-file layer, which owns retry/skip prompting — by the
//! time an `io::Error` reaches the engine it means "abandon the operation".

use std::fs::File;
use std::io;
use std::path::Path;

/// Random-access byte supplier for one viewer session.
///
/// `size` is re-queried whenever the engine revalidates after an external
/// change notification, so implementations should not cache it staleness-
/// forever. Short reads at end of file are normal and are not errors.
pub trait ByteSource {
    fn size(&mut self) -> io::Result<u64>;

    /// Read up to `buf.len()` bytes starting at `offset`. Returns the byte
    /// count actually read; 0 means end of file.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// A real file, read positionally so no seek state is shared.
pub struct FileSource {
    file: File,
}

impl FileSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    pub fn from_file(file: File) -> Self {
        Self { file }
    }
}

impl ByteSource for FileSource {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    #[cfg(unix)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }
}

/// In-memory source: tests, and already-materialized data such as an
/// archive member handed over by the shell.
pub struct SliceSource {
    bytes: Vec<u8>,
}

impl SliceSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl ByteSource for SliceSource {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.bytes.len() as u64)
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

/// Read exactly as much as the source can provide for `[offset, offset+buf.len())`,
/// looping over short reads.
pub fn read_full(src: &mut dyn ByteSource, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        let n = src.read_at(offset + done as u64, &mut buf[done..])?;
        if n == 0 {
            break;
        }
        done += n;
    }
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn slice_source_reads_and_clips() {
        let mut src = SliceSource::new(b"0123456789".to_vec());
        assert_eq!(src.size().unwrap(), 10);

        let mut buf = [0u8; 4];
        assert_eq!(src.read_at(3, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"3456");

        assert_eq!(src.read_at(8, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");

        assert_eq!(src.read_at(10, &mut buf).unwrap(), 0);
        assert_eq!(src.read_at(100, &mut buf).unwrap(), 0);
    }

    #[test]
    fn file_source_positional_reads_do_not_interfere() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"abcdefgh").unwrap();
        let mut src = FileSource::open(f.path()).unwrap();

        let mut a = [0u8; 2];
        let mut b = [0u8; 2];
        src.read_at(6, &mut a).unwrap();
        src.read_at(0, &mut b).unwrap();
        assert_eq!(&a, b"gh");
        assert_eq!(&b, b"ab");
        assert_eq!(src.size().unwrap(), 8);
    }

    #[test]
    fn read_full_loops_over_short_reads() {
        /// Source that returns at most 3 bytes per call.
        struct Trickle(SliceSource);
        impl ByteSource for Trickle {
            fn size(&mut self) -> io::Result<u64> {
                self.0.size()
            }
            fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
                let n = buf.len().min(3);
                self.0.read_at(offset, &mut buf[..n])
            }
        }

        let mut src = Trickle(SliceSource::new(b"0123456789".to_vec()));
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut src, 1, &mut buf).unwrap(), 8);
        assert_eq!(&buf, b"12345678");
    }
}
