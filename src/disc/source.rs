//! Byte source trait and implementations
//!
//! Identification never needs a whole image, only a prefix and a handful of
//! scattered reads (container map entries, compressed hunks, metadata
//! blocks). [`ByteSource`] abstracts over where those bytes come from: a
//! local file, an in-memory buffer, or a remote range-read primitive.
//! Every implementation may return fewer bytes than requested.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Instant;

/// Trait for reading byte ranges from an image, wherever it lives
pub trait ByteSource {
    /// Read up to `length` bytes starting at `offset`
    ///
    /// A short (or empty) result means the source has no more data there;
    /// it is not an error.
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, io::Error>;

    /// Read up to `length` bytes from the start of the image
    fn read_head(&mut self, length: usize) -> Result<Vec<u8>, io::Error> {
        self.read_at(0, length)
    }

    /// Total size of the underlying image, when known
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, io::Error> {
        (**self).read_at(offset, length)
    }

    fn read_head(&mut self, length: usize) -> Result<Vec<u8>, io::Error> {
        (**self).read_head(length)
    }

    fn size_hint(&self) -> Option<u64> {
        (**self).size_hint()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, io::Error> {
        (**self).read_at(offset, length)
    }

    fn read_head(&mut self, length: usize) -> Result<Vec<u8>, io::Error> {
        (**self).read_head(length)
    }

    fn size_hint(&self) -> Option<u64> {
        (**self).size_hint()
    }
}

/// Byte source over a local file
pub struct FileSource {
    file: BufReader<File>,
    len: u64,
}

impl FileSource {
    /// Open a local image file
    pub fn open(path: &Path) -> Result<Self, io::Error> {
        Self::from_file(File::open(path)?)
    }

    /// Wrap an already-open file
    pub fn from_file(file: File) -> Result<Self, io::Error> {
        let len = file.metadata()?.len();
        Ok(Self {
            file: BufReader::new(file),
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, io::Error> {
        if offset >= self.len {
            return Ok(Vec::new());
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = Vec::new();
        self.file
            .by_ref()
            .take(length as u64)
            .read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.len)
    }
}

/// Byte source over an in-memory buffer
///
/// Also used for prefixes fetched by other means (an archive member piped
/// to stdout, a `head -c` over a control channel).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
    size_hint: Option<u64>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            size_hint: None,
        }
    }

    /// Record the size of the full image this buffer is a prefix of
    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, io::Error> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let end = start.saturating_add(length).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }

    fn size_hint(&self) -> Option<u64> {
        self.size_hint.or(Some(self.data.len() as u64))
    }
}

/// Byte source backed by a caller-supplied range-read primitive
///
/// The closure receives `(offset, length)` and returns whatever bytes it
/// could fetch. Timeouts on the transport are the closure's business; the
/// overall deadline is enforced by [`BoundedSource`].
pub struct RangeSource<F> {
    read: F,
    size: Option<u64>,
}

impl<F> RangeSource<F>
where
    F: FnMut(u64, usize) -> Result<Vec<u8>, io::Error>,
{
    pub fn new(read: F) -> Self {
        Self { read, size: None }
    }

    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

impl<F> ByteSource for RangeSource<F>
where
    F: FnMut(u64, usize) -> Result<Vec<u8>, io::Error>,
{
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, io::Error> {
        let mut data = (self.read)(offset, length)?;
        data.truncate(length);
        Ok(data)
    }

    fn size_hint(&self) -> Option<u64> {
        self.size
    }
}

/// Caps the total bytes and wall-clock time one identification may spend
///
/// Once the byte budget is spent every read comes back empty; once the
/// deadline passes every read fails with `TimedOut`. Callers treat both as
/// short reads.
pub struct BoundedSource<S> {
    inner: S,
    remaining: usize,
    consumed: usize,
    deadline: Option<Instant>,
}

impl<S: ByteSource> BoundedSource<S> {
    pub fn new(inner: S, budget: usize) -> Self {
        Self {
            inner,
            remaining: budget,
            consumed: 0,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Bytes handed out so far
    pub fn bytes_read(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<S: ByteSource> ByteSource for BoundedSource<S> {
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, io::Error> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "identification deadline passed",
                ));
            }
        }

        let grant = length.min(self.remaining);
        if grant == 0 {
            return Ok(Vec::new());
        }

        let mut data = self.inner.read_at(offset, grant)?;
        data.truncate(grant);
        self.remaining -= data.len();
        self.consumed += data.len();
        Ok(data)
    }

    fn size_hint(&self) -> Option<u64> {
        self.inner.size_hint()
    }
}

/// Serves reads that fall inside an already-fetched head prefix from memory
///
/// Container identification reads the header, map entries and the first
/// hunks; on typical images those all sit in the first few hundred KiB,
/// so one bulk head read replaces dozens of small remote reads.
pub struct CachedSource<S> {
    inner: S,
    head: Vec<u8>,
    at_eof: bool,
}

impl<S: ByteSource> CachedSource<S> {
    /// Fetch `head_len` bytes up front
    ///
    /// Transports that cap each reply are asked again until the head is
    /// full; only an empty reply, or a size hint inside the head, marks the
    /// end of the image.
    pub fn new(mut inner: S, head_len: usize) -> Self {
        let (head, ended) = match read_until_end(&mut inner, 0, head_len) {
            Ok(read) => read,
            Err(e) => {
                log::debug!("Head read failed: {}", e);
                (Vec::new(), false)
            }
        };
        let at_eof = ended || inner.size_hint().is_some_and(|size| size <= head.len() as u64);
        Self { inner, head, at_eof }
    }

    pub fn head(&self) -> &[u8] {
        &self.head
    }
}

impl<S: ByteSource> ByteSource for CachedSource<S> {
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, io::Error> {
        let head_len = self.head.len() as u64;
        let end = offset.saturating_add(length as u64);

        if end <= head_len || self.at_eof {
            let start = offset.min(head_len) as usize;
            let end = end.min(head_len) as usize;
            return Ok(self.head[start..end].to_vec());
        }

        read_until_end(&mut self.inner, offset, length).map(|(data, _)| data)
    }

    fn size_hint(&self) -> Option<u64> {
        self.inner.size_hint()
    }
}

/// Read `length` bytes at `offset`, re-asking after short replies
///
/// Returns the bytes plus whether the source signalled the end of data
/// with an empty reply. A failure after some bytes arrived ends the read
/// with what was collected.
fn read_until_end<S: ByteSource + ?Sized>(
    source: &mut S,
    offset: u64,
    length: usize,
) -> Result<(Vec<u8>, bool), io::Error> {
    let mut data = source.read_at(offset, length)?;
    if data.is_empty() && length > 0 {
        return Ok((data, true));
    }

    while data.len() < length {
        let at = offset.saturating_add(data.len() as u64);
        match source.read_at(at, length - data.len()) {
            Ok(more) if more.is_empty() => return Ok((data, true)),
            Ok(more) => data.extend_from_slice(&more),
            Err(e) => {
                log::debug!("Read at {} cut short after {} bytes: {}", at, data.len(), e);
                break;
            }
        }
    }
    Ok((data, false))
}
