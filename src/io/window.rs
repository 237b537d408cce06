use std::io::{self, Read, Seek, SeekFrom};

use super::ReadAt;
use crate::error::{Error, Result};

/// A fetched range of a [`ReadAt`] source, readable and seekable at the
/// source's absolute offsets.
///
/// The synchronous ZIP readers run unchanged over a window. Reads that fall
/// outside the fetched range but inside the source fail with
/// [`io::ErrorKind::InvalidInput`]; reads at or past the end of the source
/// return end of stream.
pub struct ByteWindow {
    start: u64,
    source_len: u64,
    data: Vec<u8>,
    position: u64,
}

impl ByteWindow {
    /// Fetch `start..end` of `reader`. `end` is clamped to the source size.
    pub async fn fetch<R: ReadAt + ?Sized>(reader: &R, start: u64, end: u64) -> Result<Self> {
        let source_len = reader.size();
        let end = end.min(source_len);
        if start > end {
            return Err(Error::PositionOutOfRange {
                position: start,
                length: source_len,
            });
        }

        let len = usize::try_from(end - start)
            .map_err(|_| Error::InvalidArchive("range too large to load into memory".into()))?;
        let mut data = vec![0u8; len];
        reader.read_exact_at(start, &mut data).await?;
        log::debug!("fetched bytes {start}..{end} of {source_len}");

        Ok(Self {
            start,
            source_len,
            data,
            position: start,
        })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }

    /// Whether `start..end` lies inside the fetched range.
    pub fn covers(&self, start: u64, end: u64) -> bool {
        start >= self.start && end <= self.end()
    }
}

impl Read for ByteWindow {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.source_len {
            return Ok(0);
        }
        if self.position < self.start || self.position >= self.end() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "offset {} is outside the fetched range {}..{}",
                    self.position,
                    self.start,
                    self.end()
                ),
            ));
        }

        let from = (self.position - self.start) as usize;
        let n = buf.len().min(self.data.len() - from);
        buf[..n].copy_from_slice(&self.data[from..from + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for ByteWindow {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.source_len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        self.position = target;
        Ok(target)
    }
}
