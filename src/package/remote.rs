//! Signature access for packages behind a [`ReadAt`] source.
//!
//! Only the archive tail, the central directory and the signature entry are
//! fetched. Each range is wrapped in a [`ByteWindow`] and parsed by the same
//! readers that handle local files.

use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::error::Result;
use crate::io::{ByteWindow, ReadAt};
use crate::zip::{
    CentralDirectoryHeader, LocalFileHeader, central_directory_start,
    find_end_of_central_directory, read_central_directory,
};

use super::{is_signature_entry, read_signature_entry, signature_central_header};

/// Bytes fetched from the end of the source before anything is parsed.
///
/// Large enough for an end of central directory record with the longest
/// comment plus one backward search chunk.
const TAIL_WINDOW_SIZE: u64 = 72 * 1024;

/// Offset of the file name length in a local file header.
const LOCAL_NAME_LENGTH_POSITION: usize = 26;

pub struct RemotePackage<R: ReadAt + ?Sized> {
    reader: Arc<R>,
}

impl<R: ReadAt + ?Sized> RemotePackage<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Whether the package carries a signature entry.
    ///
    /// Unlike [`is_signed`](super::is_signed), fetch and parse errors are
    /// returned rather than read as "not signed".
    pub async fn is_signed(&self) -> Result<bool> {
        let (window, headers) = self.central_directory().await?;
        let Some(central) = headers
            .iter()
            .map(|(_, header)| header)
            .find(|header| is_signature_entry(&header.file_name, header.general_purpose_bit_flag))
        else {
            return Ok(false);
        };

        let mut window = self.entry_window(window, central).await?;
        window.seek(SeekFrom::Start(central.effective_local_header_offset()?))?;
        Ok(LocalFileHeader::try_read(&mut window)?
            .is_some_and(|local| is_signature_entry(&local.file_name, local.general_purpose_bit_flag)))
    }

    /// Fetch and check the signature entry's bytes.
    pub async fn read_signature_file(&self) -> Result<Vec<u8>> {
        let (window, headers) = self.central_directory().await?;
        let central = signature_central_header(&headers)?;
        let mut window = self.entry_window(window, central).await?;
        read_signature_entry(&mut window, central)
    }

    /// Central directory headers, plus the window they were read from.
    async fn central_directory(&self) -> Result<(ByteWindow, Vec<(u64, CentralDirectoryHeader)>)> {
        let len = self.reader.size();
        let tail_start = len.saturating_sub(TAIL_WINDOW_SIZE);
        let mut window = ByteWindow::fetch(&*self.reader, tail_start, len).await?;

        let (eocd_position, eocd) = find_end_of_central_directory(&mut window)?;
        let start = central_directory_start(&mut window, eocd_position, &eocd)?;
        if start < window.start() {
            log::debug!("central directory starts at {start}, before the tail window");
            window = ByteWindow::fetch(&*self.reader, start, len).await?;
        }

        let headers = read_central_directory(&mut window)?;
        log::debug!("read {} central directory headers", headers.len());
        Ok((window, headers))
    }

    /// A window covering the local header and payload `central` points at.
    ///
    /// The signature entry usually sits right before the central directory,
    /// so `window` is reused when it already covers the entry.
    async fn entry_window(
        &self,
        mut window: ByteWindow,
        central: &CentralDirectoryHeader,
    ) -> Result<ByteWindow> {
        let offset = central.effective_local_header_offset()?;
        let mut fixed = [0u8; LocalFileHeader::SIZE_OF_FIXED_FIELDS as usize];
        if window.covers(offset, offset.saturating_add(LocalFileHeader::SIZE_OF_FIXED_FIELDS)) {
            window.seek(SeekFrom::Start(offset))?;
            window.read_exact(&mut fixed)?;
        } else {
            self.reader.read_exact_at(offset, &mut fixed).await?;
        }

        let names = &fixed[LOCAL_NAME_LENGTH_POSITION..];
        let variable = LittleEndian::read_u16(names) as u64 + LittleEndian::read_u16(&names[2..]) as u64;
        let end = offset
            .saturating_add(LocalFileHeader::SIZE_OF_FIXED_FIELDS + variable)
            .saturating_add(central.compressed_size as u64);

        if window.covers(offset, end) {
            return Ok(window);
        }
        ByteWindow::fetch(&*self.reader, offset, end).await
    }
}
