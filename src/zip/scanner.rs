//! Forward scan of a signed archive for the positions the integrity check
//! needs.
//!
//! [`read_signed_archive_metadata`] walks local headers from the front: the
//! unsigned projection depends on where the signature entry physically
//! sits, not on what the central directory claims. The tail-first helpers
//! below it locate the central directory from the end of central directory
//! record. They only need [`Read`] and [`Seek`], so they also run over a
//! [`ByteWindow`](crate::io::ByteWindow) fetched from a remote package.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::package::is_signature_entry;

use super::structures::*;

/// Chunk size used when searching for byte signatures.
const SEEK_BUFFER_SIZE: usize = 4096;

/// Positions and sizes describing the signature entry of an archive.
///
/// All positions are absolute stream offsets. For an archive without a
/// signature entry, every signature-related field is zero; check
/// [`is_signed`](Self::is_signed) before trusting them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedArchiveMetadata {
    pub signature_local_file_header_position: u64,
    pub signature_file_compressed_size: u64,
    /// File name length plus extra field length of the signature's local header.
    pub signature_file_header_extra_size: u64,
    pub signature_has_data_descriptor: bool,
    pub signature_data_descriptor_size: u64,
    pub signature_central_directory_header_position: u64,
    pub signature_central_directory_header_size: u64,
    /// Position of the first central directory header.
    pub central_directory_position: u64,
    pub is_zip64: bool,
    pub zip64_end_of_central_directory_record_position: u64,
    pub zip64_end_of_central_directory_locator_position: u64,
    pub end_of_central_directory_record_position: u64,
    /// Number of local headers named like the signature entry.
    pub signature_entry_count: usize,
}

impl SignedArchiveMetadata {
    pub fn is_signed(&self) -> bool {
        self.signature_entry_count > 0
    }

    /// Bytes occupied by the signature entry: local header, name, extra
    /// field, payload and data descriptor.
    pub fn signature_file_entry_total_size(&self) -> u64 {
        LocalFileHeader::SIZE_OF_FIXED_FIELDS
            + self.signature_file_header_extra_size
            + self.signature_file_compressed_size
            + self.signature_data_descriptor_size
    }

    pub fn signature_central_directory_entry_size(&self) -> u64 {
        self.signature_central_directory_header_size
    }
}

/// Walk `reader` from offset 0 and locate the signature entry, the central
/// directory, the Zip64 records and the end of central directory record.
pub fn read_signed_archive_metadata<R: Read + Seek>(
    reader: &mut R,
) -> Result<SignedArchiveMetadata> {
    let mut metadata = SignedArchiveMetadata::default();
    let mut central_directory_matches = 0usize;

    reader.seek(SeekFrom::Start(0))?;
    seek_forward_to_signature(reader, LOCAL_FILE_HEADER_SIGNATURE)?;

    loop {
        let position = reader.stream_position()?;
        let Some(header) = LocalFileHeader::try_read(reader)? else {
            break;
        };
        let compressed_size = header.effective_compressed_size()?;
        reader.seek(SeekFrom::Current(to_offset(compressed_size)?))?;
        let descriptor_size = skip_data_descriptor(reader)?;

        if is_signature_entry(&header.file_name, header.general_purpose_bit_flag) {
            metadata.signature_entry_count += 1;
            if metadata.signature_entry_count == 1 {
                metadata.signature_local_file_header_position = position;
                metadata.signature_file_compressed_size = compressed_size;
                metadata.signature_file_header_extra_size =
                    header.file_name_length as u64 + header.extra_field_length as u64;
                metadata.signature_has_data_descriptor = descriptor_size > 0;
                metadata.signature_data_descriptor_size = descriptor_size;
            }
        }
    }

    if peek_signature(reader)? != Some(CENTRAL_DIRECTORY_HEADER_SIGNATURE) {
        seek_forward_to_signature(reader, CENTRAL_DIRECTORY_HEADER_SIGNATURE)?;
    }
    metadata.central_directory_position = reader.stream_position()?;

    loop {
        let position = reader.stream_position()?;
        let Some(header) = CentralDirectoryHeader::try_read(reader)? else {
            break;
        };
        if is_signature_entry(&header.file_name, header.general_purpose_bit_flag) {
            central_directory_matches += 1;
            if central_directory_matches == 1 {
                metadata.signature_central_directory_header_position = position;
                metadata.signature_central_directory_header_size = header.header_size();
            }
        }
    }

    if peek_signature(reader)? == Some(ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE) {
        metadata.is_zip64 = true;
        metadata.zip64_end_of_central_directory_record_position = reader.stream_position()?;
        metadata.zip64_end_of_central_directory_locator_position = seek_forward_to_signature(
            reader,
            ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE,
        )?;
    }

    metadata.end_of_central_directory_record_position =
        if peek_signature(reader)? == Some(END_OF_CENTRAL_DIRECTORY_SIGNATURE) {
            reader.stream_position()?
        } else {
            seek_forward_to_signature(reader, END_OF_CENTRAL_DIRECTORY_SIGNATURE)?
        };

    if metadata.signature_entry_count > 1 || central_directory_matches > 1 {
        return Err(Error::InvalidArchive(format!(
            "found {} local and {} central directory signature entries",
            metadata.signature_entry_count, central_directory_matches
        )));
    }
    if metadata.signature_entry_count != central_directory_matches {
        return Err(Error::InvalidArchive(
            "signature entry is missing from the local headers or the central directory".into(),
        ));
    }

    log::debug!("signed archive metadata: {metadata:?}");
    Ok(metadata)
}

/// Skip the bytes between an entry's payload and the next header.
///
/// Anything other than a local or central directory header at this point
/// is taken to be a data descriptor, with or without its optional magic.
fn skip_data_descriptor<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let size = match peek_signature(reader)? {
        Some(LOCAL_FILE_HEADER_SIGNATURE) | Some(CENTRAL_DIRECTORY_HEADER_SIGNATURE) => 0,
        Some(DATA_DESCRIPTOR_SIGNATURE) => 16,
        Some(_) => 12,
        None => 0,
    };
    reader.seek(SeekFrom::Current(size as i64))?;
    Ok(size)
}

fn to_offset(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::InvalidArchive(format!("offset {value} too large")))
}

/// Advance to the first occurrence of `signature` at or after the current
/// position and leave the stream positioned on it.
///
/// Returns the position found. When the stream is exhausted the position
/// is restored and [`Error::SignatureNotFound`] is returned.
pub fn seek_forward_to_signature<R: Read + Seek>(reader: &mut R, signature: u32) -> Result<u64> {
    let needle = signature.to_le_bytes();
    let start = reader.stream_position()?;
    let mut buf = vec![0u8; SEEK_BUFFER_SIZE];
    let mut base = start;
    let mut carried = 0usize;

    loop {
        let read = read_up_to(reader, &mut buf[carried..])?;
        let valid = carried + read;
        if let Some(i) = buf[..valid].windows(4).position(|w| w == needle) {
            let found = base + i as u64;
            reader.seek(SeekFrom::Start(found))?;
            return Ok(found);
        }
        if read == 0 {
            break;
        }
        // Keep a 3-byte tail so a magic split across reads is still seen.
        let keep = valid.min(3);
        buf.copy_within(valid - keep..valid, 0);
        base += (valid - keep) as u64;
        carried = keep;
    }

    reader.seek(SeekFrom::Start(start))?;
    Err(Error::SignatureNotFound { signature })
}

/// Move back to the last occurrence of `signature` starting at or before
/// the current position.
pub fn seek_backward_to_signature<R: Read + Seek>(reader: &mut R, signature: u32) -> Result<u64> {
    let needle = signature.to_le_bytes();
    let start = reader.stream_position()?;
    let length = reader.seek(SeekFrom::End(0))?;
    let mut end = start.saturating_add(4).min(length);
    let mut buf = vec![0u8; SEEK_BUFFER_SIZE];

    while end >= 4 {
        let begin = end.saturating_sub(SEEK_BUFFER_SIZE as u64);
        let window = &mut buf[..(end - begin) as usize];
        reader.seek(SeekFrom::Start(begin))?;
        reader.read_exact(window)?;
        if let Some(i) = window.windows(4).rposition(|w| w == needle) {
            let found = begin + i as u64;
            reader.seek(SeekFrom::Start(found))?;
            return Ok(found);
        }
        if begin == 0 {
            break;
        }
        end = begin + 3;
    }

    reader.seek(SeekFrom::Start(start))?;
    Err(Error::SignatureNotFound { signature })
}

/// Copy bytes from the current position up to the absolute `position`.
///
/// Hashers implement [`Write`], so this feeds digests as well as output
/// streams.
pub fn copy_until_position<R: Read + Seek, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    position: u64,
) -> Result<()> {
    let current = reader.stream_position()?;
    let length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(current))?;

    if position > length || position < current {
        return Err(Error::PositionOutOfRange { position, length });
    }

    let copied = std::io::copy(&mut reader.by_ref().take(position - current), writer)?;
    if copied != position - current {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}

/// Locate and read the end of central directory record by searching back
/// from the end of the stream.
pub fn find_end_of_central_directory<R: Read + Seek>(
    reader: &mut R,
) -> Result<(u64, EndOfCentralDirectoryRecord)> {
    let length = reader.seek(SeekFrom::End(0))?;
    if length < EndOfCentralDirectoryRecord::SIZE_OF_FIXED_FIELDS {
        return Err(Error::InvalidArchive("stream too small to be a ZIP archive".into()));
    }
    reader.seek(SeekFrom::Start(
        length - EndOfCentralDirectoryRecord::SIZE_OF_FIXED_FIELDS,
    ))?;
    let position = seek_backward_to_signature(reader, END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
    let record = EndOfCentralDirectoryRecord::try_read(reader)?.ok_or(
        Error::SignatureNotFound {
            signature: END_OF_CENTRAL_DIRECTORY_SIGNATURE,
        },
    )?;
    Ok((position, record))
}

/// Zip64 locator and record preceding the end of central directory record,
/// if the archive has them.
pub fn read_zip64_end_of_central_directory<R: Read + Seek>(
    reader: &mut R,
    end_of_central_directory_position: u64,
) -> Result<Option<(Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectoryRecord)>> {
    let Some(locator_position) =
        end_of_central_directory_position.checked_sub(Zip64EndOfCentralDirectoryLocator::SIZE)
    else {
        return Ok(None);
    };
    reader.seek(SeekFrom::Start(locator_position))?;
    let Some(locator) = Zip64EndOfCentralDirectoryLocator::try_read(reader)? else {
        return Ok(None);
    };
    reader.seek(SeekFrom::Start(
        locator.offset_of_zip64_end_of_central_directory,
    ))?;
    let record = Zip64EndOfCentralDirectoryRecord::try_read(reader)?.ok_or(
        Error::SignatureNotFound {
            signature: ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE,
        },
    )?;
    Ok(Some((locator, record)))
}

/// Absolute offset of the first central directory header.
pub fn central_directory_start<R: Read + Seek>(
    reader: &mut R,
    end_of_central_directory_position: u64,
    record: &EndOfCentralDirectoryRecord,
) -> Result<u64> {
    if record.offset_of_start_of_central_directory != SENTINEL_U32 {
        return Ok(record.offset_of_start_of_central_directory as u64);
    }
    match read_zip64_end_of_central_directory(reader, end_of_central_directory_position)? {
        Some((_, zip64)) => Ok(zip64.offset_of_start_of_central_directory),
        None => Err(Error::InvalidArchive(
            "central directory offset defers to a missing Zip64 record".into(),
        )),
    }
}

/// Read every central directory header, paired with its position.
pub fn read_central_directory<R: Read + Seek>(
    reader: &mut R,
) -> Result<Vec<(u64, CentralDirectoryHeader)>> {
    let (eocd_position, eocd) = find_end_of_central_directory(reader)?;
    let start = central_directory_start(reader, eocd_position, &eocd)?;
    reader.seek(SeekFrom::Start(start))?;

    let mut headers = Vec::new();
    loop {
        let position = reader.stream_position()?;
        match CentralDirectoryHeader::try_read(reader)? {
            Some(header) => headers.push((position, header)),
            None => break,
        }
    }
    Ok(headers)
}
