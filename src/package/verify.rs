//! Integrity of a signed package, checked against the hash of the archive
//! as it was before the signature entry was inserted.
//!
//! The "unsigned projection" is produced on the fly from the signed bytes:
//! the signature's local entry and central directory header are skipped,
//! and every offset and count that moved because of them is written back
//! at its earlier value. For an archive signed with
//! [`write_signature_into_zip`](super::write_signature_into_zip) the
//! projection is byte-for-byte the original archive.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::zip::{
    CentralDirectoryHeader, EndOfCentralDirectoryRecord, SENTINEL_U16, SENTINEL_U32,
    SignedArchiveMetadata, Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectoryRecord,
    copy_until_position, read_signed_archive_metadata,
};

use super::hash::{HashAlgorithmName, Hasher};

/// Outcome of an integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityCheck {
    Intact,
    NotSigned,
    HashMismatch,
    /// The archive could not be walked; treated as tampered.
    Malformed(String),
}

impl IntegrityCheck {
    pub fn is_intact(&self) -> bool {
        matches!(self, IntegrityCheck::Intact)
    }
}

/// Fail-closed integrity check: anything short of a matching hash is `false`.
pub fn verify_signed_zip_integrity<R: Read + Seek>(
    reader: &mut R,
    algorithm: HashAlgorithmName,
    expected_hash: &[u8],
) -> bool {
    let outcome = check_signed_zip_integrity(reader, algorithm, expected_hash);
    if !outcome.is_intact() {
        log::debug!("package integrity check failed: {outcome:?}");
    }
    outcome.is_intact()
}

/// Integrity check that reports why a package did not verify.
pub fn check_signed_zip_integrity<R: Read + Seek>(
    reader: &mut R,
    algorithm: HashAlgorithmName,
    expected_hash: &[u8],
) -> IntegrityCheck {
    let metadata = match read_signed_archive_metadata(reader) {
        Ok(metadata) => metadata,
        Err(e) => return IntegrityCheck::Malformed(e.to_string()),
    };
    if !metadata.is_signed() {
        return IntegrityCheck::NotSigned;
    }

    let mut hasher = Hasher::new(algorithm);
    if let Err(e) = write_unsigned_projection(reader, &metadata, &mut hasher) {
        return IntegrityCheck::Malformed(e.to_string());
    }

    if hasher.finalize() == expected_hash {
        IntegrityCheck::Intact
    } else {
        IntegrityCheck::HashMismatch
    }
}

/// Hash of the archive as it was before signing.
pub fn unsigned_archive_hash<R: Read + Seek>(
    reader: &mut R,
    algorithm: HashAlgorithmName,
) -> Result<Vec<u8>> {
    let metadata = read_signed_archive_metadata(reader)?;
    if !metadata.is_signed() {
        return Err(Error::NotSigned);
    }
    let mut hasher = Hasher::new(algorithm);
    write_unsigned_projection(reader, &metadata, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Stream the unsigned projection of `reader` into `writer`.
///
/// The output is the archive as it was before the signature entry was
/// added. For Zip64 archives this goes further than only decrementing the
/// entry counts and central directory size:
///
/// - the Zip64 record's central directory offset shrinks by the signature
///   entry's size
/// - the locator's offset of the Zip64 record shrinks by both signature
///   records' sizes
/// - `0xFFFF` and `0xFFFF_FFFF` sentinels in the plain end of central
///   directory record are copied unchanged, never decremented
///
/// A signer that instead left those offsets alone, or wrote the plain
/// counts as the total minus one, recorded a different hash for a Zip64
/// package, and such a package will not verify here.
pub fn write_unsigned_projection<R, W>(
    reader: &mut R,
    metadata: &SignedArchiveMetadata,
    writer: &mut W,
) -> Result<()>
where
    R: Read + Seek,
    W: Write + ?Sized,
{
    if !metadata.is_signed() {
        return Err(Error::NotSigned);
    }

    let signature_position = metadata.signature_local_file_header_position;
    let entry_size = metadata.signature_file_entry_total_size();
    let directory_entry_size = metadata.signature_central_directory_entry_size();

    // Local entries before and after the signature entry, unchanged.
    reader.seek(SeekFrom::Start(0))?;
    copy_until_position(reader, writer, signature_position)?;
    reader.seek(SeekFrom::Start(signature_position + entry_size))?;
    copy_until_position(reader, writer, metadata.central_directory_position)?;

    loop {
        let position = reader.stream_position()?;
        if position == metadata.signature_central_directory_header_position {
            reader.seek(SeekFrom::Current(directory_entry_size as i64))?;
            continue;
        }
        let Some(header) = CentralDirectoryHeader::try_read(reader)? else {
            break;
        };
        reader.seek(SeekFrom::Start(position))?;

        let offset_position = position + CentralDirectoryHeader::RELATIVE_OFFSET_FIELD_POSITION;
        copy_until_position(reader, writer, offset_position)?;
        let offset = reader.read_u32::<LittleEndian>()?;
        let adjusted = if offset != SENTINEL_U32 && offset as u64 > signature_position {
            shrink_u32(offset, entry_size, "local header offset")?
        } else {
            offset
        };
        writer.write_u32::<LittleEndian>(adjusted)?;
        copy_until_position(reader, writer, position + header.header_size())?;
    }

    if metadata.is_zip64 {
        let record_position = metadata.zip64_end_of_central_directory_record_position;
        copy_until_position(
            reader,
            writer,
            record_position + Zip64EndOfCentralDirectoryRecord::ENTRY_COUNTS_POSITION,
        )?;
        let on_disk = reader.read_u64::<LittleEndian>()?;
        let total = reader.read_u64::<LittleEndian>()?;
        let size = reader.read_u64::<LittleEndian>()?;
        let offset = reader.read_u64::<LittleEndian>()?;
        writer.write_u64::<LittleEndian>(shrink_u64(on_disk, 1, "Zip64 entry count")?)?;
        writer.write_u64::<LittleEndian>(shrink_u64(total, 1, "Zip64 entry count")?)?;
        writer.write_u64::<LittleEndian>(shrink_u64(
            size,
            directory_entry_size,
            "Zip64 central directory size",
        )?)?;
        writer.write_u64::<LittleEndian>(shrink_u64(
            offset,
            entry_size,
            "Zip64 central directory offset",
        )?)?;

        let locator_position = metadata.zip64_end_of_central_directory_locator_position;
        copy_until_position(
            reader,
            writer,
            locator_position + Zip64EndOfCentralDirectoryLocator::OFFSET_FIELD_POSITION,
        )?;
        let record_offset = reader.read_u64::<LittleEndian>()?;
        writer.write_u64::<LittleEndian>(shrink_u64(
            record_offset,
            entry_size + directory_entry_size,
            "Zip64 end of central directory offset",
        )?)?;
    }

    let eocd_position = metadata.end_of_central_directory_record_position;
    copy_until_position(
        reader,
        writer,
        eocd_position + EndOfCentralDirectoryRecord::ENTRY_COUNTS_POSITION,
    )?;
    let on_disk = reader.read_u16::<LittleEndian>()?;
    let total = reader.read_u16::<LittleEndian>()?;
    let size = reader.read_u32::<LittleEndian>()?;
    let offset = reader.read_u32::<LittleEndian>()?;
    writer.write_u16::<LittleEndian>(shrink_count(on_disk)?)?;
    writer.write_u16::<LittleEndian>(shrink_count(total)?)?;
    writer.write_u32::<LittleEndian>(if size == SENTINEL_U32 {
        size
    } else {
        shrink_u32(size, directory_entry_size, "central directory size")?
    })?;
    writer.write_u32::<LittleEndian>(if offset == SENTINEL_U32 {
        offset
    } else {
        shrink_u32(offset, entry_size, "central directory offset")?
    })?;

    // Comment length, comment and anything trailing the record.
    let resume = reader.stream_position()?;
    let length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(resume))?;
    copy_until_position(reader, writer, length)?;
    Ok(())
}

fn shrink_count(value: u16) -> Result<u16> {
    if value == SENTINEL_U16 {
        return Ok(value);
    }
    value
        .checked_sub(1)
        .ok_or_else(|| Error::InvalidArchive("entry count underflow".into()))
}

fn shrink_u32(value: u32, by: u64, what: &str) -> Result<u32> {
    (value as u64)
        .checked_sub(by)
        .map(|v| v as u32)
        .ok_or_else(|| Error::InvalidArchive(format!("{what} {value} is smaller than {by}")))
}

fn shrink_u64(value: u64, by: u64, what: &str) -> Result<u64> {
    value
        .checked_sub(by)
        .ok_or_else(|| Error::InvalidArchive(format!("{what} {value} is smaller than {by}")))
}
