use std::io::{Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::zip::{
    CentralDirectoryHeader, CompressionMethod, DosDateTime, EndOfCentralDirectoryRecord,
    LocalFileHeader, SENTINEL_U16, SENTINEL_U32, calculate_crc, copy_until_position,
    find_end_of_central_directory, read_signed_archive_metadata,
};

use super::verify::write_unsigned_projection;
use super::{SIGNATURE_PATH, is_signed, is_zip64};

const VERSION_2_0: u16 = 20;

/// Append `signature` to an unsigned package as a stored entry named
/// [`SIGNATURE_PATH`], writing the signed package to `output`.
///
/// The new local entry goes after the last local entry and its central
/// directory header after the last header, so every existing byte keeps
/// its value except the end of central directory counts, size and offset.
pub fn write_signature_into_zip<R, W>(reader: &mut R, signature: &[u8], output: &mut W) -> Result<()>
where
    R: Read + Seek,
    W: Write + ?Sized,
{
    if is_signed(reader) {
        return Err(Error::AlreadySigned);
    }
    if is_zip64(reader)? {
        return Err(Error::Zip64NotSupported);
    }

    let (eocd_position, eocd) = find_end_of_central_directory(reader)?;
    let central_directory_start = eocd.offset_of_start_of_central_directory as u64;
    let central_directory_end = central_directory_start + eocd.size_of_central_directory as u64;
    if central_directory_end > eocd_position {
        return Err(Error::InvalidArchive(
            "central directory overlaps the end of central directory record".into(),
        ));
    }

    let size = u32::try_from(signature.len()).map_err(|_| Error::Zip64NotSupported)?;
    let crc32 = calculate_crc(signature);
    let modified = DosDateTime::from_system_time(SystemTime::now());
    let name = SIGNATURE_PATH.as_bytes().to_vec();

    let local = LocalFileHeader {
        version_needed_to_extract: VERSION_2_0,
        general_purpose_bit_flag: 0,
        compression_method: CompressionMethod::Stored.as_u16(),
        last_mod_file_time: modified.time,
        last_mod_file_date: modified.date,
        crc32,
        compressed_size: size,
        uncompressed_size: size,
        file_name_length: name.len() as u16,
        extra_field_length: 0,
        file_name: name.clone(),
        extra_field: Vec::new(),
    };
    let central = CentralDirectoryHeader {
        version_made_by: VERSION_2_0,
        version_needed_to_extract: VERSION_2_0,
        general_purpose_bit_flag: 0,
        compression_method: CompressionMethod::Stored.as_u16(),
        last_mod_file_time: modified.time,
        last_mod_file_date: modified.date,
        crc32,
        compressed_size: size,
        uncompressed_size: size,
        file_name_length: name.len() as u16,
        extra_field_length: 0,
        file_comment_length: 0,
        disk_number_start: 0,
        internal_file_attributes: 0,
        external_file_attributes: 0,
        relative_offset_of_local_header: eocd.offset_of_start_of_central_directory,
        file_name: name,
        extra_field: Vec::new(),
        file_comment: Vec::new(),
    };

    let entry_size = local.header_size() + size as u64;
    let new_eocd = EndOfCentralDirectoryRecord {
        entries_in_central_directory_on_this_disk: grow_count(
            eocd.entries_in_central_directory_on_this_disk,
        )?,
        total_entries_in_central_directory: grow_count(eocd.total_entries_in_central_directory)?,
        size_of_central_directory: grow_u32(eocd.size_of_central_directory, central.header_size())?,
        offset_of_start_of_central_directory: grow_u32(
            eocd.offset_of_start_of_central_directory,
            entry_size,
        )?,
        ..eocd.clone()
    };

    reader.seek(SeekFrom::Start(0))?;
    copy_until_position(reader, output, central_directory_start)?;
    local.write_to(output)?;
    output.write_all(signature)?;
    copy_until_position(reader, output, central_directory_end)?;
    central.write_to(output)?;
    copy_until_position(reader, output, eocd_position)?;
    new_eocd.write_to(output)?;

    // Anything that trailed the old record's comment.
    reader.seek(SeekFrom::Start(
        eocd_position + EndOfCentralDirectoryRecord::SIZE_OF_FIXED_FIELDS + eocd.comment_length as u64,
    ))?;
    std::io::copy(reader, output)?;

    log::debug!(
        "inserted {} byte signature at {central_directory_start}",
        signature.len()
    );
    Ok(())
}

/// Write the package without its signature entry.
///
/// For a package signed by [`write_signature_into_zip`] the output is
/// identical to the package before signing.
pub fn remove_signature<R, W>(reader: &mut R, output: &mut W) -> Result<()>
where
    R: Read + Seek,
    W: Write + ?Sized,
{
    let metadata = read_signed_archive_metadata(reader)?;
    if !metadata.is_signed() {
        return Err(Error::NotSigned);
    }
    write_unsigned_projection(reader, &metadata, output)
}

fn grow_count(value: u16) -> Result<u16> {
    match value.checked_add(1) {
        Some(v) if v != SENTINEL_U16 => Ok(v),
        _ => Err(Error::Zip64NotSupported),
    }
}

fn grow_u32(value: u32, by: u64) -> Result<u32> {
    match u32::try_from(value as u64 + by) {
        Ok(v) if v != SENTINEL_U32 => Ok(v),
        _ => Err(Error::Zip64NotSupported),
    }
}
