//! Package-level operations on signed archives.
//!
//! A package is signed when it contains exactly one stored entry named
//! [`SIGNATURE_PATH`]. Everything here works on seekable streams owned by
//! the caller for the duration of one call.

mod hash;
mod remote;
mod repository;
mod verify;
mod writer;

use std::io::{Read, Seek, SeekFrom};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};
use crate::zip::{
    CentralDirectoryHeader, CompressionMethod, FLAG_UTF8, LocalFileHeader, calculate_crc,
    central_directory_start, find_end_of_central_directory, read_central_directory,
    read_zip64_end_of_central_directory,
};

pub use hash::{HashAlgorithmName, Hasher};
pub use remote::RemotePackage;
pub use repository::{remove_repository_signatures, remove_repository_signatures_with};
pub use verify::{
    IntegrityCheck, check_signed_zip_integrity, unsigned_archive_hash,
    verify_signed_zip_integrity, write_unsigned_projection,
};
pub use writer::{remove_signature, write_signature_into_zip};

/// Name of the reserved entry that carries the package signature.
pub const SIGNATURE_PATH: &str = ".signature.p7s";

/// Whether a header with this name and these general purpose flags is the
/// signature entry.
///
/// The name is compared byte for byte. An entry flagged as having a UTF-8
/// name never matches, even when its bytes spell [`SIGNATURE_PATH`].
pub fn is_signature_entry(file_name: &[u8], general_purpose_bit_flag: u16) -> bool {
    general_purpose_bit_flag & FLAG_UTF8 == 0 && file_name == SIGNATURE_PATH.as_bytes()
}

/// Cheap check for a signature entry. Never fails: any problem reading the
/// archive means "not signed".
pub fn is_signed<R: Read + Seek>(reader: &mut R) -> bool {
    match find_signature_entry(reader) {
        Ok(found) => found,
        Err(e) => {
            log::debug!("treating package as unsigned: {e}");
            false
        }
    }
}

fn find_signature_entry<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    let (eocd_position, eocd) = find_end_of_central_directory(reader)?;
    let start = central_directory_start(reader, eocd_position, &eocd)?;
    reader.seek(SeekFrom::Start(start))?;

    while let Some(header) = CentralDirectoryHeader::try_read(reader)? {
        if !is_signature_entry(&header.file_name, header.general_purpose_bit_flag) {
            continue;
        }
        reader.seek(SeekFrom::Start(header.effective_local_header_offset()?))?;
        if let Some(local) = LocalFileHeader::try_read(reader)? {
            return Ok(is_signature_entry(&local.file_name, local.general_purpose_bit_flag));
        }
        return Ok(false);
    }
    Ok(false)
}

/// Whether the archive uses any Zip64 structure.
pub fn is_zip64<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    let (eocd_position, eocd) = find_end_of_central_directory(reader)?;
    if eocd.is_zip64() || read_zip64_end_of_central_directory(reader, eocd_position)?.is_some() {
        return Ok(true);
    }

    for (_, header) in read_central_directory(reader)? {
        if header.has_zip64_extra_field()? {
            return Ok(true);
        }
        reader.seek(SeekFrom::Start(header.effective_local_header_offset()?))?;
        if LocalFileHeader::read(reader)?.has_zip64_extra_field()? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Read the raw bytes of the signature entry after checking it is a plain
/// stored file.
pub fn open_signature_file<R: Read + Seek>(reader: &mut R) -> Result<Vec<u8>> {
    let headers = read_central_directory(reader)?;
    let central = signature_central_header(&headers)?;
    read_signature_entry(reader, central)
}

/// The single, well-formed central directory header of the signature entry.
fn signature_central_header(
    headers: &[(u64, CentralDirectoryHeader)],
) -> Result<&CentralDirectoryHeader> {
    let mut matches = headers
        .iter()
        .map(|(_, header)| header)
        .filter(|header| is_signature_entry(&header.file_name, header.general_purpose_bit_flag));
    let central = matches.next().ok_or(Error::NotSigned)?;
    if matches.next().is_some() {
        return Err(Error::InvalidSignatureEntry(
            "more than one signature entry".into(),
        ));
    }
    check_signature_central_header(central)?;
    Ok(central)
}

/// Read the local header and payload that `central` points at.
fn read_signature_entry<R: Read + Seek>(
    reader: &mut R,
    central: &CentralDirectoryHeader,
) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(central.effective_local_header_offset()?))?;
    let local = LocalFileHeader::read(reader)?;
    check_signature_local_header(&local, central)?;

    let mut data = Vec::new();
    reader
        .take(central.compressed_size as u64)
        .read_to_end(&mut data)?;
    if data.len() as u64 != central.compressed_size as u64 {
        return Err(Error::InvalidSignatureEntry("truncated signature file".into()));
    }
    if calculate_crc(&data) != central.crc32 {
        return Err(Error::InvalidSignatureEntry("CRC-32 mismatch".into()));
    }
    Ok(data)
}

pub(crate) fn check_signature_central_header(header: &CentralDirectoryHeader) -> Result<()> {
    if header.general_purpose_bit_flag != 0 {
        return Err(Error::InvalidSignatureEntry(format!(
            "general purpose flags are {:#06x}",
            header.general_purpose_bit_flag
        )));
    }
    if header.compression() != CompressionMethod::Stored {
        return Err(Error::InvalidSignatureEntry(format!(
            "compression method {} is not stored",
            header.compression_method
        )));
    }
    if header.compressed_size != header.uncompressed_size {
        return Err(Error::InvalidSignatureEntry(
            "compressed and uncompressed sizes differ".into(),
        ));
    }
    if header.external_file_attributes != 0 {
        return Err(Error::InvalidSignatureEntry(format!(
            "external file attributes are {:#010x}",
            header.external_file_attributes
        )));
    }
    Ok(())
}

pub(crate) fn check_signature_local_header(
    local: &LocalFileHeader,
    central: &CentralDirectoryHeader,
) -> Result<()> {
    if local.file_name != central.file_name {
        return Err(Error::InvalidSignatureEntry(
            "local header name does not match the central directory".into(),
        ));
    }
    if local.general_purpose_bit_flag != 0 || local.compression() != CompressionMethod::Stored {
        return Err(Error::InvalidSignatureEntry(
            "local header is not a plain stored entry".into(),
        ));
    }
    if local.compressed_size != central.compressed_size
        || local.uncompressed_size != central.uncompressed_size
        || local.crc32 != central.crc32
    {
        return Err(Error::InvalidSignatureEntry(
            "local header sizes or CRC disagree with the central directory".into(),
        ));
    }
    Ok(())
}

/// Base64 SHA-512 of the package content.
///
/// For a signed package this is the hash of the unsigned projection, so
/// signing does not change it.
pub fn package_content_hash<R: Read + Seek>(reader: &mut R) -> Result<String> {
    let digest = if is_signed(reader) {
        unsigned_archive_hash(reader, HashAlgorithmName::Sha512)?
    } else {
        let mut hasher = Hasher::new(HashAlgorithmName::Sha512);
        reader.seek(SeekFrom::Start(0))?;
        std::io::copy(reader, &mut hasher)?;
        hasher.finalize()
    };
    Ok(STANDARD.encode(digest))
}
