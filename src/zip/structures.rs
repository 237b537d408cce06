//! Typed readers and writers for the ZIP records a signed package touches.
//!
//! Every record offers `try_read`, which reads the 4-byte magic and, if it
//! does not match, rewinds to where it started and returns `None`. Callers
//! can therefore try several record types in a row without losing
//! their place. Nothing here checks internal consistency (CRCs, offsets);
//! these are purely structural decoders.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

use super::extra_field::{ExtraField, Zip64Expectations, Zip64ExtendedInformation};

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub const CENTRAL_DIRECTORY_HEADER_SIGNATURE: u32 = 0x0201_4b50;
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0606_4b50;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

pub const SENTINEL_U16: u16 = 0xFFFF;
pub const SENTINEL_U32: u32 = 0xFFFF_FFFF;

/// General purpose bit 11: file name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Read the next four bytes as a little-endian magic without consuming them.
///
/// Returns `None` at end of stream.
pub fn peek_signature<R: Read + Seek>(reader: &mut R) -> Result<Option<u32>> {
    let start = reader.stream_position()?;
    let mut buf = [0u8; 4];
    let filled = read_up_to(reader, &mut buf)?;
    reader.seek(SeekFrom::Start(start))?;
    if filled == 4 {
        Ok(Some(u32::from_le_bytes(buf)))
    } else {
        Ok(None)
    }
}

/// Consume the magic if it is `expected`, otherwise leave the position alone.
fn try_read_signature<R: Read + Seek>(reader: &mut R, expected: u32) -> Result<bool> {
    let start = reader.stream_position()?;
    let mut buf = [0u8; 4];
    let filled = read_up_to(reader, &mut buf)?;
    if filled == 4 && u32::from_le_bytes(buf) == expected {
        return Ok(true);
    }
    reader.seek(SeekFrom::Start(start))?;
    Ok(false)
}

pub(crate) fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
fn read_vec<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.take(len).read_to_end(&mut data)?;
    if data.len() as u64 != len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(data)
}

/// MS-DOS date and time as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    /// Encode calendar fields. Years before 1980 clamp to 1980-01-01 00:00:00.
    pub fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        if year < 1980 {
            return Self {
                date: (1 << 5) | 1,
                time: 0,
            };
        }
        let date = ((year - 1980) << 9) | ((month as u16) << 5) | day as u16;
        let time = ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 / 2);
        Self { date, time }
    }

    pub fn from_system_time(time: std::time::SystemTime) -> Self {
        match der::DateTime::from_system_time(time) {
            Ok(dt) => Self::from_parts(
                dt.year(),
                dt.month(),
                dt.day(),
                dt.hour(),
                dt.minutes(),
                dt.seconds(),
            ),
            Err(_) => Self::from_parts(1980, 1, 1, 0, 0, 0),
        }
    }

    /// (year, month, day)
    pub fn date_parts(&self) -> (u16, u8, u8) {
        let day = (self.date & 0x1F) as u8;
        let month = ((self.date >> 5) & 0x0F) as u8;
        let year = ((self.date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// (hour, minute, second)
    pub fn time_parts(&self) -> (u8, u8, u8) {
        let second = ((self.time & 0x1F) * 2) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// Local File Header - 30 bytes plus name and extra field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed_to_extract: u16,
    pub general_purpose_bit_flag: u16,
    pub compression_method: u16,
    pub last_mod_file_time: u16,
    pub last_mod_file_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_name: Vec<u8>,
    pub extra_field: Vec<u8>,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = LOCAL_FILE_HEADER_SIGNATURE;
    pub const SIZE_OF_FIXED_FIELDS: u64 = 30;

    pub fn try_read<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>> {
        if !try_read_signature(reader, Self::SIGNATURE)? {
            return Ok(None);
        }

        let version_needed_to_extract = reader.read_u16::<LittleEndian>()?;
        let general_purpose_bit_flag = reader.read_u16::<LittleEndian>()?;
        let compression_method = reader.read_u16::<LittleEndian>()?;
        let last_mod_file_time = reader.read_u16::<LittleEndian>()?;
        let last_mod_file_date = reader.read_u16::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let file_name_length = reader.read_u16::<LittleEndian>()?;
        let extra_field_length = reader.read_u16::<LittleEndian>()?;
        let file_name = read_vec(reader, file_name_length as u64)?;
        let extra_field = read_vec(reader, extra_field_length as u64)?;

        Ok(Some(Self {
            version_needed_to_extract,
            general_purpose_bit_flag,
            compression_method,
            last_mod_file_time,
            last_mod_file_date,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
            file_name,
            extra_field,
        }))
    }

    /// Like [`try_read`](Self::try_read), but a missing magic is an error.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        Self::try_read(reader)?.ok_or(Error::SignatureNotFound {
            signature: Self::SIGNATURE,
        })
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_needed_to_extract)?;
        writer.write_u16::<LittleEndian>(self.general_purpose_bit_flag)?;
        writer.write_u16::<LittleEndian>(self.compression_method)?;
        writer.write_u16::<LittleEndian>(self.last_mod_file_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_file_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.file_name_length)?;
        writer.write_u16::<LittleEndian>(self.extra_field_length)?;
        writer.write_all(&self.file_name)?;
        writer.write_all(&self.extra_field)?;
        Ok(())
    }

    /// Total bytes occupied by this header, including name and extra field.
    pub fn header_size(&self) -> u64 {
        Self::SIZE_OF_FIXED_FIELDS + self.file_name_length as u64 + self.extra_field_length as u64
    }

    pub fn file_name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.file_name).into_owned()
    }

    pub fn compression(&self) -> CompressionMethod {
        CompressionMethod::from_u16(self.compression_method)
    }

    pub fn modified(&self) -> DosDateTime {
        DosDateTime {
            date: self.last_mod_file_date,
            time: self.last_mod_file_time,
        }
    }

    pub fn extra_fields(&self) -> Result<Vec<ExtraField>> {
        let expect = Zip64Expectations {
            uncompressed_size: self.uncompressed_size == SENTINEL_U32,
            compressed_size: self.compressed_size == SENTINEL_U32,
            ..Default::default()
        };
        ExtraField::parse_all(&self.extra_field, expect)
    }

    pub fn has_zip64_extra_field(&self) -> Result<bool> {
        Ok(self
            .extra_fields()?
            .iter()
            .any(|field| matches!(field, ExtraField::Zip64(_))))
    }

    /// Compressed size, taken from the Zip64 extra field when deferred.
    pub fn effective_compressed_size(&self) -> Result<u64> {
        if self.compressed_size != SENTINEL_U32 {
            return Ok(self.compressed_size as u64);
        }
        zip64_value(&self.extra_fields()?, |info| info.compressed_size)
            .ok_or_else(|| Error::InvalidArchive("missing Zip64 compressed size".into()))
    }
}

fn zip64_value(
    fields: &[ExtraField],
    pick: impl Fn(&Zip64ExtendedInformation) -> Option<u64>,
) -> Option<u64> {
    fields.iter().find_map(|field| match field {
        ExtraField::Zip64(info) => pick(info),
        ExtraField::Unknown { .. } => None,
    })
}

/// Central Directory Header - 46 bytes plus name, extra field and comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed_to_extract: u16,
    pub general_purpose_bit_flag: u16,
    pub compression_method: u16,
    pub last_mod_file_time: u16,
    pub last_mod_file_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    pub relative_offset_of_local_header: u32,
    pub file_name: Vec<u8>,
    pub extra_field: Vec<u8>,
    pub file_comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: u32 = CENTRAL_DIRECTORY_HEADER_SIGNATURE;
    pub const SIZE_OF_FIXED_FIELDS: u64 = 46;
    /// Byte offset of `relative_offset_of_local_header` from the magic.
    pub const RELATIVE_OFFSET_FIELD_POSITION: u64 = 42;

    pub fn try_read<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>> {
        if !try_read_signature(reader, Self::SIGNATURE)? {
            return Ok(None);
        }

        let version_made_by = reader.read_u16::<LittleEndian>()?;
        let version_needed_to_extract = reader.read_u16::<LittleEndian>()?;
        let general_purpose_bit_flag = reader.read_u16::<LittleEndian>()?;
        let compression_method = reader.read_u16::<LittleEndian>()?;
        let last_mod_file_time = reader.read_u16::<LittleEndian>()?;
        let last_mod_file_date = reader.read_u16::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let file_name_length = reader.read_u16::<LittleEndian>()?;
        let extra_field_length = reader.read_u16::<LittleEndian>()?;
        let file_comment_length = reader.read_u16::<LittleEndian>()?;
        let disk_number_start = reader.read_u16::<LittleEndian>()?;
        let internal_file_attributes = reader.read_u16::<LittleEndian>()?;
        let external_file_attributes = reader.read_u32::<LittleEndian>()?;
        let relative_offset_of_local_header = reader.read_u32::<LittleEndian>()?;
        let file_name = read_vec(reader, file_name_length as u64)?;
        let extra_field = read_vec(reader, extra_field_length as u64)?;
        let file_comment = read_vec(reader, file_comment_length as u64)?;

        Ok(Some(Self {
            version_made_by,
            version_needed_to_extract,
            general_purpose_bit_flag,
            compression_method,
            last_mod_file_time,
            last_mod_file_date,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
            file_comment_length,
            disk_number_start,
            internal_file_attributes,
            external_file_attributes,
            relative_offset_of_local_header,
            file_name,
            extra_field,
            file_comment,
        }))
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_made_by)?;
        writer.write_u16::<LittleEndian>(self.version_needed_to_extract)?;
        writer.write_u16::<LittleEndian>(self.general_purpose_bit_flag)?;
        writer.write_u16::<LittleEndian>(self.compression_method)?;
        writer.write_u16::<LittleEndian>(self.last_mod_file_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_file_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.file_name_length)?;
        writer.write_u16::<LittleEndian>(self.extra_field_length)?;
        writer.write_u16::<LittleEndian>(self.file_comment_length)?;
        writer.write_u16::<LittleEndian>(self.disk_number_start)?;
        writer.write_u16::<LittleEndian>(self.internal_file_attributes)?;
        writer.write_u32::<LittleEndian>(self.external_file_attributes)?;
        writer.write_u32::<LittleEndian>(self.relative_offset_of_local_header)?;
        writer.write_all(&self.file_name)?;
        writer.write_all(&self.extra_field)?;
        writer.write_all(&self.file_comment)?;
        Ok(())
    }

    pub fn header_size(&self) -> u64 {
        Self::SIZE_OF_FIXED_FIELDS
            + self.file_name_length as u64
            + self.extra_field_length as u64
            + self.file_comment_length as u64
    }

    pub fn file_name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.file_name).into_owned()
    }

    pub fn compression(&self) -> CompressionMethod {
        CompressionMethod::from_u16(self.compression_method)
    }

    pub fn modified(&self) -> DosDateTime {
        DosDateTime {
            date: self.last_mod_file_date,
            time: self.last_mod_file_time,
        }
    }

    pub fn extra_fields(&self) -> Result<Vec<ExtraField>> {
        let expect = Zip64Expectations {
            uncompressed_size: self.uncompressed_size == SENTINEL_U32,
            compressed_size: self.compressed_size == SENTINEL_U32,
            local_header_offset: self.relative_offset_of_local_header == SENTINEL_U32,
            disk_number_start: self.disk_number_start == SENTINEL_U16,
        };
        ExtraField::parse_all(&self.extra_field, expect)
    }

    pub fn effective_compressed_size(&self) -> Result<u64> {
        if self.compressed_size != SENTINEL_U32 {
            return Ok(self.compressed_size as u64);
        }
        zip64_value(&self.extra_fields()?, |info| info.compressed_size)
            .ok_or_else(|| Error::InvalidArchive("missing Zip64 compressed size".into()))
    }

    pub fn effective_uncompressed_size(&self) -> Result<u64> {
        if self.uncompressed_size != SENTINEL_U32 {
            return Ok(self.uncompressed_size as u64);
        }
        zip64_value(&self.extra_fields()?, |info| info.uncompressed_size)
            .ok_or_else(|| Error::InvalidArchive("missing Zip64 uncompressed size".into()))
    }

    pub fn effective_local_header_offset(&self) -> Result<u64> {
        if self.relative_offset_of_local_header != SENTINEL_U32 {
            return Ok(self.relative_offset_of_local_header as u64);
        }
        zip64_value(&self.extra_fields()?, |info| info.local_header_offset)
            .ok_or_else(|| Error::InvalidArchive("missing Zip64 local header offset".into()))
    }

    pub fn has_zip64_extra_field(&self) -> Result<bool> {
        Ok(self
            .extra_fields()?
            .iter()
            .any(|field| matches!(field, ExtraField::Zip64(_))))
    }
}

/// End of Central Directory record - 22 bytes plus comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectoryRecord {
    pub number_of_this_disk: u16,
    pub number_of_disk_with_start_of_central_directory: u16,
    pub entries_in_central_directory_on_this_disk: u16,
    pub total_entries_in_central_directory: u16,
    pub size_of_central_directory: u32,
    pub offset_of_start_of_central_directory: u32,
    pub comment_length: u16,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectoryRecord {
    pub const SIGNATURE: u32 = END_OF_CENTRAL_DIRECTORY_SIGNATURE;
    pub const SIZE_OF_FIXED_FIELDS: u64 = 22;
    /// Byte offset of the entry count fields from the magic.
    pub const ENTRY_COUNTS_POSITION: u64 = 8;

    pub fn try_read<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>> {
        if !try_read_signature(reader, Self::SIGNATURE)? {
            return Ok(None);
        }

        let number_of_this_disk = reader.read_u16::<LittleEndian>()?;
        let number_of_disk_with_start_of_central_directory = reader.read_u16::<LittleEndian>()?;
        let entries_in_central_directory_on_this_disk = reader.read_u16::<LittleEndian>()?;
        let total_entries_in_central_directory = reader.read_u16::<LittleEndian>()?;
        let size_of_central_directory = reader.read_u32::<LittleEndian>()?;
        let offset_of_start_of_central_directory = reader.read_u32::<LittleEndian>()?;
        let comment_length = reader.read_u16::<LittleEndian>()?;
        let comment = read_vec(reader, comment_length as u64)?;

        Ok(Some(Self {
            number_of_this_disk,
            number_of_disk_with_start_of_central_directory,
            entries_in_central_directory_on_this_disk,
            total_entries_in_central_directory,
            size_of_central_directory,
            offset_of_start_of_central_directory,
            comment_length,
            comment,
        }))
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.number_of_this_disk)?;
        writer.write_u16::<LittleEndian>(self.number_of_disk_with_start_of_central_directory)?;
        writer.write_u16::<LittleEndian>(self.entries_in_central_directory_on_this_disk)?;
        writer.write_u16::<LittleEndian>(self.total_entries_in_central_directory)?;
        writer.write_u32::<LittleEndian>(self.size_of_central_directory)?;
        writer.write_u32::<LittleEndian>(self.offset_of_start_of_central_directory)?;
        writer.write_u16::<LittleEndian>(self.comment_length)?;
        writer.write_all(&self.comment)?;
        Ok(())
    }

    /// Whether any field defers to the Zip64 record.
    pub fn is_zip64(&self) -> bool {
        self.entries_in_central_directory_on_this_disk == SENTINEL_U16
            || self.total_entries_in_central_directory == SENTINEL_U16
            || self.size_of_central_directory == SENTINEL_U32
            || self.offset_of_start_of_central_directory == SENTINEL_U32
    }
}

/// Zip64 End of Central Directory record - 56 bytes plus extensible data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectoryRecord {
    /// Size of the remainder of the record (excludes magic and this field).
    pub size_of_record: u64,
    pub version_made_by: u16,
    pub version_needed_to_extract: u16,
    pub number_of_this_disk: u32,
    pub number_of_disk_with_start_of_central_directory: u32,
    pub entries_in_central_directory_on_this_disk: u64,
    pub total_entries_in_central_directory: u64,
    pub size_of_central_directory: u64,
    pub offset_of_start_of_central_directory: u64,
    pub extensible_data: Vec<u8>,
}

impl Zip64EndOfCentralDirectoryRecord {
    pub const SIGNATURE: u32 = ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE;
    pub const SIZE_OF_FIXED_FIELDS: u64 = 56;
    pub const ENTRY_COUNTS_POSITION: u64 = 24;

    pub fn try_read<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>> {
        if !try_read_signature(reader, Self::SIGNATURE)? {
            return Ok(None);
        }

        let size_of_record = reader.read_u64::<LittleEndian>()?;
        let version_made_by = reader.read_u16::<LittleEndian>()?;
        let version_needed_to_extract = reader.read_u16::<LittleEndian>()?;
        let number_of_this_disk = reader.read_u32::<LittleEndian>()?;
        let number_of_disk_with_start_of_central_directory = reader.read_u32::<LittleEndian>()?;
        let entries_in_central_directory_on_this_disk = reader.read_u64::<LittleEndian>()?;
        let total_entries_in_central_directory = reader.read_u64::<LittleEndian>()?;
        let size_of_central_directory = reader.read_u64::<LittleEndian>()?;
        let offset_of_start_of_central_directory = reader.read_u64::<LittleEndian>()?;
        let extensible_len = size_of_record.saturating_sub(Self::SIZE_OF_FIXED_FIELDS - 12);
        let extensible_data = read_vec(reader, extensible_len)?;

        Ok(Some(Self {
            size_of_record,
            version_made_by,
            version_needed_to_extract,
            number_of_this_disk,
            number_of_disk_with_start_of_central_directory,
            entries_in_central_directory_on_this_disk,
            total_entries_in_central_directory,
            size_of_central_directory,
            offset_of_start_of_central_directory,
            extensible_data,
        }))
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u64::<LittleEndian>(self.size_of_record)?;
        writer.write_u16::<LittleEndian>(self.version_made_by)?;
        writer.write_u16::<LittleEndian>(self.version_needed_to_extract)?;
        writer.write_u32::<LittleEndian>(self.number_of_this_disk)?;
        writer.write_u32::<LittleEndian>(self.number_of_disk_with_start_of_central_directory)?;
        writer.write_u64::<LittleEndian>(self.entries_in_central_directory_on_this_disk)?;
        writer.write_u64::<LittleEndian>(self.total_entries_in_central_directory)?;
        writer.write_u64::<LittleEndian>(self.size_of_central_directory)?;
        writer.write_u64::<LittleEndian>(self.offset_of_start_of_central_directory)?;
        writer.write_all(&self.extensible_data)?;
        Ok(())
    }
}

/// Zip64 End of Central Directory locator - 20 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectoryLocator {
    pub number_of_disk_with_zip64_end_of_central_directory: u32,
    pub offset_of_zip64_end_of_central_directory: u64,
    pub total_number_of_disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    pub const SIGNATURE: u32 = ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE;
    pub const SIZE: u64 = 20;
    pub const OFFSET_FIELD_POSITION: u64 = 8;

    pub fn try_read<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>> {
        if !try_read_signature(reader, Self::SIGNATURE)? {
            return Ok(None);
        }

        Ok(Some(Self {
            number_of_disk_with_zip64_end_of_central_directory: reader
                .read_u32::<LittleEndian>()?,
            offset_of_zip64_end_of_central_directory: reader.read_u64::<LittleEndian>()?,
            total_number_of_disks: reader.read_u32::<LittleEndian>()?,
        }))
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u32::<LittleEndian>(self.number_of_disk_with_zip64_end_of_central_directory)?;
        writer.write_u64::<LittleEndian>(self.offset_of_zip64_end_of_central_directory)?;
        writer.write_u32::<LittleEndian>(self.total_number_of_disks)?;
        Ok(())
    }
}
