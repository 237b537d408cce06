//! Extra field blocks attached to local and central directory headers.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::{Error, Result};

/// Header id of the Zip64 extended information extra field.
pub const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;

/// Which Zip64 quantities the enclosing header defers to the extra field.
///
/// A quantity is present only when the enclosing header's 32-bit (or 16-bit
/// for the disk number) field holds its sentinel value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Expectations {
    pub uncompressed_size: bool,
    pub compressed_size: bool,
    pub local_header_offset: bool,
    pub disk_number_start: bool,
}

/// Zip64 extended information extra field (header id `0x0001`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zip64ExtendedInformation {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub local_header_offset: Option<u64>,
    pub disk_number_start: Option<u32>,
}

impl Zip64ExtendedInformation {
    /// Read the expected quantities in their fixed order, stopping at the
    /// first one that no longer fits in `data`.
    pub fn parse(data: &[u8], expect: Zip64Expectations) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let mut info = Self::default();
        let remaining = |c: &Cursor<&[u8]>| data.len() as u64 - c.position();

        if expect.uncompressed_size {
            if remaining(&cursor) < 8 {
                return Ok(info);
            }
            info.uncompressed_size = Some(cursor.read_u64::<LittleEndian>()?);
        }
        if expect.compressed_size {
            if remaining(&cursor) < 8 {
                return Ok(info);
            }
            info.compressed_size = Some(cursor.read_u64::<LittleEndian>()?);
        }
        if expect.local_header_offset {
            if remaining(&cursor) < 8 {
                return Ok(info);
            }
            info.local_header_offset = Some(cursor.read_u64::<LittleEndian>()?);
        }
        if expect.disk_number_start {
            if remaining(&cursor) < 4 {
                return Ok(info);
            }
            info.disk_number_start = Some(cursor.read_u32::<LittleEndian>()?);
        }

        Ok(info)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    Zip64(Zip64ExtendedInformation),
    Unknown { header_id: u16, data: Vec<u8> },
}

impl ExtraField {
    pub fn header_id(&self) -> u16 {
        match self {
            ExtraField::Zip64(_) => ZIP64_EXTRA_FIELD_ID,
            ExtraField::Unknown { header_id, .. } => *header_id,
        }
    }

    /// Split an extra field block into its `(id, size, data)` entries.
    pub fn parse_all(block: &[u8], expect: Zip64Expectations) -> Result<Vec<ExtraField>> {
        let mut cursor = Cursor::new(block);
        let mut fields = Vec::new();

        while block.len() as u64 - cursor.position() >= 2 {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let data_size = cursor.read_u16::<LittleEndian>().map_err(|_| {
                Error::InvalidArchive(format!("truncated extra field {header_id:#06x}"))
            })? as usize;

            let mut data = vec![0u8; data_size];
            cursor.read_exact(&mut data).map_err(|_| {
                Error::InvalidArchive(format!(
                    "extra field {header_id:#06x} declares {data_size} bytes past the block end"
                ))
            })?;

            let field = if header_id == ZIP64_EXTRA_FIELD_ID {
                ExtraField::Zip64(Zip64ExtendedInformation::parse(&data, expect)?)
            } else {
                ExtraField::Unknown { header_id, data }
            };
            fields.push(field);
        }

        Ok(fields)
    }
}
