//! ZIP structures as they matter to signed packages.
//!
//! ## Architecture
//!
//! - [`structures`]: typed readers/writers for local headers, central
//!   directory headers and the (Zip64) end of central directory records
//! - [`extra_field`]: extra field blocks, including Zip64 extended information
//! - [`crc32`]: table-driven CRC-32
//! - [`scanner`]: forward scan of a seekable stream for the signature entry
//!   and the records that follow it, plus tail-first central directory reads
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and data for each entry
//! 2. Central Directory with metadata for all entries
//! 3. Optional Zip64 end of central directory record and locator
//! 4. End of Central Directory (EOCD) record at the end
//!
//! A signed package adds one stored entry, the signature, after the last
//! local entry and one matching header after the last central directory
//! header.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No decompression: the signature entry is always stored

pub mod crc32;
pub mod extra_field;
pub mod scanner;
pub mod structures;

pub use crc32::{Crc32, calculate_crc};
pub use extra_field::{ExtraField, Zip64Expectations, Zip64ExtendedInformation};
pub use scanner::{
    SignedArchiveMetadata, central_directory_start, copy_until_position,
    find_end_of_central_directory, read_central_directory, read_signed_archive_metadata,
    read_zip64_end_of_central_directory, seek_backward_to_signature, seek_forward_to_signature,
};
pub use structures::*;
