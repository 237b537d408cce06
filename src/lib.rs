//! # nupkg-sign
//!
//! Signature plumbing for packages that are ZIP archives carrying a CMS
//! signature in a reserved `.signature.p7s` entry.
//!
//! The signature covers a hash of the archive as it was before the entry
//! was added. This crate can locate that entry by scanning byte signatures,
//! recompute the pre-signing hash from the signed archive without rewriting
//! it, and add certificates, countersignatures and timestamps to the CMS
//! structure with either a pure Rust or an OpenSSL engine.
//!
//! ## Features
//!
//! - Forward scan of local and central directory headers, including Zip64
//!   end of central directory records
//! - Integrity check against the hash recorded at signing time
//! - Embedding and removing the signature entry, and stripping repository
//!   signatures and countersignatures
//! - Reading only the archive tail and signature bytes of remote packages
//!   through HTTP Range requests
//! - `native` feature: an OpenSSL-backed CMS engine
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use nupkg_sign::{CmsFactory, HashAlgorithmName, package};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut file = File::open("package.nupkg")?;
//!     let signature = package::open_signature_file(&mut file)?;
//!
//!     let cms = CmsFactory::create(&signature)?;
//!     println!("primary signature: {} bytes", cms.primary_signature_value()?.len());
//!
//!     let expected = package::unsigned_archive_hash(&mut file, HashAlgorithmName::Sha256)?;
//!     assert!(package::verify_signed_zip_integrity(
//!         &mut file,
//!         HashAlgorithmName::Sha256,
//!         &expected
//!     ));
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod cms;
pub mod config;
pub mod error;
pub mod interop;
pub mod io;
pub mod package;
pub mod zip;

pub use cli::Cli;
pub use cms::{Cms, CmsFactory, CmsSignerConfig, SigningKey};
pub use config::{CmsBackend, Settings};
pub use error::{Error, Result};
pub use io::{ByteWindow, HttpRangeReader, ReadAt};
pub use package::{HashAlgorithmName, IntegrityCheck, RemotePackage, SIGNATURE_PATH};
pub use zip::{SignedArchiveMetadata, read_signed_archive_metadata};
