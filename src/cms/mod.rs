//! The CMS `SignedData` that lives in a package's signature entry.
//!
//! A package signature holds exactly one primary signer. Its unsigned
//! attributes may carry countersignatures and RFC 3161 timestamps; at most
//! one countersignature is the repository's, marked with a proof-of-receipt
//! commitment type.
//!
//! Two engines implement [`Cms`]:
//!
//! - [`ManagedCms`] rebuilds the decoded ASN.1 structure with the `cms` crate
//! - `NativeCms` (feature `native`) edits an OpenSSL `CMS_ContentInfo` in place
//!
//! [`CmsFactory`] decodes the bytes once with whichever engine is configured.
//! Changes only become visible through [`Cms::encode`].

pub mod attributes;
mod countersign;
mod managed;
#[cfg(feature = "native")]
mod native;
pub mod oids;

use x509_cert::Certificate;

use crate::config::CmsBackend;
use crate::error::Result;

pub use countersign::{CmsSignerConfig, SigningKey, build_countersigner};
pub use managed::ManagedCms;
#[cfg(feature = "native")]
pub use native::NativeCms;

pub trait Cms {
    /// The engine behind this value.
    fn backend(&self) -> CmsBackend;

    /// The primary signer's signature value.
    fn primary_signature_value(&self) -> Result<Vec<u8>>;

    /// The repository countersigner's signature value, if there is one.
    fn repository_countersignature_value(&self) -> Result<Option<Vec<u8>>>;

    /// Add certificates to the `SignedData` certificate set, skipping any
    /// already present.
    fn add_certificates(&mut self, certificates: &[Certificate]) -> Result<()>;

    /// Countersign the primary signature and attach it as an unsigned attribute.
    fn add_countersignature(&mut self, config: &CmsSignerConfig, key: &SigningKey) -> Result<()>;

    /// Attach an encoded timestamp token to the primary signer.
    fn add_timestamp(&mut self, token: &[u8]) -> Result<()>;

    /// Attach an encoded timestamp token to the repository countersigner.
    ///
    /// Fails with [`RepositoryCountersignatureNotFound`] when there is no
    /// repository countersignature.
    ///
    /// [`RepositoryCountersignatureNotFound`]: crate::Error::RepositoryCountersignatureNotFound
    fn add_timestamp_to_repository_countersignature(&mut self, token: &[u8]) -> Result<()>;

    /// Whether the primary signature itself is a repository signature.
    fn primary_signature_is_repository(&self) -> Result<bool>;

    /// Remove every repository countersignature from the primary signer and
    /// return how many were removed. Other countersignatures stay.
    fn remove_repository_countersignatures(&mut self) -> Result<usize>;

    /// DER `ContentInfo` with every change applied.
    fn encode(&self) -> Result<Vec<u8>>;

    fn primary_signature_unsigned_attribute_count(&self) -> Result<usize>;

    fn certificate_count(&self) -> Result<usize>;
}

pub struct CmsFactory;

impl CmsFactory {
    /// Decode `bytes` with the default engine for this build.
    pub fn create(bytes: &[u8]) -> Result<Box<dyn Cms>> {
        Self::create_with(bytes, CmsBackend::Auto)
    }

    pub fn create_with(bytes: &[u8], backend: CmsBackend) -> Result<Box<dyn Cms>> {
        let backend = backend.resolve();
        log::debug!("decoding {} byte signature with the {backend} CMS engine", bytes.len());

        match backend {
            CmsBackend::Native => native_engine(bytes),
            CmsBackend::Managed | CmsBackend::Auto => Ok(Box::new(ManagedCms::decode(bytes)?)),
        }
    }
}

#[cfg(feature = "native")]
fn native_engine(bytes: &[u8]) -> Result<Box<dyn Cms>> {
    Ok(Box::new(NativeCms::decode(bytes)?))
}

#[cfg(not(feature = "native"))]
fn native_engine(_bytes: &[u8]) -> Result<Box<dyn Cms>> {
    Err(crate::error::Error::BackendUnavailable("native"))
}
