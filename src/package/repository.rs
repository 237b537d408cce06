use std::io::{Cursor, Read, Seek, Write};

use crate::cms::CmsFactory;
use crate::config::CmsBackend;
use crate::error::Result;

use super::{is_signed, open_signature_file, remove_signature, write_signature_into_zip};

/// Strip repository signing from a package, writing the result to `output`.
///
/// A package whose primary signature is a repository signature loses its
/// signature entry altogether. Otherwise every repository countersignature
/// is removed and the re-encoded signature is embedded in place of the old
/// one, leaving any author signature and other countersignatures intact.
///
/// Returns `false` without writing anything when the package is unsigned
/// or has nothing to remove.
pub fn remove_repository_signatures<R, W>(reader: &mut R, output: &mut W) -> Result<bool>
where
    R: Read + Seek,
    W: Write + ?Sized,
{
    remove_repository_signatures_with(reader, output, CmsBackend::Auto)
}

/// [`remove_repository_signatures`] with an explicit CMS engine.
pub fn remove_repository_signatures_with<R, W>(
    reader: &mut R,
    output: &mut W,
    backend: CmsBackend,
) -> Result<bool>
where
    R: Read + Seek,
    W: Write + ?Sized,
{
    if !is_signed(reader) {
        return Ok(false);
    }

    let mut cms = CmsFactory::create_with(&open_signature_file(reader)?, backend)?;
    if cms.primary_signature_is_repository()? {
        log::debug!("primary signature is a repository signature, removing the signature entry");
        remove_signature(reader, output)?;
        return Ok(true);
    }

    let removed = cms.remove_repository_countersignatures()?;
    if removed == 0 {
        return Ok(false);
    }

    let mut unsigned = Vec::new();
    remove_signature(reader, &mut unsigned)?;
    write_signature_into_zip(&mut Cursor::new(unsigned), &cms.encode()?, output)?;
    log::debug!("re-embedded the signature without {removed} repository countersignatures");
    Ok(true)
}
