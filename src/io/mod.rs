mod http;
mod window;

pub use http::HttpRangeReader;
pub use window::ByteWindow;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill `buf` completely or fail.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..]).await?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            filled += n;
        }
        Ok(())
    }
}

/// Pull an entire source into memory, for operations that need a seekable
/// stream over the whole archive.
pub async fn read_fully<R: ReadAt + ?Sized>(reader: &R) -> Result<Vec<u8>> {
    let size = usize::try_from(reader.size())
        .map_err(|_| Error::InvalidArchive("source too large to load into memory".into()))?;
    let mut data = vec![0u8; size];
    reader.read_exact_at(0, &mut data).await?;
    Ok(data)
}

/// Whether `source` should be opened with [`HttpRangeReader`].
pub fn is_http_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
