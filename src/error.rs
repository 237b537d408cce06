use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("Byte signature {signature:#010x} not found")]
    SignatureNotFound { signature: u32 },
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),
    #[error("Package is not signed")]
    NotSigned,
    #[error("Package is already signed")]
    AlreadySigned,
    #[error("Zip64 packages are not supported for this operation")]
    Zip64NotSupported,
    #[error("Invalid signature entry: {0}")]
    InvalidSignatureEntry(String),
    #[error("Position {position} is outside the readable range ending at {length}")]
    PositionOutOfRange { position: u64, length: u64 },
    #[error("Expected CMS SignedData content, but found {0}")]
    UnexpectedContentType(const_oid::ObjectIdentifier),
    #[error("Expected exactly one primary signature, but found {0}")]
    NotExactlyOnePrimarySignature(usize),
    #[error("Repository countersignature not found")]
    RepositoryCountersignatureNotFound,
    #[error("ASN.1 error")]
    Asn1(#[from] der::Error),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("{function} failed with error code {code:#x}: {message}")]
    Native {
        function: &'static str,
        code: u64,
        message: String,
    },
    #[error("CMS backend {0:?} is not available in this build")]
    BackendUnavailable(&'static str),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Invalid configuration value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
