use std::fmt;
use std::io::Write;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use const_oid::db::rfc5912::{ID_SHA_256, ID_SHA_384, ID_SHA_512};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Error, Result};

/// Hash algorithms a package signature may record its content hash with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithmName {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithmName {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgorithmName::Sha256 => ID_SHA_256,
            HashAlgorithmName::Sha384 => ID_SHA_384,
            HashAlgorithmName::Sha512 => ID_SHA_512,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
    }

    pub fn output_size(&self) -> usize {
        match self {
            HashAlgorithmName::Sha256 => 32,
            HashAlgorithmName::Sha384 => 48,
            HashAlgorithmName::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithmName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithmName::Sha256 => "SHA256",
            HashAlgorithmName::Sha384 => "SHA384",
            HashAlgorithmName::Sha512 => "SHA512",
        })
    }
}

impl FromStr for HashAlgorithmName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(HashAlgorithmName::Sha256),
            "sha384" => Ok(HashAlgorithmName::Sha384),
            "sha512" => Ok(HashAlgorithmName::Sha512),
            _ => Err(Error::InvalidConfig {
                key: "hash algorithm",
                value: s.to_string(),
            }),
        }
    }
}

/// A running digest for one of the [`HashAlgorithmName`]s.
///
/// Implements [`Write`] so archive walks can stream straight into it.
#[derive(Clone)]
pub enum Hasher {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithmName) -> Self {
        match algorithm {
            HashAlgorithmName::Sha256 => Hasher::Sha256(Sha256::new()),
            HashAlgorithmName::Sha384 => Hasher::Sha384(Sha384::new()),
            HashAlgorithmName::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha384(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Sha256(h) => h.finalize().to_vec(),
            Hasher::Sha384(h) => h.finalize().to_vec(),
            Hasher::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

impl Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
