//! Shared helpers for integration tests.
//!
//! Archives are assembled byte by byte here rather than with the crate's own
//! header writers, so the tests check the scanner against an independent
//! encoding. CMS fixtures are signed with throwaway rcgen P-256 keys.

#![allow(dead_code)]

use std::io::Cursor;

use byteorder::{LittleEndian, WriteBytesExt};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{EncapsulatedContentInfo, SignedData, SignerInfos};
use der::asn1::{OctetString, SetOfVec};
use der::{Any, Decode, Encode};
use spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;

use nupkg_sign::cms::{CmsSignerConfig, SigningKey, build_countersigner, oids};
use nupkg_sign::package::{self, HashAlgorithmName, Hasher};
use nupkg_sign::zip::calculate_crc;
use nupkg_sign::SIGNATURE_PATH;

const DOS_TIME: u16 = 0x6000;
const DOS_DATE: u16 = 0x5A21;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Descriptor {
    None,
    /// Preceded by the optional 0x08074b50 magic.
    Signed,
    Bare,
}

struct TestEntry {
    name: String,
    data: Vec<u8>,
    descriptor: Descriptor,
    flags: u16,
}

/// Builds stored ZIP archives.
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<TestEntry>,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(mut self, name: &str, data: &[u8], descriptor: Descriptor, flags: u16) -> Self {
        let flags = if descriptor == Descriptor::None { flags } else { flags | 1 << 3 };
        self.entries.push(TestEntry {
            name: name.to_string(),
            data: data.to_vec(),
            descriptor,
            flags,
        });
        self
    }

    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, Descriptor::None, 0)
    }

    /// An entry with general purpose bit 3 set and a signed data descriptor.
    pub fn file_with_data_descriptor(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, Descriptor::Signed, 0)
    }

    /// An entry with general purpose bit 3 set and a 12-byte data descriptor
    /// that omits the magic.
    pub fn file_with_bare_data_descriptor(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, Descriptor::Bare, 0)
    }

    /// An entry with general purpose bit 11 (UTF-8 name) set in both headers.
    pub fn file_with_utf8_flag(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, Descriptor::None, 1 << 11)
    }

    pub fn signature(self, data: &[u8]) -> Self {
        self.file(SIGNATURE_PATH, data)
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Add a Zip64 end of central directory record and locator, and write
    /// sentinels into the plain record.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::new();

        for entry in &self.entries {
            offsets.push(out.len() as u32);
            let crc = calculate_crc(&entry.data);

            out.write_u32::<LittleEndian>(0x0403_4b50).unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(entry.flags).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(DOS_TIME).unwrap();
            out.write_u16::<LittleEndian>(DOS_DATE).unwrap();
            out.write_u32::<LittleEndian>(crc).unwrap();
            out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&entry.data);

            if entry.descriptor == Descriptor::Signed {
                out.write_u32::<LittleEndian>(0x0807_4b50).unwrap();
            }
            if entry.descriptor != Descriptor::None {
                out.write_u32::<LittleEndian>(crc).unwrap();
                out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
                out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            }
        }

        let cd_start = out.len();
        for (entry, offset) in self.entries.iter().zip(&offsets) {
            out.write_u32::<LittleEndian>(0x0201_4b50).unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(entry.flags).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(DOS_TIME).unwrap();
            out.write_u16::<LittleEndian>(DOS_DATE).unwrap();
            out.write_u32::<LittleEndian>(calculate_crc(&entry.data)).unwrap();
            out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(*offset).unwrap();
            out.extend_from_slice(entry.name.as_bytes());
        }
        let cd_size = out.len() - cd_start;
        let count = self.entries.len();

        if self.zip64 {
            let record_position = out.len();
            out.write_u32::<LittleEndian>(0x0606_4b50).unwrap();
            out.write_u64::<LittleEndian>(44).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(count as u64).unwrap();
            out.write_u64::<LittleEndian>(count as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_size as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_start as u64).unwrap();

            out.write_u32::<LittleEndian>(0x0706_4b50).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(record_position as u64).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
        }

        out.write_u32::<LittleEndian>(0x0605_4b50).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        if self.zip64 {
            out.write_u16::<LittleEndian>(0xFFFF).unwrap();
            out.write_u16::<LittleEndian>(0xFFFF).unwrap();
            out.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
            out.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
        } else {
            out.write_u16::<LittleEndian>(count as u16).unwrap();
            out.write_u16::<LittleEndian>(count as u16).unwrap();
            out.write_u32::<LittleEndian>(cd_size as u32).unwrap();
            out.write_u32::<LittleEndian>(cd_start as u32).unwrap();
        }
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.extend_from_slice(&self.comment);

        out
    }
}

/// A small unsigned package with a few stored entries.
pub fn unsigned_package() -> Vec<u8> {
    ZipBuilder::new()
        .file("[Content_Types].xml", b"<Types />")
        .file("lib/net8.0/demo.dll", &[0x4d, 0x5a, 0x90, 0x00, 0x03])
        .file("demo.nuspec", b"<package><metadata><id>demo</id></metadata></package>")
        .comment(b"packed by tests")
        .build()
}

/// Add a signature entry with the crate's own writer.
pub fn sign(unsigned: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut output = Vec::new();
    package::write_signature_into_zip(&mut Cursor::new(unsigned), signature, &mut output).unwrap();
    output
}

pub fn digest(algorithm: HashAlgorithmName, data: &[u8]) -> Vec<u8> {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Self-signed P-256 certificate and its key.
pub fn certificate_and_key(subject: &str) -> (Certificate, SigningKey) {
    let certified = rcgen::generate_simple_self_signed([subject.to_string()]).unwrap();
    let certificate = Certificate::from_der(certified.cert.der()).unwrap();
    let key = SigningKey::from_pkcs8_der(&certified.key_pair.serialize_der()).unwrap();
    (certificate, key)
}

/// DER `ContentInfo` of a `SignedData` with one signer per entry of `contents`.
pub fn signed_data(contents: &[&[u8]]) -> Vec<u8> {
    let (certificate, key) = certificate_and_key("author.test");
    signed_data_by(&CmsSignerConfig::new(certificate, HashAlgorithmName::Sha256), &key, contents)
}

/// Like [`signed_data`], but the primary signer is a repository.
pub fn repository_signed_data(content: &[u8]) -> Vec<u8> {
    let (certificate, key) = certificate_and_key("repository.test");
    signed_data_by(
        &CmsSignerConfig::repository(certificate, HashAlgorithmName::Sha256),
        &key,
        &[content],
    )
}

fn signed_data_by(config: &CmsSignerConfig, key: &SigningKey, contents: &[&[u8]]) -> Vec<u8> {
    let signers = contents
        .iter()
        .map(|content| build_countersigner(config, key, content).unwrap())
        .collect::<Vec<_>>();
    let sha256 = AlgorithmIdentifierOwned {
        oid: oids::ID_SHA_256,
        parameters: None,
    };

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::try_from(vec![sha256]).unwrap(),
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: oids::DATA,
            econtent: Some(Any::encode_from(&OctetString::new(b"content".to_vec()).unwrap()).unwrap()),
        },
        certificates: None,
        crls: None,
        signer_infos: SignerInfos(SetOfVec::try_from(signers).unwrap()),
    };

    ContentInfo {
        content_type: oids::SIGNED_DATA,
        content: Any::encode_from(&signed_data).unwrap(),
    }
    .to_der()
    .unwrap()
}

/// A syntactically valid stand-in for an RFC 3161 token.
pub fn fake_timestamp_token(marker: u8) -> Vec<u8> {
    ContentInfo {
        content_type: oids::DATA,
        content: Any::encode_from(&OctetString::new(vec![marker; 8]).unwrap()).unwrap(),
    }
    .to_der()
    .unwrap()
}
