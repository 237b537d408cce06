mod common;

use std::io::Cursor;

use nupkg_sign::package::{self, HashAlgorithmName, IntegrityCheck};
use nupkg_sign::Error;

use common::{ZipBuilder, digest, sign, unsigned_package};

const SIGNATURE: &[u8] = b"\x30\x80 not really a signature \x00\x00";

fn verify(archive: &[u8], algorithm: HashAlgorithmName, expected: &[u8]) -> bool {
    package::verify_signed_zip_integrity(&mut Cursor::new(archive), algorithm, expected)
}

#[test]
fn signed_package_verifies_against_hash_of_unsigned_bytes() {
    let unsigned = unsigned_package();
    let signed = sign(&unsigned, SIGNATURE);

    for algorithm in [
        HashAlgorithmName::Sha256,
        HashAlgorithmName::Sha384,
        HashAlgorithmName::Sha512,
    ] {
        assert!(verify(&signed, algorithm, &digest(algorithm, &unsigned)));
    }
}

#[test]
fn unsigned_archive_hash_matches_unsigned_bytes() {
    let unsigned = unsigned_package();
    let signed = sign(&unsigned, SIGNATURE);

    let hash =
        package::unsigned_archive_hash(&mut Cursor::new(&signed), HashAlgorithmName::Sha512)
            .unwrap();
    assert_eq!(hash, digest(HashAlgorithmName::Sha512, &unsigned));
}

#[test]
fn any_single_byte_change_outside_the_signature_fails() {
    let unsigned = unsigned_package();
    let signed = sign(&unsigned, SIGNATURE);
    let expected = digest(HashAlgorithmName::Sha256, &unsigned);

    // A content byte of the first entry.
    let mut tampered = signed.clone();
    tampered[30 + "[Content_Types].xml".len()] ^= 0x01;
    assert!(!verify(&tampered, HashAlgorithmName::Sha256, &expected));

    // The last byte of the archive comment.
    let mut tampered = signed.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    assert!(!verify(&tampered, HashAlgorithmName::Sha256, &expected));
}

#[test]
fn changing_the_signature_payload_keeps_the_hash() {
    let unsigned = unsigned_package();
    let expected = digest(HashAlgorithmName::Sha256, &unsigned);

    let a = sign(&unsigned, SIGNATURE);
    let b = sign(&unsigned, b"another signature, another length");
    assert!(verify(&a, HashAlgorithmName::Sha256, &expected));
    assert!(verify(&b, HashAlgorithmName::Sha256, &expected));
}

#[test]
fn wrong_expected_hash_fails() {
    let signed = sign(&unsigned_package(), SIGNATURE);
    assert!(!verify(&signed, HashAlgorithmName::Sha256, &[0u8; 32]));
    assert_eq!(
        package::check_signed_zip_integrity(
            &mut Cursor::new(&signed),
            HashAlgorithmName::Sha256,
            &[0u8; 32]
        ),
        IntegrityCheck::HashMismatch
    );
}

#[test]
fn unsigned_package_is_reported_not_signed() {
    let unsigned = unsigned_package();
    let expected = digest(HashAlgorithmName::Sha256, &unsigned);

    assert!(!verify(&unsigned, HashAlgorithmName::Sha256, &expected));
    assert_eq!(
        package::check_signed_zip_integrity(
            &mut Cursor::new(&unsigned),
            HashAlgorithmName::Sha256,
            &expected
        ),
        IntegrityCheck::NotSigned
    );
}

#[test]
fn garbage_never_verifies() {
    let garbage = b"PK\x03\x04 but nothing after that".to_vec();
    assert!(!verify(&garbage, HashAlgorithmName::Sha256, &[0u8; 32]));
    assert!(!verify(&[], HashAlgorithmName::Sha256, &[0u8; 32]));
}

#[test]
fn remove_signature_restores_the_original_bytes() {
    let unsigned = unsigned_package();
    let signed = sign(&unsigned, SIGNATURE);

    let mut restored = Vec::new();
    package::remove_signature(&mut Cursor::new(&signed), &mut restored).unwrap();
    assert_eq!(restored, unsigned);
}

#[test]
fn remove_signature_requires_a_signature() {
    let mut out = Vec::new();
    assert!(matches!(
        package::remove_signature(&mut Cursor::new(unsigned_package()), &mut out),
        Err(Error::NotSigned)
    ));
}

#[test]
fn signing_twice_is_rejected() {
    let signed = sign(&unsigned_package(), SIGNATURE);
    let mut out = Vec::new();
    assert!(matches!(
        package::write_signature_into_zip(&mut Cursor::new(&signed), SIGNATURE, &mut out),
        Err(Error::AlreadySigned)
    ));
}

#[test]
fn signing_zip64_is_rejected() {
    let zip64 = ZipBuilder::new().file("a.txt", b"abc").zip64().build();
    let mut out = Vec::new();
    assert!(matches!(
        package::write_signature_into_zip(&mut Cursor::new(&zip64), SIGNATURE, &mut out),
        Err(Error::Zip64NotSupported)
    ));
}

#[test]
fn signature_file_round_trips() {
    let signed = sign(&unsigned_package(), SIGNATURE);
    assert!(package::is_signed(&mut Cursor::new(&signed)));
    assert_eq!(
        package::open_signature_file(&mut Cursor::new(&signed)).unwrap(),
        SIGNATURE
    );
}

#[test]
fn content_hash_ignores_the_signature() {
    let unsigned = unsigned_package();
    let signed = sign(&unsigned, SIGNATURE);

    let before = package::package_content_hash(&mut Cursor::new(&unsigned)).unwrap();
    let after = package::package_content_hash(&mut Cursor::new(&signed)).unwrap();
    assert_eq!(before, after);
    assert_eq!(before.len(), 88);
}

#[test]
fn signature_entry_in_the_middle_verifies() {
    let builder = |with_signature: bool| {
        let mut builder = ZipBuilder::new().file("a.txt", b"first entry");
        if with_signature {
            builder = builder.signature(SIGNATURE);
        }
        builder.file("b/c.txt", b"an entry after the signature").build()
    };
    let unsigned = builder(false);
    let signed = builder(true);

    assert!(verify(
        &signed,
        HashAlgorithmName::Sha256,
        &digest(HashAlgorithmName::Sha256, &unsigned)
    ));
}

#[test]
fn two_signature_entries_are_rejected() {
    let archive = ZipBuilder::new()
        .file("a.txt", b"abc")
        .signature(SIGNATURE)
        .signature(b"second")
        .build();
    let single = ZipBuilder::new().file("a.txt", b"abc").build();

    assert!(!verify(
        &archive,
        HashAlgorithmName::Sha256,
        &digest(HashAlgorithmName::Sha256, &single)
    ));
    assert!(matches!(
        package::check_signed_zip_integrity(
            &mut Cursor::new(&archive),
            HashAlgorithmName::Sha256,
            &[]
        ),
        IntegrityCheck::Malformed(_)
    ));
}

#[test]
fn zip64_signed_package_verifies() {
    let unsigned = ZipBuilder::new()
        .file("a.txt", b"abc")
        .file("b.txt", b"defg")
        .zip64()
        .build();
    let signed = ZipBuilder::new()
        .file("a.txt", b"abc")
        .file("b.txt", b"defg")
        .signature(SIGNATURE)
        .zip64()
        .build();

    assert!(package::is_zip64(&mut Cursor::new(&signed)).unwrap());
    assert!(verify(
        &signed,
        HashAlgorithmName::Sha512,
        &digest(HashAlgorithmName::Sha512, &unsigned)
    ));

    let mut restored = Vec::new();
    package::remove_signature(&mut Cursor::new(&signed), &mut restored).unwrap();
    assert_eq!(restored, unsigned);
}

#[test]
fn data_descriptors_are_excluded_with_their_entry() {
    let unsigned = ZipBuilder::new()
        .file_with_data_descriptor("a.txt", b"streamed entry")
        .file("b.txt", b"plain entry")
        .build();
    let signed = ZipBuilder::new()
        .file_with_data_descriptor("a.txt", b"streamed entry")
        .file("b.txt", b"plain entry")
        .file_with_data_descriptor(nupkg_sign::SIGNATURE_PATH, SIGNATURE)
        .build();

    assert!(verify(
        &signed,
        HashAlgorithmName::Sha256,
        &digest(HashAlgorithmName::Sha256, &unsigned)
    ));
}

#[test]
fn data_descriptors_without_magic_are_excluded_with_their_entry() {
    let unsigned = ZipBuilder::new()
        .file_with_bare_data_descriptor("a.txt", b"streamed entry")
        .file("b.txt", b"plain entry")
        .build();
    let signed = ZipBuilder::new()
        .file_with_bare_data_descriptor("a.txt", b"streamed entry")
        .file("b.txt", b"plain entry")
        .file_with_bare_data_descriptor(nupkg_sign::SIGNATURE_PATH, SIGNATURE)
        .build();
    let expected = digest(HashAlgorithmName::Sha256, &unsigned);
    assert!(verify(&signed, HashAlgorithmName::Sha256, &expected));

    // The preceding entry's descriptor is hashed like any other byte.
    let mut tampered = signed.clone();
    tampered[30 + "a.txt".len() + "streamed entry".len() + 4] ^= 0x01;
    assert!(!verify(&tampered, HashAlgorithmName::Sha256, &expected));
}

#[test]
fn utf8_flagged_signature_name_is_not_verified() {
    let archive = ZipBuilder::new()
        .file("a.txt", b"abc")
        .file_with_utf8_flag(nupkg_sign::SIGNATURE_PATH, SIGNATURE)
        .build();
    assert_eq!(
        package::check_signed_zip_integrity(
            &mut Cursor::new(&archive),
            HashAlgorithmName::Sha256,
            &[]
        ),
        IntegrityCheck::NotSigned
    );
}
