mod common;

use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerInfo};
use der::{Decode, Encode};

use nupkg_sign::cms::{Cms, CmsFactory, CmsSignerConfig, ManagedCms, oids};
use nupkg_sign::{CmsBackend, Error, HashAlgorithmName};

use common::{certificate_and_key, fake_timestamp_token, repository_signed_data, signed_data};

fn decode_signed_data(encoded: &[u8]) -> SignedData {
    let content_info = ContentInfo::from_der(encoded).unwrap();
    SignedData::from_der(&content_info.content.to_der().unwrap()).unwrap()
}

fn primary_signer(encoded: &[u8]) -> SignerInfo {
    decode_signed_data(encoded).signer_infos.0.get(0).unwrap().clone()
}

fn managed(encoded: &[u8]) -> Box<dyn Cms> {
    CmsFactory::create_with(encoded, CmsBackend::Managed).unwrap()
}

#[test]
fn primary_signature_value_is_returned_unchanged() {
    let encoded = signed_data(&[b"package hash"]);
    let expected = primary_signer(&encoded).signature.as_bytes().to_vec();

    let cms = managed(&encoded);
    assert_eq!(cms.primary_signature_value().unwrap(), expected);
    assert_eq!(cms.backend(), CmsBackend::Managed);
}

#[test]
fn encode_without_changes_round_trips() {
    let encoded = signed_data(&[b"package hash"]);
    assert_eq!(managed(&encoded).encode().unwrap(), encoded);
}

#[test]
fn signer_cardinality_is_enforced() {
    for contents in [&[][..], &[&b"one"[..], &b"two"[..]][..]] {
        let encoded = signed_data(contents);
        assert!(matches!(
            ManagedCms::decode(&encoded),
            Err(Error::NotExactlyOnePrimarySignature(n)) if n == contents.len()
        ));
    }
}

#[test]
fn timestamp_adds_one_unsigned_attribute() {
    let encoded = signed_data(&[b"package hash"]);
    let mut cms = managed(&encoded);
    let before = cms.primary_signature_unsigned_attribute_count().unwrap();
    let signature = cms.primary_signature_value().unwrap();

    cms.add_timestamp(&fake_timestamp_token(1)).unwrap();
    let reencoded = cms.encode().unwrap();

    let reread = managed(&reencoded);
    assert_eq!(
        reread.primary_signature_unsigned_attribute_count().unwrap(),
        before + 1
    );
    assert_eq!(reread.primary_signature_value().unwrap(), signature);

    let signer = primary_signer(&reencoded);
    let unsigned = signer.unsigned_attrs.unwrap();
    let timestamp = unsigned
        .iter()
        .find(|a| a.oid == oids::SIGNATURE_TIME_STAMP_TOKEN)
        .unwrap();
    assert_eq!(
        timestamp.values.get(0).unwrap().to_der().unwrap(),
        fake_timestamp_token(1)
    );
}

#[test]
fn mutations_are_only_visible_after_encode() {
    let encoded = signed_data(&[b"package hash"]);
    let mut cms = managed(&encoded);
    cms.add_timestamp(&fake_timestamp_token(2)).unwrap();

    // The input buffer is untouched.
    assert_eq!(
        managed(&encoded)
            .primary_signature_unsigned_attribute_count()
            .unwrap(),
        0
    );
}

#[test]
fn certificates_are_added_once() {
    let encoded = signed_data(&[b"package hash"]);
    let (first, _) = certificate_and_key("first.test");
    let (second, _) = certificate_and_key("second.test");

    let mut cms = managed(&encoded);
    assert_eq!(cms.certificate_count().unwrap(), 0);
    cms.add_certificates(&[first.clone(), second]).unwrap();
    cms.add_certificates(&[first]).unwrap();
    assert_eq!(cms.certificate_count().unwrap(), 2);

    let reread = managed(&cms.encode().unwrap());
    assert_eq!(reread.certificate_count().unwrap(), 2);
}

#[test]
fn repository_countersignature_is_found_and_timestamped() {
    let encoded = signed_data(&[b"package hash"]);
    let (certificate, key) = certificate_and_key("repository.test");

    let mut cms = managed(&encoded);
    assert!(cms.repository_countersignature_value().unwrap().is_none());
    assert!(matches!(
        cms.add_timestamp_to_repository_countersignature(&fake_timestamp_token(3)),
        Err(Error::RepositoryCountersignatureNotFound)
    ));

    let config = CmsSignerConfig::repository(certificate, HashAlgorithmName::Sha256);
    cms.add_countersignature(&config, &key).unwrap();
    let countersignature = cms.repository_countersignature_value().unwrap().unwrap();

    cms.add_timestamp_to_repository_countersignature(&fake_timestamp_token(3))
        .unwrap();
    let reencoded = cms.encode().unwrap();

    let reread = managed(&reencoded);
    assert_eq!(
        reread.repository_countersignature_value().unwrap().unwrap(),
        countersignature
    );
    // The countersignature attribute was replaced, not duplicated.
    assert_eq!(
        reread.primary_signature_unsigned_attribute_count().unwrap(),
        1
    );

    let signer = primary_signer(&reencoded);
    let attribute = signer
        .unsigned_attrs
        .unwrap()
        .iter()
        .find(|a| a.oid == oids::COUNTERSIGNATURE)
        .unwrap()
        .clone();
    let countersigner =
        SignerInfo::from_der(&attribute.values.get(0).unwrap().to_der().unwrap()).unwrap();
    let countersigner_unsigned = countersigner.unsigned_attrs.unwrap();
    assert_eq!(countersigner_unsigned.len(), 1);
    assert_eq!(
        countersigner_unsigned.get(0).unwrap().oid,
        oids::SIGNATURE_TIME_STAMP_TOKEN
    );
}

#[test]
fn plain_countersignature_is_not_the_repository_one() {
    let encoded = signed_data(&[b"package hash"]);
    let (certificate, key) = certificate_and_key("cosigner.test");

    let mut cms = managed(&encoded);
    let config = CmsSignerConfig::new(certificate, HashAlgorithmName::Sha384)
        .with_commitment_type(oids::COMMITMENT_TYPE_PROOF_OF_ORIGIN);
    cms.add_countersignature(&config, &key).unwrap();

    assert_eq!(cms.primary_signature_unsigned_attribute_count().unwrap(), 1);
    assert!(cms.repository_countersignature_value().unwrap().is_none());
}

#[test]
fn first_repository_countersignature_wins() {
    let encoded = signed_data(&[b"package hash"]);
    let mut cms = managed(&encoded);

    for subject in ["one.test", "two.test"] {
        let (certificate, key) = certificate_and_key(subject);
        let config = CmsSignerConfig::repository(certificate, HashAlgorithmName::Sha256);
        cms.add_countersignature(&config, &key).unwrap();
    }

    let signer = primary_signer(&cms.encode().unwrap());
    let first = signer
        .unsigned_attrs
        .unwrap()
        .iter()
        .find(|a| a.oid == oids::COUNTERSIGNATURE)
        .map(|a| SignerInfo::from_der(&a.values.get(0).unwrap().to_der().unwrap()).unwrap())
        .unwrap();
    assert_eq!(
        cms.repository_countersignature_value().unwrap().unwrap(),
        first.signature.as_bytes()
    );
}

#[test]
fn repository_primary_signature_is_recognised() {
    assert!(
        managed(&repository_signed_data(b"package hash"))
            .primary_signature_is_repository()
            .unwrap()
    );
    assert!(
        !managed(&signed_data(&[b"package hash"]))
            .primary_signature_is_repository()
            .unwrap()
    );
}

/// Timestamp, one plain countersignature and two repository ones.
fn heavily_countersigned(cms: &mut dyn Cms) {
    cms.add_timestamp(&fake_timestamp_token(6)).unwrap();

    let (certificate, key) = certificate_and_key("cosigner.test");
    let config = CmsSignerConfig::new(certificate, HashAlgorithmName::Sha256);
    cms.add_countersignature(&config, &key).unwrap();

    for subject in ["one.test", "two.test"] {
        let (certificate, key) = certificate_and_key(subject);
        let config = CmsSignerConfig::repository(certificate, HashAlgorithmName::Sha256);
        cms.add_countersignature(&config, &key).unwrap();
    }
}

fn countersigners(encoded: &[u8]) -> Vec<SignerInfo> {
    primary_signer(encoded)
        .unsigned_attrs
        .map(|attrs| attrs.into_vec())
        .unwrap_or_default()
        .into_iter()
        .filter(|a| a.oid == oids::COUNTERSIGNATURE)
        .flat_map(|a| a.values.into_vec())
        .map(|value| SignerInfo::from_der(&value.to_der().unwrap()).unwrap())
        .collect()
}

#[test]
fn repository_countersignatures_are_removed_and_others_kept() {
    let encoded = signed_data(&[b"package hash"]);
    let mut cms = managed(&encoded);
    heavily_countersigned(cms.as_mut());
    assert_eq!(cms.primary_signature_unsigned_attribute_count().unwrap(), 4);

    assert_eq!(cms.remove_repository_countersignatures().unwrap(), 2);
    assert_eq!(cms.remove_repository_countersignatures().unwrap(), 0);

    let reencoded = cms.encode().unwrap();
    let reread = managed(&reencoded);
    assert!(reread.repository_countersignature_value().unwrap().is_none());
    assert_eq!(
        reread.primary_signature_unsigned_attribute_count().unwrap(),
        2
    );
    assert_eq!(
        reread.primary_signature_value().unwrap(),
        managed(&encoded).primary_signature_value().unwrap()
    );
    assert_eq!(countersigners(&reencoded).len(), 1);
}

#[test]
fn removing_the_only_countersignature_drops_the_unsigned_attributes() {
    let encoded = signed_data(&[b"package hash"]);
    let (certificate, key) = certificate_and_key("repository.test");
    let mut cms = managed(&encoded);
    cms.add_countersignature(
        &CmsSignerConfig::repository(certificate, HashAlgorithmName::Sha256),
        &key,
    )
    .unwrap();

    assert_eq!(cms.remove_repository_countersignatures().unwrap(), 1);
    let reencoded = cms.encode().unwrap();
    assert!(primary_signer(&reencoded).unsigned_attrs.is_none());
    assert_eq!(reencoded, encoded);
}

#[cfg(feature = "native")]
mod native {
    use super::*;

    fn native(encoded: &[u8]) -> Box<dyn Cms> {
        CmsFactory::create_with(encoded, CmsBackend::Native).unwrap()
    }

    #[test]
    fn native_engine_agrees_with_managed() {
        let encoded = signed_data(&[b"package hash"]);
        let cms = native(&encoded);
        assert_eq!(cms.backend(), CmsBackend::Native);
        assert_eq!(
            cms.primary_signature_value().unwrap(),
            managed(&encoded).primary_signature_value().unwrap()
        );
    }

    #[test]
    fn native_engine_enforces_cardinality() {
        let encoded = signed_data(&[b"one", b"two"]);
        assert!(matches!(
            CmsFactory::create_with(&encoded, CmsBackend::Native),
            Err(Error::NotExactlyOnePrimarySignature(2))
        ));
    }

    #[test]
    fn native_timestamp_and_repository_countersignature() {
        let encoded = signed_data(&[b"package hash"]);
        let (certificate, key) = certificate_and_key("repository.test");

        let mut cms = native(&encoded);
        cms.add_timestamp(&fake_timestamp_token(4)).unwrap();
        let config = CmsSignerConfig::repository(certificate.clone(), HashAlgorithmName::Sha256);
        cms.add_countersignature(&config, &key).unwrap();
        cms.add_timestamp_to_repository_countersignature(&fake_timestamp_token(5))
            .unwrap();
        cms.add_certificates(&[certificate.clone(), certificate]).unwrap();
        assert_eq!(cms.certificate_count().unwrap(), 1);

        let reread = managed(&cms.encode().unwrap());
        assert_eq!(
            reread.primary_signature_unsigned_attribute_count().unwrap(),
            2
        );
        assert!(reread.repository_countersignature_value().unwrap().is_some());
    }

    #[test]
    fn native_engine_recognises_repository_primary_signatures() {
        assert!(
            native(&repository_signed_data(b"package hash"))
                .primary_signature_is_repository()
                .unwrap()
        );
        assert!(
            !native(&signed_data(&[b"package hash"]))
                .primary_signature_is_repository()
                .unwrap()
        );
    }

    #[test]
    fn native_engine_removes_repository_countersignatures() {
        let encoded = signed_data(&[b"package hash"]);
        let mut cms = native(&encoded);
        heavily_countersigned(cms.as_mut());

        assert_eq!(cms.remove_repository_countersignatures().unwrap(), 2);
        let reencoded = cms.encode().unwrap();

        let reread = managed(&reencoded);
        assert!(reread.repository_countersignature_value().unwrap().is_none());
        assert_eq!(
            reread.primary_signature_unsigned_attribute_count().unwrap(),
            2
        );
        assert_eq!(countersigners(&reencoded).len(), 1);
    }
}
