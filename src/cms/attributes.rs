//! Attribute values carried by package signers and countersigners.

use cms::signed_data::{SignerInfo, UnsignedAttributes};
use der::asn1::{OctetString, SetOfVec};
use der::{Any, Decode, Encode, Sequence};
use spki::{AlgorithmIdentifierOwned, ObjectIdentifier};
use x509_cert::Certificate;
use x509_cert::attr::Attribute;

use super::oids;
use crate::error::Result;
use crate::package::{HashAlgorithmName, Hasher};

/// `CommitmentTypeIndication` from RFC 5126.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CommitmentTypeIndication {
    pub commitment_type_id: ObjectIdentifier,
    pub commitment_type_qualifier: Option<Any>,
}

/// `ESSCertIDv2` from RFC 5035. An absent hash algorithm means SHA-256.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EssCertIdV2 {
    pub hash_algorithm: Option<AlgorithmIdentifierOwned>,
    pub cert_hash: OctetString,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SigningCertificateV2 {
    pub certs: Vec<EssCertIdV2>,
}

/// A countersignature found in the primary signer's unsigned attributes.
#[derive(Clone, Debug)]
pub struct CountersignatureLocation {
    /// Index into the primary signer's unsigned attributes.
    pub attribute_index: usize,
    /// Index into that attribute's values.
    pub value_index: usize,
    pub signer_info: SignerInfo,
}

/// Build a single-valued attribute.
pub fn single_value_attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// Wrap an encoded RFC 3161 token (a `ContentInfo`) as a `signatureTimeStampToken`.
pub fn timestamp_attribute(token: &[u8]) -> Result<Attribute> {
    single_value_attribute(oids::SIGNATURE_TIME_STAMP_TOKEN, Any::from_der(token)?)
}

pub fn countersignature_attribute(signer_info: &SignerInfo) -> Result<Attribute> {
    single_value_attribute(oids::COUNTERSIGNATURE, Any::encode_from(signer_info)?)
}

pub fn commitment_type_attribute(commitment_type_id: ObjectIdentifier) -> Result<Attribute> {
    let value = CommitmentTypeIndication {
        commitment_type_id,
        commitment_type_qualifier: None,
    };
    single_value_attribute(oids::COMMITMENT_TYPE_INDICATION, Any::encode_from(&value)?)
}

pub fn signing_certificate_v2_attribute(
    certificate: &Certificate,
    hash_algorithm: HashAlgorithmName,
) -> Result<Attribute> {
    let mut hasher = Hasher::new(hash_algorithm);
    hasher.update(&certificate.to_der()?);

    let hash_algorithm = match hash_algorithm {
        HashAlgorithmName::Sha256 => None,
        other => Some(AlgorithmIdentifierOwned {
            oid: other.oid(),
            parameters: None,
        }),
    };
    let value = SigningCertificateV2 {
        certs: vec![EssCertIdV2 {
            hash_algorithm,
            cert_hash: OctetString::new(hasher.finalize())?,
        }],
    };
    single_value_attribute(oids::SIGNING_CERTIFICATE_V2, Any::encode_from(&value)?)
}

/// Add `attribute` to an attribute set, creating the set if needed.
pub fn append_attribute(
    attributes: Option<&SetOfVec<Attribute>>,
    attribute: Attribute,
) -> Result<SetOfVec<Attribute>> {
    let mut all = attributes.map(|a| a.as_slice().to_vec()).unwrap_or_default();
    all.push(attribute);
    Ok(SetOfVec::try_from(all)?)
}

/// Whether a DER `CommitmentTypeIndication` names proof of receipt.
pub fn is_proof_of_receipt(value: &[u8]) -> bool {
    CommitmentTypeIndication::from_der(value)
        .is_ok_and(|indication| indication.commitment_type_id == oids::COMMITMENT_TYPE_PROOF_OF_RECEIPT)
}

/// Whether a signer's signed attributes carry a proof-of-receipt commitment,
/// which marks a repository signature or countersignature.
pub fn is_repository_signer(signer_info: &SignerInfo) -> bool {
    let Some(signed_attrs) = &signer_info.signed_attrs else {
        return false;
    };

    signed_attrs
        .iter()
        .filter(|attr| attr.oid == oids::COMMITMENT_TYPE_INDICATION)
        .flat_map(|attr| attr.values.iter())
        .filter_map(|value| value.to_der().ok())
        .any(|der| is_proof_of_receipt(&der))
}

/// Every countersignature in `unsigned_attrs`, in attribute order.
pub fn countersignatures(
    unsigned_attrs: Option<&UnsignedAttributes>,
) -> Result<Vec<CountersignatureLocation>> {
    let mut found = Vec::new();
    let Some(unsigned_attrs) = unsigned_attrs else {
        return Ok(found);
    };

    for (attribute_index, attr) in unsigned_attrs.iter().enumerate() {
        if attr.oid != oids::COUNTERSIGNATURE {
            continue;
        }
        for (value_index, value) in attr.values.iter().enumerate() {
            found.push(CountersignatureLocation {
                attribute_index,
                value_index,
                signer_info: SignerInfo::from_der(&value.to_der()?)?,
            });
        }
    }

    Ok(found)
}

/// The first countersignature marked as the repository's.
pub fn find_repository_countersignature(
    unsigned_attrs: Option<&UnsignedAttributes>,
) -> Result<Option<CountersignatureLocation>> {
    Ok(countersignatures(unsigned_attrs)?
        .into_iter()
        .find(|location| is_repository_signer(&location.signer_info)))
}

/// Replace the countersignature at `location` with `updated`.
///
/// The old attribute is removed and a new one holding the remaining values
/// plus `updated` is added back.
pub fn replace_countersignature(
    unsigned_attrs: &UnsignedAttributes,
    location: &CountersignatureLocation,
    updated: &SignerInfo,
) -> Result<UnsignedAttributes> {
    let mut attributes = unsigned_attrs.as_slice().to_vec();
    let old = attributes.remove(location.attribute_index);

    let mut values: Vec<Any> = old
        .values
        .into_vec()
        .into_iter()
        .enumerate()
        .filter(|(i, _)| *i != location.value_index)
        .map(|(_, v)| v)
        .collect();
    values.push(Any::encode_from(updated)?);

    attributes.push(Attribute {
        oid: oids::COUNTERSIGNATURE,
        values: SetOfVec::try_from(values)?,
    });
    Ok(SetOfVec::try_from(attributes)?)
}

/// Drop every repository countersignature from `unsigned_attrs`.
///
/// Countersignature attributes left without values are dropped too. Returns
/// what remains, `None` if nothing does, and how many were removed.
pub fn strip_repository_countersignatures(
    unsigned_attrs: &UnsignedAttributes,
) -> Result<(Option<UnsignedAttributes>, usize)> {
    let mut removed = 0;
    let mut kept = Vec::new();

    for attr in unsigned_attrs.iter() {
        if attr.oid != oids::COUNTERSIGNATURE {
            kept.push(attr.clone());
            continue;
        }

        let mut values = Vec::new();
        for value in attr.values.iter() {
            if is_repository_signer(&SignerInfo::from_der(&value.to_der()?)?) {
                removed += 1;
            } else {
                values.push(value.clone());
            }
        }
        if !values.is_empty() {
            kept.push(Attribute {
                oid: oids::COUNTERSIGNATURE,
                values: SetOfVec::try_from(values)?,
            });
        }
    }

    let remaining = if kept.is_empty() {
        None
    } else {
        Some(SetOfVec::try_from(kept)?)
    };
    Ok((remaining, removed))
}
