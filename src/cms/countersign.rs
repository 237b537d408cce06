//! Building countersigner `SignerInfo`s.

use std::time::SystemTime;

use cms::cert::IssuerAndSerialNumber;
use cms::content_info::CmsVersion;
use cms::signed_data::{SignerIdentifier, SignerInfo};
use der::asn1::{OctetString, SetOfVec, UtcTime};
use der::{Any, Decode, Encode};
use p256::ecdsa::signature::hazmat::PrehashSigner;
use signature::{SignatureEncoding, Signer};
use spki::{AlgorithmIdentifierOwned, ObjectIdentifier};
use x509_cert::Certificate;
use x509_cert::attr::Attribute;

use super::attributes::{
    commitment_type_attribute, signing_certificate_v2_attribute, single_value_attribute,
};
use super::oids;
use crate::error::{Error, Result};
use crate::package::{HashAlgorithmName, Hasher};

/// What a countersigner signs with and which signed attributes it carries.
#[derive(Clone, Debug)]
pub struct CmsSignerConfig {
    pub certificate: Certificate,
    pub hash_algorithm: HashAlgorithmName,
    /// Commitment type written as a `commitmentTypeIndication` attribute.
    pub commitment_type: Option<ObjectIdentifier>,
    /// Adds a `signingCertificateV2` attribute binding the certificate.
    pub include_signing_certificate: bool,
    /// Extra signed attributes, added after the generated ones.
    pub signed_attributes: Vec<Attribute>,
}

impl CmsSignerConfig {
    pub fn new(certificate: Certificate, hash_algorithm: HashAlgorithmName) -> Self {
        Self {
            certificate,
            hash_algorithm,
            commitment_type: None,
            include_signing_certificate: true,
            signed_attributes: Vec::new(),
        }
    }

    /// Countersigner config for a repository, marked with proof of receipt.
    pub fn repository(certificate: Certificate, hash_algorithm: HashAlgorithmName) -> Self {
        Self::new(certificate, hash_algorithm)
            .with_commitment_type(oids::COMMITMENT_TYPE_PROOF_OF_RECEIPT)
    }

    pub fn with_commitment_type(mut self, commitment_type: ObjectIdentifier) -> Self {
        self.commitment_type = Some(commitment_type);
        self
    }

    pub fn with_signing_certificate(mut self, include: bool) -> Self {
        self.include_signing_certificate = include;
        self
    }

    pub fn with_signed_attribute(mut self, attribute: Attribute) -> Self {
        self.signed_attributes.push(attribute);
        self
    }
}

/// Private keys accepted for countersigning.
#[derive(Clone)]
pub enum SigningKey {
    EcdsaP256(p256::ecdsa::SigningKey),
    Rsa(rsa::RsaPrivateKey),
}

impl SigningKey {
    /// Load a PKCS#8 DER private key, trying P-256 and then RSA.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        use p256::pkcs8::DecodePrivateKey;

        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
            return Ok(SigningKey::EcdsaP256(key));
        }
        rsa::RsaPrivateKey::from_pkcs8_der(der)
            .map(SigningKey::Rsa)
            .map_err(|e| Error::Signing(format!("unsupported private key: {e}")))
    }

    fn signature_algorithm(&self, hash: HashAlgorithmName) -> Result<AlgorithmIdentifierOwned> {
        let (oid, parameters) = match (self, hash) {
            (SigningKey::EcdsaP256(_), HashAlgorithmName::Sha256) => (oids::ECDSA_WITH_SHA_256, None),
            (SigningKey::EcdsaP256(_), HashAlgorithmName::Sha384) => (oids::ECDSA_WITH_SHA_384, None),
            (SigningKey::EcdsaP256(_), HashAlgorithmName::Sha512) => (oids::ECDSA_WITH_SHA_512, None),
            (SigningKey::Rsa(_), hash) => {
                let oid = match hash {
                    HashAlgorithmName::Sha256 => oids::SHA_256_WITH_RSA_ENCRYPTION,
                    HashAlgorithmName::Sha384 => oids::SHA_384_WITH_RSA_ENCRYPTION,
                    HashAlgorithmName::Sha512 => oids::SHA_512_WITH_RSA_ENCRYPTION,
                };
                (oid, Some(Any::from_der(&[0x05, 0x00])?))
            }
        };
        Ok(AlgorithmIdentifierOwned { oid, parameters })
    }

    fn sign(&self, hash: HashAlgorithmName, message: &[u8]) -> Result<Vec<u8>> {
        let signing_error = |e: signature::Error| Error::Signing(e.to_string());

        match self {
            SigningKey::EcdsaP256(key) => {
                let mut hasher = Hasher::new(hash);
                hasher.update(message);
                let signature: p256::ecdsa::Signature =
                    key.sign_prehash(&hasher.finalize()).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            SigningKey::Rsa(key) => {
                let signature = match hash {
                    HashAlgorithmName::Sha256 => {
                        rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(key.clone())
                            .try_sign(message)
                            .map_err(signing_error)?
                    }
                    HashAlgorithmName::Sha384 => {
                        rsa::pkcs1v15::SigningKey::<sha2::Sha384>::new(key.clone())
                            .try_sign(message)
                            .map_err(signing_error)?
                    }
                    HashAlgorithmName::Sha512 => {
                        rsa::pkcs1v15::SigningKey::<sha2::Sha512>::new(key.clone())
                            .try_sign(message)
                            .map_err(signing_error)?
                    }
                };
                Ok(signature.to_vec())
            }
        }
    }
}

/// Build a `SignerInfo` countersigning `signature_value`.
///
/// The signed attributes always carry the message digest of
/// `signature_value` and the signing time.
pub fn build_countersigner(
    config: &CmsSignerConfig,
    key: &SigningKey,
    signature_value: &[u8],
) -> Result<SignerInfo> {
    let mut hasher = Hasher::new(config.hash_algorithm);
    hasher.update(signature_value);
    let digest = hasher.finalize();

    let mut signed = vec![
        single_value_attribute(
            oids::MESSAGE_DIGEST,
            Any::encode_from(&OctetString::new(digest)?)?,
        )?,
        single_value_attribute(
            oids::SIGNING_TIME,
            Any::encode_from(&UtcTime::from_system_time(SystemTime::now())?)?,
        )?,
    ];
    if let Some(commitment_type) = config.commitment_type {
        signed.push(commitment_type_attribute(commitment_type)?);
    }
    if config.include_signing_certificate {
        signed.push(signing_certificate_v2_attribute(
            &config.certificate,
            config.hash_algorithm,
        )?);
    }
    signed.extend(config.signed_attributes.iter().cloned());

    let signed_attrs = SetOfVec::try_from(signed)?;
    let signature = key.sign(config.hash_algorithm, &signed_attrs.to_der()?)?;

    let tbs = &config.certificate.tbs_certificate;
    Ok(SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: tbs.issuer.clone(),
            serial_number: tbs.serial_number.clone(),
        }),
        digest_alg: AlgorithmIdentifierOwned {
            oid: config.hash_algorithm.oid(),
            parameters: None,
        },
        signed_attrs: Some(signed_attrs),
        signature_algorithm: key.signature_algorithm(config.hash_algorithm)?,
        signature: OctetString::new(signature)?,
        unsigned_attrs: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::attributes::is_repository_signer;
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use p256::ecdsa::{Signature, VerifyingKey};

    fn certificate_and_key() -> (Certificate, SigningKey) {
        let certified = rcgen::generate_simple_self_signed(["repo.test".to_string()]).unwrap();
        let certificate = Certificate::from_der(certified.cert.der()).unwrap();
        let key = SigningKey::from_pkcs8_der(&certified.key_pair.serialize_der()).unwrap();
        (certificate, key)
    }

    #[test]
    fn countersigner_signs_its_attributes() {
        let (certificate, key) = certificate_and_key();
        let config = CmsSignerConfig::repository(certificate, HashAlgorithmName::Sha256);
        let signer = build_countersigner(&config, &key, b"primary signature").unwrap();

        assert!(is_repository_signer(&signer));
        assert_eq!(signer.signature_algorithm.oid, oids::ECDSA_WITH_SHA_256);

        let signed_attrs = signer.signed_attrs.as_ref().unwrap();
        let digest_attr = signed_attrs
            .iter()
            .find(|a| a.oid == oids::MESSAGE_DIGEST)
            .unwrap();
        let digest = OctetString::from_der(&digest_attr.values.get(0).unwrap().to_der().unwrap())
            .unwrap();
        let mut hasher = Hasher::new(HashAlgorithmName::Sha256);
        hasher.update(b"primary signature");
        assert_eq!(digest.as_bytes(), hasher.finalize().as_slice());

        let SigningKey::EcdsaP256(secret) = &key else {
            panic!("rcgen keys are P-256");
        };
        let mut hasher = Hasher::new(HashAlgorithmName::Sha256);
        hasher.update(&signed_attrs.to_der().unwrap());
        let signature = Signature::from_der(signer.signature.as_bytes()).unwrap();
        VerifyingKey::from(secret)
            .verify_prehash(&hasher.finalize(), &signature)
            .unwrap();
    }

    #[test]
    fn plain_countersigner_is_not_a_repository_one() {
        let (certificate, key) = certificate_and_key();
        let content_type =
            single_value_attribute(oids::CONTENT_TYPE, Any::encode_from(&oids::DATA).unwrap())
                .unwrap();
        let config = CmsSignerConfig::new(certificate, HashAlgorithmName::Sha384)
            .with_signing_certificate(false)
            .with_signed_attribute(content_type);
        let signer = build_countersigner(&config, &key, b"x").unwrap();

        assert!(!is_repository_signer(&signer));
        let signed_attrs = signer.signed_attrs.unwrap();
        assert_eq!(signed_attrs.len(), 3);
        assert!(signed_attrs.iter().any(|a| a.oid == oids::CONTENT_TYPE));
        assert_eq!(signer.digest_alg.oid, oids::ID_SHA_384);
    }

    #[test]
    fn rejects_unknown_key_material() {
        assert!(SigningKey::from_pkcs8_der(&[0x30, 0x00]).is_err());
    }
}
