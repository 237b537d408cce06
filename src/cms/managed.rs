use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{CertificateSet, SignedData, SignerInfo, SignerInfos};
use der::asn1::SetOfVec;
use der::{Any, Decode, Encode};
use x509_cert::Certificate;

use super::attributes::{
    append_attribute, countersignature_attribute, find_repository_countersignature,
    is_repository_signer, replace_countersignature, strip_repository_countersignatures,
    timestamp_attribute,
};
use super::countersign::{CmsSignerConfig, SigningKey, build_countersigner};
use super::{Cms, oids};
use crate::config::CmsBackend;
use crate::error::{Error, Result};

/// CMS engine working on the decoded `SignedData` structure.
#[derive(Clone, Debug)]
pub struct ManagedCms {
    signed_data: SignedData,
}

impl ManagedCms {
    /// Decode a DER `ContentInfo` holding `SignedData` with exactly one signer.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let content_info = ContentInfo::from_der(bytes)?;
        if content_info.content_type != oids::SIGNED_DATA {
            return Err(Error::UnexpectedContentType(content_info.content_type));
        }

        let signed_data = SignedData::from_der(&content_info.content.to_der()?)?;
        let signers = signed_data.signer_infos.0.len();
        if signers != 1 {
            return Err(Error::NotExactlyOnePrimarySignature(signers));
        }

        Ok(Self { signed_data })
    }

    pub fn signed_data(&self) -> &SignedData {
        &self.signed_data
    }

    fn primary_signer(&self) -> Result<&SignerInfo> {
        self.signed_data
            .signer_infos
            .0
            .get(0)
            .ok_or(Error::NotExactlyOnePrimarySignature(0))
    }

    /// Apply `update` to the primary signer and store the result.
    fn update_primary_signer(
        &mut self,
        update: impl FnOnce(&mut SignerInfo) -> Result<()>,
    ) -> Result<()> {
        let mut signer = self.primary_signer()?.clone();
        update(&mut signer)?;
        self.signed_data.signer_infos = SignerInfos(SetOfVec::try_from(vec![signer])?);
        Ok(())
    }
}

impl Cms for ManagedCms {
    fn backend(&self) -> CmsBackend {
        CmsBackend::Managed
    }

    fn primary_signature_value(&self) -> Result<Vec<u8>> {
        Ok(self.primary_signer()?.signature.as_bytes().to_vec())
    }

    fn repository_countersignature_value(&self) -> Result<Option<Vec<u8>>> {
        let signer = self.primary_signer()?;
        Ok(find_repository_countersignature(signer.unsigned_attrs.as_ref())?
            .map(|location| location.signer_info.signature.as_bytes().to_vec()))
    }

    fn add_certificates(&mut self, certificates: &[Certificate]) -> Result<()> {
        let mut choices = self
            .signed_data
            .certificates
            .as_ref()
            .map(|set| set.0.as_slice().to_vec())
            .unwrap_or_default();

        for certificate in certificates {
            let choice = CertificateChoices::Certificate(certificate.clone());
            if !choices.contains(&choice) {
                choices.push(choice);
            }
        }

        log::debug!("SignedData now carries {} certificates", choices.len());
        self.signed_data.certificates = Some(CertificateSet(SetOfVec::try_from(choices)?));
        Ok(())
    }

    fn add_countersignature(&mut self, config: &CmsSignerConfig, key: &SigningKey) -> Result<()> {
        let primary_value = self.primary_signature_value()?;
        let countersigner = build_countersigner(config, key, &primary_value)?;
        let attribute = countersignature_attribute(&countersigner)?;

        log::debug!("adding countersignature by {}", config.certificate.tbs_certificate.subject);
        self.update_primary_signer(|signer| {
            signer.unsigned_attrs = Some(append_attribute(signer.unsigned_attrs.as_ref(), attribute)?);
            Ok(())
        })
    }

    fn add_timestamp(&mut self, token: &[u8]) -> Result<()> {
        let attribute = timestamp_attribute(token)?;

        log::debug!("adding {} byte timestamp to the primary signature", token.len());
        self.update_primary_signer(|signer| {
            signer.unsigned_attrs = Some(append_attribute(signer.unsigned_attrs.as_ref(), attribute)?);
            Ok(())
        })
    }

    fn add_timestamp_to_repository_countersignature(&mut self, token: &[u8]) -> Result<()> {
        let attribute = timestamp_attribute(token)?;

        self.update_primary_signer(|signer| {
            let unsigned_attrs = signer
                .unsigned_attrs
                .as_ref()
                .ok_or(Error::RepositoryCountersignatureNotFound)?;
            let location = find_repository_countersignature(Some(unsigned_attrs))?
                .ok_or(Error::RepositoryCountersignatureNotFound)?;

            let mut countersigner = location.signer_info.clone();
            countersigner.unsigned_attrs = Some(append_attribute(
                countersigner.unsigned_attrs.as_ref(),
                attribute,
            )?);

            log::debug!(
                "re-adding repository countersignature from unsigned attribute {} with a timestamp",
                location.attribute_index
            );
            signer.unsigned_attrs = Some(replace_countersignature(
                unsigned_attrs,
                &location,
                &countersigner,
            )?);
            Ok(())
        })
    }

    fn primary_signature_is_repository(&self) -> Result<bool> {
        Ok(is_repository_signer(self.primary_signer()?))
    }

    fn remove_repository_countersignatures(&mut self) -> Result<usize> {
        let Some(unsigned_attrs) = &self.primary_signer()?.unsigned_attrs else {
            return Ok(0);
        };
        let (remaining, removed) = strip_repository_countersignatures(unsigned_attrs)?;
        if removed == 0 {
            return Ok(0);
        }

        log::debug!("removing {removed} repository countersignatures");
        self.update_primary_signer(|signer| {
            signer.unsigned_attrs = remaining;
            Ok(())
        })?;
        Ok(removed)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let content_info = ContentInfo {
            content_type: oids::SIGNED_DATA,
            content: Any::encode_from(&self.signed_data)?,
        };
        Ok(content_info.to_der()?)
    }

    fn primary_signature_unsigned_attribute_count(&self) -> Result<usize> {
        Ok(self
            .primary_signer()?
            .unsigned_attrs
            .as_ref()
            .map_or(0, |attrs| attrs.len()))
    }

    fn certificate_count(&self) -> Result<usize> {
        Ok(self
            .signed_data
            .certificates
            .as_ref()
            .map_or(0, |set| set.0.len()))
    }
}
