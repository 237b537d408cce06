//! CMS engine driving OpenSSL's `CMS_ContentInfo` in place.
//!
//! Attribute values OpenSSL hands back are decoded with the `cms` crate;
//! new attributes are built in Rust and handed over as DER. Buffers passed
//! across the boundary come from a [`HeapBlockRetainer`] scoped to the call.

use std::ffi::{c_int, c_void};

use cms::signed_data::SignerInfo;
use der::{Decode, Encode};
use x509_cert::Certificate;

use super::attributes::{
    append_attribute, countersignature_attribute, is_proof_of_receipt, is_repository_signer,
    timestamp_attribute,
};
use super::countersign::{CmsSignerConfig, SigningKey, build_countersigner};
use super::{Cms, oids};
use crate::config::CmsBackend;
use crate::error::{Error, Result};
use crate::interop::ffi::{self, CMS_SignerInfo, ContentInfoHandle, X509_ATTRIBUTE, X509Handle};
use crate::interop::{HeapBlockRetainer, with_retainer};

use openssl_sys as ossl;

/// A countersignature found among the primary signer's unsigned attributes.
struct NativeCountersignature {
    attribute_index: c_int,
    value_index: c_int,
    value_count: c_int,
    signer_info: SignerInfo,
}

pub struct NativeCms {
    handle: ContentInfoHandle,
}

impl NativeCms {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let handle = ContentInfoHandle::from_der(bytes)?;

        let content_type = with_retainer(|retainer| {
            // SAFETY: the handle is live; the returned object is borrowed from it.
            let obj = unsafe { ffi::CMS_get0_type(handle.as_ptr()) };
            ffi::object_text(retainer, obj)
        })?;
        if content_type != oids::SIGNED_DATA.to_string() {
            let oid = content_type
                .parse()
                .map_err(|_| Error::InvalidSignatureEntry(content_type.clone()))?;
            return Err(Error::UnexpectedContentType(oid));
        }

        let cms = Self { handle };
        let signers = cms.signer_count()?;
        if signers != 1 {
            return Err(Error::NotExactlyOnePrimarySignature(signers));
        }
        Ok(cms)
    }

    fn signer_count(&self) -> Result<usize> {
        // SAFETY: the stack belongs to the live handle.
        unsafe {
            let signers = ffi::CMS_get0_SignerInfos(self.handle.as_ptr());
            if signers.is_null() {
                return Ok(0);
            }
            Ok(ossl::OPENSSL_sk_num(signers).max(0) as usize)
        }
    }

    fn primary_signer(&self) -> Result<*mut CMS_SignerInfo> {
        // SAFETY: decode guaranteed exactly one signer; the pointer is
        // borrowed from the handle and only used while `self` is alive.
        unsafe {
            let signers = ffi::CMS_get0_SignerInfos(self.handle.as_ptr());
            let signer = ffi::non_null(signers, "CMS_get0_SignerInfos")?;
            let si = ossl::OPENSSL_sk_value(signer.as_ptr(), 0) as *mut CMS_SignerInfo;
            Ok(ffi::non_null(si, "OPENSSL_sk_value")?.as_ptr())
        }
    }

    /// Every countersignature on the primary signer, in attribute order.
    fn countersignatures(&self, retainer: &HeapBlockRetainer) -> Result<Vec<NativeCountersignature>> {
        let si = self.primary_signer()?;
        let countersignature = oids::COUNTERSIGNATURE.to_string();
        let mut found = Vec::new();

        // SAFETY: attributes and values are borrowed from the signer, which
        // stays alive and unmodified for the duration of the loop.
        unsafe {
            for attribute_index in 0..ffi::CMS_unsigned_get_attr_count(si) {
                let attr = ffi::CMS_unsigned_get_attr(si, attribute_index);
                let attr = ffi::non_null(attr, "CMS_unsigned_get_attr")?.as_ptr();
                let obj = ffi::X509_ATTRIBUTE_get0_object(attr);
                if ffi::object_text(retainer, obj)? != countersignature {
                    continue;
                }

                let values = attribute_values(attr)?;
                let value_count = values.len() as c_int;
                for (value_index, der) in values.iter().enumerate() {
                    found.push(NativeCountersignature {
                        attribute_index,
                        value_index: value_index as c_int,
                        value_count,
                        signer_info: SignerInfo::from_der(der)?,
                    });
                }
            }
        }

        Ok(found)
    }

    fn repository_countersignature(
        &self,
        retainer: &HeapBlockRetainer,
    ) -> Result<Option<NativeCountersignature>> {
        Ok(self
            .countersignatures(retainer)?
            .into_iter()
            .find(|c| is_repository_signer(&c.signer_info)))
    }

    /// Append an unsigned attribute whose single value is the DER `value`.
    fn add_unsigned_attribute(
        &self,
        retainer: &HeapBlockRetainer,
        si: *mut CMS_SignerInfo,
        oid: &str,
        value: &[u8],
    ) -> Result<()> {
        let name = retainer.alloc_ascii_string(oid)?;
        let data = retainer.alloc_bytes(value)?;
        let len = c_int::try_from(value.len())
            .map_err(|_| Error::Signing(format!("{} byte attribute is too large", value.len())))?;

        // SAFETY: both blocks live until the retainer is dropped, after this
        // call; OpenSSL copies the data.
        let ok = unsafe {
            ffi::CMS_unsigned_add1_attr_by_txt(
                si,
                name.as_c_str(),
                ossl::V_ASN1_SEQUENCE,
                data.as_ptr().cast::<c_void>().cast_const(),
                len,
            )
        };
        if ok != 1 {
            return Err(ffi::last_error("CMS_unsigned_add1_attr_by_txt"));
        }
        Ok(())
    }

    fn certificates_der(&self) -> Result<Vec<Vec<u8>>> {
        // SAFETY: CMS_get1_certs returns a new stack holding one reference per
        // certificate; each is moved into an X509Handle and the stack freed.
        unsafe {
            let stack = ffi::CMS_get1_certs(self.handle.as_ptr());
            if stack.is_null() {
                return Ok(Vec::new());
            }
            let count = ossl::OPENSSL_sk_num(stack).max(0);
            let handles: Vec<X509Handle> = (0..count)
                .filter_map(|i| std::ptr::NonNull::new(ossl::OPENSSL_sk_value(stack, i) as *mut ffi::X509))
                .map(|ptr| X509Handle::from_owned(ptr))
                .collect();
            ossl::OPENSSL_sk_free(stack);

            handles.iter().map(X509Handle::to_der).collect()
        }
    }
}

/// DER of each value of `attr`.
///
/// # Safety
///
/// `attr` must point to a live attribute.
unsafe fn attribute_values(attr: *mut X509_ATTRIBUTE) -> Result<Vec<Vec<u8>>> {
    unsafe {
        (0..ffi::X509_ATTRIBUTE_count(attr))
            .map(|index| {
                let value = ffi::X509_ATTRIBUTE_get0_type(attr, index);
                let value = ffi::non_null(value, "X509_ATTRIBUTE_get0_type")?.as_ptr();
                ffi::encode_with("i2d_ASN1_TYPE", |out| ffi::i2d_ASN1_TYPE(value, out))
            })
            .collect()
    }
}

impl Cms for NativeCms {
    fn backend(&self) -> CmsBackend {
        CmsBackend::Native
    }

    fn primary_signature_value(&self) -> Result<Vec<u8>> {
        let si = self.primary_signer()?;
        // SAFETY: the signature string is borrowed from the live signer.
        unsafe {
            let signature = ffi::CMS_SignerInfo_get0_signature(si);
            let signature = ffi::non_null(signature, "CMS_SignerInfo_get0_signature")?;
            Ok(ffi::string_bytes(signature.as_ptr()))
        }
    }

    fn repository_countersignature_value(&self) -> Result<Option<Vec<u8>>> {
        with_retainer(|retainer| {
            Ok(self
                .repository_countersignature(retainer)?
                .map(|c| c.signer_info.signature.as_bytes().to_vec()))
        })
    }

    fn add_certificates(&mut self, certificates: &[Certificate]) -> Result<()> {
        let mut existing = self.certificates_der()?;

        for certificate in certificates {
            let der = certificate.to_der()?;
            if existing.contains(&der) {
                continue;
            }
            let x509 = X509Handle::from_der(&der)?;
            // SAFETY: CMS_add1_cert takes its own reference.
            if unsafe { ffi::CMS_add1_cert(self.handle.as_ptr(), x509.as_ptr()) } != 1 {
                return Err(ffi::last_error("CMS_add1_cert"));
            }
            existing.push(der);
        }
        Ok(())
    }

    fn add_countersignature(&mut self, config: &CmsSignerConfig, key: &SigningKey) -> Result<()> {
        let primary_value = self.primary_signature_value()?;
        let countersigner = build_countersigner(config, key, &primary_value)?;
        let value = countersignature_attribute(&countersigner)?
            .values
            .get(0)
            .ok_or(Error::Signing("empty countersignature attribute".into()))?
            .to_der()?;

        log::debug!("adding countersignature by {}", config.certificate.tbs_certificate.subject);
        let si = self.primary_signer()?;
        with_retainer(|retainer| {
            self.add_unsigned_attribute(retainer, si, &oids::COUNTERSIGNATURE.to_string(), &value)
        })
    }

    fn add_timestamp(&mut self, token: &[u8]) -> Result<()> {
        log::debug!("adding {} byte timestamp to the primary signature", token.len());
        let si = self.primary_signer()?;
        with_retainer(|retainer| {
            self.add_unsigned_attribute(
                retainer,
                si,
                &oids::SIGNATURE_TIME_STAMP_TOKEN.to_string(),
                token,
            )
        })
    }

    fn add_timestamp_to_repository_countersignature(&mut self, token: &[u8]) -> Result<()> {
        let si = self.primary_signer()?;

        with_retainer(|retainer| {
            let repository = self
                .repository_countersignature(retainer)?
                .ok_or(Error::RepositoryCountersignatureNotFound)?;

            let mut countersigner = repository.signer_info.clone();
            countersigner.unsigned_attrs = Some(append_attribute(
                countersigner.unsigned_attrs.as_ref(),
                timestamp_attribute(token)?,
            )?);
            let updated = countersigner.to_der()?;

            // Collect the sibling values before the attribute is detached.
            let mut siblings = Vec::new();
            for c in self.countersignatures(retainer)? {
                if c.attribute_index == repository.attribute_index
                    && c.value_index != repository.value_index
                {
                    siblings.push(c.signer_info.to_der()?);
                }
            }
            debug_assert_eq!(siblings.len() as c_int, repository.value_count - 1);

            log::debug!(
                "re-adding repository countersignature from unsigned attribute {} with a timestamp",
                repository.attribute_index
            );
            // SAFETY: the index came from iterating this signer's attributes,
            // which nothing has modified since.
            let removed = unsafe { ffi::CMS_unsigned_delete_attr(si, repository.attribute_index) };
            drop(ffi::AttributeHandle::new(removed, "CMS_unsigned_delete_attr")?);

            let countersignature = oids::COUNTERSIGNATURE.to_string();
            for sibling in &siblings {
                self.add_unsigned_attribute(retainer, si, &countersignature, sibling)?;
            }
            self.add_unsigned_attribute(retainer, si, &countersignature, &updated)
        })
    }

    fn primary_signature_is_repository(&self) -> Result<bool> {
        let si = self.primary_signer()?;
        let commitment_type = oids::COMMITMENT_TYPE_INDICATION.to_string();

        with_retainer(|retainer| {
            // SAFETY: attributes are borrowed from the live signer, which is
            // not modified here.
            unsafe {
                for index in 0..ffi::CMS_signed_get_attr_count(si) {
                    let attr = ffi::CMS_signed_get_attr(si, index);
                    let attr = ffi::non_null(attr, "CMS_signed_get_attr")?.as_ptr();
                    let obj = ffi::X509_ATTRIBUTE_get0_object(attr);
                    if ffi::object_text(retainer, obj)? != commitment_type {
                        continue;
                    }
                    if attribute_values(attr)?.iter().any(|der| is_proof_of_receipt(der)) {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        })
    }

    fn remove_repository_countersignatures(&mut self) -> Result<usize> {
        let si = self.primary_signer()?;
        let countersignature = oids::COUNTERSIGNATURE.to_string();

        with_retainer(|retainer| {
            let found = self.countersignatures(retainer)?;
            let mut attribute_indices: Vec<c_int> = found
                .iter()
                .filter(|c| is_repository_signer(&c.signer_info))
                .map(|c| c.attribute_index)
                .collect();
            attribute_indices.dedup();

            let mut removed = 0;
            // Highest index first: deleting shifts only the attributes after it.
            for &attribute_index in attribute_indices.iter().rev() {
                let (repository, siblings): (Vec<_>, Vec<_>) = found
                    .iter()
                    .filter(|c| c.attribute_index == attribute_index)
                    .partition(|c| is_repository_signer(&c.signer_info));
                let siblings = siblings
                    .iter()
                    .map(|c| c.signer_info.to_der())
                    .collect::<der::Result<Vec<_>>>()?;

                log::debug!(
                    "removing {} repository countersignatures from unsigned attribute {attribute_index}",
                    repository.len()
                );
                // SAFETY: the index came from iterating this signer's
                // attributes; only later indices have been touched since.
                let detached = unsafe { ffi::CMS_unsigned_delete_attr(si, attribute_index) };
                drop(ffi::AttributeHandle::new(detached, "CMS_unsigned_delete_attr")?);

                for sibling in &siblings {
                    self.add_unsigned_attribute(retainer, si, &countersignature, sibling)?;
                }
                removed += repository.len();
            }
            Ok(removed)
        })
    }

    fn encode(&self) -> Result<Vec<u8>> {
        self.handle.to_der()
    }

    fn primary_signature_unsigned_attribute_count(&self) -> Result<usize> {
        let si = self.primary_signer()?;
        // SAFETY: the signer is live.
        let count = unsafe { ffi::CMS_unsigned_get_attr_count(si) };
        Ok(count.max(0) as usize)
    }

    fn certificate_count(&self) -> Result<usize> {
        Ok(self.certificates_der()?.len())
    }
}
