//! OpenSSL declarations used by the native CMS engine.
//!
//! openssl-sys covers decoding and freeing CMS and X.509 values but not
//! the per-signer attribute calls, so those are declared here.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_uchar, c_ulong, c_void};
use std::ptr::{self, NonNull};

use openssl_sys as ossl;

use super::HeapBlockRetainer;
use crate::error::{Error, Result};

pub use ossl::{ASN1_OBJECT, ASN1_STRING, ASN1_TYPE, CMS_ContentInfo, OPENSSL_STACK, X509};

pub enum CMS_SignerInfo {}
pub enum X509_ATTRIBUTE {}

// Available at link time since OpenSSL 1.1.0.
unsafe extern "C" {
    pub fn CMS_get0_type(cms: *const CMS_ContentInfo) -> *const ASN1_OBJECT;
    pub fn CMS_get0_SignerInfos(cms: *mut CMS_ContentInfo) -> *mut OPENSSL_STACK;
    pub fn CMS_get1_certs(cms: *mut CMS_ContentInfo) -> *mut OPENSSL_STACK;
    pub fn CMS_add1_cert(cms: *mut CMS_ContentInfo, cert: *mut X509) -> c_int;

    pub fn CMS_SignerInfo_get0_signature(si: *mut CMS_SignerInfo) -> *mut ASN1_STRING;
    pub fn CMS_signed_get_attr_count(si: *const CMS_SignerInfo) -> c_int;
    pub fn CMS_signed_get_attr(si: *const CMS_SignerInfo, loc: c_int) -> *mut X509_ATTRIBUTE;
    pub fn CMS_unsigned_get_attr_count(si: *const CMS_SignerInfo) -> c_int;
    pub fn CMS_unsigned_get_attr(si: *const CMS_SignerInfo, loc: c_int) -> *mut X509_ATTRIBUTE;
    pub fn CMS_unsigned_delete_attr(si: *mut CMS_SignerInfo, loc: c_int) -> *mut X509_ATTRIBUTE;
    pub fn CMS_unsigned_add1_attr_by_txt(
        si: *mut CMS_SignerInfo,
        attrname: *const c_char,
        type_: c_int,
        bytes: *const c_void,
        len: c_int,
    ) -> c_int;

    pub fn X509_ATTRIBUTE_get0_object(attr: *mut X509_ATTRIBUTE) -> *mut ASN1_OBJECT;
    pub fn X509_ATTRIBUTE_count(attr: *const X509_ATTRIBUTE) -> c_int;
    pub fn X509_ATTRIBUTE_get0_type(attr: *mut X509_ATTRIBUTE, idx: c_int) -> *mut ASN1_TYPE;
    pub fn X509_ATTRIBUTE_free(attr: *mut X509_ATTRIBUTE);

    pub fn i2d_ASN1_TYPE(a: *const ASN1_TYPE, out: *mut *mut c_uchar) -> c_int;

    pub fn ERR_error_string_n(e: c_ulong, buf: *mut c_char, len: usize);
}

/// Build an [`Error::Native`] from the thread's OpenSSL error queue.
pub fn last_error(function: &'static str) -> Error {
    // SAFETY: both calls only touch the thread-local error queue and the
    // buffer we own.
    unsafe {
        let code = ossl::ERR_get_error();
        let mut buf = [0 as c_char; 256];
        ERR_error_string_n(code, buf.as_mut_ptr(), buf.len());
        let message = std::ffi::CStr::from_ptr(buf.as_ptr())
            .to_string_lossy()
            .into_owned();
        Error::Native {
            function,
            code: code as u64,
            message,
        }
    }
}

/// Fail with the OpenSSL error queue unless `ptr` is non-null.
pub fn non_null<T>(ptr: *mut T, function: &'static str) -> Result<NonNull<T>> {
    NonNull::new(ptr).ok_or_else(|| last_error(function))
}

/// Run a two-pass `i2d_*` encoder into a fresh buffer.
pub fn encode_with(
    function: &'static str,
    mut encode: impl FnMut(*mut *mut c_uchar) -> c_int,
) -> Result<Vec<u8>> {
    let len = encode(ptr::null_mut());
    if len < 0 {
        return Err(last_error(function));
    }
    let mut buf = vec![0u8; len as usize];
    let mut out = buf.as_mut_ptr();
    if encode(&mut out) != len {
        return Err(last_error(function));
    }
    Ok(buf)
}

/// Dotted-decimal text of an object identifier.
pub fn object_text(retainer: &HeapBlockRetainer, obj: *const ASN1_OBJECT) -> Result<String> {
    const CAPACITY: usize = 128;
    let buf = retainer.alloc(CAPACITY)?;

    // SAFETY: buf holds CAPACITY bytes and outlives the call.
    let written =
        unsafe { ossl::OBJ_obj2txt(buf.cast(), CAPACITY as c_int, obj, 1) };
    if written <= 0 || written as usize >= CAPACITY {
        return Err(last_error("OBJ_obj2txt"));
    }
    Ok(String::from_utf8_lossy(&buf.as_slice()[..written as usize]).into_owned())
}

/// Copy the contents of an `ASN1_STRING`.
///
/// # Safety
///
/// `s` must point to a live `ASN1_STRING`.
pub unsafe fn string_bytes(s: *const ASN1_STRING) -> Vec<u8> {
    unsafe {
        let data = ossl::ASN1_STRING_get0_data(s);
        let len = ossl::ASN1_STRING_length(s);
        if data.is_null() || len <= 0 {
            return Vec::new();
        }
        std::slice::from_raw_parts(data, len as usize).to_vec()
    }
}

/// Owned `CMS_ContentInfo`.
pub struct ContentInfoHandle(NonNull<CMS_ContentInfo>);

impl ContentInfoHandle {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        ossl::init();
        let mut p = der.as_ptr();
        // SAFETY: p walks within `der`, whose length is passed alongside.
        let cms = unsafe {
            ossl::d2i_CMS_ContentInfo(ptr::null_mut(), &mut p, der.len() as std::ffi::c_long)
        };
        non_null(cms, "d2i_CMS_ContentInfo").map(Self)
    }

    pub fn as_ptr(&self) -> *mut CMS_ContentInfo {
        self.0.as_ptr()
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        // SAFETY: the handle is live for the duration of both passes.
        encode_with("i2d_CMS_ContentInfo", |out| unsafe {
            ossl::i2d_CMS_ContentInfo(self.as_ptr(), out)
        })
    }
}

impl Drop for ContentInfoHandle {
    fn drop(&mut self) {
        // SAFETY: we own the only reference.
        unsafe { ossl::CMS_ContentInfo_free(self.0.as_ptr()) }
    }
}

/// Owned `X509`.
pub struct X509Handle(NonNull<X509>);

impl X509Handle {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let mut p = der.as_ptr();
        // SAFETY: as for d2i_CMS_ContentInfo.
        let x509 =
            unsafe { ossl::d2i_X509(ptr::null_mut(), &mut p, der.len() as std::ffi::c_long) };
        non_null(x509, "d2i_X509").map(Self)
    }

    /// Take ownership of a reference the caller already holds.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live `X509` whose reference is transferred.
    pub unsafe fn from_owned(ptr: NonNull<X509>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *mut X509 {
        self.0.as_ptr()
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        // SAFETY: the handle is live for the duration of both passes.
        encode_with("i2d_X509", |out| unsafe { ossl::i2d_X509(self.as_ptr(), out) })
    }
}

impl Drop for X509Handle {
    fn drop(&mut self) {
        // SAFETY: we own this reference.
        unsafe { ossl::X509_free(self.0.as_ptr()) }
    }
}

/// Owned `X509_ATTRIBUTE`, as returned by `CMS_unsigned_delete_attr`.
pub struct AttributeHandle(NonNull<X509_ATTRIBUTE>);

impl AttributeHandle {
    pub fn new(ptr: *mut X509_ATTRIBUTE, function: &'static str) -> Result<Self> {
        non_null(ptr, function).map(Self)
    }
}

impl Drop for AttributeHandle {
    fn drop(&mut self) {
        // SAFETY: the attribute was detached from its signer and is ours.
        unsafe { X509_ATTRIBUTE_free(self.0.as_ptr()) }
    }
}
