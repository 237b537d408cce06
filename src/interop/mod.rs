//! Support for calling into native crypto libraries.
//!
//! [`HeapBlockRetainer`] scopes every unmanaged buffer a native call
//! sequence needs; [`ffi`] holds the OpenSSL declarations and owned handle
//! types used by the native CMS engine.

#[cfg(feature = "native")]
pub mod ffi;
mod heap_block;

pub use heap_block::{HeapBlock, HeapBlockRetainer};

/// Run `f` with a fresh retainer, freeing every block when it returns.
pub fn with_retainer<T>(f: impl FnOnce(&HeapBlockRetainer) -> T) -> T {
    let retainer = HeapBlockRetainer::new();
    f(&retainer)
}
