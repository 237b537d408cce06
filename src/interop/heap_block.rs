//! Arena for unmanaged buffers handed to native calls.
//!
//! Every block lives until the [`HeapBlockRetainer`] that produced it is
//! dropped. The [`HeapBlock`] handles borrow the retainer, so the borrow
//! checker rejects any use of a block after the arena is gone.

use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::ffi::c_char;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Alignment for every block; enough for any C scalar or struct.
const BLOCK_ALIGN: usize = 16;

/// Owns a set of zero-initialised heap blocks and frees them together.
#[derive(Default)]
pub struct HeapBlockRetainer {
    blocks: RefCell<Vec<(NonNull<u8>, Layout)>>,
}

/// A block owned by a [`HeapBlockRetainer`].
#[derive(Debug, Clone, Copy)]
pub struct HeapBlock<'a> {
    ptr: NonNull<u8>,
    len: usize,
    _retainer: PhantomData<&'a HeapBlockRetainer>,
}

impl<'a> HeapBlock<'a> {
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn cast<T>(&self) -> *mut T {
        self.ptr.as_ptr().cast()
    }

    pub fn as_c_str(&self) -> *const c_char {
        self.ptr.as_ptr().cast_const().cast()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the block's bytes.
    pub fn as_slice(&self) -> &'a [u8] {
        // SAFETY: the block is `len` initialised bytes kept alive for 'a by
        // the retainer, and no `&mut` to it is ever handed out.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl HeapBlockRetainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.blocks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.borrow().is_empty()
    }

    /// Allocate `size` zeroed bytes.
    pub fn alloc(&self, size: usize) -> Result<HeapBlock<'_>> {
        let layout = Layout::from_size_align(size.max(1), BLOCK_ALIGN).map_err(|e| {
            Error::Native {
                function: "HeapBlockRetainer::alloc",
                code: 0,
                message: e.to_string(),
            }
        })?;

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        self.blocks.borrow_mut().push((ptr, layout));

        Ok(HeapBlock {
            ptr,
            len: size,
            _retainer: PhantomData,
        })
    }

    /// Allocate room for `count` elements of `element_size` bytes each.
    pub fn alloc_array(&self, count: usize, element_size: usize) -> Result<HeapBlock<'_>> {
        let size = count.checked_mul(element_size).ok_or(Error::Native {
            function: "HeapBlockRetainer::alloc_array",
            code: 0,
            message: format!("{count} x {element_size} bytes overflows"),
        })?;
        self.alloc(size)
    }

    /// Copy `s` into a NUL-terminated ASCII buffer.
    pub fn alloc_ascii_string(&self, s: &str) -> Result<HeapBlock<'_>> {
        if !s.is_ascii() || s.bytes().any(|b| b == 0) {
            return Err(Error::Native {
                function: "HeapBlockRetainer::alloc_ascii_string",
                code: 0,
                message: format!("{s:?} is not a NUL-free ASCII string"),
            });
        }
        let block = self.alloc(s.len() + 1)?;
        // SAFETY: the block holds s.len() + 1 bytes, already zeroed, so the
        // terminator is in place.
        unsafe { std::ptr::copy_nonoverlapping(s.as_ptr(), block.as_ptr(), s.len()) };
        Ok(block)
    }

    pub fn alloc_bytes(&self, bytes: &[u8]) -> Result<HeapBlock<'_>> {
        let block = self.alloc(bytes.len())?;
        // SAFETY: the block holds at least bytes.len() bytes and is fresh.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), block.as_ptr(), bytes.len()) };
        Ok(block)
    }
}

impl Drop for HeapBlockRetainer {
    fn drop(&mut self) {
        for (ptr, layout) in self.blocks.get_mut().drain(..) {
            // SAFETY: each pair was produced by alloc_zeroed with this layout
            // and is freed exactly once.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }
}
