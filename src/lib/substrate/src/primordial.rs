//! Memory the managed runtime needs before it can run at all.
//!
//! Two regions get built here:
//!   - The primordial VM thread locals: the thread-local block for the very first managed
//!     thread, created before the runtime's own thread machinery exists. It is carved out of
//!     a scoped stack allocation that lives exactly as long as the closure given to
//!     [with_primordial_locals], and the entry call happens inside that closure.
//!   - The auxiliary space: a scratch region sized by the image (plus an optional reserve),
//!     taken from the global allocator and never given back. Once the entry point has it,
//!     it belongs to the managed runtime.

use std::{alloc::Layout, marker::PhantomData, mem::MaybeUninit, ptr::NonNull};

use boot_image::{Address, ImageHeader, WORD_SIZE};
use tracing::debug;

use crate::BootstrapError;

/// Fill byte for fresh auxiliary space, so that reads of uninitialized words stand out.
pub const AUXILIARY_SENTINEL: u8 = 0x01;

/// Extra auxiliary space for recording the address of every reference field written. The
/// recorded references are checked against the card table for matching dirty cards. 1 GiB
/// holds 128 Mi 64-bit references.
#[cfg(feature = "card-table-verification")]
pub const REFERENCE_BUFFER_SIZE: usize = 1024 * 1024 * 1024;
#[cfg(not(feature = "card-table-verification"))]
pub const REFERENCE_BUFFER_SIZE: usize = 0;

/// Upper bound on the primordial thread locals, which live on the bootstrap stack.
pub const MAX_PRIMORDIAL_LOCALS: usize = 1024 * 1024;

/// The primordial VM thread locals block. Word-aligned and zero-filled.
pub struct PrimordialLocals<'frame> {
    base: NonNull<u8>,
    len: usize,
    _frame: PhantomData<&'frame mut [u8]>,
}

impl<'frame> PrimordialLocals<'frame> {
    /// Carve a word-aligned block of `len` bytes out of `buf`, which must have at least one
    /// word of slack past `len`.
    fn carve(buf: &'frame mut [MaybeUninit<u8>], len: usize) -> Self {
        let skew = buf.as_ptr().align_offset(WORD_SIZE);
        let block = &mut buf[skew..(skew + len)];
        for byte in block.iter_mut() {
            byte.write(0);
        }
        let base = NonNull::from(block).cast::<u8>();
        Self {
            base,
            len,
            _frame: PhantomData,
        }
    }

    pub fn address(&self) -> Address {
        Address::from(self.base.as_ptr())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // Safety: carve initialized all len bytes, and the borrow of the frame buffer is
        // held for 'frame.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), self.len) }
    }
}

/// Build the primordial thread locals for `header` and run `f` with them. The block stays
/// valid until `f` returns.
pub fn with_primordial_locals<R>(
    header: &ImageHeader,
    f: impl FnOnce(PrimordialLocals<'_>) -> R,
) -> Result<R, BootstrapError> {
    let len = header.thread_locals_size;
    if len > MAX_PRIMORDIAL_LOCALS {
        return Err(BootstrapError::PrimordialLocalsTooLarge {
            size: len,
            max: MAX_PRIMORDIAL_LOCALS,
        });
    }

    // One word of slack, so the block can be aligned up.
    Ok(alloca::with_alloca(len + WORD_SIZE, |buf| {
        let locals = PrimordialLocals::carve(buf, len);
        debug!(
            "primordial VM thread locals allocated at {} ({} bytes)",
            locals.address(),
            len
        );
        f(locals)
    }))
}

/// The auxiliary space handed to the managed runtime.
#[derive(Debug)]
pub struct AuxiliarySpace {
    base: Option<NonNull<u8>>,
    len: usize,
}

impl AuxiliarySpace {
    /// No auxiliary space. Crosses the bridge as a null address.
    pub fn none() -> Self {
        Self { base: None, len: 0 }
    }

    /// Allocate `header.auxiliary_space_size + extra_reserve` bytes and fill them with
    /// [AUXILIARY_SENTINEL]. A total of zero allocates nothing.
    pub fn allocate(header: &ImageHeader, extra_reserve: usize) -> Result<Self, BootstrapError> {
        let declared = header.auxiliary_space_size;
        let len = declared
            .checked_add(extra_reserve)
            .ok_or(BootstrapError::AuxiliaryOverflow {
                declared,
                reserve: extra_reserve,
            })?;
        if len == 0 {
            return Ok(Self::none());
        }

        let layout = Layout::from_size_align(len, WORD_SIZE)
            .map_err(|_| BootstrapError::AuxiliaryAllocation { size: len })?;
        // Safety: layout has a non-zero size.
        let base = NonNull::new(unsafe { std::alloc::alloc(layout) })
            .ok_or(BootstrapError::AuxiliaryAllocation { size: len })?;
        // Safety: we just allocated len bytes at base.
        unsafe { base.as_ptr().write_bytes(AUXILIARY_SENTINEL, len) };

        debug!(
            "allocated {} bytes of auxiliary space at {}",
            len,
            Address::from(base.as_ptr())
        );
        Ok(Self {
            base: Some(base),
            len,
        })
    }

    pub fn address(&self) -> Address {
        self.base
            .map_or(Address::NULL, |base| Address::from(base.as_ptr()))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self.base {
            // Safety: base points to len initialized bytes that are never freed.
            Some(base) => unsafe { std::slice::from_raw_parts(base.as_ptr(), self.len) },
            None => &[],
        }
    }
}
