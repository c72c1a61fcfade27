//! The entry bridge: the one call from native bootstrap into managed code.

use std::ffi::{c_char, c_int};

use boot_image::{Address, ImageHeader};
use tracing::debug;

use crate::{
    linker::{LinkerBridge, OpenLibraryFn, ResolveSymbolFn},
    primordial::{AuxiliarySpace, PrimordialLocals},
    ArgVector, BootstrapError,
};

/// Signature of the VM run method compiled into the image. Parameter order is fixed and must
/// match the managed side exactly.
pub type VmRunFn = unsafe extern "C" fn(
    primordial_locals: Address,
    heap_base: Address,
    auxiliary_space: Address,
    open_library: OpenLibraryFn,
    resolve_symbol: ResolveSymbolFn,
    argc: c_int,
    argv: *const *mut c_char,
) -> c_int;

/// Everything passed across the bridge, in call order.
#[derive(Clone, Copy, Debug)]
pub struct EntryArgs {
    pub primordial_locals: Address,
    pub heap_base: Address,
    pub auxiliary_space: Address,
    pub linker: LinkerBridge,
    pub argc: c_int,
    pub argv: *const *mut c_char,
}

impl EntryArgs {
    pub fn new(
        locals: &PrimordialLocals<'_>,
        heap_base: Address,
        aux: &AuxiliarySpace,
        linker: LinkerBridge,
        args: &ArgVector,
    ) -> Self {
        debug_assert!(locals.address().is_word_aligned());
        debug_assert!(aux.is_empty() || !aux.address().is_null());
        Self {
            primordial_locals: locals.address(),
            heap_base,
            auxiliary_space: aux.address(),
            linker,
            argc: args.argc(),
            argv: args.argv(),
        }
    }
}

/// The entry point's address inside a loaded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryPoint {
    addr: Address,
}

impl EntryPoint {
    pub fn resolve(heap_base: Address, header: &ImageHeader) -> Result<Self, BootstrapError> {
        let offset = header.entry_offset;
        let addr = heap_base
            .checked_add(offset)
            .ok_or(BootstrapError::EntryOverflow { heap_base, offset })?;
        if addr.is_null() {
            return Err(BootstrapError::NullEntry { heap_base, offset });
        }
        debug!("VM run method at {} (heap {} + {})", addr, heap_base, offset);
        Ok(Self { addr })
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    /// Call the entry point and return its exit code as is.
    ///
    /// # Safety
    /// The address must hold code with the [VmRunFn] signature, and every pointer in `args`
    /// must stay valid for the whole call.
    pub unsafe fn invoke(&self, args: &EntryArgs) -> c_int {
        let run: VmRunFn = std::mem::transmute::<usize, VmRunFn>(self.addr.as_usize());
        run(
            args.primordial_locals,
            args.heap_base,
            args.auxiliary_space,
            args.linker.open_library,
            args.linker.resolve_symbol,
            args.argc,
            args.argv,
        )
    }
}
