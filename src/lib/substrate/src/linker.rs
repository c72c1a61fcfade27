//! The dynamic link bridge.
//!
//! Managed code does not know how to talk to the platform loader, so the entry point is
//! handed two native functions to do it: one to open a library, one to look up a symbol.
//! Both are thin, stateless wrappers over `dlopen`/`dlsym` and are safe to call from any
//! thread once managed code is running. Failures come back as null and are left for the
//! managed runtime to deal with.

use std::{
    ffi::{c_char, c_void, CStr},
    ptr::NonNull,
};

use static_assertions::const_assert_eq;

pub type OpenLibraryFn = unsafe extern "C" fn(path: *const c_char) -> *mut c_void;
pub type ResolveSymbolFn = unsafe extern "C" fn(handle: *mut c_void, name: *const c_char) -> *mut c_void;

/// The pair of loader functions handed to managed code.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct LinkerBridge {
    pub open_library: OpenLibraryFn,
    pub resolve_symbol: ResolveSymbolFn,
}

const_assert_eq!(
    std::mem::size_of::<LinkerBridge>(),
    2 * std::mem::size_of::<usize>()
);

impl LinkerBridge {
    /// The bridge backed by this process's dynamic loader.
    pub const NATIVE: LinkerBridge = LinkerBridge {
        open_library: open_dynamic_library,
        resolve_symbol,
    };
}

impl Default for LinkerBridge {
    fn default() -> Self {
        Self::NATIVE
    }
}

/// Open a library with lazy binding. A null path opens the main program.
///
/// # Safety
/// `path` must be null or point to a NUL-terminated string.
pub unsafe extern "C" fn open_dynamic_library(path: *const c_char) -> *mut c_void {
    #[cfg(feature = "trace-linker")]
    trace_open(path, None);

    let handle = libc::dlopen(path, libc::RTLD_LAZY);

    #[cfg(feature = "trace-linker")]
    trace_open(path, Some(handle));

    handle
}

/// Look up `name` in the library `handle`. Returns null if there is no such symbol.
///
/// # Safety
/// `handle` must come from `dlopen` (or be one of the platform pseudo-handles), and `name`
/// must point to a NUL-terminated string.
pub unsafe extern "C" fn resolve_symbol(handle: *mut c_void, name: *const c_char) -> *mut c_void {
    libc::dlsym(handle, name)
}

#[cfg(feature = "trace-linker")]
unsafe fn trace_open(path: *const c_char, result: Option<*mut c_void>) {
    let name = if path.is_null() {
        std::borrow::Cow::Borrowed("(null)")
    } else {
        CStr::from_ptr(path).to_string_lossy()
    };
    match result {
        None => tracing::trace!("openDynamicLibrary {} ({:p})", name, path),
        Some(handle) => tracing::trace!("openDynamicLibrary {} = {:p}", name, handle),
    }
}

/// A library opened through the bridge, for native-side callers.
///
/// Handles are never closed. Libraries opened during bootstrap stay loaded for the life of
/// the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LibraryHandle(NonNull<c_void>);

// Safety: a dlopen handle is an opaque token, and dlsym may be called on it from any thread.
unsafe impl Send for LibraryHandle {}
unsafe impl Sync for LibraryHandle {}

impl LibraryHandle {
    /// Open `path`, or the main program when `path` is `None`.
    pub fn open(path: Option<&CStr>) -> Option<Self> {
        let path = path.map_or(std::ptr::null(), |p| p.as_ptr());
        // Safety: path is null or a valid C string.
        NonNull::new(unsafe { open_dynamic_library(path) }).map(Self)
    }

    pub fn symbol(&self, name: &CStr) -> Option<NonNull<c_void>> {
        // Safety: the handle came from dlopen and name is a valid C string.
        NonNull::new(unsafe { resolve_symbol(self.0.as_ptr(), name.as_ptr()) })
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}
