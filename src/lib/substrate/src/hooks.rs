//! Native services that managed code calls back into after hand-off.
//!
//! These are looked up by name through the dynamic link bridge (`dlsym` on the main
//! program), so they are exported unmangled with the C ABI. Any managed thread may call
//! them at any time.

use std::{
    ffi::{c_char, c_int, c_void},
    fmt::Display,
};

use crate::context::BootstrapContext;

pub type NativeExitFn = extern "C" fn(code: c_int) -> !;
pub type NativeTrapExitFn = extern "C" fn(code: c_int, address: *const c_void) -> !;
pub type NativeExecutablePathFn = extern "C" fn() -> *const c_char;
pub type NativeEnvironmentFn = extern "C" fn() -> *const *const c_char;

/// Every exported hook. Referencing this table keeps the symbols in the final executable.
#[repr(C)]
pub struct NativeHooks {
    pub exit: NativeExitFn,
    pub trap_exit: NativeTrapExitFn,
    pub stack_trap_exit: NativeTrapExitFn,
    pub executable_path: NativeExecutablePathFn,
    pub environment: NativeEnvironmentFn,
}

#[used]
pub static NATIVE_HOOKS: NativeHooks = NativeHooks {
    exit: native_exit,
    trap_exit: native_trap_exit,
    stack_trap_exit: native_stack_trap_exit,
    executable_path: native_executable_path,
    environment: native_environment,
};

fn fatal_exit(code: c_int, msg: impl Display) -> ! {
    eprintln!("substrate: {}", msg);
    std::process::exit(code)
}

pub fn trap_message(address: *const c_void) -> String {
    format!("Trap in native code at {:#x}", address as usize)
}

pub fn stack_trap_message(address: *const c_void) -> String {
    format!(
        "Native code hit the stack overflow guard page at {:#x}",
        address as usize
    )
}

#[no_mangle]
pub extern "C" fn native_exit(code: c_int) -> ! {
    std::process::exit(code)
}

#[no_mangle]
pub extern "C" fn native_trap_exit(code: c_int, address: *const c_void) -> ! {
    fatal_exit(code, trap_message(address))
}

#[no_mangle]
pub extern "C" fn native_stack_trap_exit(code: c_int, address: *const c_void) -> ! {
    fatal_exit(code, stack_trap_message(address))
}

/// The executable's directory, NUL-terminated, with a trailing separator. The pointer stays
/// valid for the life of the process.
#[no_mangle]
pub extern "C" fn native_executable_path() -> *const c_char {
    match BootstrapContext::installed_or_resolve() {
        Ok(ctx) => ctx.executable_dir_c().as_ptr(),
        Err(e) => fatal_exit(e.exit_code(), e),
    }
}

/// The process environment block. Callers must treat it as read-only.
#[no_mangle]
pub extern "C" fn native_environment() -> *const *const c_char {
    environment()
}

#[cfg(target_vendor = "apple")]
fn environment() -> *const *const c_char {
    // Safety: _NSGetEnviron always returns a valid pointer to the environ variable.
    unsafe { *libc::_NSGetEnviron() as *const *const c_char }
}

#[cfg(not(target_vendor = "apple"))]
fn environment() -> *const *const c_char {
    extern "C" {
        static environ: *const *const c_char;
    }
    // Safety: environ is set up by the C runtime before main.
    unsafe { environ }
}
