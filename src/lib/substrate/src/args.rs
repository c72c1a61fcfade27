use std::{
    ffi::{c_char, c_int, CStr, CString},
    os::unix::ffi::OsStringExt,
};

use crate::BootstrapError;

/// A C argument vector, NULL-terminated, owned for as long as managed code may read it.
#[derive(Debug)]
pub struct ArgVector {
    argv: Vec<*mut c_char>,
}

impl ArgVector {
    pub fn new<I, S>(args: I) -> Result<Self, BootstrapError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        let mut argv = Vec::new();
        for (index, arg) in args.into_iter().enumerate() {
            match CString::new(arg) {
                Ok(arg) => argv.push(arg.into_raw()),
                Err(_) => {
                    // Reclaim what we built so far.
                    drop(Self { argv });
                    return Err(BootstrapError::InvalidArgument { index });
                }
            }
        }
        if c_int::try_from(argv.len()).is_err() {
            let count = argv.len();
            drop(Self { argv });
            return Err(BootstrapError::TooManyArguments { count });
        }
        argv.push(std::ptr::null_mut());
        Ok(Self { argv })
    }

    /// The arguments this process was started with, untouched.
    pub fn from_env() -> Result<Self, BootstrapError> {
        Self::new(std::env::args_os().map(|a| a.into_vec()))
    }

    pub fn argc(&self) -> c_int {
        // Checked against c_int::MAX in new.
        (self.argv.len() - 1) as c_int
    }

    pub fn argv(&self) -> *const *mut c_char {
        self.argv.as_ptr()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CStr> {
        self.argv
            .iter()
            .take_while(|p| !p.is_null())
            // Safety: every non-null entry came from CString::into_raw.
            .map(|&p| unsafe { CStr::from_ptr(p) })
    }
}

impl Drop for ArgVector {
    fn drop(&mut self) {
        for &arg in self.argv.iter().filter(|p| !p.is_null()) {
            // Safety: every non-null entry came from CString::into_raw, and is freed once.
            drop(unsafe { CString::from_raw(arg) });
        }
    }
}
