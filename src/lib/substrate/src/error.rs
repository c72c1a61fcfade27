//! Errors that stop bootstrap before control reaches managed code.
use std::path::PathBuf;

use boot_image::{Address, ImageError, Offset};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BootstrapError {
    #[error("could not read {link}")]
    #[diagnostic(code(substrate::executable_path))]
    ExecutablePath {
        link: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("executable path is {len} bytes, the limit is {max}")]
    #[diagnostic(code(substrate::executable_path))]
    PathTooLong { len: usize, max: usize },
    #[error("no executable path was supplied, and this platform has no self link to read")]
    #[diagnostic(code(substrate::executable_path))]
    MissingExecutablePath,
    #[error("failed to load boot image {path}")]
    #[diagnostic(code(substrate::image_load))]
    ImageLoad {
        path: PathBuf,
        #[source]
        #[diagnostic_source]
        source: ImageError,
    },
    #[error("entry point at heap base {heap_base} + {offset} is null")]
    #[diagnostic(code(substrate::entry))]
    NullEntry { heap_base: Address, offset: Offset },
    #[error("entry point at heap base {heap_base} + {offset} is past the end of the address space")]
    #[diagnostic(code(substrate::entry))]
    EntryOverflow { heap_base: Address, offset: Offset },
    #[error("failed to allocate {size} bytes of auxiliary space")]
    #[diagnostic(code(substrate::alloc))]
    AuxiliaryAllocation { size: usize },
    #[error("auxiliary space of {declared} bytes plus a reserve of {reserve} bytes overflows")]
    #[diagnostic(code(substrate::alloc))]
    AuxiliaryOverflow { declared: usize, reserve: usize },
    #[error("primordial thread locals of {size} bytes exceed the {max} byte limit")]
    #[diagnostic(code(substrate::alloc))]
    PrimordialLocalsTooLarge { size: usize, max: usize },
    #[error("argument {index} contains an interior NUL byte")]
    #[diagnostic(code(substrate::args))]
    InvalidArgument { index: usize },
    #[error("too many arguments ({count}) for a C argument vector")]
    #[diagnostic(code(substrate::args))]
    TooManyArguments { count: usize },
    #[error("bad value for {var}: {value:?} ({reason})")]
    #[diagnostic(code(substrate::config))]
    Config {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl BootstrapError {
    /// The process exit status for this failure. Each class of fatal error gets its own.
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapError::ExecutablePath { .. }
            | BootstrapError::PathTooLong { .. }
            | BootstrapError::MissingExecutablePath => 2,
            BootstrapError::ImageLoad { .. } => 3,
            BootstrapError::NullEntry { .. } | BootstrapError::EntryOverflow { .. } => 4,
            BootstrapError::AuxiliaryAllocation { .. }
            | BootstrapError::AuxiliaryOverflow { .. }
            | BootstrapError::PrimordialLocalsTooLarge { .. } => 5,
            BootstrapError::InvalidArgument { .. } | BootstrapError::TooManyArguments { .. } => 6,
            BootstrapError::Config { .. } => 7,
        }
    }
}
