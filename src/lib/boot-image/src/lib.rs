//! The boot image, as seen from the native substrate.
//!
//! A boot image is a precomputed snapshot of a managed runtime's heap and compiled code. The
//! substrate never looks inside it. It needs three things from whoever loads it:
//!   1. A handle it can close once the managed runtime returns.
//!   2. A small header telling it where the entry point lives and how much primordial memory
//!      to build.
//!   3. The base address at which the heap ended up in memory.
//!
//! Those three things are the [BootImage] trait, and producing one from a path is the
//! [ImageLoader] trait. The rest of this crate is one concrete loader ([MappedImageLoader])
//! for the flat image format described in [header].

pub mod addr;
pub mod error;
pub mod header;
pub mod loader;
pub mod mapped;

pub use addr::{Address, Offset, WORD_SIZE};
pub use error::ImageError;
pub use header::{ImageHeader, RawImageHeader, IMAGE_MAGIC, IMAGE_VERSION};
pub use loader::{BootImage, ImageLoader};
pub use mapped::{MappedImage, MappedImageLoader};
