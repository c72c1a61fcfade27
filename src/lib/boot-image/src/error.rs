//! Errors for loading a boot image.
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ImageError {
    #[error("i/o error on image file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("image file too short for a header: {len} bytes, need {need}")]
    ShortHeader { len: usize, need: usize },
    #[error("bad image magic {found:#010x}, expected {expected:#010x}")]
    #[diagnostic(help("is this file a boot image?"))]
    BadMagic { found: u32, expected: u32 },
    #[error("unsupported image version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("image built for a {found}-byte word, this host uses {expected}-byte words")]
    WordSizeMismatch { found: u32, expected: u32 },
    #[error("image built for {found:#x}-byte pages, this host uses {expected:#x}-byte pages")]
    PageSizeMismatch { found: u32, expected: usize },
    #[error("heap offset {offset:#x} is not aligned to the host page size {page_size:#x}")]
    MisalignedHeap { offset: u64, page_size: usize },
    #[error("heap [{offset:#x}, +{size:#x}) extends past end of image file ({file_len:#x} bytes)")]
    HeapOutOfBounds { offset: u64, size: u64, file_len: u64 },
    #[error("entry offset {entry:#x} lies outside the heap ({heap_size:#x} bytes)")]
    EntryOutOfBounds { entry: u64, heap_size: u64 },
    #[error("header field {field} does not fit in a native word: {value:#x}")]
    FieldOverflow { field: &'static str, value: u64 },
    #[error("failed to map {len:#x} bytes of heap: {source}")]
    MapFailed {
        len: usize,
        #[source]
        source: std::io::Error,
    },
}
