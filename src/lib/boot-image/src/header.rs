//! The image header.
//!
//! A flat image starts with a [RawImageHeader], native-endian, at file offset zero. The heap
//! follows at `heap_offset`, which must be page-aligned so it can be mapped directly:
//!
//! ```text
//! +---------------------+ 0
//! | RawImageHeader      |
//! +---------------------+
//! | (padding)           |
//! +---------------------+ heap_offset
//! | heap + code         |
//! |   ...entry point at heap_offset + entry_offset
//! +---------------------+ heap_offset + heap_size
//! ```
//!
//! Loaders hand the substrate an [ImageHeader], which is the validated, typed view. Only the
//! fields the substrate consumes are kept.

use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{addr::Offset, ImageError, WORD_SIZE};

pub const IMAGE_MAGIC: u32 = 0x564d_4249;
pub const IMAGE_VERSION: u32 = 1;

/// On-disk header layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct RawImageHeader {
    pub magic: u32,
    pub version: u32,
    pub word_size: u32,
    pub page_size: u32,
    pub entry_offset: u64,
    pub thread_locals_size: u64,
    pub auxiliary_space_size: u64,
    pub heap_offset: u64,
    pub heap_size: u64,
}

const_assert_eq!(std::mem::size_of::<RawImageHeader>(), 56);

impl RawImageHeader {
    pub const SIZE: usize = std::mem::size_of::<RawImageHeader>();

    /// Read a header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        let (hdr, _) = RawImageHeader::read_from_prefix(bytes).map_err(|_| {
            ImageError::ShortHeader {
                len: bytes.len(),
                need: Self::SIZE,
            }
        })?;
        Ok(hdr)
    }

    /// Check the header against the host and the image file, and produce the typed view.
    pub fn validate(&self, file_len: u64, host_page_size: usize) -> Result<ImageHeader, ImageError> {
        if self.magic != IMAGE_MAGIC {
            return Err(ImageError::BadMagic {
                found: self.magic,
                expected: IMAGE_MAGIC,
            });
        }
        if self.version != IMAGE_VERSION {
            return Err(ImageError::UnsupportedVersion {
                found: self.version,
                expected: IMAGE_VERSION,
            });
        }
        if self.word_size as usize != WORD_SIZE {
            return Err(ImageError::WordSizeMismatch {
                found: self.word_size,
                expected: WORD_SIZE as u32,
            });
        }
        if self.page_size as usize != host_page_size {
            return Err(ImageError::PageSizeMismatch {
                found: self.page_size,
                expected: host_page_size,
            });
        }
        if self.heap_offset % host_page_size as u64 != 0 {
            return Err(ImageError::MisalignedHeap {
                offset: self.heap_offset,
                page_size: host_page_size,
            });
        }
        let heap_end = self.heap_offset.checked_add(self.heap_size);
        if heap_end.map_or(true, |end| end > file_len) {
            return Err(ImageError::HeapOutOfBounds {
                offset: self.heap_offset,
                size: self.heap_size,
                file_len,
            });
        }
        if self.entry_offset >= self.heap_size {
            return Err(ImageError::EntryOutOfBounds {
                entry: self.entry_offset,
                heap_size: self.heap_size,
            });
        }

        Ok(ImageHeader {
            entry_offset: Offset::new(to_word("entry_offset", self.entry_offset)?),
            thread_locals_size: to_word("thread_locals_size", self.thread_locals_size)?,
            auxiliary_space_size: to_word("auxiliary_space_size", self.auxiliary_space_size)?,
            heap_size: to_word("heap_size", self.heap_size)?,
        })
    }
}

fn to_word(field: &'static str, value: u64) -> Result<usize, ImageError> {
    usize::try_from(value).map_err(|_| ImageError::FieldOverflow { field, value })
}

/// Layout facts about a loaded image, as consumed by the substrate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageHeader {
    /// Offset of the VM run method, from the heap base.
    pub entry_offset: Offset,
    /// Size of the VM thread locals block for the primordial thread.
    pub thread_locals_size: usize,
    /// Size of the auxiliary space the image wants allocated for it.
    pub auxiliary_space_size: usize,
    pub heap_size: usize,
}

impl ImageHeader {
    pub fn new(
        entry_offset: Offset,
        thread_locals_size: usize,
        auxiliary_space_size: usize,
        heap_size: usize,
    ) -> Self {
        Self {
            entry_offset,
            thread_locals_size,
            auxiliary_space_size,
            heap_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 4096;

    fn good() -> RawImageHeader {
        RawImageHeader {
            magic: IMAGE_MAGIC,
            version: IMAGE_VERSION,
            word_size: WORD_SIZE as u32,
            page_size: PAGE as u32,
            entry_offset: 0x1000,
            thread_locals_size: 256,
            auxiliary_space_size: 4096,
            heap_offset: PAGE as u64,
            heap_size: 0x2000,
        }
    }

    #[test]
    fn parse_and_validate() {
        let raw = good();
        let parsed = RawImageHeader::parse(raw.as_bytes()).unwrap();
        assert_eq!(parsed, raw);

        let hdr = parsed.validate(0x3000, PAGE).unwrap();
        assert_eq!(hdr.entry_offset, Offset::new(0x1000));
        assert_eq!(hdr.thread_locals_size, 256);
        assert_eq!(hdr.auxiliary_space_size, 4096);
        assert_eq!(hdr.heap_size, 0x2000);
    }

    #[test]
    fn short_header() {
        let raw = good();
        let err = RawImageHeader::parse(&raw.as_bytes()[..10]).unwrap_err();
        assert!(matches!(err, ImageError::ShortHeader { len: 10, .. }));
    }

    #[test]
    fn rejects_bad_fields() {
        let mut raw = good();
        raw.magic = 0xdead_beef;
        assert!(matches!(
            raw.validate(0x3000, PAGE),
            Err(ImageError::BadMagic { .. })
        ));

        let mut raw = good();
        raw.version = 7;
        assert!(matches!(
            raw.validate(0x3000, PAGE),
            Err(ImageError::UnsupportedVersion { found: 7, .. })
        ));

        let mut raw = good();
        raw.word_size = 2;
        assert!(matches!(
            raw.validate(0x3000, PAGE),
            Err(ImageError::WordSizeMismatch { found: 2, .. })
        ));

        let mut raw = good();
        raw.heap_offset = 100;
        assert!(matches!(
            raw.validate(0x3000, PAGE),
            Err(ImageError::MisalignedHeap { offset: 100, .. })
        ));
    }

    #[test]
    fn rejects_foreign_page_size() {
        let mut raw = good();
        raw.page_size = 16384;
        raw.heap_offset = 16384;
        assert!(matches!(
            raw.validate(0x6000, PAGE),
            Err(ImageError::PageSizeMismatch {
                found: 16384,
                expected: PAGE
            })
        ));
        assert!(raw.validate(0x6000, 16384).is_ok());
    }

    #[test]
    fn rejects_out_of_bounds() {
        let raw = good();
        assert!(matches!(
            raw.validate(0x2fff, PAGE),
            Err(ImageError::HeapOutOfBounds { .. })
        ));

        let mut raw = good();
        raw.heap_size = u64::MAX;
        assert!(matches!(
            raw.validate(0x3000, PAGE),
            Err(ImageError::HeapOutOfBounds { .. })
        ));

        let mut raw = good();
        raw.entry_offset = 0x2000;
        assert!(matches!(
            raw.validate(0x3000, PAGE),
            Err(ImageError::EntryOutOfBounds { entry: 0x2000, .. })
        ));
    }
}
