//! A loader for flat images that maps the heap straight out of the file.

use std::{
    fs::File,
    io::Read,
    os::fd::{AsRawFd, IntoRawFd},
    path::Path,
};

use tracing::{debug, trace};

use crate::{Address, BootImage, ImageError, ImageHeader, ImageLoader, RawImageHeader};

/// Loads flat images by mapping the heap region private and copy-on-write.
#[derive(Clone, Copy, Debug)]
pub struct MappedImageLoader {
    executable: bool,
}

impl Default for MappedImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MappedImageLoader {
    pub fn new() -> Self {
        Self { executable: true }
    }

    /// Whether the heap mapping gets execute permission. On by default, since the heap
    /// carries the image's compiled code.
    pub fn executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }

    fn protections(&self) -> libc::c_int {
        let mut prot = libc::PROT_READ | libc::PROT_WRITE;
        if self.executable {
            prot |= libc::PROT_EXEC;
        }
        prot
    }
}

fn host_page_size() -> usize {
    // Safety: sysconf has no preconditions.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz <= 0 {
        4096
    } else {
        sz as usize
    }
}

impl ImageLoader for MappedImageLoader {
    type Image = MappedImage;

    fn load(&self, path: &Path) -> Result<MappedImage, ImageError> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut buf = Vec::with_capacity(RawImageHeader::SIZE);
        file.by_ref()
            .take(RawImageHeader::SIZE as u64)
            .read_to_end(&mut buf)?;
        let raw = RawImageHeader::parse(&buf)?;
        trace!("raw image header: {:?}", raw);

        let header = raw.validate(file_len, host_page_size())?;
        let len = header.heap_size;

        // Safety: we ask for a fresh mapping at a kernel-chosen address, so nothing existing
        // is clobbered. The file offset has been checked for page alignment.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                self.protections(),
                libc::MAP_PRIVATE,
                file.as_raw_fd(),
                raw.heap_offset as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(ImageError::MapFailed {
                len,
                source: std::io::Error::last_os_error(),
            });
        }

        let heap_base = Address::from(ptr);
        debug!(
            "mapped image {} heap at {} ({:#x} bytes)",
            path.display(),
            heap_base,
            len
        );

        Ok(MappedImage {
            file,
            header,
            heap_base,
        })
    }
}

/// A flat image whose heap is mapped into this process.
#[derive(Debug)]
pub struct MappedImage {
    file: File,
    header: ImageHeader,
    heap_base: Address,
}

impl MappedImage {
    pub fn heap_len(&self) -> usize {
        self.header.heap_size
    }
}

impl BootImage for MappedImage {
    fn header(&self) -> &ImageHeader {
        &self.header
    }

    fn heap_base(&self) -> Address {
        self.heap_base
    }

    fn close(self) -> Result<(), ImageError> {
        let fd = self.file.into_raw_fd();
        // Safety: we own fd, having just taken it out of the File.
        if unsafe { libc::close(fd) } != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }
}
