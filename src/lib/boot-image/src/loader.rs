use std::path::Path;

use crate::{Address, ImageError, ImageHeader};

/// A loaded boot image. The header and heap base stay valid until [BootImage::close] is
/// called, and the heap mapping itself stays in place for the rest of the process.
pub trait BootImage {
    fn header(&self) -> &ImageHeader;

    /// The address at which the heap was mapped. All header offsets are relative to it.
    fn heap_base(&self) -> Address;

    /// Release the image handle. Does not unmap the heap, since managed code is still
    /// running out of it (or has just returned from it).
    fn close(self) -> Result<(), ImageError>;
}

/// Something that can turn an image path into a [BootImage].
pub trait ImageLoader {
    type Image: BootImage;

    fn load(&self, path: &Path) -> Result<Self::Image, ImageError>;
}
