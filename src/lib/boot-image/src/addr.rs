//! Typed addresses and offsets.
//!
//! Everything the image header describes is an offset from the heap base, and everything the
//! substrate hands across the entry bridge is an absolute address. Keeping the two apart
//! means the only way to get an address out of an offset is `base + offset`.

use std::{
    fmt,
    ops::{Add, Sub},
};

use static_assertions::const_assert_eq;

/// Size of a native machine word, in bytes.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// An absolute native address. Crosses the entry bridge as a plain machine word.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Address(usize);

const_assert_eq!(std::mem::size_of::<Address>(), WORD_SIZE);

impl Address {
    pub const NULL: Address = Address(0);

    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn is_word_aligned(self) -> bool {
        self.0 % WORD_SIZE == 0
    }

    /// Round up to the next word boundary. Aligned addresses are returned unchanged.
    pub const fn word_align(self) -> Self {
        Self((self.0 + (WORD_SIZE - 1)) & !(WORD_SIZE - 1))
    }

    /// `self + offset`, or None if that wraps past the end of the address space.
    pub const fn checked_add(self, offset: Offset) -> Option<Self> {
        match self.0.checked_add(offset.0) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl<T> From<*const T> for Address {
    fn from(value: *const T) -> Self {
        Self(value as usize)
    }
}

impl<T> From<*mut T> for Address {
    fn from(value: *mut T) -> Self {
        Self(value as usize)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A byte offset relative to some base address (usually the heap base).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Offset(usize);

impl Offset {
    pub const fn new(off: usize) -> Self {
        Self(off)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl From<usize> for Offset {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Add<Offset> for Address {
    type Output = Address;

    fn add(self, rhs: Offset) -> Self::Output {
        Address(self.0 + rhs.0)
    }
}

impl Sub<Address> for Address {
    type Output = Offset;

    fn sub(self, rhs: Address) -> Self::Output {
        Offset(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_align_rounds_up() {
        assert_eq!(Address::new(0).word_align(), Address::new(0));
        assert_eq!(Address::new(1).word_align(), Address::new(WORD_SIZE));
        assert_eq!(
            Address::new(WORD_SIZE * 3).word_align(),
            Address::new(WORD_SIZE * 3)
        );
        assert_eq!(
            Address::new(WORD_SIZE * 3 + 1).word_align(),
            Address::new(WORD_SIZE * 4)
        );
        assert!(Address::new(WORD_SIZE * 7 - 1).word_align().is_word_aligned());
    }

    #[test]
    fn base_plus_offset() {
        let base = Address::new(0x4000_0000);
        let entry = base + Offset::new(0x1000);
        assert_eq!(entry, Address::new(0x4000_1000));
        assert_eq!(entry - base, Offset::new(0x1000));
        assert_eq!(base.checked_add(Offset::new(0x1000)), Some(entry));
    }

    #[test]
    fn checked_add_wraps_to_none() {
        let top = Address::new(usize::MAX - 0xfff);
        assert_eq!(
            top.checked_add(Offset::new(0xfff)),
            Some(Address::new(usize::MAX))
        );
        assert_eq!(top.checked_add(Offset::new(0x1000)), None);
    }

    #[test]
    fn null() {
        assert!(Address::NULL.is_null());
        assert!(Address::from(std::ptr::null::<u8>()).is_null());
        assert!(!Address::new(8).is_null());
        assert_eq!(format!("{}", Address::new(0x10)), "0x10");
    }
}
