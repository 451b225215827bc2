use std::fmt;

use assert_into::AssertInto;

/// One past the last byte of the 32-bit address space.
pub const ADDRESS_SPACE_END: u64 = 1 << 32;

/// A run of initialized bytes at consecutive addresses.
///
/// `start + len` never exceeds [`ADDRESS_SPACE_END`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MemoryRegion {
    start: u32,
    bytes: Vec<u8>,
}

impl MemoryRegion {
    pub const fn new(start: u32) -> Self {
        Self {
            start,
            bytes: Vec::new(),
        }
    }

    /// Returns `None` if the bytes would run past the end of the address space.
    pub fn with_bytes(start: u32, bytes: Vec<u8>) -> Option<Self> {
        if u64::from(start) + bytes.len() as u64 > ADDRESS_SPACE_END {
            return None;
        }
        Some(Self { start, bytes })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    /// Exclusive end address. May equal [`ADDRESS_SPACE_END`], hence `u64`.
    pub fn end(&self) -> u64 {
        u64::from(self.start) + self.bytes.len() as u64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && u64::from(addr) < self.end()
    }

    pub fn overlaps(&self, other: &MemoryRegion) -> bool {
        u64::from(self.start) < other.end() && u64::from(other.start) < self.end()
    }

    /// Bytes `addr..addr + len`, if all of them lie in this region.
    pub fn read(&self, addr: u32, len: usize) -> Option<&[u8]> {
        let offset: usize = addr.checked_sub(self.start)?.assert_into();
        self.bytes.get(offset..offset.checked_add(len)?)
    }

    pub(crate) fn append(&mut self, data: &[u8]) {
        debug_assert!(self.end() + data.len() as u64 <= ADDRESS_SPACE_END);
        self.bytes.extend_from_slice(data);
    }

    /// Appends a region that starts where this one ends.
    pub(crate) fn join(&mut self, next: MemoryRegion) {
        debug_assert_eq!(self.end(), u64::from(next.start));
        self.bytes.extend(next.bytes);
    }
}

impl fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("start", &format_args!("{:#010x}", self.start))
            .field("end", &format_args!("{:#010x}", self.end()))
            .field("len", &self.bytes.len())
            .finish()
    }
}
