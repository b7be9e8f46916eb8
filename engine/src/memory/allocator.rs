//! A monotonic bump allocator over a growable linear buffer.
//!
//! This module provides the raw byte storage backing the [arena](super::arena::Arena): string
//! payloads, handle arrays and scratch buffers all live here. Allocation is append-only; the only
//! way to give memory back short of a [bulk reset](Allocator::reset) is to [shrink](Allocator::shrink)
//! the most recent allocation, which callers may do only while they can prove nothing was
//! allocated in between.

/// Size of a single page, in bytes. Capacity is always a multiple of this.
pub const PAGE_SIZE: u32 = 0x1_0000;

/// Alignment of every allocation, in bytes.
const ALIGNMENT: u32 = 4;

/// Rounds a size up to the next multiple of the allocation alignment.
pub(crate) const fn align(size: u32) -> u32 {
    (size + (ALIGNMENT - 1)) & !(ALIGNMENT - 1)
}

/// A monotonic bump allocator.
///
/// Offsets returned by [`allocate`](Self::allocate) are stable for the lifetime of the allocator:
/// growth reallocates the underlying buffer but never moves the offsets themselves, which is what
/// allows 32-bit offsets to be embedded in terms as durable references.
///
/// The first word of the buffer is permanently reserved, so offset `0` is never handed out and
/// remains available as an "unallocated" marker to callers.
pub struct Allocator {
    /// The backing buffer. Its length is the current capacity.
    data: Vec<u8>,

    /// Next free offset.
    offset: u32,
}

impl Allocator {
    /// Creates an allocator with a single-page buffer and the first word reserved.
    #[must_use]
    pub fn new() -> Self {
        let mut allocator = Self { data: Vec::new(), offset: ALIGNMENT };
        allocator.grow_to(PAGE_SIZE);
        allocator
    }

    /// Current bump offset, one past the end of the most recent allocation.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Current capacity of the backing buffer.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        u32::try_from(self.data.len()).unwrap_or(u32::MAX)
    }

    /// Allocates `size` bytes (rounded up to alignment) and returns the offset of the region.
    pub fn allocate(&mut self, size: u32) -> u32 {
        let size = align(size);
        let address = self.offset;
        self.ensure(address + size);
        self.offset = address + size;
        address
    }

    /// Appends `size` bytes (rounded up to alignment) to the allocation ending at `address`.
    ///
    /// `address` must be the current bump offset: extending is only valid while the caller's
    /// region is the most recent allocation. Anything else is a contract violation and aborts.
    pub fn extend(&mut self, address: u32, size: u32) {
        assert!(address == self.offset, "extended region is not the most recent allocation");
        self.allocate(size);
    }

    /// Releases the `size` bytes (rounded up to alignment) ending the allocation at `address`.
    ///
    /// The inverse of [`extend`](Self::extend): the released region must end at the current bump
    /// offset, i.e. the caller guarantees nothing was allocated since.
    pub fn shrink(&mut self, address: u32, size: u32) {
        let size = align(size);
        assert!(address + size == self.offset, "shrunk region is not the most recent allocation");
        self.offset = address;
    }

    /// Resets the bump offset to the reserved first word. Capacity is retained.
    ///
    /// The caller guarantees that no offset handed out before the reset is dereferenced after it.
    pub fn reset(&mut self) {
        log::trace!("allocator reset, discarding {} bytes", self.offset - ALIGNMENT);
        self.offset = ALIGNMENT;
    }

    /// Grows the buffer until it can hold `required` bytes.
    ///
    /// Growth doubles the capacity; if the doubled request cannot be reserved, the request is
    /// halved down to a single page before giving up.
    fn ensure(&mut self, required: u32) {
        if required <= self.capacity() {
            return;
        }
        let mut target = self.capacity().max(PAGE_SIZE);
        while target < required {
            target = target.checked_mul(2).unwrap_or(u32::MAX);
        }
        while self.try_grow_to(target).is_err() {
            let halved = (target / 2).max(required).max(PAGE_SIZE);
            assert!(halved != target, "allocator failed to grow to {target} bytes");
            target = halved;
        }
    }

    /// Grows the buffer to exactly `target` bytes, panicking on failure.
    fn grow_to(&mut self, target: u32) {
        self.try_grow_to(target).unwrap_or_else(|_| panic!("allocator failed to grow to {target} bytes"));
    }

    /// Fallibly grows the buffer to `target` bytes, zero-filling the new tail.
    fn try_grow_to(&mut self, target: u32) -> Result<(), std::collections::TryReserveError> {
        let target = target as usize;
        if target > self.data.len() {
            self.data.try_reserve_exact(target - self.data.len())?;
            log::trace!("allocator grown to {target} bytes");
            self.data.resize(target, 0);
        }
        Ok(())
    }

    /// Reads `len` bytes at `address`.
    #[inline]
    #[must_use]
    pub fn bytes(&self, address: u32, len: u32) -> &[u8] {
        &self.data[address as usize..(address + len) as usize]
    }

    /// Writes `bytes` at `address`. The region must have been allocated.
    #[inline]
    pub fn write_bytes(&mut self, address: u32, bytes: &[u8]) {
        assert!(address + u32::try_from(bytes.len()).unwrap_or(u32::MAX) <= self.offset, "write past the bump offset");
        self.data[address as usize..address as usize + bytes.len()].copy_from_slice(bytes);
    }

    /// Reads the little-endian word at `address`.
    #[inline]
    #[must_use]
    pub fn read_word(&self, address: u32) -> u32 {
        let bytes = self.bytes(address, 4);
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Writes `value` as a little-endian word at `address`.
    #[inline]
    pub fn write_word(&mut self, address: u32, value: u32) {
        self.write_bytes(address, &value.to_le_bytes());
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}
