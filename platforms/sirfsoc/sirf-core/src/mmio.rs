//! Memory-mapped register access.
//!
//! There is no PAC for SiRF parts, so drivers address their register blocks
//! by byte offset from the block's base, the same way the vendor
//! documentation does.
use core::{
    fmt,
    ptr::NonNull,
    sync::atomic::{fence, Ordering},
};

/// A block of 32-bit memory-mapped registers.
///
/// [`write`](Self::write) is ordered after every earlier memory access
/// (descriptor tables, buffers, relaxed register writes); it is what starts a
/// transfer. [`write_relaxed`](Self::write_relaxed) carries no such ordering.
pub trait Mmio: Sync {
    /// Read the register at `offset` bytes from the base of the block.
    fn read(&self, offset: usize) -> u32;

    /// Write the register at `offset`, without any ordering guarantees
    /// relative to other memory accesses.
    fn write_relaxed(&self, offset: usize, value: u32);

    /// Write the register at `offset` after all prior memory accesses have
    /// completed.
    fn write(&self, offset: usize, value: u32) {
        fence(Ordering::SeqCst);
        self.write_relaxed(offset, value);
    }
}

/// Read-modify-write `offset`, setting every bit in `bits`.
pub(crate) fn set_bits(regs: &dyn Mmio, offset: usize, bits: u32) {
    regs.write_relaxed(offset, regs.read(offset) | bits);
}

/// Read-modify-write `offset`, clearing every bit in `bits`.
pub(crate) fn clear_bits(regs: &dyn Mmio, offset: usize, bits: u32) {
    regs.write_relaxed(offset, regs.read(offset) & !bits);
}

/// A register block at a fixed physical (or identity-mapped) address.
pub struct RawMmio {
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: MMIO accesses are single volatile loads and stores; sharing the
// pointer between contexts is exactly what interrupt handlers need.
unsafe impl Send for RawMmio {}
unsafe impl Sync for RawMmio {}

impl RawMmio {
    /// # Safety
    ///
    /// `base` must point to a mapped register block at least `len` bytes
    /// long, which stays mapped for as long as the returned value exists.
    /// Nothing else may assume exclusive access to that block.
    #[must_use]
    pub const unsafe fn new(base: NonNull<u32>, len: usize) -> Self {
        Self { base, len }
    }

    #[inline]
    fn reg(&self, offset: usize) -> *mut u32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.len,
            "register offset {offset:#x} is outside of the {:#x}-byte block",
            self.len,
        );
        // SAFETY: bounds were checked above, and `new`'s contract says the
        // whole block is mapped.
        unsafe { self.base.as_ptr().byte_add(offset) }
    }
}

impl Mmio for RawMmio {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        unsafe { self.reg(offset).read_volatile() }
    }

    #[inline]
    fn write_relaxed(&self, offset: usize, value: u32) {
        unsafe { self.reg(offset).write_volatile(value) }
    }
}

impl<M: Mmio + ?Sized> Mmio for &'_ M {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        M::read(self, offset)
    }

    #[inline]
    fn write_relaxed(&self, offset: usize, value: u32) {
        M::write_relaxed(self, offset, value)
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        M::write(self, offset, value)
    }
}

impl fmt::Debug for RawMmio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMmio")
            .field("base", &self.base)
            .field("len", &format_args!("{:#x}", self.len))
            .finish()
    }
}
