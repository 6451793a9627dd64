//! Memory-mapped register access.
//! Behaviors: [M1]-[M3] bounded volatile 32-bit access

use core::ptr::NonNull;
use volatile::VolatilePtr;

/// 32-bit register window addressed by byte offset.
///
/// Implemented by [`MmioRegion`] for real hardware and by recording fakes in
/// driver tests.
pub trait RegisterSpace {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

impl<T: RegisterSpace + ?Sized> RegisterSpace for &T {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }
}

impl<T: RegisterSpace + ?Sized> RegisterSpace for alloc::sync::Arc<T> {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }
}

/// A mapped MMIO window.
#[derive(Debug, Clone, Copy)]
pub struct MmioRegion {
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: the window is device memory; every access is a single volatile
// 32-bit load or store, which the device serializes.
unsafe impl Send for MmioRegion {}
unsafe impl Sync for MmioRegion {}

impl MmioRegion {
    /// # Safety
    ///
    /// `base` must point to `len` bytes of mapped device registers that stay
    /// mapped for as long as any copy of the region is alive, and must be
    /// 4-byte aligned.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        Self {
            base: base.cast(),
            len,
        }
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base.cast()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// [M1] Rejects offsets outside the window or not 4-byte aligned
    fn reg(&self, offset: usize) -> VolatilePtr<'_, u32> {
        assert!(
            offset % 4 == 0 && offset.checked_add(4).is_some_and(|end| end <= self.len),
            "register offset {offset:#x} outside {:#x}-byte window",
            self.len
        );
        // SAFETY: offset checked against the window, which `new` guarantees is mapped
        unsafe { VolatilePtr::new(self.base.add(offset / 4)) }
    }
}

impl RegisterSpace for MmioRegion {
    /// [M2] Single volatile load
    fn read32(&self, offset: usize) -> u32 {
        self.reg(offset).read()
    }

    /// [M3] Single volatile store
    fn write32(&self, offset: usize, value: u32) {
        self.reg(offset).write(value);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
