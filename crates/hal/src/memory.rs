//! Physically-contiguous memory for DMA-visible buffers.

use core::alloc::Layout;
use core::ops::RangeInclusive;
use core::ptr::NonNull;

use crate::HalError;

/// Size of a page for contiguous allocation.
pub const PAGE_SIZE: usize = 4096;

/// Number of pages needed for `size` bytes.
pub const fn pages_for(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE)
}

/// `size` rounded up to a page multiple.
pub const fn round_page(size: usize) -> usize {
    pages_for(size) * PAGE_SIZE
}

/// Cache attribute requested for a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemAttr {
    /// Normal cached memory.
    #[default]
    WriteBack,
    /// Uncached, writes may be merged in a write buffer.
    WriteCombining,
    /// Strongly ordered, uncached.
    Uncacheable,
}

/// A contiguous region handed out by a [`ContiguousAllocator`].
///
/// Only the allocator that produced it can build one, so a region passed back
/// to [`ContiguousAllocator::free`] is always one it owns.
#[derive(Debug)]
pub struct ContigRegion {
    vaddr: NonNull<u8>,
    paddr: u64,
    size: usize,
    align: usize,
}

impl ContigRegion {
    /// # Safety
    ///
    /// `vaddr` must be valid for reads and writes of `size` bytes, backed by
    /// physically contiguous memory starting at `paddr`, aligned to `align`.
    pub unsafe fn from_raw_parts(vaddr: NonNull<u8>, paddr: u64, size: usize, align: usize) -> Self {
        Self {
            vaddr,
            paddr,
            size,
            align,
        }
    }

    pub fn vaddr(&self) -> NonNull<u8> {
        self.vaddr
    }

    pub fn paddr(&self) -> u64 {
        self.paddr
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }
}

/// Physically-contiguous allocator.
///
/// # Safety
///
/// Implementations must return zeroed, physically contiguous memory that
/// lies inside the requested physical range, is aligned to `align`, and
/// stays mapped until handed back to `free`.
pub unsafe trait ContiguousAllocator {
    fn allocate(
        &self,
        size: usize,
        align: usize,
        phys: RangeInclusive<u64>,
        attr: MemAttr,
    ) -> Result<ContigRegion, HalError>;

    fn free(&self, region: ContigRegion);
}

/// Allocator for identity-mapped platforms: carves regions out of the global
/// heap and reports the virtual address as the physical one.
///
/// The cache attribute is accepted but not applied; identity-mapped boards
/// map the heap with a single attribute.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityHeapAllocator;

fn region_layout(size: usize, align: usize) -> Result<Layout, HalError> {
    Layout::from_size_align(size, align.max(1)).map_err(|_| HalError::OutOfMemory)
}

// SAFETY: alloc_zeroed hands out one contiguous block; with an identity map
// that block is also physically contiguous.
unsafe impl ContiguousAllocator for IdentityHeapAllocator {
    fn allocate(
        &self,
        size: usize,
        align: usize,
        phys: RangeInclusive<u64>,
        _attr: MemAttr,
    ) -> Result<ContigRegion, HalError> {
        if size == 0 {
            return Err(HalError::OutOfMemory);
        }
        let layout = region_layout(size, align)?;
        // SAFETY: layout has non-zero size
        let ptr = unsafe { alloc::alloc::alloc_zeroed(layout) };
        let vaddr = NonNull::new(ptr).ok_or(HalError::OutOfMemory)?;

        let paddr = vaddr.as_ptr() as u64;
        let last = paddr + (size as u64 - 1);
        if !phys.contains(&paddr) || !phys.contains(&last) {
            // SAFETY: allocated just above with the same layout
            unsafe { alloc::alloc::dealloc(vaddr.as_ptr(), layout) };
            return Err(HalError::OutOfMemory);
        }

        // SAFETY: block is valid for `size` bytes and identity mapped
        Ok(unsafe { ContigRegion::from_raw_parts(vaddr, paddr, size, layout.align()) })
    }

    fn free(&self, region: ContigRegion) {
        if let Ok(layout) = region_layout(region.size, region.align) {
            // SAFETY: region came from `allocate` with this layout
            unsafe { alloc::alloc::dealloc(region.vaddr.as_ptr(), layout) };
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
