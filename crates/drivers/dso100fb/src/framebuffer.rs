//! Scan-out framebuffer memory.
//! Behaviors: [F1]-[F4] geometry, allocation, binding, release

use alloc::string::String;
use core::ops::RangeInclusive;

use dso_hal::{
    ContigRegion, ContiguousAllocator, FbFlags, FramebufferInfo, MemAttr, PAGE_SIZE, RegisterSpace,
    round_page,
};
use log::error;

use crate::DriverError;
use crate::config::PanelConfig;
use crate::regs;

/// Bits per pixel, XRGB8888.
pub const DEPTH: u32 = 32;

/// FB_BASE is a 32-bit register, so the buffer must sit below 4 GiB.
pub const FB_PHYS_RANGE: RangeInclusive<u64> = 0..=u32::MAX as u64;

/// Byte layout of the framebuffer for a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbGeometry {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    /// Bytes of pixel data, as programmed into FB_LENGTH.
    pub size: usize,
    /// `size` rounded up to whole pages.
    pub alloc_size: usize,
}

impl FbGeometry {
    /// [F1] stride = width * 4, size = stride * height, allocation page-rounded.
    ///
    /// `config` must have passed [`PanelConfig::validate`], which keeps `size`
    /// within FB_LENGTH.
    pub fn for_panel(config: &PanelConfig) -> Self {
        let stride = config.width * (DEPTH / 8);
        let size = stride as usize * config.height as usize;
        Self {
            width: config.width,
            height: config.height,
            stride,
            size,
            alloc_size: round_page(size),
        }
    }
}

/// An allocated framebuffer. Freed when dropped.
pub struct Framebuffer<'a, A: ContiguousAllocator> {
    allocator: &'a A,
    region: Option<ContigRegion>,
    geometry: FbGeometry,
}

impl<'a, A: ContiguousAllocator> Framebuffer<'a, A> {
    /// [F2] Page-aligned, zeroed, write-combining, below 4 GiB. Not retried.
    pub fn allocate(allocator: &'a A, geometry: FbGeometry) -> Result<Self, DriverError> {
        let region = allocator
            .allocate(
                geometry.alloc_size,
                PAGE_SIZE,
                FB_PHYS_RANGE,
                MemAttr::WriteCombining,
            )
            .map_err(|e| {
                error!(
                    "[DSO100FB] cannot allocate {} byte framebuffer: {e}",
                    geometry.alloc_size
                );
                DriverError::AllocationFailure
            })?;
        Ok(Self {
            allocator,
            region: Some(region),
            geometry,
        })
    }

    pub fn geometry(&self) -> &FbGeometry {
        &self.geometry
    }

    pub fn vaddr(&self) -> usize {
        self.region
            .as_ref()
            .map_or(0, |r| r.vaddr().as_ptr() as usize)
    }

    pub fn paddr(&self) -> u64 {
        self.region.as_ref().map_or(0, ContigRegion::paddr)
    }

    /// [F3] Points the controller at the buffer. FB_LENGTH gets the unrounded size.
    pub fn bind<R: RegisterSpace + ?Sized>(&self, hw: &R) {
        hw.write32(regs::FB_BASE, self.paddr() as u32);
        hw.write32(regs::FB_LENGTH, self.geometry.size as u32);
    }

    /// Detaches the controller from the buffer before it is released.
    pub fn unbind<R: RegisterSpace + ?Sized>(&self, hw: &R) {
        hw.write32(regs::FB_BASE, 0);
        hw.write32(regs::FB_LENGTH, 0);
    }

    /// Descriptor handed to the display consumer.
    pub fn info(&self, name: String) -> FramebufferInfo {
        FramebufferInfo {
            name,
            width: self.geometry.width,
            height: self.geometry.height,
            depth: DEPTH,
            bpp: DEPTH,
            stride: self.geometry.stride,
            size: self.geometry.size,
            vbase: self.vaddr(),
            pbase: self.paddr(),
            flags: FbFlags::MEMATTR,
            memattr: MemAttr::WriteCombining,
        }
    }
}

impl<A: ContiguousAllocator> Drop for Framebuffer<'_, A> {
    /// [F4] Returns the region to the allocator exactly once
    fn drop(&mut self) {
        if let Some(region) = self.region.take() {
            self.allocator.free(region);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
