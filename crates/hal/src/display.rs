//! Framebuffer description handed to the display consumer.

use alloc::string::String;
use bitflags::bitflags;

use crate::HalError;
use crate::memory::MemAttr;

bitflags! {
    /// Framebuffer capability flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FbFlags: u32 {
        /// `memattr` is meaningful and must be honoured when mapping `pbase`.
        const MEMATTR = 1 << 0;
    }
}

/// Geometry and placement of a scanned-out framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Colour depth in bits.
    pub depth: u32,
    /// Storage per pixel in bits.
    pub bpp: u32,
    /// Bytes per scanline.
    pub stride: u32,
    /// Bytes of visible pixel data (`stride * height`).
    pub size: usize,
    pub vbase: usize,
    pub pbase: u64,
    pub flags: FbFlags,
    pub memattr: MemAttr,
}

impl FramebufferInfo {
    pub fn bytes_per_pixel(&self) -> u32 {
        self.bpp / 8
    }
}

/// Generic framebuffer device created as a child of the display controller.
///
/// `attach` receives the description of a buffer that is already being
/// scanned out; `detach` must stop every access to it before returning.
pub trait DisplayConsumer {
    fn attach(&mut self, info: &FramebufferInfo) -> Result<(), HalError>;
    fn detach(&mut self);
}
