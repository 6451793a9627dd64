//! Generic framebuffer device.
//!
//! Created by a display controller driver as its child. On attach it checks
//! the descriptor it is given and from then on exposes the buffer as an
//! `embedded-graphics` draw target in XRGB8888.

#![cfg_attr(not(test), no_std)]

use dso_hal::{DisplayConsumer, FramebufferInfo, HalError};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use log::{error, info};

/// Framebuffer consumer for 32-bit XRGB buffers.
pub struct FbDevice {
    info: Option<FramebufferInfo>,
}

impl FbDevice {
    /// # Safety
    ///
    /// Every [`FramebufferInfo`] later passed to `attach` must describe
    /// `size` bytes of writable memory at `vbase` that stay mapped until
    /// `detach` is called.
    pub unsafe fn new() -> Self {
        Self { info: None }
    }

    pub fn info(&self) -> Option<&FramebufferInfo> {
        self.info.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.info.is_some()
    }

    /// Draw target over the attached buffer.
    pub fn display(&mut self) -> Option<FbDisplay<'_>> {
        let info = self.info.as_ref()?;
        // SAFETY: `new`'s contract keeps the buffer mapped while attached,
        // and the &mut borrow on self makes this the only view of it.
        let buffer = unsafe { core::slice::from_raw_parts_mut(info.vbase as *mut u8, info.size) };
        Some(FbDisplay {
            buffer,
            width: info.width,
            height: info.height,
            stride: info.stride as usize,
            bytes_per_pixel: info.bytes_per_pixel() as usize,
        })
    }
}

fn validate(info: &FramebufferInfo) -> Result<(), &'static str> {
    if info.bpp != 32 || info.depth != 32 {
        return Err("unsupported pixel depth");
    }
    if info.width == 0 || info.height == 0 {
        return Err("empty mode");
    }
    if (info.stride as usize) < info.width as usize * info.bytes_per_pixel() as usize {
        return Err("stride shorter than a scanline");
    }
    if info.size < info.stride as usize * info.height as usize {
        return Err("buffer smaller than the mode");
    }
    if info.vbase == 0 {
        return Err("buffer not mapped");
    }
    Ok(())
}

impl DisplayConsumer for FbDevice {
    fn attach(&mut self, fb: &FramebufferInfo) -> Result<(), HalError> {
        if let Err(reason) = validate(fb) {
            error!("[FBD] {}: rejecting framebuffer: {reason}", fb.name);
            return Err(HalError::ChildRejected);
        }
        info!(
            "[FBD] {}: {}x{}, {} bpp, stride {}",
            fb.name, fb.width, fb.height, fb.bpp, fb.stride
        );
        self.info = Some(fb.clone());
        Ok(())
    }

    fn detach(&mut self) {
        self.info = None;
    }
}

/// DrawTarget adapter for an attached [`FbDevice`].
pub struct FbDisplay<'a> {
    buffer: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    bytes_per_pixel: usize,
}

impl DrawTarget for FbDisplay<'_> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x >= self.width || y >= self.height {
                continue;
            }
            let offset = y as usize * self.stride + x as usize * self.bytes_per_pixel;
            // XRGB8888, little endian
            let px = u32::from_be_bytes([0, color.r(), color.g(), color.b()]);
            self.buffer[offset..offset + 4].copy_from_slice(&px.to_le_bytes());
        }
        Ok(())
    }
}

impl OriginDimensions for FbDisplay<'_> {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
