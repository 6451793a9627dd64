//! Panel configuration loading.
//! Behaviors: [C1]-[C5] all-or-nothing property load
//!
//! The panel is described by fifteen 32-bit firmware properties. Every one of
//! them is required; there are no defaults.

use dso_hal::{PropertyError, PropertySource};
use log::error;

use crate::DriverError;
use crate::framebuffer::DEPTH;
use crate::regs;

/// Panel timing geometry and signal polarities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelConfig {
    pub width: u32,
    pub hfrontporch: u32,
    pub hsync: u32,
    pub hbackporch: u32,
    pub overlayx: u32,
    pub overlaywidth: u32,
    pub height: u32,
    pub vfrontporch: u32,
    pub vsync: u32,
    pub vbackporch: u32,
    pub overlayy: u32,
    pub overlayheight: u32,
    pub deinverted: u32,
    pub hsyncinverted: u32,
    pub vsyncinverted: u32,
}

type Setter = fn(&mut PanelConfig, u32);

/// Property names in load order, each with the field it fills.
pub const PANEL_PROPERTIES: [(&str, Setter); 15] = [
    ("width", |c, v| c.width = v),
    ("hfrontporch", |c, v| c.hfrontporch = v),
    ("hsync", |c, v| c.hsync = v),
    ("hbackporch", |c, v| c.hbackporch = v),
    ("overlayx", |c, v| c.overlayx = v),
    ("overlaywidth", |c, v| c.overlaywidth = v),
    ("height", |c, v| c.height = v),
    ("vfrontporch", |c, v| c.vfrontporch = v),
    ("vsync", |c, v| c.vsync = v),
    ("vbackporch", |c, v| c.vbackporch = v),
    ("overlayy", |c, v| c.overlayy = v),
    ("overlayheight", |c, v| c.overlayheight = v),
    ("deinverted", |c, v| c.deinverted = v),
    ("hsyncinverted", |c, v| c.hsyncinverted = v),
    ("vsyncinverted", |c, v| c.vsyncinverted = v),
];

impl PanelConfig {
    /// [C1] Reads every property in order, [C2] stops at the first missing one,
    /// [C3] rejects malformed cells, [C4] validates the result.
    pub fn load<S: PropertySource + ?Sized>(props: &S) -> Result<Self, DriverError> {
        let mut config = Self::default();
        for (name, set) in PANEL_PROPERTIES {
            match props.property_u32(name) {
                Ok(value) => set(&mut config, value),
                Err(PropertyError::NotFound) => {
                    error!("[DSO100FB] required parameter {name} is not specified");
                    return Err(DriverError::MissingConfiguration(name));
                }
                Err(PropertyError::Malformed) => {
                    error!("[DSO100FB] parameter {name} is not a 32-bit cell");
                    return Err(DriverError::MalformedConfiguration(name));
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// [C4] Overlay inside the active area, non-zero size, [C5] every value
    /// fits its 16-bit timing field and the frame size fits FB_LENGTH.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.width == 0 {
            return Err(DriverError::InvalidGeometry("width"));
        }
        if self.height == 0 {
            return Err(DriverError::InvalidGeometry("height"));
        }

        let limits = [
            ("width", self.width, regs::HTIMING1_WIDTH_BEFORE),
            ("hfrontporch", self.hfrontporch, regs::HTIMING2_FRONT_PORCH),
            ("hsync", self.hsync, regs::HTIMING3_SYNC),
            ("hbackporch", self.hbackporch, regs::HTIMING3_BACK_PORCH),
            ("height", self.height, regs::VTIMING1_HEIGHT_BEFORE),
            ("vfrontporch", self.vfrontporch, regs::VTIMING2_FRONT_PORCH),
            ("vsync", self.vsync, regs::VTIMING3_SYNC),
            ("vbackporch", self.vbackporch, regs::VTIMING3_BACK_PORCH),
        ];
        for (name, value, field) in limits {
            if !field.fits(value) {
                return Err(DriverError::InvalidGeometry(name));
            }
        }

        let bytes_per_pixel = DEPTH / 8;
        if self
            .width
            .checked_mul(bytes_per_pixel)
            .and_then(|stride| stride.checked_mul(self.height))
            .is_none()
        {
            return Err(DriverError::InvalidGeometry("height"));
        }

        if self.overlayx.checked_add(self.overlaywidth).is_none_or(|end| end > self.width) {
            return Err(DriverError::InvalidGeometry("overlaywidth"));
        }
        if self.overlayy.checked_add(self.overlayheight).is_none_or(|end| end > self.height) {
            return Err(DriverError::InvalidGeometry("overlayheight"));
        }
        Ok(())
    }

    /// Pixels to the right of the overlay.
    pub fn width_after_overlay(&self) -> u32 {
        self.width - self.overlaywidth - self.overlayx
    }

    /// Lines below the overlay.
    pub fn height_after_overlay(&self) -> u32 {
        self.height - self.overlayheight - self.overlayy
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
