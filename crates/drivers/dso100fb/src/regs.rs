//! DSO-100 register map.
//! Behaviors: [R1]-[R3] bitfield packing
//!
//! All registers are 32 bits wide. Timing registers hold two 16-bit fields,
//! the first in the low half and the second in the high half.

use bitflags::bitflags;

/// Interrupt status. Write to acknowledge.
pub const ISR: usize = 0x00;
/// Interrupt mask, same bit layout as [`ISR`].
pub const IMR: usize = 0x04;
/// Control.
pub const CR: usize = 0x08;
pub const HTIMING1: usize = 0x0C;
pub const HTIMING2: usize = 0x10;
pub const HTIMING3: usize = 0x14;
pub const VTIMING1: usize = 0x18;
pub const VTIMING2: usize = 0x1C;
pub const VTIMING3: usize = 0x20;
/// Panel interface control (signal polarities).
pub const IFCTRL: usize = 0x24;
/// Physical base of the scanned-out framebuffer.
pub const FB_BASE: usize = 0x28;
/// Length in bytes of the scanned-out framebuffer.
pub const FB_LENGTH: usize = 0x2C;

/// Size of the register window.
pub const REGS_SIZE: usize = 0x30;

bitflags! {
    /// CR bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        const START = 1 << 0;
        const STOP = 1 << 1;
    }

    /// ISR / IMR bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqStatus: u32 {
        const STARTED = 1 << 0;
        const STOPPED = 1 << 1;
    }

    /// IFCTRL bits. A set bit inverts the signal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterfaceControl: u32 {
        const DE_POL = 1 << 0;
        const HSYNC_POL = 1 << 1;
        const VSYNC_POL = 1 << 2;
    }
}

/// A bitfield inside a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub pos: u32,
    pub width: u32,
}

impl Field {
    pub const fn new(name: &'static str, pos: u32, width: u32) -> Self {
        Self { name, pos, width }
    }

    /// Unshifted mask.
    pub const fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// Largest value the field can hold.
    pub const fn max(&self) -> u32 {
        self.mask()
    }

    pub const fn fits(&self, value: u32) -> bool {
        value <= self.max()
    }

    /// [R1] Masks and shifts `value` into position
    pub const fn pack(&self, value: u32) -> u32 {
        (value & self.mask()) << self.pos
    }

    /// [R2] Extracts the field from a register value
    pub const fn extract(&self, reg: u32) -> u32 {
        (reg >> self.pos) & self.mask()
    }
}

pub const HTIMING1_WIDTH_BEFORE: Field = Field::new("HTIMING1_WIDTH_BEFORE", 0, 16);
pub const HTIMING1_OVERLAY_WIDTH: Field = Field::new("HTIMING1_OVERLAY_WIDTH", 16, 16);
pub const HTIMING2_WIDTH_AFTER: Field = Field::new("HTIMING2_WIDTH_AFTER", 0, 16);
pub const HTIMING2_FRONT_PORCH: Field = Field::new("HTIMING2_FRONT_PORCH", 16, 16);
pub const HTIMING3_SYNC: Field = Field::new("HTIMING3_SYNC", 0, 16);
pub const HTIMING3_BACK_PORCH: Field = Field::new("HTIMING3_BACK_PORCH", 16, 16);

pub const VTIMING1_HEIGHT_BEFORE: Field = Field::new("VTIMING1_HEIGHT_BEFORE", 0, 16);
pub const VTIMING1_OVERLAY_HEIGHT: Field = Field::new("VTIMING1_OVERLAY_HEIGHT", 16, 16);
pub const VTIMING2_HEIGHT_AFTER: Field = Field::new("VTIMING2_HEIGHT_AFTER", 0, 16);
pub const VTIMING2_FRONT_PORCH: Field = Field::new("VTIMING2_FRONT_PORCH", 16, 16);
pub const VTIMING3_SYNC: Field = Field::new("VTIMING3_SYNC", 0, 16);
pub const VTIMING3_BACK_PORCH: Field = Field::new("VTIMING3_BACK_PORCH", 16, 16);

pub const ISR_STARTED: Field = Field::new("ISR_STARTED", 0, 1);
pub const ISR_STOPPED: Field = Field::new("ISR_STOPPED", 1, 1);
pub const CR_START: Field = Field::new("CR_START", 0, 1);
pub const CR_STOP: Field = Field::new("CR_STOP", 1, 1);
pub const IFCTRL_DE_POL: Field = Field::new("IFCTRL_DE_POL", 0, 1);
pub const IFCTRL_HSYNC_POL: Field = Field::new("IFCTRL_HSYNC_POL", 1, 1);
pub const IFCTRL_VSYNC_POL: Field = Field::new("IFCTRL_VSYNC_POL", 2, 1);
pub const FB_BASE_ADDR: Field = Field::new("FB_BASE_ADDR", 0, 32);
pub const FB_LENGTH_BYTES: Field = Field::new("FB_LENGTH_BYTES", 0, 32);

/// A named register and its fields.
#[derive(Debug, Clone, Copy)]
pub struct Register {
    pub name: &'static str,
    pub offset: usize,
    pub fields: &'static [Field],
}

/// The whole register map, in offset order.
pub const REGISTERS: &[Register] = &[
    Register { name: "ISR", offset: ISR, fields: &[ISR_STARTED, ISR_STOPPED] },
    Register { name: "IMR", offset: IMR, fields: &[ISR_STARTED, ISR_STOPPED] },
    Register { name: "CR", offset: CR, fields: &[CR_START, CR_STOP] },
    Register {
        name: "HTIMING1",
        offset: HTIMING1,
        fields: &[HTIMING1_WIDTH_BEFORE, HTIMING1_OVERLAY_WIDTH],
    },
    Register {
        name: "HTIMING2",
        offset: HTIMING2,
        fields: &[HTIMING2_WIDTH_AFTER, HTIMING2_FRONT_PORCH],
    },
    Register { name: "HTIMING3", offset: HTIMING3, fields: &[HTIMING3_SYNC, HTIMING3_BACK_PORCH] },
    Register {
        name: "VTIMING1",
        offset: VTIMING1,
        fields: &[VTIMING1_HEIGHT_BEFORE, VTIMING1_OVERLAY_HEIGHT],
    },
    Register {
        name: "VTIMING2",
        offset: VTIMING2,
        fields: &[VTIMING2_HEIGHT_AFTER, VTIMING2_FRONT_PORCH],
    },
    Register { name: "VTIMING3", offset: VTIMING3, fields: &[VTIMING3_SYNC, VTIMING3_BACK_PORCH] },
    Register {
        name: "IFCTRL",
        offset: IFCTRL,
        fields: &[IFCTRL_DE_POL, IFCTRL_HSYNC_POL, IFCTRL_VSYNC_POL],
    },
    Register { name: "FB_BASE", offset: FB_BASE, fields: &[FB_BASE_ADDR] },
    Register { name: "FB_LENGTH", offset: FB_LENGTH, fields: &[FB_LENGTH_BYTES] },
];

/// [R3] Packs `(field, value)` pairs into one register value
pub fn pack(fields: &[(Field, u32)]) -> u32 {
    fields
        .iter()
        .fold(0, |reg, &(field, value)| reg | field.pack(value))
}

// ============================================================================
// Unit Tests
// ============================================================================
