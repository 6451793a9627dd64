//! Timing register derivation and programming.
//! Behaviors: [T1]-[T4] panel geometry to HTIMING/VTIMING/IFCTRL

use dso_hal::RegisterSpace;

use crate::config::PanelConfig;
use crate::regs::{self, InterfaceControl};

/// Values for the seven timing registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingRegisters {
    pub htiming1: u32,
    pub htiming2: u32,
    pub htiming3: u32,
    pub vtiming1: u32,
    pub vtiming2: u32,
    pub vtiming3: u32,
    pub ifctrl: u32,
}

impl TimingRegisters {
    /// [T1] Overlay split of each axis, [T2] porches and sync, [T3] polarity bits.
    ///
    /// `config` must have passed [`PanelConfig::validate`].
    pub fn from_config(config: &PanelConfig) -> Self {
        let mut ifctrl = InterfaceControl::empty();
        ifctrl.set(InterfaceControl::DE_POL, config.deinverted != 0);
        ifctrl.set(InterfaceControl::HSYNC_POL, config.hsyncinverted != 0);
        ifctrl.set(InterfaceControl::VSYNC_POL, config.vsyncinverted != 0);

        Self {
            htiming1: regs::pack(&[
                (regs::HTIMING1_WIDTH_BEFORE, config.overlayx),
                (regs::HTIMING1_OVERLAY_WIDTH, config.overlaywidth),
            ]),
            htiming2: regs::pack(&[
                (regs::HTIMING2_WIDTH_AFTER, config.width_after_overlay()),
                (regs::HTIMING2_FRONT_PORCH, config.hfrontporch),
            ]),
            htiming3: regs::pack(&[
                (regs::HTIMING3_SYNC, config.hsync),
                (regs::HTIMING3_BACK_PORCH, config.hbackporch),
            ]),
            vtiming1: regs::pack(&[
                (regs::VTIMING1_HEIGHT_BEFORE, config.overlayy),
                (regs::VTIMING1_OVERLAY_HEIGHT, config.overlayheight),
            ]),
            vtiming2: regs::pack(&[
                (regs::VTIMING2_HEIGHT_AFTER, config.height_after_overlay()),
                (regs::VTIMING2_FRONT_PORCH, config.vfrontporch),
            ]),
            vtiming3: regs::pack(&[
                (regs::VTIMING3_SYNC, config.vsync),
                (regs::VTIMING3_BACK_PORCH, config.vbackporch),
            ]),
            ifctrl: ifctrl.bits(),
        }
    }

    fn pairs(&self) -> [(usize, u32); 7] {
        [
            (regs::HTIMING1, self.htiming1),
            (regs::HTIMING2, self.htiming2),
            (regs::HTIMING3, self.htiming3),
            (regs::VTIMING1, self.vtiming1),
            (regs::VTIMING2, self.vtiming2),
            (regs::VTIMING3, self.vtiming3),
            (regs::IFCTRL, self.ifctrl),
        ]
    }

    /// [T4] Writes all seven registers, horizontal first.
    pub fn program<R: RegisterSpace + ?Sized>(&self, hw: &R) {
        for (offset, value) in self.pairs() {
            hw.write32(offset, value);
        }
    }

    pub fn read<R: RegisterSpace + ?Sized>(hw: &R) -> Self {
        Self {
            htiming1: hw.read32(regs::HTIMING1),
            htiming2: hw.read32(regs::HTIMING2),
            htiming3: hw.read32(regs::HTIMING3),
            vtiming1: hw.read32(regs::VTIMING1),
            vtiming2: hw.read32(regs::VTIMING2),
            vtiming3: hw.read32(regs::VTIMING3),
            ifctrl: hw.read32(regs::IFCTRL),
        }
    }

    /// Rebuilds the panel geometry. Polarity flags come back as 0 or 1.
    pub fn decode(&self) -> PanelConfig {
        let overlayx = regs::HTIMING1_WIDTH_BEFORE.extract(self.htiming1);
        let overlaywidth = regs::HTIMING1_OVERLAY_WIDTH.extract(self.htiming1);
        let overlayy = regs::VTIMING1_HEIGHT_BEFORE.extract(self.vtiming1);
        let overlayheight = regs::VTIMING1_OVERLAY_HEIGHT.extract(self.vtiming1);
        let ifctrl = InterfaceControl::from_bits_truncate(self.ifctrl);

        PanelConfig {
            width: overlayx + overlaywidth + regs::HTIMING2_WIDTH_AFTER.extract(self.htiming2),
            hfrontporch: regs::HTIMING2_FRONT_PORCH.extract(self.htiming2),
            hsync: regs::HTIMING3_SYNC.extract(self.htiming3),
            hbackporch: regs::HTIMING3_BACK_PORCH.extract(self.htiming3),
            overlayx,
            overlaywidth,
            height: overlayy + overlayheight + regs::VTIMING2_HEIGHT_AFTER.extract(self.vtiming2),
            vfrontporch: regs::VTIMING2_FRONT_PORCH.extract(self.vtiming2),
            vsync: regs::VTIMING3_SYNC.extract(self.vtiming3),
            vbackporch: regs::VTIMING3_BACK_PORCH.extract(self.vtiming3),
            overlayy,
            overlayheight,
            deinverted: u32::from(ifctrl.contains(InterfaceControl::DE_POL)),
            hsyncinverted: u32::from(ifctrl.contains(InterfaceControl::HSYNC_POL)),
            vsyncinverted: u32::from(ifctrl.contains(InterfaceControl::VSYNC_POL)),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
