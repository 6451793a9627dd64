//! Attach/detach lifecycle.
//! Behaviors: [D1]-[D6] acquisition order, unwinding, teardown order
//!
//! Each resource acquired during attach is held by a guard that releases it
//! when dropped. [`Dso100Fb`] declares its guards in teardown order, so both a
//! failed attach and a detach release exactly what was acquired, newest first.

use alloc::string::String;
use alloc::sync::Arc;
use core::time::Duration;

use dso_hal::{
    DisplayConsumer, FdtProperties, FramebufferInfo, InterruptController, InterruptHandler,
    IrqCookie, IrqLine, Platform, RegisterSpace,
};
use log::{debug, error, info};

use crate::DriverError;
use crate::config::PanelConfig;
use crate::framebuffer::{FbGeometry, Framebuffer};
use crate::handshake::{AckMode, InterruptSync};
use crate::regs::{self, Control, IrqStatus};
use crate::timing::TimingRegisters;

/// Device tree `compatible` string.
pub const COMPATIBLE: &str = "dso100,dso100fb";
/// Device description reported by [`probe`].
pub const DESCRIPTION: &str = "DSO-100 framebuffer controller";

/// [D1] Matches an enabled node listing [`COMPATIBLE`].
pub fn probe(node: &FdtProperties<'_, '_>) -> Option<&'static str> {
    if node.status_okay() && node.is_compatible(COMPATIBLE) {
        Some(DESCRIPTION)
    } else {
        None
    }
}

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Not scanning out.
    Uninitialized,
    /// Timings and framebuffer programmed, start not yet acknowledged.
    Configuring,
    /// Scan-out running.
    Running,
    /// Stop requested.
    Stopping,
}

/// Driver tunables. Panel geometry is not here; it comes from firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverConfig {
    /// Bound on each start/stop handshake. `None` waits for the hardware
    /// indefinitely.
    pub handshake_timeout: Option<Duration>,
    /// How the interrupt handler acknowledges ISR.
    pub ack_mode: AckMode,
}

struct RegsGuard<'a, P: Platform> {
    platform: &'a P,
    regs: Option<P::Registers>,
}

impl<P: Platform> Drop for RegsGuard<'_, P> {
    fn drop(&mut self) {
        if let Some(regs) = self.regs.take() {
            self.platform.unmap_registers(regs);
        }
    }
}

struct IrqLineGuard<'a, P: Platform> {
    platform: &'a P,
    line: IrqLine,
}

impl<P: Platform> Drop for IrqLineGuard<'_, P> {
    fn drop(&mut self) {
        self.platform.release_irq(self.line);
    }
}

struct IrqHandlerGuard<'a, P: Platform> {
    platform: &'a P,
    cookie: IrqCookie,
}

impl<P: Platform> Drop for IrqHandlerGuard<'_, P> {
    fn drop(&mut self) {
        self.platform.interrupts().teardown(self.cookie);
    }
}

/// An attached child; detached and deleted on drop.
struct ChildGuard<'a, P: Platform> {
    platform: &'a P,
    child: Option<P::Child>,
}

impl<P: Platform> Drop for ChildGuard<'_, P> {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            child.detach();
            self.platform.delete_child(child);
        }
    }
}

/// An attached DSO-100 controller.
pub struct Dso100Fb<'a, P: Platform> {
    // Teardown order. Do not reorder.
    child: ChildGuard<'a, P>,
    framebuffer: Framebuffer<'a, P::Allocator>,
    _irq: IrqHandlerGuard<'a, P>,
    _line: IrqLineGuard<'a, P>,
    _regs: RegsGuard<'a, P>,
    sync: Arc<InterruptSync<P::Registers, P::Wait>>,

    info: FramebufferInfo,
    state: ControllerState,
    config: DriverConfig,
    name: &'a str,
}

impl<'a, P: Platform> Dso100Fb<'a, P> {
    /// [D2] Acquires in order: sync state, registers, IRQ line, handler,
    /// panel config, framebuffer, child; then starts the controller.
    /// [D3] On failure everything already acquired is released in reverse.
    pub fn attach(platform: &'a P, config: DriverConfig) -> Result<Self, DriverError> {
        let name = platform.name_unit();
        let wait = platform.wait_queue();

        let mapped = platform.map_registers().map_err(|e| {
            error!("[DSO100FB] {name}: cannot map registers: {e}");
            DriverError::ResourceUnavailable(e)
        })?;
        let regs = RegsGuard {
            platform,
            regs: Some(mapped.clone()),
        };

        let line = platform.allocate_irq().map_err(|e| {
            error!("[DSO100FB] {name}: cannot allocate IRQ: {e}");
            DriverError::ResourceUnavailable(e)
        })?;
        let line = IrqLineGuard { platform, line };

        let sync = Arc::new(InterruptSync::new(mapped, wait, config.ack_mode));
        let handler: Arc<dyn InterruptHandler> = sync.clone();
        let cookie = platform
            .interrupts()
            .setup(line.line, handler)
            .map_err(|e| {
                error!("[DSO100FB] {name}: cannot setup interrupt: {e}");
                DriverError::ResourceUnavailable(e)
            })?;
        let irq = IrqHandlerGuard { platform, cookie };

        let panel = PanelConfig::load(platform.properties())?;

        let timing = TimingRegisters::from_config(&panel);
        timing.program(sync.registers());
        debug!(
            "[DSO100FB] {name}: timings programmed, read back {:?}",
            TimingRegisters::read(sync.registers()).decode()
        );

        let framebuffer = Framebuffer::allocate(platform.allocator(), FbGeometry::for_panel(&panel))?;
        framebuffer.bind(sync.registers());
        let info = framebuffer.info(String::from(name));

        let mut fbd = platform.add_child().map_err(|e| {
            error!("[DSO100FB] {name}: cannot add framebuffer device: {e}");
            DriverError::ChildAttachFailure(e)
        })?;
        if let Err(e) = fbd.attach(&info) {
            error!("[DSO100FB] {name}: framebuffer device attach failed: {e}");
            platform.delete_child(fbd);
            return Err(DriverError::ChildAttachFailure(e));
        }
        let child = ChildGuard {
            platform,
            child: Some(fbd),
        };

        let mut driver = Self {
            child,
            framebuffer,
            _irq: irq,
            _line: line,
            _regs: regs,
            sync,
            info,
            state: ControllerState::Configuring,
            config,
            name,
        };

        if let Err(e) =
            driver
                .sync
                .signal_and_wait(Control::START, IrqStatus::STARTED, config.handshake_timeout)
        {
            error!("[DSO100FB] {name}: controller did not start: {e}");
            driver.abandon_scanout();
            return Err(e);
        }
        driver.state = ControllerState::Running;

        info!(
            "[DSO100FB] {name}: {}x{} running, framebuffer {:#x} (phys {:#x}), {} bytes",
            driver.info.width,
            driver.info.height,
            driver.info.vbase,
            driver.info.pbase,
            driver.info.size
        );
        Ok(driver)
    }

    /// [D4] Stop handshake, then child, framebuffer, handler, IRQ line and
    /// registers are released in that order.
    ///
    /// A stop that is not acknowledged in time still tears everything down;
    /// the timeout is returned afterwards.
    pub fn detach(mut self) -> Result<(), DriverError> {
        let result = self.stop();
        drop(self);
        result
    }

    /// Framebuffer descriptor shared with the child.
    pub fn info(&self) -> &FramebufferInfo {
        &self.info
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn geometry(&self) -> &FbGeometry {
        self.framebuffer.geometry()
    }

    /// Child device holding the framebuffer.
    pub fn child(&self) -> Option<&P::Child> {
        self.child.child.as_ref()
    }

    /// Panel geometry decoded from the timing registers.
    pub fn current_mode(&self) -> PanelConfig {
        TimingRegisters::read(self.sync.registers()).decode()
    }

    /// [D5] Runs the stop handshake once, only while running.
    fn stop(&mut self) -> Result<(), DriverError> {
        if self.state != ControllerState::Running {
            return Ok(());
        }
        self.state = ControllerState::Stopping;
        let result = self.sync.signal_and_wait(
            Control::STOP,
            IrqStatus::STOPPED,
            self.config.handshake_timeout,
        );
        if let Err(e) = result {
            error!("[DSO100FB] {}: controller did not stop: {e}", self.name);
            self.abandon_scanout();
        }
        self.state = ControllerState::Uninitialized;
        result
    }

    /// The controller never confirmed a start or stop and may still be
    /// fetching. Requests a stop without waiting and unbinds the buffer, so
    /// nothing points at it once it is freed.
    fn abandon_scanout(&self) {
        let hw = self.sync.registers();
        hw.write32(regs::CR, Control::STOP.bits());
        self.framebuffer.unbind(hw);
    }
}

impl<P: Platform> Drop for Dso100Fb<'_, P> {
    /// [D6] Dropping a running driver detaches it
    fn drop(&mut self) {
        // Still Configuring means the start handshake never completed.
        let started = self.state != ControllerState::Configuring;
        let _ = self.stop();
        if started {
            info!("[DSO100FB] {}: detached", self.name);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
