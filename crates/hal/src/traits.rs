//! Platform-independent traits for the services a display controller driver
//! consumes from its bus.

use alloc::sync::Arc;

use crate::HalError;
use crate::display::DisplayConsumer;
use crate::memory::ContiguousAllocator;
use crate::mmio::RegisterSpace;
use crate::properties::PropertySource;
use crate::wait::WaitQueue;

/// Hardware interrupt line assigned to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqLine(pub u32);

/// Token returned by [`InterruptController::setup`], needed to tear the
/// handler down again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqCookie(pub usize);

/// IRQ handler trait.
pub trait InterruptHandler: Send + Sync {
    /// Called in interrupt context when the line fires
    fn handle(&self, irq: u32);
}

/// Handler registration on an interrupt controller.
pub trait InterruptController {
    /// Installs `handler` on `line`; it may run as soon as this returns.
    fn setup(&self, line: IrqLine, handler: Arc<dyn InterruptHandler>) -> Result<IrqCookie, HalError>;

    /// Removes the handler. No invocation is running or will start once this
    /// returns.
    fn teardown(&self, cookie: IrqCookie);
}

/// Everything a display controller driver needs from the bus it sits on.
pub trait Platform {
    type Registers: RegisterSpace + Clone + Send + Sync + 'static;
    type Properties: PropertySource;
    type Allocator: ContiguousAllocator;
    type Interrupts: InterruptController;
    type Child: DisplayConsumer;
    type Wait: WaitQueue + 'static;

    /// Device name plus unit number, e.g. `dso100fb0`.
    fn name_unit(&self) -> &str;

    fn map_registers(&self) -> Result<Self::Registers, HalError>;
    fn unmap_registers(&self, regs: Self::Registers);

    fn allocate_irq(&self) -> Result<IrqLine, HalError>;
    fn release_irq(&self, line: IrqLine);

    fn interrupts(&self) -> &Self::Interrupts;
    fn properties(&self) -> &Self::Properties;
    fn allocator(&self) -> &Self::Allocator;

    /// Fresh wait queue for one device instance.
    fn wait_queue(&self) -> Self::Wait;

    /// Creates the generic framebuffer child. It is attached separately.
    fn add_child(&self) -> Result<Self::Child, HalError>;
    fn delete_child(&self, child: Self::Child);
}
