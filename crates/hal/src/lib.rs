#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Hardware boundary for the DSO-100 framebuffer driver.
//!
//! The driver core never touches a bus, an interrupt controller or a page
//! allocator directly. Everything it consumes from the platform is expressed
//! here as a trait, together with the few concrete primitives every platform
//! shares (MMIO windows, FDT property lookup, IRQ-safe locking, wait queues).

extern crate alloc;

pub mod display;
pub mod properties;
pub mod interrupts;
pub mod memory;
pub mod mmio;
pub mod traits;
pub mod wait;

pub use display::{DisplayConsumer, FbFlags, FramebufferInfo};
pub use properties::{FdtProperties, PropertyError, PropertySource};
pub use memory::{
    ContigRegion, ContiguousAllocator, IdentityHeapAllocator, MemAttr, PAGE_SIZE, round_page,
};
pub use mmio::{MmioRegion, RegisterSpace};
pub use traits::{InterruptController, InterruptHandler, IrqCookie, IrqLine, Platform};
pub use wait::{Clock, SpinWaitQueue, WaitQueue, WaitResult};
#[cfg(any(test, feature = "std"))]
pub use wait::StdWaitQueue;

use core::mem::ManuallyDrop;
use dso_error::define_kernel_error;
use spin::{Mutex, MutexGuard};

define_kernel_error! {
    /// Failures reported by platform collaborators.
    pub enum HalError(0x01) {
        /// Memory-mapped register window could not be mapped
        RegistersUnavailable = 0x01 => "Register space unavailable",
        /// No interrupt line assigned to the device
        IrqUnavailable = 0x02 => "Interrupt line unavailable",
        /// Interrupt controller refused the handler
        IrqSetupFailed = 0x03 => "Interrupt handler registration failed",
        /// No contiguous region satisfying the request
        OutOfMemory = 0x04 => "Contiguous allocation failed",
        /// Bus could not create the child device
        ChildUnavailable = 0x05 => "Child device could not be created",
        /// Child device refused to attach
        ChildRejected = 0x06 => "Child device refused to attach",
    }
}

/// IRQ-safe lock that masks local interrupts while held.
/// Behaviors: [L1]-[L4] interrupt-safe locking
///
/// Data shared with an interrupt handler must live behind one of these: a
/// plain spin lock would deadlock if the handler fired on the CPU that
/// already holds it.
pub struct IrqSafeLock<T> {
    inner: Mutex<T>,
}

impl<T> IrqSafeLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            inner: Mutex::new(data),
        }
    }

    /// [L1] Disables interrupts before acquiring, [L4] data accessible through guard
    pub fn lock(&self) -> IrqSafeLockGuard<'_, T> {
        let state = interrupts::disable();
        let guard = self.inner.lock();
        IrqSafeLockGuard {
            guard: ManuallyDrop::new(guard),
            state,
        }
    }
}

pub struct IrqSafeLockGuard<'a, T> {
    guard: ManuallyDrop<MutexGuard<'a, T>>,
    state: u64,
}

impl<T> core::ops::Deref for IrqSafeLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> core::ops::DerefMut for IrqSafeLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for IrqSafeLockGuard<'_, T> {
    /// [L2] Restores interrupts after releasing
    fn drop(&mut self) {
        // SAFETY: guard is only dropped once, here, before interrupts come back
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        interrupts::restore(self.state);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
