#![cfg_attr(not(test), no_std)]

//! DSO-100 display controller driver.
//!
//! Reads the panel timings from firmware properties, programs the controller,
//! allocates and binds a write-combining framebuffer, hands it to a generic
//! framebuffer child, and starts scan-out with an interrupt-acknowledged
//! handshake. [`Dso100Fb::detach`] (or dropping the driver) runs the stop
//! handshake and releases everything in reverse order.
//!
//! ```ignore
//! let driver = Dso100Fb::attach(&platform, DriverConfig::default())?;
//! let info = driver.info();
//! // ... draw into info.vbase ...
//! driver.detach()?;
//! ```

extern crate alloc;

pub mod config;
pub mod driver;
pub mod framebuffer;
pub mod handshake;
pub mod regs;
pub mod timing;

#[cfg(test)]
mod testing;

pub use config::PanelConfig;
pub use driver::{COMPATIBLE, ControllerState, DESCRIPTION, DriverConfig, Dso100Fb, probe};
pub use framebuffer::FbGeometry;
pub use handshake::{AckMode, InterruptSync};
pub use timing::TimingRegisters;

use dso_error::define_kernel_error;
use dso_hal::HalError;

define_kernel_error! {
    /// Attach/detach failures of the DSO-100 driver.
    pub enum DriverError(0x10) {
        /// Register window, interrupt line or handler registration unavailable
        ResourceUnavailable(HalError) = 0x01 => "Resource unavailable",
        /// A panel property is absent
        MissingConfiguration(&'static str) = 0x02 => "Required panel parameter missing",
        /// A panel property is not a single 32-bit cell
        MalformedConfiguration(&'static str) = 0x03 => "Panel parameter malformed",
        /// Panel geometry cannot be programmed (named parameter)
        InvalidGeometry(&'static str) = 0x04 => "Invalid panel geometry",
        /// No contiguous memory for the framebuffer
        AllocationFailure = 0x05 => "Framebuffer allocation failed",
        /// The framebuffer child could not be created or attached
        ChildAttachFailure(HalError) = 0x06 => "Framebuffer device attach failed",
        /// The controller did not acknowledge a start/stop request in time
        HandshakeTimeout = 0x07 => "Controller handshake timed out",
    }
}
