//! Interrupt-driven start/stop handshake.
//! Behaviors: [H1]-[H6] signal, accumulate, release
//!
//! The interrupt handler ORs every status it reads into `pending` and wakes
//! the waiter. The waiter owns clearing: once its mask overlaps `pending` it
//! zeroes the accumulator and masks the controller again.

use core::time::Duration;

use dso_hal::{InterruptHandler, IrqSafeLock, RegisterSpace, WaitQueue, WaitResult};
use log::{debug, trace, warn};

use crate::DriverError;
use crate::regs::{self, Control, IrqStatus};

/// How the interrupt handler acknowledges ISR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Write the complement of the status just read. A bit that rises between
    /// the read and the write is cleared without being seen.
    #[default]
    Complement,
    /// Write back exactly the bits just read.
    WriteBack,
}

impl AckMode {
    pub fn ack_value(self, status: u32) -> u32 {
        match self {
            Self::Complement => !status,
            Self::WriteBack => status,
        }
    }
}

/// Pending-status accumulator shared between the interrupt handler and the
/// lifecycle thread.
pub struct InterruptSync<R, W> {
    regs: R,
    pending: IrqSafeLock<u32>,
    wait: W,
    ack_mode: AckMode,
}

impl<R: RegisterSpace, W: WaitQueue> InterruptSync<R, W> {
    pub fn new(regs: R, wait: W, ack_mode: AckMode) -> Self {
        Self {
            regs,
            pending: IrqSafeLock::new(0),
            wait,
            ack_mode,
        }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Status bits seen since the last completed handshake.
    pub fn pending(&self) -> u32 {
        *self.pending.lock()
    }

    /// [H1] Unmasks `ack` and writes `signal` to CR under the lock,
    /// [H2] sleeps until `pending` overlaps `ack`,
    /// [H3] then clears `pending` and masks every interrupt again.
    ///
    /// With `timeout` set, [H4] gives up once it passes and returns
    /// `HandshakeTimeout` after the same cleanup. A timeout too large to
    /// form a deadline waits without one.
    pub fn signal_and_wait(
        &self,
        signal: Control,
        ack: IrqStatus,
        timeout: Option<Duration>,
    ) -> Result<(), DriverError> {
        let deadline = timeout.and_then(|t| self.wait.now().checked_add(t));
        let mut pending = self.pending.lock();

        self.regs.write32(regs::IMR, ack.bits());
        self.regs.write32(regs::CR, signal.bits());

        let result = loop {
            if *pending & ack.bits() != 0 {
                break Ok(());
            }
            let epoch = self.wait.epoch();
            drop(pending);
            let woke = self.wait.wait(epoch, deadline);
            pending = self.pending.lock();
            if woke == WaitResult::TimedOut && *pending & ack.bits() == 0 {
                break Err(DriverError::HandshakeTimeout);
            }
        };

        match result {
            Ok(()) => debug!("[DSO100FB] {signal:?} acknowledged, status {:#x}", *pending),
            Err(_) => warn!("[DSO100FB] {signal:?} not acknowledged within {timeout:?}"),
        }

        *pending = 0;
        self.regs.write32(regs::IMR, 0);
        result
    }

    /// [H5] Reads and acknowledges ISR, [H6] ORs the status into `pending`
    /// and wakes the waiter. Never blocks on anything but the pending lock.
    pub fn handle_interrupt(&self) {
        let status = self.regs.read32(regs::ISR);
        self.regs.write32(regs::ISR, self.ack_mode.ack_value(status));
        trace!("[DSO100FB] interrupt, status {status:#x}");

        let mut pending = self.pending.lock();
        *pending |= status;
        self.wait.wake_all();
    }
}

impl<R, W> InterruptHandler for InterruptSync<R, W>
where
    R: RegisterSpace + Send + Sync,
    W: WaitQueue,
{
    fn handle(&self, _irq: u32) {
        self.handle_interrupt();
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
