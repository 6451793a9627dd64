//! Local interrupt mask control.
//! Behaviors: [I1]-[I5] interrupt disable/restore cycle
//!
//! On bare-metal targets these touch the CPU mask bits directly. Everywhere
//! else (host tests, hosted simulators) a per-thread flag stands in for them.

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod arch {
    /// [I1] Masks IRQs, [I2] returns previous DAIF
    #[inline(always)]
    pub fn disable() -> u64 {
        let state: u64;
        unsafe {
            core::arch::asm!("mrs {}, daif", out(reg) state);
            core::arch::asm!("msr daifset, #2");
        }
        state
    }

    /// [I3] Restores previous DAIF
    #[inline(always)]
    pub fn restore(state: u64) {
        unsafe {
            core::arch::asm!("msr daif, {}", in(reg) state);
        }
    }

    /// [I4][I5] IRQ is DAIF bit 7
    #[inline(always)]
    pub fn is_enabled() -> bool {
        let state: u64;
        unsafe {
            core::arch::asm!("mrs {}, daif", out(reg) state);
        }
        (state & (1 << 7)) == 0
    }
}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod arch {
    /// [I1] Clears IF, [I2] returns previous RFLAGS
    #[inline(always)]
    pub fn disable() -> u64 {
        let flags: u64;
        unsafe {
            core::arch::asm!("pushfq; pop {}", out(reg) flags, options(nomem));
            core::arch::asm!("cli", options(nomem, nostack));
        }
        flags
    }

    /// [I3] Sets IF again only if it was set before
    #[inline(always)]
    pub fn restore(state: u64) {
        if (state & 0x200) != 0 {
            unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
        }
    }

    /// [I4][I5] IF is RFLAGS bit 9
    #[inline(always)]
    pub fn is_enabled() -> bool {
        let flags: u64;
        unsafe {
            core::arch::asm!("pushfq; pop {}", out(reg) flags, options(nomem));
        }
        (flags & 0x200) != 0
    }
}

#[cfg(not(all(any(target_arch = "aarch64", target_arch = "x86_64"), target_os = "none")))]
mod arch {
    #[cfg(any(test, feature = "std"))]
    std::thread_local! {
        static ENABLED: core::cell::Cell<bool> = const { core::cell::Cell::new(true) };
    }

    /// [I1] Disables interrupts, [I2] returns previous state (mock impl)
    #[inline(always)]
    pub fn disable() -> u64 {
        #[cfg(any(test, feature = "std"))]
        {
            let prev = is_enabled();
            ENABLED.with(|e| e.set(false));
            u64::from(prev)
        }
        #[cfg(not(any(test, feature = "std")))]
        0
    }

    /// [I3] Restores previous interrupt state (mock impl)
    #[inline(always)]
    pub fn restore(state: u64) {
        #[cfg(any(test, feature = "std"))]
        ENABLED.with(|e| e.set(state != 0));
        #[cfg(not(any(test, feature = "std")))]
        let _ = state;
    }

    /// [I4][I5] (mock impl)
    #[inline(always)]
    pub fn is_enabled() -> bool {
        #[cfg(any(test, feature = "std"))]
        return ENABLED.with(core::cell::Cell::get);
        #[cfg(not(any(test, feature = "std")))]
        true
    }
}

/// [I1] Disables interrupts, [I2] returns previous state
#[inline(always)]
pub fn disable() -> u64 {
    arch::disable()
}

/// [I3] Restores the state returned by [`disable`]
#[inline(always)]
pub fn restore(state: u64) {
    arch::restore(state);
}

/// [I4] Returns true when enabled, [I5] returns false when disabled
#[inline(always)]
pub fn is_enabled() -> bool {
    arch::is_enabled()
}
