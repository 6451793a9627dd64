//! Error handling infrastructure for the DSO-100 driver stack.
//!
//! Provides the `define_kernel_error!` macro. Every error enum declared with it
//! carries a subsystem byte and a per-variant code, so a failed attach can be
//! reported as a single `EXXYY` number in a boot log.
//!
//! ## Usage
//!
//! ### Simple errors (no inner data)
//! ```ignore
//! define_kernel_error! {
//!     pub enum HalError(0x01) {
//!         RegistersUnavailable = 0x01 => "Register space unavailable",
//!         IrqUnavailable = 0x02 => "Interrupt line unavailable",
//!     }
//! }
//! ```
//!
//! ### Variants carrying data
//! ```ignore
//! define_kernel_error! {
//!     pub enum DriverError(0x10) {
//!         ResourceUnavailable(HalError) = 0x01 => "Resource unavailable",
//!         MissingConfiguration(&'static str) = 0x02 => "Required panel parameter missing",
//!     }
//! }
//! ```
//!
//! The inner value must be `Copy + Eq + Display`; it is appended to the
//! description in parentheses.

#![no_std]

/// Macro to define an error type with consistent handling.
///
/// Supports both simple variants and variants wrapping an inner value.
#[macro_export]
macro_rules! define_kernel_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($subsystem:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $(($inner:ty))? = $code:literal => $desc:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant $(($inner))?,
            )*
        }

        impl $name {
            /// Subsystem identifier for this error type.
            pub const SUBSYSTEM: u8 = $subsystem;

            /// Numeric error code: subsystem in the high byte, variant in the low byte.
            pub const fn code(&self) -> u16 {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? _unused) => {
                            (($subsystem as u16) << 8) | $code
                        }
                    )*
                }
            }

            /// Short description for logging.
            pub const fn name(&self) -> &'static str {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? _unused) => {
                            $desc
                        }
                    )*
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? inner) => {
                            $crate::define_kernel_error!(@display_body self f $desc $(($inner))? inner)
                        }
                    )*
                }
            }
        }

        impl core::error::Error for $name {}
    };

    (@pattern $variant:ident ($inner:ty) $bind:ident) => { Self::$variant($bind) };
    (@pattern $variant:ident $bind:ident) => { Self::$variant };

    (@display_body $self:ident $f:ident $desc:literal ($inner:ty) $bind:ident) => {
        write!($f, "E{:04X}: {} ({})", $self.code(), $desc, $bind)
    };
    (@display_body $self:ident $f:ident $desc:literal $bind:ident) => {
        write!($f, "E{:04X}: {}", $self.code(), $desc)
    };
}
