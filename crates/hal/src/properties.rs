//! Firmware property lookup.
//!
//! The driver only ever asks for named 32-bit cells. [`PropertySource`] is that
//! question; [`FdtProperties`] answers it from a flattened device tree node.

use ::fdt::node::FdtNode;
use dso_error::define_kernel_error;

define_kernel_error! {
    /// Errors returned by a property lookup
    /// [P1] NotFound - no property with that name
    /// [P2] Malformed - property exists but is not a single 32-bit cell
    pub enum PropertyError(0x02) {
        /// [P1] Property absent
        NotFound = 0x01 => "Property not found",
        /// [P2] Wrong length for a u32 cell
        Malformed = 0x02 => "Property is not a 32-bit cell",
    }
}

/// Opaque key → u32 lookup.
pub trait PropertySource {
    fn property_u32(&self, name: &str) -> Result<u32, PropertyError>;
}

/// Property source backed by a device tree node.
#[derive(Clone, Copy)]
pub struct FdtProperties<'b, 'a: 'b> {
    node: FdtNode<'b, 'a>,
}

impl<'b, 'a: 'b> FdtProperties<'b, 'a> {
    pub fn new(node: FdtNode<'b, 'a>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> FdtNode<'b, 'a> {
        self.node
    }

    /// True when `compatible` lists `compat`.
    pub fn is_compatible(&self, compat: &str) -> bool {
        self.node
            .compatible()
            .is_some_and(|c| c.all().any(|entry| entry == compat))
    }

    /// [P4] A node without `status` counts as enabled
    pub fn status_okay(&self) -> bool {
        match self.node.property("status").and_then(|p| p.as_str()) {
            None => true,
            Some(status) => matches!(status.trim_end_matches('\0'), "okay" | "ok"),
        }
    }
}

impl PropertySource for FdtProperties<'_, '_> {
    /// [P1] missing → NotFound, [P2] wrong size → Malformed, [P3] big-endian decode
    fn property_u32(&self, name: &str) -> Result<u32, PropertyError> {
        let prop = self.node.property(name).ok_or(PropertyError::NotFound)?;
        let cell: [u8; 4] = prop
            .value
            .try_into()
            .map_err(|_| PropertyError::Malformed)?;
        Ok(u32::from_be_bytes(cell))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
