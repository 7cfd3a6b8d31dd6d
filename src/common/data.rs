//! Memory Access Types.
//!
//! This module defines the classification of memory accesses used throughout
//! the simulator. The memory map and the caches use these types to select
//! the right cache, validate access rights, and report faults with the
//! correct access kind.

/// Type of memory access operation.
///
/// Used to distinguish between instruction fetches, data reads, and data
/// writes for permission checking in the memory map and for routing an
/// access to the instruction or data cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    /// Data read access.
    ///
    /// Used when loading data from memory into registers.
    /// Requires Read (R) permission in the TLB.
    Read,

    /// Data write access.
    ///
    /// Used when storing data from registers to memory.
    /// Requires Write (W) permission in the TLB.
    Write,

    /// Instruction fetch access.
    ///
    /// Used when fetching instructions for execution.
    /// Requires Execute (X) permission in the TLB.
    Execute,
}

impl AccessType {
    /// Short lowercase name used in fault messages.
    pub fn label(self) -> &'static str {
        match self {
            AccessType::Read => "read",
            AccessType::Write => "write",
            AccessType::Execute => "execute",
        }
    }
}
