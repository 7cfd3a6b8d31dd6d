//! Exception taxonomy.
//!
//! Every fault the core can raise is a variant of [`CpuException`]. The
//! pipeline catches exceptions escaping the execute stage, offers them to
//! the interrupt controller, and normalizes whatever is left with the
//! faulting instruction's program counter before rethrowing to the caller
//! of `step`.

use std::fmt;

use crate::common::data::AccessType;

/// A fault raised by the decoder, the executor, or the memory system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CpuException {
    /// The decoder could not map an instruction word to an operation.
    InvalidInstruction { word: u32, pc: u32 },

    /// A checked add/sub/addi overflowed two's-complement range.
    ArithmeticOverflow { pc: u32 },

    /// A misaligned word/halfword/doubleword access or an invalid fetch.
    AddressError {
        addr: u32,
        access: AccessType,
        pc: u32,
    },

    /// Wrapper for backing-store faults, carrying address and access kind.
    MemoryAccess {
        addr: u32,
        access: AccessType,
        pc: u32,
    },

    /// Kernel-only address touched in user mode, or the TLB denied rights.
    PrivilegeViolation { addr: u32, access: AccessType },

    /// The `syscall` instruction executed; `code` snapshots `$v0`.
    Syscall { code: u32, pc: u32 },

    /// A trap instruction (`teq`, `tne`, ...) fired.
    Trap { name: &'static str, pc: u32 },

    /// A bitfield position/width or register-pair constraint was violated.
    Range { what: &'static str, pc: u32 },
}

impl CpuException {
    /// The program counter carried by this exception, if any.
    pub fn pc(&self) -> Option<u32> {
        match self {
            CpuException::InvalidInstruction { pc, .. }
            | CpuException::ArithmeticOverflow { pc }
            | CpuException::AddressError { pc, .. }
            | CpuException::MemoryAccess { pc, .. }
            | CpuException::Syscall { pc, .. }
            | CpuException::Trap { pc, .. }
            | CpuException::Range { pc, .. } => Some(*pc),
            CpuException::PrivilegeViolation { .. } => None,
        }
    }
}

/// Attaches the executing instruction's PC to exceptions that lack one and
/// rewrites `AddressError` as `MemoryAccess` for uniform surfacing.
pub fn normalize_cpu_exception(err: CpuException, pc: u32) -> CpuException {
    match err {
        CpuException::AddressError {
            addr,
            access,
            pc: fault_pc,
        } => CpuException::MemoryAccess {
            addr,
            access,
            pc: if fault_pc == 0 { pc } else { fault_pc },
        },
        other => other,
    }
}

impl fmt::Display for CpuException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuException::InvalidInstruction { word, pc } => {
                write!(f, "invalid instruction {:#010x} at pc {:#010x}", word, pc)
            }
            CpuException::ArithmeticOverflow { pc } => {
                write!(f, "arithmetic overflow at pc {:#010x}", pc)
            }
            CpuException::AddressError { addr, access, pc } => {
                write!(
                    f,
                    "address error: {} of {:#010x} at pc {:#010x}",
                    access.label(),
                    addr,
                    pc
                )
            }
            CpuException::MemoryAccess { addr, access, pc } => {
                write!(
                    f,
                    "memory access fault: {} of {:#010x} at pc {:#010x}",
                    access.label(),
                    addr,
                    pc
                )
            }
            CpuException::PrivilegeViolation { addr, access } => {
                write!(
                    f,
                    "privilege violation: {} of {:#010x} in user mode",
                    access.label(),
                    addr
                )
            }
            CpuException::Syscall { code, pc } => {
                write!(f, "syscall {} at pc {:#010x}", code, pc)
            }
            CpuException::Trap { name, pc } => {
                write!(f, "trap {} at pc {:#010x}", name, pc)
            }
            CpuException::Range { what, pc } => {
                write!(f, "range violation: {} at pc {:#010x}", what, pc)
            }
        }
    }
}

impl std::error::Error for CpuException {}
