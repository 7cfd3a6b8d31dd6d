//! Instruction Set Architecture.
//!
//! Instruction word field accessors, the decoder (a pure function from
//! an instruction word and its PC to a decoded operation), the
//! executor (pattern-match dispatch over the operation sum type), and
//! FPU conversion helpers.

/// The decoder.
pub mod decoder;

/// The per-opcode semantic functions.
pub mod exec;

/// FPU conversion and clamping helpers.
pub mod fpu;

/// Instruction word field accessors.
pub mod instruction;

/// Decoded operation types.
pub mod op;

pub use decoder::decode;
pub use exec::{execute, ExecEffect};
pub use instruction::Instruction;
pub use op::{Decoded, Op};
