//! CPU core.
//!
//! Architectural machine state, hazard classification and detection,
//! the interrupt controller, the breakpoint interface, and the
//! five-stage pipeline simulator.

/// Breakpoint engine interface and the address-set implementation.
pub mod breakpoint;

/// Hazard classification and detection.
pub mod hazard;

/// Interrupt controller.
pub mod interrupt;

/// The five-stage pipeline.
pub mod pipeline;

/// Machine state: registers, COP0/COP1, delayed branch, reservation.
pub mod state;

pub use breakpoint::{BreakpointEngine, BreakpointSet, NoBreakpoints};
pub use interrupt::{InterruptController, InterruptKind, InterruptRequest};
pub use pipeline::snapshot::{Observer, PipelineSnapshot, RuntimeSnapshot, StepOutcome};
pub use pipeline::Pipeline;
pub use state::{BranchState, DelayedBranch, Fpu, MachineState, RegisterFile};
